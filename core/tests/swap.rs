mod common;

use common::*;
use zaswap_core::{ClientError, EngineError, Settled, SwapState, TokenAmount};

#[tokio::test]
async fn confirmed_swap_forces_one_fresh_handle_read() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    orch.refresh_balance().await;
    assert_eq!(orch.view().handle, Some(chain.handle_of(ALICE)));
    let invalidations = orch.handles().invalidation_count();
    let reads = chain.handle_reads.get();

    let request = orch.on_swap("1.0").await.current().unwrap().unwrap();

    assert_eq!(request.state(), SwapState::Confirmed { block_number: 4_200_001 });
    assert!(request.tx_hash().is_some());
    assert_eq!(request.error(), None);
    assert_eq!(orch.handles().invalidation_count(), invalidations + 1);
    assert_eq!(chain.handle_reads.get(), reads + 1);

    let fresh = chain.handle_of(ALICE);
    assert!(!fresh.is_empty());
    assert_eq!(orch.handles().current().map(|b| b.handle), Some(fresh));

    let view = orch.view();
    assert!(!view.swapping);
    assert_eq!(view.swap_status.as_deref(), Some("Swap confirmed in block 4200001"));
    assert_eq!(view.handle, Some(fresh));
    assert_eq!(view.clear_balance, None);
}

#[tokio::test]
async fn pending_status_shows_transaction_hash() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let release = wallet.gates.hold("confirm");
    let (request, ()) = tokio::join!(orch.on_swap("0.1"), async {
        tokio::task::yield_now().await;
        let view = orch.view();
        assert!(view.swapping);
        assert_eq!(
            view.swap_status,
            Some(format!("Swapping... tx: 0x{}", "01".repeat(32)))
        );
        release.send(()).unwrap();
    });

    let request = request.current().unwrap().unwrap();
    assert!(matches!(request.state(), SwapState::Confirmed { .. }));
}

#[tokio::test]
async fn wrong_network_submits_nothing() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    wallet.chain_id.set(1);
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let request = orch.on_swap("0.1").await.current().unwrap().unwrap();
    assert_eq!(request.state(), SwapState::Failed);
    assert_eq!(request.tx_hash(), None);
    assert_eq!(
        request.error(),
        Some(&EngineError::WrongNetwork {
            expected: SEPOLIA,
            expected_name: "Sepolia".into(),
            actual: 1,
        })
    );
    assert_eq!(wallet.submits.get(), 0);
    assert!(!orch.view().swapping);
}

#[tokio::test]
async fn rejected_submission_has_no_hash() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    *wallet.submit_error.borrow_mut() = Some(ClientError::Rejected("User denied".into()));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let request = orch.on_swap("0.1").await.current().unwrap().unwrap();
    assert_eq!(request.state(), SwapState::Failed);
    assert_eq!(request.tx_hash(), None);
    assert_eq!(request.error(), Some(&EngineError::UserRejected));
    assert_eq!(
        orch.view().swap_status.as_deref(),
        Some("Request rejected in wallet.")
    );
}

#[tokio::test]
async fn node_error_is_submission_failed() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    *wallet.submit_error.borrow_mut() =
        Some(ClientError::Transport("insufficient funds for gas".into()));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let request = orch.on_swap("0.1").await.current().unwrap().unwrap();
    assert_eq!(
        request.error(),
        Some(&EngineError::SubmissionFailed("insufficient funds for gas".into()))
    );
    assert_eq!(request.tx_hash(), None);
}

#[tokio::test]
async fn revert_after_submission_keeps_hash() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    *wallet.receipt.borrow_mut() = ReceiptMode::Revert(Some("Insufficient liquidity".into()));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);
    let invalidations = orch.handles().invalidation_count();

    let request = orch.on_swap("2").await.current().unwrap().unwrap();
    assert_eq!(request.state(), SwapState::Failed);
    assert!(request.tx_hash().is_some());
    assert_eq!(
        request.error(),
        Some(&EngineError::ExecutionReverted {
            reason: Some("Insufficient liquidity".into())
        })
    );
    assert_eq!(orch.handles().invalidation_count(), invalidations);
    assert_eq!(
        orch.view().swap_status.as_deref(),
        Some("Swap reverted on-chain: Insufficient liquidity")
    );
}

#[tokio::test]
async fn lost_confirmation_keeps_hash() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    *wallet.receipt.borrow_mut() = ReceiptMode::Lost;
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let request = orch.on_swap("0.1").await.current().unwrap().unwrap();
    assert_eq!(request.state(), SwapState::Failed);
    assert!(request.tx_hash().is_some());
    assert_eq!(
        request.error(),
        Some(&EngineError::SubmissionFailed("transaction dropped".into()))
    );
}

#[tokio::test]
async fn invalid_amount_is_rejected_before_the_wallet() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    for input in ["", "0", "-1", "ten"] {
        let settled = orch.on_swap(input).await;
        assert!(matches!(
            settled,
            Settled::Current(Err(EngineError::InputInvalid(_)))
        ));
    }
    assert_eq!(wallet.submits.get(), 0);
    assert_eq!(
        orch.view().swap_status.as_deref(),
        Some("Enter an ETH amount greater than zero.")
    );
}

#[tokio::test]
async fn disconnected_wallet_cannot_swap() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, None);
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let request = orch.on_swap("0.1").await.current().unwrap().unwrap();
    assert_eq!(request.error(), Some(&EngineError::WalletDisconnected));
    assert_eq!(request.tx_hash(), None);
    assert_eq!(wallet.submits.get(), 0);
}

#[tokio::test]
async fn only_one_swap_in_flight() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let release = wallet.gates.hold("confirm");
    let (first, second) = tokio::join!(orch.on_swap("0.1"), async {
        let second = orch.on_swap("0.2").await;
        release.send(()).unwrap();
        second
    });

    assert!(matches!(
        first.current().unwrap().unwrap().state(),
        SwapState::Confirmed { .. }
    ));
    assert_eq!(second, Settled::Current(Err(EngineError::SwapInProgress)));
    assert_eq!(wallet.submits.get(), 1);

    // the slot is free again
    let third = orch.on_swap("0.3").await.current().unwrap().unwrap();
    assert!(matches!(third.state(), SwapState::Confirmed { .. }));
}

#[tokio::test]
async fn quotes_are_not_blocked_by_a_pending_swap() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let release = wallet.gates.hold("confirm");
    let (swap, quote) = tokio::join!(orch.on_swap("1"), async {
        let quote = orch.on_amount_change("0.5").await;
        assert!(orch.view().swapping);
        release.send(()).unwrap();
        quote
    });

    assert!(swap.current().unwrap().is_ok());
    assert_eq!(
        quote.current().unwrap().unwrap().unwrap().output.raw(),
        1_650_000_000
    );
}

#[tokio::test]
async fn account_switch_during_swap_skips_invalidation() {
    let chain = MockChain::default();
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    let orch = orchestrator(&chain, &wallet, &relayer);

    let release = wallet.gates.hold("confirm");
    let (swap, ()) = tokio::join!(orch.on_swap("1"), async {
        orch.on_account_change(Some(BOB)).await;
        release.send(()).unwrap();
    });
    let after_switch = orch.handles().invalidation_count();

    let request = swap.current().unwrap().unwrap();
    assert!(matches!(request.state(), SwapState::Confirmed { .. }));
    assert_eq!(orch.handles().account(), Some(BOB));
    assert_eq!(orch.handles().invalidation_count(), after_switch);
}

#[tokio::test]
async fn swap_from_previous_account_keeps_new_account_balance() {
    let chain = MockChain::default();
    let bob_handle = chain.credit(BOB);
    let wallet = MockWallet::new(&chain, Some(ALICE));
    let relayer = MockRelayer::default();
    relayer.knows(bob_handle, 5_000_000);
    let orch = orchestrator(&chain, &wallet, &relayer);

    let release = wallet.gates.hold("confirm");
    let (swap, reads) = tokio::join!(orch.on_swap("1"), async {
        orch.on_account_change(Some(BOB)).await;
        let value = orch.on_decrypt().await;
        assert_eq!(value, Settled::Current(Ok(TokenAmount::from_raw(5_000_000))));
        let reads = chain.handle_reads.get();
        release.send(()).unwrap();
        reads
    });

    let request = swap.current().unwrap().unwrap();
    assert!(matches!(request.state(), SwapState::Confirmed { .. }));
    assert!(!request.invalidated_balance());
    assert_eq!(chain.handle_reads.get(), reads);

    let view = orch.view();
    assert_eq!(view.handle, Some(bob_handle));
    assert_eq!(view.clear_balance, Some(TokenAmount::from_raw(5_000_000)));
}
