mod evm;

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;
use zaswap_config::ZaswapConfig;
use zaswap_core::{EngineConfig, Orchestrator, Settled, SwapState};
use zaswap_relayer::{HttpRelayer, HttpRelayerConfig};

use evm::{EvmReader, EvmWallet};

type Engine = Orchestrator<EvmReader, EvmWallet, HttpRelayer>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "quote" => {
            let Some(amount) = args.get(2) else {
                println!("Usage: quote <eth> [--offline]");
                println!("  --offline - Use the configured rate instead of the swap contract");
                return;
            };
            let offline = args[3..].iter().any(|a| a == "--offline");
            if let Err(e) = quote(amount, offline).await {
                eprintln!("❌ Error fetching quote: {}", e);
                std::process::exit(1);
            }
        }
        "swap" => {
            let Some(amount) = args.get(2) else {
                println!("Usage: swap <eth>");
                println!("  eth - Amount of ETH to swap for cUSDT");
                return;
            };
            if let Err(e) = swap(amount).await {
                eprintln!("❌ Error swapping: {}", e);
                std::process::exit(1);
            }
        }
        "balance" => {
            if let Err(e) = balance().await {
                eprintln!("❌ Error reading balance: {}", e);
                std::process::exit(1);
            }
        }
        "decrypt" => {
            if let Err(e) = decrypt().await {
                eprintln!("❌ Error decrypting balance: {}", e);
                std::process::exit(1);
            }
        }
        "address" => {
            if let Err(e) = address() {
                eprintln!("❌ Error: {}", e);
                std::process::exit(1);
            }
        }
        "config" => {
            print!("{}", ZaswapConfig::generate_sample());
        }
        "init" => {
            let path = args.get(2).map(PathBuf::from);
            if let Err(e) = init(path) {
                eprintln!("❌ Error writing config: {}", e);
                std::process::exit(1);
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("ZaSwap CLI - Swap ETH for confidential cUSDT");
    println!();
    println!("USAGE:");
    println!("  zaswap <command> [args]");
    println!();
    println!("SWAP COMMANDS:");
    println!("  quote <eth> [--offline]    Quote cUSDT for an ETH amount");
    println!("  swap <eth>                 Swap ETH for cUSDT");
    println!();
    println!("BALANCE COMMANDS:");
    println!("  balance                    Show the encrypted balance handle");
    println!("  decrypt                    Decrypt the balance through the relayer");
    println!();
    println!("OTHER COMMANDS:");
    println!("  address                    Show the signer and contract addresses");
    println!("  config                     Print a sample zaswap.toml");
    println!("  init [path]                Write a sample zaswap.toml");
    println!("  help                       Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  zaswap quote 0.5                     # 1650 cUSDT");
    println!("  zaswap quote 0.5 --offline           # Preview at the configured rate");
    println!("  zaswap swap 1                        # Swap 1 ETH");
    println!("  zaswap decrypt                       # Sign and decrypt balance");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  ZASWAP_PRIVATE_KEY   Signer key (hex); without it the wallet is disconnected");
    println!("  ZASWAP_CONFIG        Path to zaswap.toml");
    println!("  ZASWAP_RPC_URL       JSON-RPC endpoint");
    println!("  ZASWAP_RELAYER_URL   Decryption relayer");
    println!("  RUST_LOG             Log level (debug/info/warn/error)");
}

fn load_config() -> Result<(ZaswapConfig, EngineConfig)> {
    let config = ZaswapConfig::load()?;
    let engine = EngineConfig::from_config(&config).context("Invalid contract configuration")?;
    Ok((config, engine))
}

fn connect() -> Result<Engine> {
    let (config, engine) = load_config()?;

    let provider = evm::provider(&config.network.rpc_url)?;
    let wallet = match env::var("ZASWAP_PRIVATE_KEY") {
        Ok(key) => EvmWallet::with_key(provider.clone(), &key, engine.chain_id)?,
        Err(_) => EvmWallet::disconnected(provider.clone()),
    };
    let relayer = HttpRelayer::new(HttpRelayerConfig::new(
        config.relayer.url.clone(),
        engine.decryption_domain.clone(),
    ))
    .context("Failed to build relayer client")?;

    log::debug!(
        "Connected to {} ({}) via {}",
        engine.chain_name,
        engine.chain_id,
        config.network.rpc_url
    );
    Ok(Orchestrator::new(engine, EvmReader::new(provider), wallet, relayer))
}

/// Unwraps an engine outcome; nothing is superseded in a one-shot command
fn settled<T>(outcome: Settled<zaswap_core::Result<T>>) -> Result<T> {
    match outcome {
        Settled::Current(result) => Ok(result?),
        Settled::Stale => anyhow::bail!("Operation was cancelled"),
    }
}

async fn quote(amount: &str, offline: bool) -> Result<()> {
    let engine = connect()?;
    if offline {
        let output = engine.preview(amount)?;
        println!("{} ETH → {} (offline)", amount.trim(), output);
        return Ok(());
    }

    let quote = settled(engine.on_amount_change(amount).await)?;
    match quote {
        Some(q) => {
            println!("{} → {}", q.input, q.output);
            if let Ok(expected) = engine.preview(amount) {
                if expected != q.output {
                    log::warn!(
                        "On-chain quote {} differs from the configured rate ({})",
                        q.output,
                        expected
                    );
                }
            }
        }
        None => println!("--"),
    }
    Ok(())
}

async fn swap(amount: &str) -> Result<()> {
    let engine = connect()?;
    println!("Swapping {} ETH...", amount);

    let request = settled(engine.on_swap(amount).await)?;
    if let Some(hash) = request.tx_hash() {
        println!("   tx: {}", hash);
    }
    match request.state() {
        SwapState::Confirmed { .. } => println!("✓ {}", request.status_line()),
        _ => anyhow::bail!(request.status_line()),
    }

    if let Some(handle) = engine.view().masked_handle() {
        println!("   Encrypted balance: {}", handle);
    }
    Ok(())
}

async fn balance() -> Result<()> {
    let engine = connect()?;
    let bound = settled(engine.refresh_balance().await)?;
    println!("Encrypted balance: {}", bound.handle.masked());
    if bound.handle.is_empty() {
        println!("   (no balance yet)");
    }
    Ok(())
}

async fn decrypt() -> Result<()> {
    let engine = connect()?;
    let bound = settled(engine.refresh_balance().await)?;
    println!("Decrypting {}...", bound.handle.masked());

    let value = settled(engine.on_decrypt().await)?;
    println!("✓ Balance: {}", value);
    Ok(())
}

fn address() -> Result<()> {
    let (config, engine) = load_config()?;
    match env::var("ZASWAP_PRIVATE_KEY") {
        Ok(key) => {
            let provider = evm::provider(&config.network.rpc_url)?;
            let wallet = EvmWallet::with_key(provider, &key, engine.chain_id)?;
            if let Some(account) = zaswap_core::WalletSigner::account(&wallet) {
                println!("Signer:   {}", account);
            }
        }
        Err(_) => println!("Signer:   (not configured)"),
    }
    println!("Network:  {} ({})", engine.chain_name, engine.chain_id);
    println!("Token:    {}", engine.token_address);
    println!("Swap:     {}", engine.swap_address);
    println!("Verifier: {}", engine.decryption_domain.verifying_contract);
    Ok(())
}

fn init(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from("zaswap.toml"));
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    fs::write(&path, ZaswapConfig::generate_sample())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✓ Wrote {}", path.display());
    Ok(())
}
