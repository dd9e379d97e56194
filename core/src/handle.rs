use std::fmt;
use std::str::FromStr;

use crate::types::{Address, HexError, decode_fixed};

/// Opaque reference to an on-chain ciphertext.
///
/// A handle only means something together with the contract it was read from, see
/// [`BoundHandle`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptedHandle(pub [u8; 32]);

impl EncryptedHandle {
    /// Returned for accounts that were never funded
    pub const EMPTY: EncryptedHandle = EncryptedHandle([0u8; 32]);

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Short form for display: `0x12345678…abcdef`
    pub fn masked(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..10], &full[full.len() - 6..])
    }
}

impl FromStr for EncryptedHandle {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s).map(EncryptedHandle)
    }
}

impl fmt::Display for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedHandle({})", self.masked())
    }
}

/// A handle paired with the contract that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundHandle {
    pub handle: EncryptedHandle,
    pub contract: Address,
}

impl BoundHandle {
    pub fn new(handle: EncryptedHandle, contract: Address) -> Self {
        Self { handle, contract }
    }
}
