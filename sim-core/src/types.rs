//! Basic simulation types

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical timestamp carried by every message
pub type Timestamp = u64;

/// Account balance. Arbitrary precision and never negative.
pub type Balance = num::BigUint;

/// Parse a decimal balance, rejecting signs and garbage
pub fn parse_balance(text: &str) -> Result<Balance, CoreError> {
    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(CoreError::InvalidAmount(format!(
            "negative amount {}",
            trimmed
        )));
    }
    trimmed
        .parse::<Balance>()
        .map_err(|e| CoreError::InvalidAmount(format!("{}: {}", trimmed, e)))
}

/// Account identity. Plain integer, compared by value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Address(u64);

impl Address {
    /// Create a new address
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Underlying integer id
    pub const fn id(&self) -> u64 {
        self.0
    }

    /// Big-endian byte form, used for hashing
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Address {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse::<u64>()
            .map(Address)
            .map_err(|_| CoreError::InvalidAddress(s.to_string()))
    }
}

/// 32-byte digest of a ledger's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRoot([u8; 32]);

impl StateRoot {
    /// Create a new root from a byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying byte array
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Zero root (all bytes are 0)
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl Default for StateRoot {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for StateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<[u8; 32]> for StateRoot {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = Address::new(42);
        assert_eq!(addr.to_string(), "#42");
        assert_eq!("#42".parse::<Address>().unwrap(), addr);
        assert_eq!(" 42 ".parse::<Address>().unwrap(), addr);
        assert!("forty-two".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_equality_is_by_value() {
        assert_eq!(Address::new(7), Address::from(7));
        assert_ne!(Address::new(7), Address::new(8));
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance("1000").unwrap(), Balance::from(1000u32));
        assert_eq!(
            parse_balance("340282366920938463463374607431768211456").unwrap(),
            Balance::from(u128::MAX) + 1u32
        );
        assert!(matches!(
            parse_balance("-5"),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(parse_balance("ten").is_err());
    }

    #[test]
    fn test_state_root_hex() {
        let root = StateRoot::zero();
        assert_eq!(
            root.to_hex(),
            "0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(StateRoot::new([1u8; 32]).to_string().len(), 66);
    }
}
