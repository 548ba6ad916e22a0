use ethers::types::{Address, H256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Converts a raw token quantity (integer string, e.g. wei) into a float
/// amount adjusted for the currency's decimals.
pub fn raw_quantity_to_amount(quantity: &str, decimals: u8) -> Result<f64, ConversionError> {
    let value = Decimal::from_str(quantity)
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))?;
    let divisor = Decimal::from(10u128.pow(decimals.min(28) as u32));
    (value / divisor)
        .to_f64()
        .ok_or_else(|| ConversionError::InvalidDecimal(quantity.to_string()))
}

/// Converts a U256 log amount into a float adjusted for decimals.
pub fn u256_to_amount(value: U256, decimals: u8) -> Result<f64, ConversionError> {
    raw_quantity_to_amount(&value.to_string(), decimals)
}

/// Lowercased 0x-prefixed address string, the canonical form used for cache
/// keys and marketplace joins.
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

/// Lowercased 0x-prefixed transaction hash, the join key between transfers
/// and marketplace events.
pub fn tx_hash_to_string(hash: H256) -> String {
    format!("{:?}", hash).to_lowercase()
}

/// Extracts an address from an indexed event topic (last 20 bytes).
pub fn topic_to_address(topic: H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// Extracts a token id from an indexed event topic.
pub fn topic_to_u256(topic: H256) -> U256 {
    U256::from_big_endian(topic.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_conversion_applies_decimals() {
        let eth = raw_quantity_to_amount("1500000000000000000", 18).unwrap();
        assert!((eth - 1.5).abs() < 1e-12);
        let whole = raw_quantity_to_amount("42", 0).unwrap();
        assert_eq!(whole, 42.0);
    }

    #[test]
    fn topic_round_trips_address() {
        let addr: Address = "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"
            .parse()
            .unwrap();
        let topic = H256::from(addr);
        assert_eq!(topic_to_address(topic), addr);
    }
}
