use alloy::primitives::Address;
use serde_json::Value;

use crate::error::ConnectorError;

pub fn chain_id_to_hex(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}

pub fn json_chain_id_to_u64(value: &Value) -> Result<u64, ConnectorError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| ConnectorError::InvalidChainId(format!("expected string or number, got {value}")))?;
    parse_chain_id(s)
}

/// Accepts `0x`-prefixed hex or plain decimal.
pub fn parse_chain_id(raw: &str) -> Result<u64, ConnectorError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|e| ConnectorError::InvalidChainId(format!("{raw:?}: {e}")))
}

/// Parses an address. Anything but all-lowercase hex must match its EIP-55 checksum exactly.
pub fn normalize_address(raw: &str) -> Result<Address, ConnectorError> {
    let address: Address = raw.parse().map_err(|e| ConnectorError::InvalidAddress {
        value: raw.to_owned(),
        reason: format!("{e}"),
    })?;
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    if digits.chars().any(|c| c.is_ascii_uppercase()) {
        let expected = address.to_checksum(None);
        if expected.trim_start_matches("0x") != digits {
            return Err(ConnectorError::InvalidAddress {
                value: raw.to_owned(),
                reason: "checksum mismatch".to_owned(),
            });
        }
    }
    Ok(address)
}

pub fn normalize_addresses(value: &Value) -> Result<Vec<Address>, ConnectorError> {
    let items = value.as_array().ok_or_else(|| ConnectorError::InvalidAddress {
        value: value.to_string(),
        reason: "account list must be an array".to_owned(),
    })?;
    items
        .iter()
        .map(|item| {
            let raw = item.as_str().ok_or_else(|| ConnectorError::InvalidAddress {
                value: item.to_string(),
                reason: "account must be a string".to_owned(),
            })?;
            normalize_address(raw)
        })
        .collect()
}

/// Serde adapter for `u64` quantities carried as `0x`-prefixed hex strings.
pub mod hex_quantity {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::chain_id_to_hex(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        super::json_chain_id_to_u64(&raw).map_err(D::Error::custom)
    }
}
