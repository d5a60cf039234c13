//! Human-readable size strings ("256MB") to byte counts.

use serde::Deserialize;
use std::sync::LazyLock;

use regex::Regex;

use crate::error_handling::types::ConfigError;

/// Unit suffixes, indexed by their power of 1024.
const SUFFIXES: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

static SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([KMGTP]?B)$").expect("size pattern is valid"));

/// A size as the host may send it: already a number, or a suffixed string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn to_bytes(&self) -> Result<u64, ConfigError> {
        match self {
            SizeValue::Bytes(n) => Ok(*n),
            SizeValue::Text(s) => human_to_bytes(s),
        }
    }
}

/// Converts `"10B"`, `"512KB"`, `"256MB"` ... `"1PB"` to bytes.
///
/// Only the suffixes in [`SUFFIXES`] are recognised; `"1G"` or a bare `"1024"`
/// are rejected.
pub fn human_to_bytes(input: &str) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    let captures = SIZE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ConfigError::InvalidSize(input.to_string()))?;

    let number: u64 = captures[1]
        .parse()
        .map_err(|_| ConfigError::InvalidSize(input.to_string()))?;
    let power = SUFFIXES
        .iter()
        .position(|s| *s == &captures[2])
        .ok_or_else(|| ConfigError::InvalidSize(input.to_string()))?;

    1024u64
        .checked_pow(power as u32)
        .and_then(|factor| number.checked_mul(factor))
        .ok_or_else(|| ConfigError::InvalidSize(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_known_suffixes() {
        assert_eq!(human_to_bytes("256MB").unwrap(), 268_435_456);
        assert_eq!(human_to_bytes("10B").unwrap(), 10);
        assert_eq!(human_to_bytes("4KB").unwrap(), 4096);
        assert_eq!(human_to_bytes("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(human_to_bytes("1TB").unwrap(), 1024u64.pow(4));
        assert_eq!(human_to_bytes("1PB").unwrap(), 1024u64.pow(5));
    }

    #[test]
    fn rejects_unknown_forms() {
        for bad in ["1G", "1024", "MB", "B", "1.5GB", "-1MB", "", "12 MB", "1mb"] {
            assert!(
                matches!(human_to_bytes(bad), Err(ConfigError::InvalidSize(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(human_to_bytes("99999999999PB").is_err());
    }

    #[test]
    fn integers_pass_through() {
        assert_eq!(SizeValue::Bytes(1_048_576).to_bytes().unwrap(), 1_048_576);
        assert_eq!(
            SizeValue::Text("256MB".to_string()).to_bytes().unwrap(),
            268_435_456
        );
    }

    #[test]
    fn deserializes_either_shape() {
        let n: SizeValue = serde_json::from_str("1048576").unwrap();
        assert_eq!(n, SizeValue::Bytes(1_048_576));
        let s: SizeValue = serde_json::from_str("\"64MB\"").unwrap();
        assert_eq!(s, SizeValue::Text("64MB".to_string()));
    }
}
