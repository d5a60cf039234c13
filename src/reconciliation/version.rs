//! Engine version gate.

use std::cmp::Ordering;

use crate::error_handling::types::ReconcileError;

pub const MINIMUM_ENGINE_VERSION: &str = "0.3.3";

/// Numeric release components of a version string. Suffixes such as `-ce`
/// or `-rc.1` are ignored and trailing zeros are dropped, so `17.03` and
/// `17.3.0` compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion(Vec<u64>);

impl EngineVersion {
    pub fn parse(raw: &str) -> Option<EngineVersion> {
        let release = raw.trim().split(|c: char| c == '-' || c == '+').next().unwrap_or_default();
        let mut parts = Vec::new();
        for component in release.split('.') {
            let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
            match digits.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => break,
            }
        }
        if parts.is_empty() {
            return None;
        }
        while parts.last() == Some(&0) {
            parts.pop();
        }
        Some(EngineVersion(parts))
    }
}

impl PartialOrd for EngineVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Fails unless `found` is at least [`MINIMUM_ENGINE_VERSION`].
pub fn check_supported(found: &str) -> Result<(), ReconcileError> {
    let unsupported = || ReconcileError::UnsupportedEngineVersion {
        found: found.to_string(),
        minimum: MINIMUM_ENGINE_VERSION.to_string(),
    };
    let minimum = EngineVersion::parse(MINIMUM_ENGINE_VERSION).ok_or_else(unsupported)?;
    match EngineVersion::parse(found) {
        Some(version) if version >= minimum => Ok(()),
        _ => Err(unsupported()),
    }
}
