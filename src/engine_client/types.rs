//! Plain data crossing the engine boundary.

use crate::configuration::types::{DesiredSpec, PortMapping, VolumeMount};

/// One row of the engine's container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub image: String,
    pub command: String,
}

/// A container as reported by inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedContainer {
    pub id: String,
    pub image: String,
    pub command: String,
    pub is_running: bool,
    /// The engine's inspect document, handed back to the host untouched.
    pub raw_details: serde_json::Value,
}

/// Everything the engine needs to create one replica.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub image: String,
    pub command: Vec<String>,
    pub hostname: Option<String>,
    /// `KEY=VALUE` pairs.
    pub environment: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    pub volumes_from: Option<String>,
    pub memory_limit_bytes: u64,
    pub memory_swap: i64,
    pub dns: Vec<String>,
    pub detach: bool,
}

impl From<&DesiredSpec> for CreateRequest {
    fn from(spec: &DesiredSpec) -> Self {
        CreateRequest {
            image: spec.image.clone(),
            command: split_command(&spec.command),
            hostname: spec.hostname.clone(),
            environment: spec
                .environment
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
            ports: spec.ports.clone(),
            volumes: spec.volumes.clone(),
            volumes_from: spec.volumes_from.clone(),
            memory_limit_bytes: spec.memory_limit_bytes,
            memory_swap: spec.memory_swap,
            dns: spec.dns.clone(),
            detach: spec.detach,
        }
    }
}

/// Result of a create call. A missing image is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    ImageNotFound,
}

/// How waiting on one container ended. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i64),
    TimedOut,
    Failed(String),
}

/// Splits a command line into argv, honouring single quotes, double quotes
/// and backslash escapes the way a POSIX shell would.
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('"'), '"') => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        args.push(current);
    }
    args
}
