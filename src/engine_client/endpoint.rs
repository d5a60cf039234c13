//! Normalisation of the `docker_url` argument.

use std::fmt;

use crate::error_handling::types::ConfigError;

pub const DEFAULT_ENGINE_PORT: u16 = 4243;

/// Where the engine's remote API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    /// Plain HTTP, always with an explicit port, e.g. `http://127.0.0.1:4243`.
    Http { base_url: String },
    /// Local socket, e.g. `unix:///var/run/docker.sock`.
    Unix { socket_path: String },
}

impl EngineEndpoint {
    /// Parses a URL, defaulting the scheme to `http` and the port to 4243.
    /// `tcp://` is treated as `http://`.
    pub fn parse(raw: &str) -> Result<EngineEndpoint, ConfigError> {
        let raw = raw.trim();
        let invalid = || ConfigError::InvalidUrl(raw.to_string());

        let (scheme, rest) = raw.split_once("://").unwrap_or(("http", raw));

        match scheme.to_ascii_lowercase().as_str() {
            "unix" => {
                if rest.is_empty() {
                    return Err(invalid());
                }
                return Ok(EngineEndpoint::Unix {
                    socket_path: rest.to_string(),
                });
            }
            "http" | "tcp" => {}
            _ => return Err(invalid()),
        }

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path.trim_end_matches('/')),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(invalid());
        }

        let port = match authority.strip_prefix('[') {
            Some(v6) => v6.split_once("]:").map(|(_, port)| port),
            None => authority.rsplit_once(':').map(|(_, port)| port),
        };
        let authority = match port {
            Some(port) => {
                port.parse::<u16>().map_err(|_| invalid())?;
                authority.to_string()
            }
            None => format!("{}:{}", authority, DEFAULT_ENGINE_PORT),
        };

        let base_url = if path.is_empty() {
            format!("http://{}", authority)
        } else {
            format!("http://{}/{}", authority, path)
        };
        Ok(EngineEndpoint::Http { base_url })
    }
}

impl fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEndpoint::Http { base_url } => f.write_str(base_url),
            EngineEndpoint::Unix { socket_path } => write!(f, "unix://{}", socket_path),
        }
    }
}
