use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::size::SizeValue;
use super::types::*;
use crate::engine_client::endpoint::EngineEndpoint;
use crate::error_handling::types::ConfigError;

pub const DEFAULT_DOCKER_URL: &str = "http://127.0.0.1:4243";
pub const DEFAULT_MEMORY_LIMIT: &str = "256MB";
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;

/// The argument record handed over by the orchestration host.
///
/// Every field is optional at the serde level so that a missing `image` or
/// `command` is reported as a [`ConfigError::MissingField`] rather than a
/// generic decoding error. Defaults mirror what the host documents:
///
/// - `count`: 1
/// - `memory_limit`: `"256MB"`
/// - `memory_swap`: 0
/// - `docker_url`: `http://127.0.0.1:4243`, or `DOCKER_URL` from the environment
/// - `detach`: true
/// - `state`: `present`
///
/// Hosts are loose about scalar types, so `count`, `detach`, `debug`,
/// `memory_swap`, `wait_timeout` and `deadline` accept either their native
/// JSON type or a string.
///
/// # Examples
///
/// ```
/// use dockside::configuration::config::ModuleArgs;
///
/// let args = ModuleArgs::from_json_str(r#"{"image": "busybox", "command": "sleep 600", "count": "3"}"#).unwrap();
/// let config = args.resolve().unwrap();
/// assert_eq!(config.spec.replica_count, 3);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleArgs {
    /// Desired number of matching containers.
    pub count: Option<Scalar>,

    /// Image reference, e.g. `nginx:1.25`. Required.
    pub image: Option<String>,

    /// Process command. Required; compared after trimming.
    pub command: Option<String>,

    /// Comma-separated port specification, see [`PortMapping`].
    pub ports: Option<String>,

    /// Either a mapping of container path to host path (empty for an
    /// anonymous volume) or a list of `host:container[:mode]` strings.
    pub volumes: Option<VolumesArg>,

    /// Container whose volumes are shared with the new containers.
    pub volumes_from: Option<String>,

    /// RAM allocated to each container, integer bytes or a size string.
    pub memory_limit: Option<SizeValue>,

    /// Swap allowance handed to the engine untouched.
    pub memory_swap: Option<Scalar>,

    /// Engine base URL. A missing port defaults to 4243, a missing scheme to `http`.
    pub docker_url: Option<String>,

    /// Registry user used when an image has to be pulled.
    #[serde(alias = "user")]
    pub username: Option<String>,

    /// Registry password used when an image has to be pulled.
    pub password: Option<String>,

    pub hostname: Option<String>,

    /// Environment variables; non-string values are rendered as JSON scalars.
    pub env: Option<BTreeMap<String, serde_json::Value>>,

    /// DNS servers, as a list or a comma-separated string.
    pub dns: Option<ListArg>,

    pub detach: Option<Scalar>,

    /// One of `present`, `absent`, `stop`, `kill`, `restart`.
    pub state: Option<String>,

    /// Raises log verbosity to debug.
    pub debug: Option<Scalar>,

    /// Seconds to wait for each container to exit after stop/kill. The wait
    /// is best-effort: running out of time is not an error.
    pub wait_timeout: Option<Scalar>,

    /// Overall deadline for the pass, in seconds. Every engine call must
    /// finish before it or the pass fails.
    pub deadline: Option<Scalar>,
}

/// A scalar the host may send either natively or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Scalar {
    fn as_bool(&self, field: &'static str) -> Result<bool, ConfigError> {
        match self {
            Scalar::Bool(b) => Ok(*b),
            Scalar::Int(0) => Ok(false),
            Scalar::Int(1) => Ok(true),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => Ok(true),
                "no" | "false" | "off" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{} is not a boolean", s),
                }),
            },
            Scalar::Int(n) => Err(ConfigError::InvalidValue {
                field,
                reason: format!("{} is not a boolean", n),
            }),
        }
    }

    fn as_int(&self, field: &'static str) -> Result<i64, ConfigError> {
        let invalid = |raw: String| ConfigError::InvalidValue {
            field,
            reason: format!("{} is not an integer", raw),
        };
        match self {
            Scalar::Int(n) => Ok(*n),
            Scalar::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid(s.clone())),
            Scalar::Bool(b) => Err(invalid(b.to_string())),
        }
    }

    fn as_seconds(&self, field: &'static str) -> Result<Duration, ConfigError> {
        let n = self.as_int(field)?;
        u64::try_from(n)
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidValue {
                field,
                reason: format!("{} is not a number of seconds", n),
            })
    }

    fn as_count(&self) -> Result<usize, ConfigError> {
        let invalid = |raw: String| ConfigError::InvalidCount(raw);
        match self {
            Scalar::Int(n) => usize::try_from(*n).map_err(|_| invalid(n.to_string())),
            Scalar::Text(s) => s.trim().parse::<usize>().map_err(|_| invalid(s.clone())),
            Scalar::Bool(b) => Err(invalid(b.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VolumesArg {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

impl VolumesArg {
    fn into_mounts(self) -> Result<Vec<VolumeMount>, ConfigError> {
        match self {
            VolumesArg::List(entries) => entries.iter().map(|e| VolumeMount::parse(e)).collect(),
            VolumesArg::Map(map) => map
                .into_iter()
                .map(|(container, host)| {
                    if host.trim().is_empty() {
                        VolumeMount::parse(&container)
                    } else {
                        VolumeMount::parse(&format!("{}:{}", host, container))
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListArg {
    List(Vec<String>),
    Text(String),
}

impl ListArg {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            ListArg::List(items) => items,
            ListArg::Text(text) => text.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// A validated record: what to converge to, where the engine is, and how
/// long calls may take.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub spec: DesiredSpec,
    pub endpoint: EngineEndpoint,
    pub wait_timeout: Duration,
    pub deadline: Option<Duration>,
    pub debug: bool,
}

impl ModuleArgs {
    /// Reads a record from `path`. `-` reads JSON from stdin; files ending
    /// in `.toml` are parsed as TOML, everything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if path == Path::new("-") {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            return Self::from_json_str(&raw);
        }

        let raw = std::fs::read_to_string(path)?;
        debug!("Read {} bytes of arguments from {}", raw.len(), path.display());
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Whether the record asks for debug logging. Invalid values count as false
    /// here; [`ModuleArgs::resolve`] reports them.
    pub fn debug_requested(&self) -> bool {
        self.debug
            .as_ref()
            .and_then(|d| d.as_bool("debug").ok())
            .unwrap_or(false)
    }

    /// Validates the record and applies defaults.
    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        let image = required(self.image, "image")?;
        let command = required(self.command, "command")?;

        let replica_count = match &self.count {
            Some(count) => count.as_count()?,
            None => 1,
        };

        let desired_state = match &self.state {
            Some(state) => state.parse()?,
            None => DesiredState::Present,
        };

        let memory_limit_bytes = match &self.memory_limit {
            Some(limit) => limit.to_bytes()?,
            None => super::size::human_to_bytes(DEFAULT_MEMORY_LIMIT)?,
        };

        let ports = match &self.ports {
            Some(spec) => PortMapping::parse_list(spec)?,
            None => Vec::new(),
        };

        let volumes = match self.volumes {
            Some(volumes) => volumes.into_mounts()?,
            None => Vec::new(),
        };

        let environment = self
            .env
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        let detach = match &self.detach {
            Some(detach) => detach.as_bool("detach")?,
            None => true,
        };
        let debug = match &self.debug {
            Some(debug) => debug.as_bool("debug")?,
            None => false,
        };

        let memory_swap = match &self.memory_swap {
            Some(swap) => swap.as_int("memory_swap")?,
            None => 0,
        };
        let wait_timeout = match &self.wait_timeout {
            Some(timeout) => timeout.as_seconds("wait_timeout")?,
            None => Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
        };
        let deadline = match &self.deadline {
            Some(deadline) => Some(deadline.as_seconds("deadline")?),
            None => None,
        };

        let credentials = non_empty(self.username).map(|username| RegistryCredentials {
            username,
            password: self.password,
        });

        let docker_url = non_empty(self.docker_url)
            .or_else(|| non_empty(std::env::var("DOCKER_URL").ok()))
            .unwrap_or_else(|| DEFAULT_DOCKER_URL.to_string());
        let endpoint = EngineEndpoint::parse(&docker_url)?;

        let spec = DesiredSpec {
            image,
            command,
            replica_count,
            ports,
            volumes,
            volumes_from: non_empty(self.volumes_from),
            memory_limit_bytes,
            memory_swap,
            environment,
            dns: self.dns.map(ListArg::into_vec).unwrap_or_default(),
            hostname: non_empty(self.hostname),
            detach,
            desired_state,
            credentials,
        };

        Ok(RunConfig {
            spec,
            endpoint,
            wait_timeout,
            deadline,
            debug,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
