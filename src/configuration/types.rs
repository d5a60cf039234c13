use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error_handling::types::ConfigError;

/// The state the host wants the matching containers to converge to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    /// Exactly `replica_count` matching containers running.
    Present,
    /// Matching containers stopped and removed.
    Absent,
    /// Matching containers stopped but kept.
    Stopped,
    /// Matching containers killed and removed.
    Killed,
    /// Matching containers restarted in place.
    Restarted,
}

impl FromStr for DesiredState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            "stop" | "stopped" => Ok(DesiredState::Stopped),
            "kill" | "killed" => Ok(DesiredState::Killed),
            "restart" | "restarted" => Ok(DesiredState::Restarted),
            _ => Err(ConfigError::InvalidState(s.to_string())),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DesiredState::Present => "present",
            DesiredState::Absent => "absent",
            DesiredState::Stopped => "stop",
            DesiredState::Killed => "kill",
            DesiredState::Restarted => "restart",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Protocol {
    TCP,
    UDP,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::TCP => "tcp",
            Protocol::UDP => "udp",
        }
    }
}

/// One entry of the `ports` argument.
///
/// Accepted forms: `80`, `:8080` (same port on the host), `8080:80`,
/// `127.0.0.1:8080:80`, each optionally suffixed with `/tcp` or `/udp`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ip: Option<String>,
    /// `None` lets the engine pick an ephemeral host port.
    pub host_port: Option<u16>,
}

impl PortMapping {
    /// Parses a comma-separated port specification.
    pub fn parse_list(spec: &str) -> Result<Vec<PortMapping>, ConfigError> {
        spec.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(PortMapping::parse)
            .collect()
    }

    fn parse(entry: &str) -> Result<PortMapping, ConfigError> {
        let invalid = || ConfigError::InvalidPorts(entry.to_string());

        let (body, protocol) = match entry.rsplit_once('/') {
            Some((body, "tcp")) => (body, Protocol::TCP),
            Some((body, "udp")) => (body, Protocol::UDP),
            Some(_) => return Err(invalid()),
            None => (entry, Protocol::TCP),
        };

        let port = |s: &str| s.parse::<u16>().ok().filter(|p| *p > 0);
        let parts: Vec<&str> = body.split(':').collect();
        let (host_ip, host_port, container_port) = match parts.as_slice() {
            [container] => (None, None, port(*container).ok_or_else(invalid)?),
            ["", container] => {
                let p = port(*container).ok_or_else(invalid)?;
                (None, Some(p), p)
            }
            [host, container] => (
                None,
                Some(port(*host).ok_or_else(invalid)?),
                port(*container).ok_or_else(invalid)?,
            ),
            [ip, host, container] if !ip.is_empty() => {
                let host_port = if host.is_empty() {
                    None
                } else {
                    Some(port(*host).ok_or_else(invalid)?)
                };
                (
                    Some(ip.to_string()),
                    host_port,
                    port(*container).ok_or_else(invalid)?,
                )
            }
            _ => return Err(invalid()),
        };

        Ok(PortMapping {
            container_port,
            protocol,
            host_ip,
            host_port,
        })
    }

    /// Engine-side key, e.g. `80/tcp`.
    pub fn port_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol.as_str())
    }
}

/// A volume to mount. Without `host_path` the engine creates an anonymous volume.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VolumeMount {
    pub container_path: String,
    pub host_path: Option<String>,
    pub mode: Option<String>,
}

impl VolumeMount {
    /// Parses `container`, `host:container` or `host:container:mode`.
    pub fn parse(entry: &str) -> Result<VolumeMount, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "volumes",
            reason: format!("{}: {}", entry, reason),
        };
        let parts: Vec<&str> = entry.trim().split(':').collect();
        let mount = match parts.as_slice() {
            [container] => VolumeMount {
                container_path: container.to_string(),
                host_path: None,
                mode: None,
            },
            [host, container] => VolumeMount {
                container_path: container.to_string(),
                host_path: Some(host.to_string()),
                mode: None,
            },
            [host, container, mode] => {
                if !matches!(*mode, "ro" | "rw") {
                    return Err(invalid("mode must be ro or rw"));
                }
                VolumeMount {
                    container_path: container.to_string(),
                    host_path: Some(host.to_string()),
                    mode: Some(mode.to_string()),
                }
            }
            _ => return Err(invalid("too many ':' separators")),
        };
        if mount.container_path.is_empty() || mount.host_path.as_deref() == Some("") {
            return Err(invalid("empty path"));
        }
        Ok(mount)
    }

    /// Bind string for the engine's host config, if this mount has a host side.
    pub fn bind(&self) -> Option<String> {
        let host = self.host_path.as_ref()?;
        Some(match &self.mode {
            Some(mode) => format!("{}:{}:{}", host, self.container_path, mode),
            None => format!("{}:{}", host, self.container_path),
        })
    }
}

/// Credentials forwarded to the engine when pulling a missing image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: Option<String>,
}

/// Everything one reconciliation pass needs to know about the desired containers.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredSpec {
    pub image: String,
    pub command: String,
    pub replica_count: usize,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    pub volumes_from: Option<String>,
    pub memory_limit_bytes: u64,
    pub memory_swap: i64,
    pub environment: BTreeMap<String, String>,
    pub dns: Vec<String>,
    pub hostname: Option<String>,
    pub detach: bool,
    pub desired_state: DesiredState,
    pub credentials: Option<RegistryCredentials>,
}

impl DesiredSpec {
    /// A spec with the host defaults for everything but image and command.
    pub fn new(image: impl Into<String>, command: impl Into<String>) -> Self {
        DesiredSpec {
            image: image.into(),
            command: command.into(),
            replica_count: 1,
            ports: Vec::new(),
            volumes: Vec::new(),
            volumes_from: None,
            memory_limit_bytes: 256 * 1024 * 1024,
            memory_swap: 0,
            environment: BTreeMap::new(),
            dns: Vec::new(),
            hostname: None,
            detach: true,
            desired_state: DesiredState::Present,
            credentials: None,
        }
    }

    pub fn with_count(mut self, replica_count: usize) -> Self {
        self.replica_count = replica_count;
        self
    }

    pub fn with_state(mut self, desired_state: DesiredState) -> Self {
        self.desired_state = desired_state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_aliases() {
        assert_eq!("present".parse::<DesiredState>().unwrap(), DesiredState::Present);
        assert_eq!("stop".parse::<DesiredState>().unwrap(), DesiredState::Stopped);
        assert_eq!("Killed".parse::<DesiredState>().unwrap(), DesiredState::Killed);
        assert_eq!("restart".parse::<DesiredState>().unwrap(), DesiredState::Restarted);
        assert!(matches!(
            "paused".parse::<DesiredState>(),
            Err(ConfigError::InvalidState(_))
        ));
        assert_eq!(DesiredState::Stopped.to_string(), "stop");
    }

    #[test]
    fn port_forms() {
        let ports = PortMapping::parse_list("22, :8080,9000:80,127.0.0.1:5353:53/udp").unwrap();
        assert_eq!(ports.len(), 4);

        assert_eq!(ports[0].container_port, 22);
        assert_eq!(ports[0].host_port, None);

        assert_eq!(ports[1].container_port, 8080);
        assert_eq!(ports[1].host_port, Some(8080));

        assert_eq!(ports[2].container_port, 80);
        assert_eq!(ports[2].host_port, Some(9000));

        assert_eq!(ports[3].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[3].port_key(), "53/udp");
    }

    #[test]
    fn bad_ports() {
        for bad in ["http", "0", "80/sctp", "a:b:c:d", "70000"] {
            assert!(PortMapping::parse_list(bad).is_err(), "{bad}");
        }
        assert!(PortMapping::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn volume_forms() {
        let anon = VolumeMount::parse("/data").unwrap();
        assert_eq!(anon.bind(), None);

        let bound = VolumeMount::parse("/srv/www:/var/www:ro").unwrap();
        assert_eq!(bound.container_path, "/var/www");
        assert_eq!(bound.bind().as_deref(), Some("/srv/www:/var/www:ro"));

        assert!(VolumeMount::parse("/a:/b:rx").is_err());
        assert!(VolumeMount::parse(":/b").is_err());
    }
}
