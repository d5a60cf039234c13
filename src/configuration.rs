pub mod config;
pub mod size;
pub mod types;

pub use config::{ModuleArgs, RunConfig};
pub use types::{DesiredSpec, DesiredState, PortMapping, Protocol, RegistryCredentials, VolumeMount};
