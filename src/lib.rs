pub mod configuration;
pub use configuration::{DesiredSpec, DesiredState, ModuleArgs, RunConfig};

pub mod engine_client;
pub use engine_client::{DockerEngine, EngineClient, EngineEndpoint};

pub mod error_handling;
pub use error_handling::{ConfigError, EngineError, ReconcileError};

pub mod reconciliation;
pub use reconciliation::{run, HostResult, ReconcileOptions, ReconciliationResult, Reconciler};
