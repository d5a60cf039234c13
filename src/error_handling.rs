//! Error taxonomy shared by configuration, the engine adapter and the reconciler.

pub mod types;

pub use types::{ConfigError, EngineError, ReconcileError};
