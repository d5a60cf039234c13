//! The call surface the reconciler drives.

use std::time::Duration;

use async_trait::async_trait;

use crate::configuration::types::RegistryCredentials;
use crate::engine_client::types::{
    ContainerSummary, CreateOutcome, CreateRequest, ObservedContainer, WaitOutcome,
};
use crate::error_handling::types::EngineError;

/// One method per engine primitive. Implementations hold no decision logic
/// and cache nothing: every call goes to the engine.
///
/// Batched operations take a slice of ids and apply the primitive to each in
/// order, stopping at the first failure.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// The engine's release string, e.g. `24.0.7`.
    async fn server_version(&self) -> Result<String, EngineError>;

    /// Running containers, in the engine's listing order.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError>;

    async fn inspect(&self, id: &str) -> Result<ObservedContainer, EngineError>;

    /// Creates (but does not start) one container.
    async fn create(&self, request: &CreateRequest) -> Result<CreateOutcome, EngineError>;

    async fn pull(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError>;

    async fn start(&self, ids: &[String]) -> Result<(), EngineError>;

    async fn stop(&self, ids: &[String]) -> Result<(), EngineError>;

    async fn kill(&self, ids: &[String]) -> Result<(), EngineError>;

    async fn restart(&self, ids: &[String]) -> Result<(), EngineError>;

    async fn remove(&self, ids: &[String]) -> Result<(), EngineError>;

    /// Blocks until each container has exited or `timeout` elapses for it.
    /// Never fails: problems are reported per id.
    async fn wait(&self, ids: &[String], timeout: Duration) -> Vec<(String, WaitOutcome)>;
}
