//! Engine client adapter.
//!
//! A thin, stateless wrapper over the container engine's remote API. The
//! reconciler only talks to the [`EngineClient`] trait, so tests drive it
//! against an in-memory engine instead of a daemon.
//!
//! Re-exports:
//! - [`EngineClient`]: the call surface.
//! - [`DockerEngine`]: the Docker implementation.
//! - [`EngineEndpoint`]: a normalised `docker_url`.
//!
//! Example (non-running):
//! ```ignore
//! use std::time::Duration;
//! use dockside::engine_client::{DockerEngine, EngineClient, EngineEndpoint};
//!
//! let endpoint = EngineEndpoint::parse("http://127.0.0.1:4243")?;
//! let engine = DockerEngine::connect(&endpoint, Duration::from_secs(120))?;
//! println!("engine {}", engine.server_version().await?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod docker_engine;
pub mod endpoint;
#[cfg(test)]
pub mod recording;
pub mod types;

pub use client::EngineClient;
pub use docker_engine::DockerEngine;
pub use endpoint::EngineEndpoint;
pub use types::{ContainerSummary, CreateOutcome, CreateRequest, ObservedContainer, WaitOutcome};
