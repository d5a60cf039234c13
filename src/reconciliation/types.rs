use serde::Serialize;

use crate::engine_client::types::ObservedContainer;

/// Outcome of one successful reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationResult {
    /// True when at least one mutating engine call was issued.
    pub changed: bool,
    pub started_count: usize,
    pub stopped_count: usize,
    pub killed_count: usize,
    pub restarted_count: usize,
    pub summary: Vec<ObservedContainer>,
    pub message: String,
}

impl ReconciliationResult {
    /// Fills in `message` from the counters.
    pub fn with_message(mut self, image: &str, command: &str) -> Self {
        self.message = format!(
            "Started {}, stopped {}, killed {}, restarted {} container(s) running image {} with command {}",
            self.started_count,
            self.stopped_count,
            self.killed_count,
            self.restarted_count,
            image,
            command
        );
        self
    }
}

/// Facts published back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostFacts {
    #[serde(rename = "DockerContainers")]
    pub docker_containers: Vec<serde_json::Value>,
}

/// The record printed to stdout for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResult {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible_facts: Option<HostFacts>,
}

impl HostResult {
    pub fn failure(changed: bool, msg: impl Into<String>) -> Self {
        HostResult {
            failed: true,
            changed,
            msg: msg.into(),
            ansible_facts: None,
        }
    }
}

impl From<ReconciliationResult> for HostResult {
    fn from(result: ReconciliationResult) -> Self {
        HostResult {
            failed: false,
            changed: result.changed,
            msg: result.message,
            ansible_facts: Some(HostFacts {
                docker_containers: result
                    .summary
                    .into_iter()
                    .map(|c| c.raw_details)
                    .collect(),
            }),
        }
    }
}
