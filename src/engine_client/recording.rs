//! In-memory engine used by the unit tests. Every call is appended to a log
//! so tests can assert on exactly what a reconciliation pass issued.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::configuration::types::RegistryCredentials;
use crate::engine_client::client::EngineClient;
use crate::engine_client::types::{
    ContainerSummary, CreateOutcome, CreateRequest, ObservedContainer, WaitOutcome,
};
use crate::error_handling::types::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Version,
    List,
    Inspect(String),
    Create(String),
    Pull(String),
    Start(Vec<String>),
    Stop(Vec<String>),
    Kill(Vec<String>),
    Restart(Vec<String>),
    Remove(Vec<String>),
    Wait(Vec<String>),
}

impl Call {
    /// Calls that change engine state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Call::Version | Call::List | Call::Inspect(_) | Call::Wait(_)
        )
    }
}

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    image: String,
    command: String,
    running: bool,
}

struct State {
    version: String,
    containers: Vec<FakeContainer>,
    image_available: bool,
    pull_provides_image: bool,
    crash_on_start: bool,
    wait_outcome: WaitOutcome,
    failures: HashMap<&'static str, EngineError>,
    list_delay: Option<Duration>,
    wait_delay: Option<Duration>,
    last_wait_timeout: Option<Duration>,
    next_id: usize,
    calls: Vec<Call>,
}

pub struct RecordingEngine {
    state: Mutex<State>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        RecordingEngine {
            state: Mutex::new(State {
                version: "24.0.7".to_string(),
                containers: Vec::new(),
                image_available: true,
                pull_provides_image: true,
                crash_on_start: false,
                wait_outcome: WaitOutcome::Exited(0),
                failures: HashMap::new(),
                list_delay: None,
                wait_delay: None,
                last_wait_timeout: None,
                next_id: 1,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_version(self, version: &str) -> Self {
        self.lock().version = version.to_string();
        self
    }

    /// Seeds `count` running containers.
    pub fn with_running(self, image: &str, command: &str, count: usize) -> Self {
        {
            let mut state = self.lock();
            for _ in 0..count {
                let id = state.allocate_id();
                state.containers.push(FakeContainer {
                    id,
                    image: image.to_string(),
                    command: command.to_string(),
                    running: true,
                });
            }
        }
        self
    }

    /// Creates fail with "image not found" until a pull succeeds.
    pub fn without_image(self) -> Self {
        self.lock().image_available = false;
        self
    }

    /// Pulls succeed but the image never becomes available.
    pub fn pull_does_not_help(self) -> Self {
        self.lock().pull_provides_image = false;
        self
    }

    /// Started containers exit immediately.
    pub fn crash_on_start(self) -> Self {
        self.lock().crash_on_start = true;
        self
    }

    pub fn with_wait_outcome(self, outcome: WaitOutcome) -> Self {
        self.lock().wait_outcome = outcome;
        self
    }

    /// Makes every call to `operation` fail with `err`.
    pub fn failing(self, operation: &'static str, err: EngineError) -> Self {
        self.lock().failures.insert(operation, err);
        self
    }

    /// Delays the listing, to exercise deadlines.
    pub fn with_list_delay(self, delay: Duration) -> Self {
        self.lock().list_delay = Some(delay);
        self
    }

    /// Makes every wait take `delay`, regardless of its timeout.
    pub fn with_wait_delay(self, delay: Duration) -> Self {
        self.lock().wait_delay = Some(delay);
        self
    }

    /// Timeout passed to the most recent wait.
    pub fn last_wait_timeout(&self) -> Option<Duration> {
        self.lock().last_wait_timeout
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(*c)).count()
    }

    /// Ids of all containers still known to the engine, in creation order.
    pub fn container_ids(&self) -> Vec<String> {
        self.lock().containers.iter().map(|c| c.id.clone()).collect()
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.lock()
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| c.id.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Records `call`, then returns the scripted failure for `operation`, if any.
    fn record(&self, call: Call, operation: &'static str) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn apply(&self, ids: &[String], f: impl Fn(&mut FakeContainer, bool)) -> Result<(), EngineError> {
        let mut state = self.lock();
        let crash = state.crash_on_start;
        for id in ids {
            let container = state
                .containers
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| EngineError::daemon(404, format!("No such container: {}", id)))?;
            f(container, crash);
        }
        Ok(())
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        let id = format!("c{:03}", self.next_id);
        self.next_id += 1;
        id
    }
}

#[async_trait]
impl EngineClient for RecordingEngine {
    async fn server_version(&self) -> Result<String, EngineError> {
        self.record(Call::Version, "version")?;
        Ok(self.lock().version.clone())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        self.record(Call::List, "list")?;
        let delay = self.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .lock()
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                image: c.image.clone(),
                command: c.command.clone(),
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ObservedContainer, EngineError> {
        self.record(Call::Inspect(id.to_string()), "inspect")?;
        // a real inspect is a round trip
        tokio::task::yield_now().await;
        let state = self.lock();
        let c = state
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::daemon(404, format!("No such container: {}", id)))?;
        Ok(ObservedContainer {
            id: c.id.clone(),
            image: c.image.clone(),
            command: c.command.clone(),
            is_running: c.running,
            raw_details: json!({
                "Id": c.id,
                "Config": { "Image": c.image },
                "State": { "Running": c.running },
            }),
        })
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateOutcome, EngineError> {
        self.record(Call::Create(request.image.clone()), "create")?;
        let mut state = self.lock();
        if !state.image_available {
            return Ok(CreateOutcome::ImageNotFound);
        }
        let id = state.allocate_id();
        state.containers.push(FakeContainer {
            id: id.clone(),
            image: request.image.clone(),
            command: request.command.join(" "),
            running: false,
        });
        Ok(CreateOutcome::Created(id))
    }

    async fn pull(
        &self,
        image: &str,
        _credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError> {
        self.record(Call::Pull(image.to_string()), "pull")?;
        let mut state = self.lock();
        if state.pull_provides_image {
            state.image_available = true;
        }
        Ok(())
    }

    async fn start(&self, ids: &[String]) -> Result<(), EngineError> {
        self.record(Call::Start(ids.to_vec()), "start")?;
        self.apply(ids, |c, crash| c.running = !crash)
    }

    async fn stop(&self, ids: &[String]) -> Result<(), EngineError> {
        self.record(Call::Stop(ids.to_vec()), "stop")?;
        self.apply(ids, |c, _| c.running = false)
    }

    async fn kill(&self, ids: &[String]) -> Result<(), EngineError> {
        self.record(Call::Kill(ids.to_vec()), "kill")?;
        self.apply(ids, |c, _| c.running = false)
    }

    async fn restart(&self, ids: &[String]) -> Result<(), EngineError> {
        self.record(Call::Restart(ids.to_vec()), "restart")?;
        self.apply(ids, |c, crash| c.running = !crash)
    }

    async fn remove(&self, ids: &[String]) -> Result<(), EngineError> {
        self.record(Call::Remove(ids.to_vec()), "remove")?;
        tokio::task::yield_now().await;
        self.lock().containers.retain(|c| !ids.contains(&c.id));
        Ok(())
    }

    async fn wait(&self, ids: &[String], timeout: Duration) -> Vec<(String, WaitOutcome)> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::Wait(ids.to_vec()));
            state.last_wait_timeout = Some(timeout);
            state.wait_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        ids.iter()
            .map(|id| (id.clone(), state.wait_outcome.clone()))
            .collect()
    }
}
