use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use super::matching::MatchKey;
use super::types::{HostResult, ReconciliationResult};
use super::version::check_supported;
use crate::configuration::config::{RunConfig, DEFAULT_WAIT_TIMEOUT_SECS};
use crate::configuration::types::{DesiredSpec, DesiredState};
use crate::engine_client::client::EngineClient;
use crate::engine_client::types::{CreateOutcome, CreateRequest, ObservedContainer, WaitOutcome};
use crate::error_handling::types::{EngineError, ReconcileError};

/// Bounds applied to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// How long to wait for each stopped or killed container to exit.
    pub wait_timeout: Duration,
    /// Every engine call must complete before this instant.
    pub deadline: Option<Instant>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            deadline: None,
        }
    }
}

impl ReconcileOptions {
    /// Options for `config`, with the deadline counted from now.
    pub fn from_config(config: &RunConfig) -> Self {
        ReconcileOptions {
            wait_timeout: config.wait_timeout,
            deadline: config.deadline.map(|d| Instant::now() + d),
        }
    }
}

/// Drives one reconciliation pass against an engine.
///
/// The reconciler keeps no state between passes. The only thing it tracks
/// is whether it has issued a mutating call yet, so a failed pass can still
/// tell the host that something changed.
pub struct Reconciler<'a, E: EngineClient + ?Sized> {
    engine: &'a E,
    options: ReconcileOptions,
    pass_id: Uuid,
    changed: bool,
    /// Set once stop or kill has been issued: the inspect and remove that
    /// complete the branch are no longer bound by the deadline.
    finishing: bool,
}

impl<'a, E: EngineClient + ?Sized> Reconciler<'a, E> {
    pub fn new(engine: &'a E, options: ReconcileOptions) -> Self {
        Reconciler {
            engine,
            options,
            pass_id: Uuid::new_v4(),
            changed: false,
            finishing: false,
        }
    }

    pub fn pass_id(&self) -> Uuid {
        self.pass_id
    }

    /// Whether a mutating engine call has been issued so far.
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    pub async fn reconcile(&mut self, spec: &DesiredSpec) -> Result<ReconciliationResult, ReconcileError> {
        info!(
            "[{}] Reconciling {} x {} ({}) toward {}",
            self.pass_id, spec.replica_count, spec.image, spec.command, spec.desired_state
        );

        let version = self.call("version", self.engine.server_version()).await?;
        check_supported(&version)?;
        debug!("[{}] Engine version {} accepted", self.pass_id, version);

        let group = self.observe(spec).await?;
        let mut result = ReconciliationResult {
            changed: false,
            started_count: 0,
            stopped_count: 0,
            killed_count: 0,
            restarted_count: 0,
            summary: Vec::new(),
            message: String::new(),
        };

        if group.is_empty() && spec.desired_state != DesiredState::Present {
            info!(
                "[{}] No matching containers, nothing to {}",
                self.pass_id, spec.desired_state
            );
        } else {
            match spec.desired_state {
                DesiredState::Present => self.converge_count(spec, group, &mut result).await?,
                DesiredState::Absent => {
                    let ids = ids_of(&group);
                    let observed = self.halt(&ids, false).await?;
                    result.stopped_count = count_where(&observed, |c| !c.is_running);
                    self.remove(&ids).await?;
                    result.summary = observed;
                }
                DesiredState::Stopped => {
                    let observed = self.halt(&ids_of(&group), false).await?;
                    result.stopped_count = count_where(&observed, |c| !c.is_running);
                    result.summary = observed;
                }
                DesiredState::Killed => {
                    let ids = ids_of(&group);
                    let observed = self.halt(&ids, true).await?;
                    result.killed_count = count_where(&observed, |c| !c.is_running);
                    self.remove(&ids).await?;
                    result.summary = observed;
                }
                DesiredState::Restarted => {
                    let ids = ids_of(&group);
                    self.changed = true;
                    self.call("restart", self.engine.restart(&ids)).await?;
                    let observed = self.inspect_all(&ids).await?;
                    result.restarted_count = count_where(&observed, |c| c.is_running);
                    result.summary = observed;
                }
            }
        }

        result.changed = self.changed;
        Ok(result.with_message(&spec.image, &spec.command))
    }

    /// Lists running containers and inspects the ones matching `spec`, in
    /// the engine's listing order.
    async fn observe(&self, spec: &DesiredSpec) -> Result<Vec<ObservedContainer>, ReconcileError> {
        let key = MatchKey::for_spec(spec);
        let listed = self.call("list", self.engine.list_containers()).await?;

        let mut group = Vec::new();
        for summary in listed.iter().filter(|s| key.matches(s)) {
            group.push(self.call("inspect", self.engine.inspect(&summary.id)).await?);
        }
        info!(
            "[{}] {} of {} running containers match",
            self.pass_id,
            group.len(),
            listed.len()
        );
        Ok(group)
    }

    async fn converge_count(
        &mut self,
        spec: &DesiredSpec,
        mut group: Vec<ObservedContainer>,
        result: &mut ReconciliationResult,
    ) -> Result<(), ReconcileError> {
        let running = group.len();
        match spec.replica_count.cmp(&running) {
            Ordering::Equal => {
                info!("[{}] {} replicas already running", self.pass_id, running);
                result.summary = group;
            }
            Ordering::Greater => {
                let missing = spec.replica_count - running;
                info!("[{}] Scaling up by {}", self.pass_id, missing);
                let created = self.scale_up(spec, missing).await?;
                result.started_count = count_where(&created, |c| c.is_running);
                group.extend(created);
                result.summary = group;
            }
            Ordering::Less => {
                let excess = running - spec.replica_count;
                info!("[{}] Scaling down by {}", self.pass_id, excess);
                let survivors = group.split_off(excess);
                let ids = ids_of(&group);
                let observed = self.halt(&ids, false).await?;
                result.stopped_count = count_where(&observed, |c| !c.is_running);
                self.remove(&ids).await?;
                result.summary = survivors;
            }
        }
        Ok(())
    }

    /// Creates, starts and inspects `missing` new replicas. A missing image is
    /// pulled once, after which only the replicas still lacking are created.
    async fn scale_up(
        &mut self,
        spec: &DesiredSpec,
        missing: usize,
    ) -> Result<Vec<ObservedContainer>, ReconcileError> {
        let request = CreateRequest::from(spec);
        let mut created = self.create_replicas(&request, missing).await?;

        if created.len() < missing {
            info!("[{}] Image {} not found locally, pulling", self.pass_id, spec.image);
            self.changed = true;
            self.call(
                "pull",
                self.engine.pull(&spec.image, spec.credentials.as_ref()),
            )
            .await?;

            let retried = self
                .create_replicas(&request, missing - created.len())
                .await?;
            created.extend(retried);
            if created.len() < missing {
                return Err(ReconcileError::ImageNotFound(spec.image.clone()));
            }
        }

        self.changed = true;
        self.call("start", self.engine.start(&created)).await?;
        let observed = self.inspect_all(&created).await?;

        let started = count_where(&observed, |c| c.is_running);
        if started < created.len() {
            warn!(
                "[{}] {} of {} new containers are not running after start",
                self.pass_id,
                created.len() - started,
                created.len()
            );
        }
        Ok(observed)
    }

    /// Issues up to `count` creates, stopping early when the image is missing.
    async fn create_replicas(
        &mut self,
        request: &CreateRequest,
        count: usize,
    ) -> Result<Vec<String>, ReconcileError> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let outcome = self.call("create", self.engine.create(request)).await?;
            match outcome {
                CreateOutcome::Created(id) => {
                    self.changed = true;
                    debug!("[{}] Created container {}", self.pass_id, id);
                    ids.push(id);
                }
                CreateOutcome::ImageNotFound => break,
            }
        }
        Ok(ids)
    }

    /// Stops (or kills) `ids`, waits for them to exit and inspects them.
    async fn halt(&mut self, ids: &[String], kill: bool) -> Result<Vec<ObservedContainer>, ReconcileError> {
        self.changed = true;
        if kill {
            info!("[{}] Killing {} containers", self.pass_id, ids.len());
            self.call("kill", self.engine.kill(ids)).await?;
        } else {
            info!("[{}] Stopping {} containers", self.pass_id, ids.len());
            self.call("stop", self.engine.stop(ids)).await?;
        }
        self.finishing = true;
        self.settle(ids).await;
        self.inspect_all(ids).await
    }

    async fn remove(&mut self, ids: &[String]) -> Result<(), ReconcileError> {
        info!("[{}] Removing {} containers", self.pass_id, ids.len());
        self.changed = true;
        self.call("remove", self.engine.remove(ids)).await
    }

    /// Waits for `ids` to exit, for no longer than the time left before the
    /// deadline. Nothing here can fail the pass.
    async fn settle(&self, ids: &[String]) {
        let timeout = match self.options.deadline {
            Some(deadline) => self
                .options
                .wait_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.options.wait_timeout,
        };
        let wait = self.engine.wait(ids, timeout);
        let outcomes = match self.options.deadline {
            Some(deadline) => match timeout_at(deadline, wait).await {
                Ok(outcomes) => outcomes,
                Err(_) => ids
                    .iter()
                    .map(|id| (id.clone(), WaitOutcome::TimedOut))
                    .collect(),
            },
            None => wait.await,
        };

        for (id, outcome) in outcomes {
            match outcome {
                WaitOutcome::Exited(code) => {
                    debug!("[{}] Container {} exited with status {}", self.pass_id, id, code)
                }
                WaitOutcome::TimedOut => {
                    warn!("[{}] Timed out waiting for container {} to exit", self.pass_id, id)
                }
                WaitOutcome::Failed(reason) => {
                    warn!("[{}] Waiting for container {} failed: {}", self.pass_id, id, reason)
                }
            }
        }
    }

    async fn inspect_all(&self, ids: &[String]) -> Result<Vec<ObservedContainer>, ReconcileError> {
        let mut observed = Vec::with_capacity(ids.len());
        for id in ids {
            observed.push(self.call("inspect", self.engine.inspect(id)).await?);
        }
        Ok(observed)
    }

    /// Awaits one adapter call under the pass deadline.
    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, ReconcileError> {
        let response = match self.options.deadline {
            Some(deadline) if !self.finishing => timeout_at(deadline, request)
                .await
                .map_err(|_| ReconcileError::DeadlineExceeded { operation })?,
            _ => request.await,
        };
        response.map_err(|e| ReconcileError::from_engine(operation, e))
    }
}

fn ids_of(containers: &[ObservedContainer]) -> Vec<String> {
    containers.iter().map(|c| c.id.clone()).collect()
}

fn count_where(containers: &[ObservedContainer], pred: impl Fn(&ObservedContainer) -> bool) -> usize {
    containers.iter().filter(|c| pred(*c)).count()
}

/// Runs one pass and folds the outcome into the record the host expects.
pub async fn run<E: EngineClient + ?Sized>(
    engine: &E,
    spec: &DesiredSpec,
    options: ReconcileOptions,
) -> HostResult {
    let mut reconciler = Reconciler::new(engine, options);
    match reconciler.reconcile(spec).await {
        Ok(result) => {
            info!("[{}] {}", reconciler.pass_id(), result.message);
            HostResult::from(result)
        }
        Err(e) => {
            error!("[{}] Reconciliation failed: {}", reconciler.pass_id(), e);
            HostResult::failure(reconciler.has_changed(), e.to_string())
        }
    }
}
