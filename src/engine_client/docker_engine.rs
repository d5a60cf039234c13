use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, PortBinding};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use log::{debug, info, warn};

use crate::configuration::types::RegistryCredentials;
use crate::engine_client::client::EngineClient;
use crate::engine_client::endpoint::EngineEndpoint;
use crate::engine_client::types::{
    ContainerSummary, CreateOutcome, CreateRequest, ObservedContainer, WaitOutcome,
};
use crate::error_handling::types::EngineError;

/// [`EngineClient`] over the Docker remote API.
///
/// Construction does not touch the network; the first request does. A
/// daemon that cannot be reached therefore surfaces as
/// [`EngineError::Unreachable`] from whichever call comes first, normally
/// [`EngineClient::server_version`].
pub struct DockerEngine {
    docker: Docker,
    endpoint: EngineEndpoint,
}

impl DockerEngine {
    /// Builds a client for `endpoint`. `request_timeout` bounds every HTTP
    /// request, so it must be longer than any wait timeout in use.
    pub fn connect(endpoint: &EngineEndpoint, request_timeout: Duration) -> Result<Self, EngineError> {
        let timeout_secs = request_timeout.as_secs().max(1);
        let docker = match endpoint {
            EngineEndpoint::Http { base_url } => {
                Docker::connect_with_http(base_url, timeout_secs, API_DEFAULT_VERSION)
            }
            EngineEndpoint::Unix { socket_path } => {
                Docker::connect_with_unix(socket_path, timeout_secs, API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| EngineError::Unreachable(format!("{}: {}", endpoint, e)))?;

        info!("Engine client configured for {}", endpoint);
        Ok(DockerEngine {
            docker,
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn server_version(&self) -> Result<String, EngineError> {
        let version = self.docker.version().await.map_err(map_error)?;
        debug!(
            "Engine at {} reports version {:?} (API {:?})",
            self.endpoint, version.version, version.api_version
        );
        version
            .version
            .ok_or_else(|| EngineError::Malformed("version document without Version".to_string()))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let rows = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(map_error)?;

        debug!("Engine listed {} running containers", rows.len());
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(ContainerSummary {
                    id: row.id?,
                    image: row.image.unwrap_or_default(),
                    command: row.command.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ObservedContainer, EngineError> {
        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(map_error)?;
        observed_from_inspect(details)
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateOutcome, EngineError> {
        debug!("Creating container from image {}", request.image);
        match self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config(request))
            .await
        {
            Ok(response) => {
                for warning in &response.warnings {
                    warn!("Engine warning while creating {}: {}", response.id, warning);
                }
                Ok(CreateOutcome::Created(response.id))
            }
            Err(e) => create_failure(e),
        }
    }

    async fn pull(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError> {
        let (name, tag) = split_reference(image);
        info!("Pulling image {}:{}", name, tag);

        let options = CreateImageOptions {
            from_image: name,
            tag,
            ..Default::default()
        };
        let auth = credentials.map(|c| DockerCredentials {
            username: Some(c.username.clone()),
            password: c.password.clone(),
            ..Default::default()
        });

        let mut stream = self.docker.create_image(Some(options), None, auth);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull {}: {}", image, status);
                    }
                }
                Err(BollardError::DockerResponseServerError {
                    status_code: 404, ..
                }) => return Err(EngineError::ImageNotFound(image.to_string())),
                Err(e) => return Err(map_error(e)),
            }
        }
        Ok(())
    }

    async fn start(&self, ids: &[String]) -> Result<(), EngineError> {
        for id in ids {
            debug!("Starting container {}", id);
            tolerate_not_modified(
                self.docker
                    .start_container(id, None::<StartContainerOptions<String>>)
                    .await,
            )?;
        }
        Ok(())
    }

    async fn stop(&self, ids: &[String]) -> Result<(), EngineError> {
        for id in ids {
            debug!("Stopping container {}", id);
            tolerate_not_modified(
                self.docker
                    .stop_container(id, Some(StopContainerOptions { t: 10 }))
                    .await,
            )?;
        }
        Ok(())
    }

    async fn kill(&self, ids: &[String]) -> Result<(), EngineError> {
        for id in ids {
            debug!("Killing container {}", id);
            self.docker
                .kill_container(id, Some(KillContainerOptions { signal: "SIGKILL" }))
                .await
                .map_err(map_error)?;
        }
        Ok(())
    }

    async fn restart(&self, ids: &[String]) -> Result<(), EngineError> {
        for id in ids {
            debug!("Restarting container {}", id);
            self.docker
                .restart_container(id, Some(RestartContainerOptions { t: 10 }))
                .await
                .map_err(map_error)?;
        }
        Ok(())
    }

    async fn remove(&self, ids: &[String]) -> Result<(), EngineError> {
        for id in ids {
            debug!("Removing container {}", id);
            self.docker
                .remove_container(id, Some(RemoveContainerOptions::default()))
                .await
                .map_err(map_error)?;
        }
        Ok(())
    }

    async fn wait(&self, ids: &[String], timeout: Duration) -> Vec<(String, WaitOutcome)> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let options = WaitContainerOptions {
                condition: "not-running",
            };
            let mut stream = Box::pin(self.docker.wait_container(id, Some(options)));
            let outcome = match tokio::time::timeout(timeout, stream.next()).await {
                Err(_) => WaitOutcome::TimedOut,
                Ok(Some(Ok(response))) => WaitOutcome::Exited(response.status_code),
                // Non-zero exit codes arrive as errors.
                Ok(Some(Err(BollardError::DockerContainerWaitError { code, .. }))) => {
                    WaitOutcome::Exited(code)
                }
                Ok(Some(Err(e))) => WaitOutcome::Failed(e.to_string()),
                Ok(None) => WaitOutcome::Failed("wait ended without a status".to_string()),
            };
            debug!("Wait on {} ended: {:?}", id, outcome);
            outcomes.push((id.clone(), outcome));
        }
        outcomes
    }
}

fn map_error(err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => EngineError::daemon(status_code, message),
        e @ (BollardError::JsonDataError { .. } | BollardError::JsonSerdeError { .. }) => {
            EngineError::Malformed(e.to_string())
        }
        other => EngineError::Unreachable(other.to_string()),
    }
}

/// Start and stop answer 304 when the container is already in the target state.
fn tolerate_not_modified(result: Result<(), BollardError>) -> Result<(), EngineError> {
    match result {
        Err(BollardError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        other => other.map_err(map_error),
    }
}

/// Create also answers 404 for a missing `volumes_from` container or
/// network; only a missing image is worth a pull.
fn create_failure(err: BollardError) -> Result<CreateOutcome, EngineError> {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            ref message,
        } if message.to_ascii_lowercase().contains("no such image") => {
            Ok(CreateOutcome::ImageNotFound)
        }
        other => Err(map_error(other)),
    }
}

fn observed_from_inspect(details: ContainerInspectResponse) -> Result<ObservedContainer, EngineError> {
    let raw_details =
        serde_json::to_value(&details).map_err(|e| EngineError::Malformed(e.to_string()))?;
    let id = details
        .id
        .clone()
        .ok_or_else(|| EngineError::Malformed("inspect document without Id".to_string()))?;

    let command = std::iter::once(details.path.clone().unwrap_or_default())
        .chain(details.args.clone().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    Ok(ObservedContainer {
        id,
        image: details
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default(),
        command,
        is_running: details
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false),
        raw_details,
    })
}

fn container_config(request: &CreateRequest) -> Config<String> {
    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &request.ports {
        exposed_ports.insert(port.port_key(), HashMap::new());
        port_bindings
            .entry(port.port_key())
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: Some(port.host_port.map(|p| p.to_string()).unwrap_or_default()),
            });
    }

    let volumes: HashMap<String, HashMap<(), ()>> = request
        .volumes
        .iter()
        .map(|v| (v.container_path.clone(), HashMap::new()))
        .collect();
    let binds: Vec<String> = request.volumes.iter().filter_map(|v| v.bind()).collect();

    let host_config = HostConfig {
        memory: (request.memory_limit_bytes > 0)
            .then(|| i64::try_from(request.memory_limit_bytes).unwrap_or(i64::MAX)),
        memory_swap: (request.memory_swap != 0).then_some(request.memory_swap),
        dns: non_empty(request.dns.clone()),
        volumes_from: request.volumes_from.clone().map(|v| vec![v]),
        binds: non_empty(binds),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        ..Default::default()
    };

    Config {
        image: Some(request.image.clone()),
        cmd: non_empty(request.command.clone()),
        hostname: request.hostname.clone(),
        env: non_empty(request.environment.clone()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        volumes: (!volumes.is_empty()).then_some(volumes),
        attach_stdout: Some(!request.detach),
        attach_stderr: Some(!request.detach),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Splits an image reference into the repository and tag the pull API
/// expects, defaulting the tag to `latest`. Digest references are passed
/// whole with an empty tag.
fn split_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, "latest"),
    }
}
