#[cfg(test)]
mod integration_tests {
    use crate::configuration::types::{DesiredSpec, DesiredState};
    use crate::engine_client::{DockerEngine, EngineClient, EngineEndpoint};
    use crate::error_handling::types::ReconcileError;
    use crate::reconciliation::{run, ReconcileOptions, Reconciler};
    use std::time::Duration;
    use tokio::time::timeout;

    const SOCKET: &str = "unix:///var/run/docker.sock";

    fn docker_url() -> String {
        std::env::var("DOCKER_URL").unwrap_or_else(|_| SOCKET.to_string())
    }

    async fn connect() -> Option<DockerEngine> {
        let endpoint = EngineEndpoint::parse(&docker_url()).ok()?;
        let engine = DockerEngine::connect(&endpoint, Duration::from_secs(120)).ok()?;
        match engine.server_version().await {
            Ok(_) => Some(engine),
            Err(e) => {
                eprintln!("Skipping: no engine at {}: {}", endpoint, e);
                None
            }
        }
    }

    /// A spec unlikely to collide with anything else running on the host.
    fn test_spec(count: usize) -> DesiredSpec {
        let seconds = 100_000 + uuid::Uuid::new_v4().as_u128() % 100_000;
        DesiredSpec::new("busybox:latest", format!("sleep {}", seconds)).with_count(count)
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine"]
    async fn test_scale_up_down_and_remove() {
        let Some(engine) = connect().await else {
            return;
        };
        let spec = test_spec(2);
        let options = ReconcileOptions {
            wait_timeout: Duration::from_secs(20),
            ..ReconcileOptions::default()
        };

        let up = timeout(
            Duration::from_secs(300),
            Reconciler::new(&engine, options).reconcile(&spec),
        )
        .await
        .expect("scale up timed out")
        .expect("scale up failed");
        assert!(up.changed);
        assert_eq!(up.started_count, 2);

        let again = Reconciler::new(&engine, options)
            .reconcile(&spec)
            .await
            .expect("second pass failed");
        assert!(!again.changed);
        assert_eq!(again.summary.len(), 2);

        let down = Reconciler::new(&engine, options)
            .reconcile(&spec.clone().with_count(1))
            .await
            .expect("scale down failed");
        assert_eq!(down.stopped_count, 1);
        assert_eq!(down.summary.len(), 1);

        let gone = run(&engine, &spec.with_state(DesiredState::Absent), options).await;
        assert!(!gone.failed, "{}", gone.msg);
        assert!(gone.changed);

        println!("Reconciliation against a live engine completed");
    }

    #[tokio::test]
    #[ignore = "requires a Docker engine"]
    async fn test_unknown_image_fails_after_pull() {
        let Some(engine) = connect().await else {
            return;
        };
        let spec = DesiredSpec::new("dockside-test/does-not-exist:never", "true");

        let err = Reconciler::new(&engine, ReconcileOptions::default())
            .reconcile(&spec)
            .await
            .expect_err("pull of a missing image should fail");

        assert!(matches!(
            err,
            ReconcileError::ImageNotFound(_) | ReconcileError::Engine { operation: "pull", .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_reported() {
        let endpoint = EngineEndpoint::parse("http://127.0.0.1:1").expect("valid url");
        let engine =
            DockerEngine::connect(&endpoint, Duration::from_secs(2)).expect("client construction");

        let host = run(&engine, &test_spec(1), ReconcileOptions::default()).await;

        assert!(host.failed);
        assert!(!host.changed);
        assert!(host.msg.starts_with("unable to connect to the engine"), "{}", host.msg);
    }
}
