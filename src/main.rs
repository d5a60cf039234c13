use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use dockside::configuration::config::ModuleArgs;
use dockside::engine_client::DockerEngine;
use dockside::error_handling::ReconcileError;
use dockside::reconciliation::{run, HostResult, ReconcileOptions};

/// Lower bound on the HTTP timeout of each engine request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "dockside")]
#[command(version)]
#[command(about = "Converges the containers running an image and command to a desired state")]
struct Args {
    /// Argument record, JSON or TOML. `-` reads JSON from stdin.
    #[arg(env = "DOCKSIDE_ARGS", default_value = "-")]
    args_file: String,

    /// Engine URL, overriding the record's docker_url.
    #[arg(long)]
    docker_url: Option<String>,

    /// Desired state, overriding the record's state.
    #[arg(long)]
    state: Option<String>,

    /// Log at debug level.
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = ModuleArgs::from_file(Path::new(&args.args_file));
    let debug = args.debug
        || loaded
            .as_ref()
            .map(ModuleArgs::debug_requested)
            .unwrap_or(false);

    // stdout is reserved for the result record
    env_logger::Builder::new()
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .format_target(false)
        .init();

    let mut module_args = match loaded {
        Ok(module_args) => module_args,
        Err(e) => {
            error!("Unable to read arguments from {}: {}", args.args_file, e);
            return emit(&HostResult::failure(false, e.to_string()));
        }
    };
    if let Some(url) = args.docker_url {
        module_args.docker_url = Some(url);
    }
    if let Some(state) = args.state {
        module_args.state = Some(state);
    }

    let config = match module_args.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            return emit(&HostResult::failure(false, e.to_string()));
        }
    };
    info!("Using engine at {}", config.endpoint);

    let request_timeout = REQUEST_TIMEOUT.max(config.wait_timeout + Duration::from_secs(10));
    let engine = match DockerEngine::connect(&config.endpoint, request_timeout) {
        Ok(engine) => engine,
        Err(e) => {
            let e = ReconcileError::from_engine("connect", e);
            error!("{}", e);
            return emit(&HostResult::failure(false, e.to_string()));
        }
    };

    let result = run(&engine, &config.spec, ReconcileOptions::from_config(&config)).await;
    emit(&result)
}

/// Prints the result record and maps it to the process exit status.
fn emit(result: &HostResult) -> ExitCode {
    match serde_json::to_string(result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Unable to serialise the result record: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if result.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
