mod config;
mod detect;
mod http;
mod lock;
mod probe;
mod providers;
mod runner;
mod state;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use runner::RunReport;

const CONFIG_PATHS: [&'static str; 2] = [
    "./dynup.toml",
    #[cfg(target_family = "unix")]
    "/etc/dynup/config.toml",
];

/// An explicit path on the command line wins; otherwise the first existing
/// well-known location is used.
fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::args_os().nth(1) {
        return Some(PathBuf::from(path));
    }

    CONFIG_PATHS
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let Some(path) = config_path() else {
        error!("no configuration found, quitting");
        return ExitCode::FAILURE;
    };

    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    info!("dynup v{} starting", env!("CARGO_PKG_VERSION"));

    match runner::run(&config) {
        Ok(RunReport::NoChange) => ExitCode::SUCCESS,
        Ok(RunReport::Updated { succeeded, failed }) => {
            info!(
                "run finished: {} update(s) applied, {} failed",
                succeeded, failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("run aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
