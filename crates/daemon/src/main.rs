// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tld`: the taskloop daemon.

use std::process::ExitCode;

use tl_daemon::{env, logging, reconcile_state, startup, Config, EnvOverrides, LifecycleError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tld: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = match logging::init(&config.log_dir, &env::log_filter()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tld: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let mut daemon = startup(&config, &EnvOverrides::from_env()).await?;
    reconcile_state(&daemon).await;
    daemon.spawn_background(env::snapshot_interval());
    info!(version = env::VERSION, pid = std::process::id(), "READY");

    wait_for_signal().await?;
    daemon.shutdown().await
}

async fn wait_for_signal() -> Result<(), LifecycleError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
        info!("shutdown signal received");
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");
        Ok(())
    }
}
