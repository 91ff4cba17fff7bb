/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! The `serve` subcommand: run the relay daemon until signalled.

use anyhow::{Context, Result};
use mercurius::config::{ServerConfig, Validate};
use mercurius::RelayService;
use tracing::info;

use crate::logging;

pub async fn run(mut config: ServerConfig, foreground: bool) -> Result<()> {
    if foreground {
        config.foreground = true;
    }

    config
        .validate()
        .context("configuration validation failed")?;

    let _guard = logging::init_daemon_logging(&config)?;

    let service = RelayService::start(config)
        .await
        .context("failed to start the relay service")?;

    shutdown_signal().await;
    info!("shutdown signal received");

    service.stop().await;
    Ok(())
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(_) => {
            let _ = ctrl_c.await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
