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

//! Logging initialization for the daemon and the producer subcommands.

use anyhow::{Context, Result};
use mercurius::config::ServerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes daemon logging: stderr in the foreground, the configured
/// log file otherwise. The returned guard must live as long as the daemon
/// so buffered log lines are flushed on exit.
pub fn init_daemon_logging(config: &ServerConfig) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(if config.debug { "debug" } else { "info" });

    if config.foreground {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let log_path = config.log_file_path();
    let log_dir = log_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let file_name = log_path
        .file_name()
        .context("log path has no file name")?
        .to_owned();

    let appender = tracing_appender::rolling::never(log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Producer subcommands only surface their own failures.
pub fn init_producer_logging(debug: bool) {
    let filter = env_filter(if debug { "debug" } else { "error" });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}
