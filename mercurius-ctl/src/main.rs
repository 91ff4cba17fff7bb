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

use anyhow::{Context, Result};
use clap::Parser;
use mercurius::spool::Request;
use mercurius_ctl::cli::{Cli, Commands};
use mercurius_ctl::{commands, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match mercurius::config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        // Producers never propagate failures to their caller; only the
        // daemon treats a bad configuration as fatal.
        Err(err) => {
            if matches!(cli.command, Commands::Serve { .. }) {
                return Err(err).context("failed to load configuration");
            }
            eprintln!("{err}");
            return Ok(());
        }
    };
    if cli.debug {
        config.debug = true;
    }

    match cli.command {
        Commands::Serve { foreground } => {
            commands::serve::run(config, foreground).await?;
        }
        Commands::SendMsg { key, body } => {
            logging::init_producer_logging(config.debug);
            commands::produce::run(&config, Request::send_message(key, body));
        }
        Commands::LinkBisque {
            irods_username,
            irods_path,
        } => {
            logging::init_producer_logging(config.debug);
            commands::produce::run(&config, Request::link_bisque(irods_username, irods_path));
        }
        Commands::RemoveBisque {
            irods_username,
            irods_path,
        } => {
            logging::init_producer_logging(config.debug);
            commands::produce::run(&config, Request::remove_bisque(irods_username, irods_path));
        }
        Commands::MoveBisque {
            irods_username,
            source_irods_path,
            dest_irods_path,
        } => {
            logging::init_producer_logging(config.debug);
            commands::produce::run(
                &config,
                Request::move_bisque(irods_username, source_irods_path, dest_irods_path),
            );
        }
    }

    Ok(())
}
