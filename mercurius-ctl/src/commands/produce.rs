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

//! Producer subcommands: write exactly one spool entry and exit.
//!
//! A producer succeeds whenever the spool is writable; daemon-side
//! failures surface later through the `failed/` directory and the daemon
//! log. Business errors are reported on stderr but never change the exit
//! code — there is no reply channel from the daemon back to producers.

use mercurius::config::ServerConfig;
use mercurius::error::RelayError;
use mercurius::spool::{Request, Spool};
use tracing::debug;

pub fn run(config: &ServerConfig, request: Request) {
    debug!(request_type = %request.request_type(), "queueing request");

    if let Err(err) = turn_in_one(config, &request) {
        eprintln!("{err}");
    }
}

fn turn_in_one(config: &ServerConfig, request: &Request) -> Result<(), RelayError> {
    request.validate()?;

    let spool = Spool::new(config.spool_dir_path());
    spool.make_dirs()?;
    spool.turn_in(request)?;
    Ok(())
}
