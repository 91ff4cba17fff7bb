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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mercurius",
    version,
    about = "Queue a command to be executed asynchronously, or run the relay daemon",
    long_about = "Queues side-effect requests for asynchronous execution. Messages are \
                  routed to the configured AMQP exchange, and BisQue data-control requests \
                  are routed to the configured BisQue server. The serve subcommand runs \
                  the daemon that drains the queue."
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay daemon
    Serve {
        /// Stay attached to the terminal and log to stderr
        #[arg(long)]
        foreground: bool,
    },

    /// Queue a message for the broker
    #[command(name = "send_msg")]
    SendMsg {
        /// Routing key for the message
        key: String,
        /// Message body, published verbatim
        body: String,
    },

    /// Queue a BisQue link request for a platform object
    #[command(name = "link_bisque")]
    LinkBisque {
        /// Platform user the object is linked on behalf of
        irods_username: String,
        /// Absolute platform path of the object
        irods_path: String,
    },

    /// Queue a BisQue remove request for a platform object
    #[command(name = "remove_bisque")]
    RemoveBisque {
        /// Platform user the object is removed on behalf of
        irods_username: String,
        /// Absolute platform path of the object
        irods_path: String,
    },

    /// Queue a BisQue move request for a platform object
    #[command(name = "move_bisque")]
    MoveBisque {
        /// Platform user the object is moved on behalf of
        irods_username: String,
        /// Absolute platform path the object moves from
        source_irods_path: String,
        /// Absolute platform path the object moves to
        dest_irods_path: String,
    },
}
