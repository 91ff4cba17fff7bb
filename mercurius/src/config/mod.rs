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

//! Configuration loading, types, and validation.

mod error;
mod loader;
mod types;
mod validation;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_file, CONFIG_ENV_VAR, SYSTEM_CONFIG_PATH};
pub use types::{AmqpConfig, BisqueConfig, IrodsConfig, ServerConfig};
pub use validation::Validate;

use std::time::Duration;

/// Cooldown between reconnect attempts for the broker channel and the
/// platform client. The drain tick is the retry cadence; this only gates
/// how often a dead collaborator is re-dialed.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);
