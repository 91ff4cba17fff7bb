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

//! Error taxonomy for the relay.
//!
//! The drainer classifies every dispatch error into one of two behaviors:
//! *not-ready* errors leave the spool entry in place and halt the current
//! lane for the remainder of the tick, while every other error quarantines
//! the entry under `failed/`. `RelayError::is_not_ready` is the single
//! classification point.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Malformed request JSON: unparseable body, or unknown/missing `type`.
    #[error("failed to decode request: {0}")]
    Decode(#[source] serde_json::Error),

    /// A required field was empty after decoding.
    #[error("invalid {request_type} request: {reason}")]
    Validation {
        request_type: &'static str,
        reason: String,
    },

    /// An outbound collaborator is within its reconnect cooldown or is not
    /// configured. The item is retained and retried on a later tick.
    #[error("{collaborator} is not ready: {reason}")]
    NotReady {
        collaborator: &'static str,
        reason: String,
    },

    /// A collaborator accepted the call but reported failure: non-2xx from
    /// the catalog, publish rejection, object-not-found on the platform.
    #[error("remote operation failed: {0}")]
    Remote(String),

    /// The spool directories are missing or unwritable. Fatal at startup.
    #[error("environment error on {path}: {reason}")]
    Environment { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Builds a not-ready error for the named collaborator.
    pub fn not_ready(collaborator: &'static str, reason: impl Into<String>) -> Self {
        RelayError::NotReady {
            collaborator,
            reason: reason.into(),
        }
    }

    /// Builds a validation error for the named request type.
    pub fn validation(request_type: &'static str, reason: impl Into<String>) -> Self {
        RelayError::Validation {
            request_type,
            reason: reason.into(),
        }
    }

    /// True for transient unavailability that should halt the lane instead
    /// of quarantining the item.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, RelayError::NotReady { .. })
    }
}

impl From<lapin::Error> for RelayError {
    fn from(err: lapin::Error) -> Self {
        RelayError::Remote(format!("AMQP error: {err}"))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Remote(format!("HTTP error: {err}"))
    }
}
