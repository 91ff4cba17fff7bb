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

//! The spool request model.
//!
//! Every spool entry is a self-describing JSON document: a `type`
//! discriminator selects the payload schema, and a shared envelope carries
//! `creation_time` (set at producer time, never modified). The on-disk
//! location of an entry is a runtime-only attribute attached after the
//! file is parsed; it is the handle by which the relay later promotes or
//! deletes the entry and is never serialized.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// The closed set of request kinds the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    SendMessage,
    LinkBisque,
    RemoveBisque,
    MoveBisque,
}

impl RequestType {
    /// The wire value of the `type` discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::SendMessage => "send_message",
            RequestType::LinkBisque => "link_bisque",
            RequestType::RemoveBisque => "remove_bisque",
            RequestType::MoveBisque => "move_bisque",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a spool request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    /// Publish `body` to the broker exchange under routing key `key`.
    SendMessage { key: String, body: String },
    /// Register a platform object with the catalog on behalf of a user.
    LinkBisque {
        irods_username: String,
        irods_path: String,
    },
    /// Remove a platform object's catalog entry.
    RemoveBisque {
        irods_username: String,
        irods_path: String,
    },
    /// Reflect a platform-side rename in the catalog.
    MoveBisque {
        irods_username: String,
        source_irods_path: String,
        dest_irods_path: String,
    },
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestPayload::SendMessage { .. } => RequestType::SendMessage,
            RequestPayload::LinkBisque { .. } => RequestType::LinkBisque,
            RequestPayload::RemoveBisque { .. } => RequestType::RemoveBisque,
            RequestPayload::MoveBisque { .. } => RequestType::MoveBisque,
        }
    }
}

/// A spool request: envelope plus tagged payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub payload: RequestPayload,

    /// Set once by the producer; preserved verbatim across the wire.
    pub creation_time: DateTime<Local>,

    /// Physical location of the entry, filled in after parsing a spool
    /// file. Never serialized.
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

impl Request {
    fn new(payload: RequestPayload) -> Self {
        Self {
            payload,
            creation_time: Local::now(),
            file_path: None,
        }
    }

    pub fn send_message(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(RequestPayload::SendMessage {
            key: key.into(),
            body: body.into(),
        })
    }

    pub fn link_bisque(irods_username: impl Into<String>, irods_path: impl Into<String>) -> Self {
        Self::new(RequestPayload::LinkBisque {
            irods_username: irods_username.into(),
            irods_path: irods_path.into(),
        })
    }

    pub fn remove_bisque(irods_username: impl Into<String>, irods_path: impl Into<String>) -> Self {
        Self::new(RequestPayload::RemoveBisque {
            irods_username: irods_username.into(),
            irods_path: irods_path.into(),
        })
    }

    pub fn move_bisque(
        irods_username: impl Into<String>,
        source_irods_path: impl Into<String>,
        dest_irods_path: impl Into<String>,
    ) -> Self {
        Self::new(RequestPayload::MoveBisque {
            irods_username: irods_username.into(),
            source_irods_path: source_irods_path.into(),
            dest_irods_path: dest_irods_path.into(),
        })
    }

    /// Decodes a request from its JSON wire form.
    ///
    /// Unparseable JSON and unknown or missing `type` values are all decode
    /// errors; the caller quarantines the backing file.
    pub fn decode(bytes: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(bytes).map_err(RelayError::Decode)
    }

    /// Encodes the request to its JSON wire form. `file_path` is skipped.
    pub fn encode(&self) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(self).map_err(RelayError::Decode)
    }

    pub fn request_type(&self) -> RequestType {
        self.payload.request_type()
    }

    /// True for requests dispatched through the broker channel.
    pub fn is_send_message(&self) -> bool {
        matches!(self.payload, RequestPayload::SendMessage { .. })
    }

    /// True for requests dispatched through the catalog client.
    pub fn is_bisque_family(&self) -> bool {
        matches!(
            self.payload,
            RequestPayload::LinkBisque { .. }
                | RequestPayload::RemoveBisque { .. }
                | RequestPayload::MoveBisque { .. }
        )
    }

    /// Checks that every required field is non-empty.
    pub fn validate(&self) -> Result<(), RelayError> {
        let fail = |reason: &str| {
            Err(RelayError::validation(
                self.request_type().as_str(),
                reason.to_string(),
            ))
        };

        match &self.payload {
            RequestPayload::SendMessage { key, .. } => {
                if key.is_empty() {
                    return fail("empty key");
                }
            }
            RequestPayload::LinkBisque {
                irods_username,
                irods_path,
            }
            | RequestPayload::RemoveBisque {
                irods_username,
                irods_path,
            } => {
                if irods_username.is_empty() {
                    return fail("empty irods_username");
                }
                if irods_path.is_empty() {
                    return fail("empty irods_path");
                }
            }
            RequestPayload::MoveBisque {
                irods_username,
                source_irods_path,
                dest_irods_path,
            } => {
                if irods_username.is_empty() {
                    return fail("empty irods_username");
                }
                if source_irods_path.is_empty() {
                    return fail("empty source_irods_path");
                }
                if dest_irods_path.is_empty() {
                    return fail("empty dest_irods_path");
                }
            }
        }

        Ok(())
    }

    /// Basename of the backing file, used for in-pass ordering.
    pub fn basename(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
    }
}
