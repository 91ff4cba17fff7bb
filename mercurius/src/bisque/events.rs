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

//! Translates inbound broker events into catalog requests.
//!
//! The platform publishes a filesystem event for every object mutation,
//! including the ones this daemon's own catalog calls cause through the
//! service account. Three routing keys are acted on; everything else is
//! ignored. Accepted events are written through the same spool the
//! external producers use — this is how the daemon feeds itself.
//!
//! The translator runs on the broker consumer task and must never fail
//! it: malformed bodies are logged and dropped.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::amqp::{BrokerEvent, EventHandler};
use crate::bisque::{home_user, is_in_scope};
use crate::config::BisqueConfig;
use crate::spool::{Request, Spool};

const ADD_ROUTING_KEY: &str = "data-object.add";
const REMOVE_ROUTING_KEY: &str = "data-object.rm";
const MOVE_ROUTING_KEY: &str = "data-object.mv";

/// Event author as carried in the message body.
struct Author {
    name: String,
    zone: String,
}

/// The platform's `user#zone` notation.
impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.zone)
    }
}

/// Maps platform filesystem events to spooled catalog requests.
pub struct EventTranslator {
    spool: Arc<Spool>,
    config: BisqueConfig,
}

impl EventTranslator {
    pub fn new(spool: Arc<Spool>, config: BisqueConfig) -> Self {
        Self { spool, config }
    }

    fn handle_add(&self, body: &[u8]) {
        let Some((author, value)) = self.parse_event(ADD_ROUTING_KEY, body) else {
            return;
        };
        let Some(path) = string_field(&value, "path") else {
            warn!(routing_key = ADD_ROUTING_KEY, "event body has no path field");
            return;
        };

        if !self.accepts(ADD_ROUTING_KEY, &author, &path) {
            return;
        }

        let username = home_user(&self.config, &path, &author.name);
        self.turn_in(Request::link_bisque(username, path));
    }

    fn handle_remove(&self, body: &[u8]) {
        let Some((author, value)) = self.parse_event(REMOVE_ROUTING_KEY, body) else {
            return;
        };
        let Some(path) = string_field(&value, "path") else {
            warn!(routing_key = REMOVE_ROUTING_KEY, "event body has no path field");
            return;
        };

        if !self.accepts(REMOVE_ROUTING_KEY, &author, &path) {
            return;
        }

        let username = home_user(&self.config, &path, &author.name);
        self.turn_in(Request::remove_bisque(username, path));
    }

    fn handle_move(&self, body: &[u8]) {
        let Some((author, value)) = self.parse_event(MOVE_ROUTING_KEY, body) else {
            return;
        };
        let (Some(old_path), Some(new_path)) = (
            string_field(&value, "old-path"),
            string_field(&value, "new-path"),
        ) else {
            warn!(routing_key = MOVE_ROUTING_KEY, "event body is missing old-path or new-path");
            return;
        };

        if author.name == self.config.irods_username {
            debug!(routing_key = MOVE_ROUTING_KEY, author = %author, "ignoring event authored by the service account");
            return;
        }

        let old_in_scope = is_in_scope(&self.config, &old_path);
        let new_in_scope = is_in_scope(&self.config, &new_path);

        // A move across the scope boundary degrades to the half that is
        // visible to the catalog.
        match (old_in_scope, new_in_scope) {
            (true, true) => {
                let username = home_user(&self.config, &new_path, &author.name);
                self.turn_in(Request::move_bisque(username, old_path, new_path));
            }
            (true, false) => {
                let username = home_user(&self.config, &old_path, &author.name);
                self.turn_in(Request::remove_bisque(username, old_path));
            }
            (false, true) => {
                let username = home_user(&self.config, &new_path, &author.name);
                self.turn_in(Request::link_bisque(username, new_path));
            }
            (false, false) => {
                debug!(
                    old_path = %old_path,
                    new_path = %new_path,
                    "ignoring move outside the catalog root"
                );
            }
        }
    }

    /// Scope and origin filters shared by the add and remove paths.
    fn accepts(&self, routing_key: &str, author: &Author, path: &str) -> bool {
        if author.name == self.config.irods_username {
            debug!(routing_key, author = %author, "ignoring event authored by the service account");
            return false;
        }
        if !is_in_scope(&self.config, path) {
            debug!(
                routing_key,
                path,
                root = %self.config.irods_root_path,
                "ignoring event outside the catalog root"
            );
            return false;
        }
        true
    }

    fn parse_event(&self, routing_key: &str, body: &[u8]) -> Option<(Author, Value)> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                warn!(routing_key, error = %err, "failed to parse event body");
                return None;
            }
        };

        let author = value.get("author").and_then(Value::as_object)?;
        let name = author.get("name").and_then(Value::as_str);
        let zone = author.get("zone").and_then(Value::as_str);

        match (name, zone) {
            (Some(name), Some(zone)) => Some((
                Author {
                    name: name.to_string(),
                    zone: zone.to_string(),
                },
                value.clone(),
            )),
            _ => {
                warn!(routing_key, "event body has no author name/zone");
                None
            }
        }
    }

    fn turn_in(&self, request: Request) {
        let request_type = request.request_type();
        match self.spool.turn_in(&request) {
            Ok(_) => debug!(%request_type, "spooled request from broker event"),
            Err(err) => error!(%request_type, error = %err, "failed to spool request from broker event"),
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

impl EventHandler for EventTranslator {
    fn on_event(&self, event: BrokerEvent) {
        // The upstream event format is unsafe with embedded carriage
        // returns; such bodies are dropped before any parsing.
        if event.body.contains(&b'\r') {
            error!(routing_key = %event.routing_key, "rejecting event body containing a carriage return");
            return;
        }

        match event.routing_key.as_str() {
            ADD_ROUTING_KEY => self.handle_add(&event.body),
            REMOVE_ROUTING_KEY => self.handle_remove(&event.body),
            MOVE_ROUTING_KEY => self.handle_move(&event.body),
            _ => {}
        }
    }
}
