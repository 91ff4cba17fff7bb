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

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RECONNECT_COOLDOWN;
use crate::error::RelayError;
use crate::platform::{PlatformConnector, PlatformSession};

struct SessionState {
    session: Option<Box<dyn PlatformSession>>,
    last_connect_attempt: Option<Instant>,
}

/// Lazy-reconnect wrapper around a platform protocol session.
///
/// The session is acquired on first use and re-acquired at most once per
/// reconnect cooldown. The state mutex is held for the duration of every
/// operation, so protocol calls serialize.
pub struct PlatformClient {
    connector: Box<dyn PlatformConnector>,
    state: Mutex<SessionState>,
}

impl PlatformClient {
    /// Creates the client and makes a first connection attempt. Like the
    /// broker channel, an unreachable platform is not fatal at startup.
    pub async fn create(connector: Box<dyn PlatformConnector>) -> Self {
        let client = Self {
            connector,
            state: Mutex::new(SessionState {
                session: None,
                last_connect_attempt: None,
            }),
        };

        {
            let mut state = client.state.lock().await;
            if let Err(err) = client.ensure_session(&mut state).await {
                warn!(error = %err, "platform unreachable at startup, will retry");
            }
        }

        client
    }

    /// Attaches `(key, val)` to the object at `path`.
    ///
    /// The object must exist with a non-zero identifier; a missing object
    /// is a remote error (the request is quarantined, not retried).
    pub async fn set_key_val(&self, path: &str, key: &str, val: &str) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        self.ensure_session(&mut state).await?;

        let session = state
            .session
            .as_ref()
            .ok_or_else(|| RelayError::not_ready("platform", "no session"))?;

        debug!(path, key, "setting platform key/value");

        let stat = session.stat(path).await?;
        match stat {
            Some(stat) if stat.id != 0 => {}
            _ => {
                return Err(RelayError::Remote(format!(
                    "platform object not found: {path}"
                )));
            }
        }

        session.add_metadata(path, key, val, "").await?;

        info!(path, key, "set platform key/value");
        Ok(())
    }

    /// Drops the session. Safe to call repeatedly.
    pub async fn release(&self) {
        let mut state = self.state.lock().await;
        state.session = None;
    }

    async fn ensure_session(&self, state: &mut SessionState) -> Result<(), RelayError> {
        if state.session.is_some() {
            return Ok(());
        }

        let cooldown_elapsed = state
            .last_connect_attempt
            .map(|at| at.elapsed() >= RECONNECT_COOLDOWN)
            .unwrap_or(true);
        if !cooldown_elapsed {
            return Err(RelayError::not_ready(
                "platform",
                format!(
                    "inside reconnect cooldown ({}s since last attempt)",
                    RECONNECT_COOLDOWN.as_secs()
                ),
            ));
        }

        state.last_connect_attempt = Some(Instant::now());
        match self.connector.connect().await {
            Ok(session) => {
                state.session = Some(session);
                info!("connected to platform");
                Ok(())
            }
            Err(err) => Err(RelayError::not_ready(
                "platform",
                format!("connect failed: {err}"),
            )),
        }
    }
}
