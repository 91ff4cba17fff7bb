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

//! Platform sessions driven through the platform's command-line utilities.
//!
//! The relay daemon runs on the platform server itself (it is fed by the
//! server's rule engine), where `iinit`, `iquest`, and `imeta` are always
//! installed. Connection settings are passed through the utilities'
//! standard environment variables; the scratch authentication file is
//! private to the session and removed when the session is dropped.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::IrodsConfig;
use crate::error::RelayError;
use crate::platform::{ObjectKind, ObjectStat, PlatformConnector, PlatformSession};

const NO_ROWS_MARKER: &str = "CAT_NO_ROWS_FOUND";

/// Connector that authenticates with `iinit` and issues queries and
/// metadata updates through `iquest` / `imeta`.
pub struct IcommandsConnector {
    config: IrodsConfig,
}

impl IcommandsConnector {
    pub fn new(config: IrodsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlatformConnector for IcommandsConnector {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, RelayError> {
        let session = IcommandsSession::authenticate(&self.config).await?;
        Ok(Box::new(session))
    }
}

struct IcommandsSession {
    envs: Vec<(String, String)>,
    auth_file: PathBuf,
}

impl IcommandsSession {
    async fn authenticate(config: &IrodsConfig) -> Result<Self, RelayError> {
        let auth_file = std::env::temp_dir().join(format!(
            "mercurius-irodsA-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));

        let envs = vec![
            ("IRODS_HOST".to_string(), config.host.clone()),
            ("IRODS_PORT".to_string(), config.port.to_string()),
            ("IRODS_ZONE_NAME".to_string(), config.zone.clone()),
            ("IRODS_USER_NAME".to_string(), config.admin_username.clone()),
            (
                "IRODS_AUTHENTICATION_FILE".to_string(),
                auth_file.to_string_lossy().into_owned(),
            ),
        ];

        let session = Self { envs, auth_file };

        debug!(host = %config.host, port = config.port, zone = %config.zone, "authenticating platform session");
        session
            .run("iinit", &[], Some(&config.admin_password))
            .await?;

        Ok(session)
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, RelayError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|err| RelayError::Remote(format!("failed to run {program}: {err}")))?;

        if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
            handle
                .write_all(input.as_bytes())
                .await
                .map_err(|err| RelayError::Remote(format!("{program} stdin: {err}")))?;
            drop(handle);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| RelayError::Remote(format!("{program} wait: {err}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        // iquest reports an empty result set as an error; let the caller
        // see the marker instead of failing.
        if !output.status.success()
            && !stdout.contains(NO_ROWS_MARKER)
            && !stderr.contains(NO_ROWS_MARKER)
        {
            return Err(RelayError::Remote(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(format!("{stdout}{stderr}"))
    }

    async fn query_id(&self, query: &str) -> Result<Option<i64>, RelayError> {
        let output = self.run("iquest", &["--no-page", "%s", query], None).await?;
        if output.contains(NO_ROWS_MARKER) {
            return Ok(None);
        }

        match output.lines().next().map(str::trim) {
            Some(line) => line.parse::<i64>().map(Some).map_err(|_| {
                RelayError::Remote(format!("unexpected iquest output: {line:?}"))
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PlatformSession for IcommandsSession {
    async fn stat(&self, path: &str) -> Result<Option<ObjectStat>, RelayError> {
        let (collection, name) = split_object_path(path)?;

        if !name.is_empty() {
            let query = data_object_query(&collection, &name)?;
            if let Some(id) = self.query_id(&query).await? {
                return Ok(Some(ObjectStat {
                    id,
                    kind: ObjectKind::DataObject,
                }));
            }
        }

        let query = collection_query(path)?;
        match self.query_id(&query).await? {
            Some(id) => Ok(Some(ObjectStat {
                id,
                kind: ObjectKind::Collection,
            })),
            None => Ok(None),
        }
    }

    async fn add_metadata(
        &self,
        path: &str,
        key: &str,
        value: &str,
        units: &str,
    ) -> Result<(), RelayError> {
        let stat = self.stat(path).await?.ok_or_else(|| {
            RelayError::Remote(format!("platform object not found: {path}"))
        })?;

        let target_flag = match stat.kind {
            ObjectKind::DataObject => "-d",
            ObjectKind::Collection => "-C",
        };

        let mut args = vec!["add", target_flag, path, key, value];
        if !units.is_empty() {
            args.push(units);
        }

        self.run("imeta", &args, None).await?;
        Ok(())
    }
}

impl Drop for IcommandsSession {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.auth_file) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.auth_file.display(), error = %err, "failed to remove scratch auth file");
            }
        }
    }
}

/// Splits an absolute platform path into (parent collection, leaf name).
fn split_object_path(path: &str) -> Result<(String, String), RelayError> {
    if !path.starts_with('/') {
        return Err(RelayError::Remote(format!(
            "platform path is not absolute: {path}"
        )));
    }

    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Ok(("/".to_string(), trimmed[1..].to_string())),
        Some(pos) => Ok((trimmed[..pos].to_string(), trimmed[pos + 1..].to_string())),
        None => Ok(("/".to_string(), String::new())),
    }
}

fn data_object_query(collection: &str, name: &str) -> Result<String, RelayError> {
    Ok(format!(
        "SELECT DATA_ID WHERE COLL_NAME = '{}' AND DATA_NAME = '{}'",
        quoted(collection)?,
        quoted(name)?
    ))
}

fn collection_query(path: &str) -> Result<String, RelayError> {
    Ok(format!(
        "SELECT COLL_ID WHERE COLL_NAME = '{}'",
        quoted(path.trim_end_matches('/'))?
    ))
}

/// The general query language has no quote escaping; refuse rather than
/// build a malformed query.
fn quoted(value: &str) -> Result<&str, RelayError> {
    if value.contains('\'') {
        return Err(RelayError::Remote(format!(
            "platform path contains a quote: {value}"
        )));
    }
    Ok(value)
}
