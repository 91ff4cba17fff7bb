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

//! HTTP client for the external catalog.
//!
//! Three operations, one per catalog-family request variant. All calls
//! authenticate with the admin credentials; the insert operation parses
//! the returned XML and writes the catalog's identifier back onto the
//! platform object, which doubles as a replay dedupe key.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::bisque::{catalog_url, resource_name};
use crate::config::BisqueConfig;
use crate::error::RelayError;
use crate::platform::PlatformClient;
use crate::spool::{Request, RequestPayload};

/// Metadata key under which the catalog's identifier is written back.
pub const BISQUE_ID_METADATA_KEY: &str = "ipc-bisque-id";

/// Per-request timeout for catalog calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

/// Stateless HTTP client for the catalog; configuration only.
pub struct BisqueClient {
    config: BisqueConfig,
    client: reqwest::Client,
    platform: Arc<PlatformClient>,
}

impl BisqueClient {
    pub fn new(
        config: BisqueConfig,
        platform: Arc<PlatformClient>,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            config,
            client,
            platform,
        })
    }

    pub fn config(&self) -> &BisqueConfig {
        &self.config
    }

    /// Dispatches one catalog-family request.
    pub async fn process_item(&self, request: &Request) -> Result<(), RelayError> {
        request.validate()?;

        match &request.payload {
            RequestPayload::LinkBisque {
                irods_username,
                irods_path,
            } => self.link(irods_username, irods_path).await,
            RequestPayload::RemoveBisque { irods_path, .. } => self.remove(irods_path).await,
            RequestPayload::MoveBisque {
                source_irods_path,
                dest_irods_path,
                ..
            } => self.move_entry(source_irods_path, dest_irods_path).await,
            RequestPayload::SendMessage { .. } => Err(RelayError::validation(
                "send_message",
                "not a catalog request",
            )),
        }
    }

    /// Registers a platform object with the catalog and writes the
    /// returned identifier back as platform metadata.
    pub async fn link(&self, irods_username: &str, irods_path: &str) -> Result<(), RelayError> {
        let name = resource_name(&self.config, irods_path)?;
        let value = catalog_url(&self.config, irods_path)?;
        let body = format!(r#"<resource name="{name}" permission="private" value="{value}" />"#);

        debug!(path = irods_path, user = irods_username, "linking object into catalog");

        let response = self
            .client
            .post(self.api_url("/blob_service/paths/insert"))
            .query(&[("user", irods_username)])
            .basic_auth(&self.config.admin_username, Some(&self.config.admin_password))
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await?;

        let text = read_ok_body(response).await?;
        let resource_uniq = parse_resource_uniq(&text)?;

        info!(path = irods_path, resource_uniq = %resource_uniq, "linked object into catalog");

        self.platform
            .set_key_val(irods_path, BISQUE_ID_METADATA_KEY, &resource_uniq)
            .await
    }

    /// Removes a platform object's catalog entry.
    pub async fn remove(&self, irods_path: &str) -> Result<(), RelayError> {
        let path = catalog_url(&self.config, irods_path)?;

        debug!(path = irods_path, "removing object from catalog");

        let response = self
            .client
            .get(self.api_url("/blob_service/paths/remove"))
            .query(&[("path", path.as_str())])
            .basic_auth(&self.config.admin_username, Some(&self.config.admin_password))
            .send()
            .await?;

        read_ok_body(response).await?;
        info!(path = irods_path, "removed object from catalog");
        Ok(())
    }

    /// Reflects a platform-side rename in the catalog.
    pub async fn move_entry(
        &self,
        source_irods_path: &str,
        dest_irods_path: &str,
    ) -> Result<(), RelayError> {
        let path = catalog_url(&self.config, source_irods_path)?;
        let destination = catalog_url(&self.config, dest_irods_path)?;

        debug!(
            source = source_irods_path,
            dest = dest_irods_path,
            "moving object within catalog"
        );

        let response = self
            .client
            .get(self.api_url("/blob_service/paths/move"))
            .query(&[("path", path.as_str()), ("destination", destination.as_str())])
            .basic_auth(&self.config.admin_username, Some(&self.config.admin_password))
            .send()
            .await?;

        read_ok_body(response).await?;
        info!(
            source = source_irods_path,
            dest = dest_irods_path,
            "moved object within catalog"
        );
        Ok(())
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Reads the body and fails on anything but 200.
async fn read_ok_body(response: reqwest::Response) -> Result<String, RelayError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status != StatusCode::OK {
        return Err(RelayError::Remote(format!(
            "catalog responded {status}: {}",
            body.trim()
        )));
    }

    Ok(body)
}

/// Extracts the `resource_uniq` attribute from the insert response's root
/// element.
fn parse_resource_uniq(body: &str) -> Result<String, RelayError> {
    let document = roxmltree::Document::parse(body.trim())
        .map_err(|err| RelayError::Remote(format!("catalog returned malformed XML: {err}")))?;

    match document.root_element().attribute("resource_uniq") {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(RelayError::Remote(
            "catalog response has no resource_uniq attribute".to_string(),
        )),
    }
}
