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

//! The external catalog (BisQue) side of the relay: the HTTP client that
//! executes catalog-family requests, and the translator that turns broker
//! events into new catalog requests.
//!
//! Path translation rules shared by both halves live here. The catalog
//! mirrors the platform subtree under `irods_root_path`; a platform path
//! is *in scope* when it sits under that prefix, and its catalog URL is
//! the root-relative remainder appended to `irods_base_url`. The first
//! segment of the remainder is the owning user.

mod client;
mod events;

pub use client::{BisqueClient, BISQUE_ID_METADATA_KEY};
pub use events::EventTranslator;

use crate::config::BisqueConfig;
use crate::error::RelayError;

/// True when `path` lies under the catalog's configured root.
pub(crate) fn is_in_scope(config: &BisqueConfig, path: &str) -> bool {
    let base = format!("{}/", config.irods_root_path.trim_end_matches('/'));
    path.starts_with(&base)
}

/// Maps a platform path to the URL the catalog stores for it.
pub(crate) fn catalog_url(config: &BisqueConfig, path: &str) -> Result<String, RelayError> {
    let base = format!("{}/", config.irods_root_path.trim_end_matches('/'));
    let rel = path.strip_prefix(&base).ok_or_else(|| {
        RelayError::validation(
            "catalog",
            format!(
                "path {path} is not under catalog root {}",
                config.irods_root_path
            ),
        )
    })?;

    Ok(format!(
        "{}/{}",
        config.irods_base_url.trim_end_matches('/'),
        rel.trim_start_matches('/')
    ))
}

/// The name the catalog stores for a path: the root-relative remainder
/// with the leading username segment stripped (the catalog already tracks
/// the owning user separately).
pub(crate) fn resource_name(config: &BisqueConfig, path: &str) -> Result<String, RelayError> {
    let base = format!("{}/", config.irods_root_path.trim_end_matches('/'));
    let rel = path
        .strip_prefix(&base)
        .ok_or_else(|| {
            RelayError::validation(
                "catalog",
                format!(
                    "path {path} is not under catalog root {}",
                    config.irods_root_path
                ),
            )
        })?
        .trim_start_matches('/');

    match rel.split_once('/') {
        Some((_user, rest)) if !rest.is_empty() => Ok(rest.to_string()),
        _ => Ok(rel.to_string()),
    }
}

/// Recovers the owning user from the platform's conventional layout:
/// `/<zone>/home/<user>/...` or `/<zone>/trash/home/<user>/...`. Falls
/// back to `default` for any other shape.
pub(crate) fn home_user(config: &BisqueConfig, path: &str, default: &str) -> String {
    let home_prefix = format!("/{}/home/", config.irods_zone);
    let trash_prefix = format!("/{}/trash/home/", config.irods_zone);

    for prefix in [&trash_prefix, &home_prefix] {
        if let Some(rest) = path.strip_prefix(prefix.as_str()) {
            if let Some(first) = rest.split('/').next() {
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    default.to_string()
}
