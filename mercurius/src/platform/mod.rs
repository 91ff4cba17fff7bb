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

//! Client for the data-management platform's metadata store.
//!
//! The platform's wire protocol is a vendor concern and sits behind the
//! [`PlatformConnector`] / [`PlatformSession`] traits. What the relay
//! needs from it is a single operation — attach a key/value pair to a
//! named object — wrapped by [`PlatformClient`] with the same lazy,
//! cooldown-gated reconnection the broker channel uses.
//!
//! The shipped connector, [`icommands::IcommandsConnector`], drives the
//! platform's command-line utilities; deployments with a native protocol
//! client can implement the traits instead.

mod client;
pub mod icommands;

pub use client::PlatformClient;

use async_trait::async_trait;

use crate::error::RelayError;

/// What a stat resolves to on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    DataObject,
    Collection,
}

/// Identity of a platform object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub id: i64,
    pub kind: ObjectKind,
}

/// One authenticated protocol session.
#[async_trait]
pub trait PlatformSession: Send + Sync {
    /// Resolves a path to an object identity; `None` when nothing exists
    /// at the path.
    async fn stat(&self, path: &str) -> Result<Option<ObjectStat>, RelayError>;

    /// Attaches the metadata triple `(key, value, units)` to the object at
    /// `path`.
    async fn add_metadata(
        &self,
        path: &str,
        key: &str,
        value: &str,
        units: &str,
    ) -> Result<(), RelayError>;
}

/// Produces authenticated sessions. Dial errors are returned as-is; the
/// wrapping client downgrades them to *not-ready*.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, RelayError>;
}
