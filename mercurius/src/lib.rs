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

//! Mercurius is an asynchronous command-relay daemon.
//!
//! Producers (a rule engine embedded in a data-management platform, plus a
//! small CLI) deposit side-effect requests as JSON files in a filesystem
//! spool. A long-running service drains the spool on a fixed tick and
//! dispatches each request to one of two outbound collaborators:
//!
//! - an AMQP exchange (topic-keyed publish), or
//! - an HTTP catalog service (BisQue) that maintains links to objects
//!   stored in the platform.
//!
//! The service also consumes platform filesystem events from the broker
//! and translates them back into catalog requests, so mutations made by
//! external clients are reflected in the catalog.
//!
//! Delivery is at-least-once: a request file is deleted only after its
//! dispatch succeeds, and a crash between the two re-delivers it on the
//! next drain pass. Requests that fail for non-transient reasons are
//! quarantined under the spool's `failed/` directory.

pub mod amqp;
pub mod bisque;
pub mod config;
pub mod error;
pub mod platform;
pub mod service;
pub mod spool;

pub use config::{AmqpConfig, BisqueConfig, ConfigError, IrodsConfig, ServerConfig};
pub use error::RelayError;
pub use service::RelayService;
pub use spool::{Request, RequestPayload, RequestType, Spool};

/// Result type used throughout the relay.
pub type Result<T> = std::result::Result<T, error::RelayError>;
