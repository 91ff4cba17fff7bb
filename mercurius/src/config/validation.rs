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

use crate::config::{ConfigError, ServerConfig};

pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Validation(message.to_string()));

        if self.data_root_path.as_os_str().is_empty() {
            return invalid("data root path must be given");
        }

        if self.amqp_config.url.is_empty() {
            return invalid("AMQP URL is not given");
        }
        if self.amqp_config.exchange.is_empty() {
            return invalid("AMQP exchange is not given");
        }

        // The catalog section is optional; when a URL is present the rest
        // of the section becomes mandatory.
        if !self.bisque_config.url.is_empty() {
            if self.bisque_config.admin_username.is_empty() {
                return invalid("BisQue admin username is not given");
            }
            if self.bisque_config.admin_password.is_empty() {
                return invalid("BisQue admin password is not given");
            }
            if self.bisque_config.irods_username.is_empty() {
                return invalid("BisQue iRODS username is not given");
            }
            if self.bisque_config.irods_zone.is_empty() {
                return invalid("BisQue iRODS zone is not given");
            }
            if self.bisque_config.irods_base_url.is_empty() {
                return invalid("BisQue iRODS base URL is not given");
            }
            if self.bisque_config.irods_root_path.is_empty() {
                return invalid("BisQue iRODS root path is not given");
            }
        }

        if self.irods_config.host.is_empty() {
            return invalid("iRODS host is not given");
        }
        if self.irods_config.zone.is_empty() {
            return invalid("iRODS zone is not given");
        }
        if self.irods_config.port == 0 {
            return invalid("iRODS port is not given");
        }
        if self.irods_config.admin_username.is_empty() {
            return invalid("iRODS admin username is not given");
        }
        if self.irods_config.admin_password.is_empty() {
            return invalid("iRODS admin password is not given");
        }

        Ok(())
    }
}
