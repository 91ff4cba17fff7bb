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

//! Configuration file discovery and parsing.
//!
//! The daemon and the producer CLI read the same YAML file. Resolution
//! order: the `--config` flag, `$MERCURIUS_CONFIG`, `./mercurius.yml` or
//! `./mercurius.yaml`, then the packaged install location. `${VAR}`
//! references are expanded before parsing so credentials can stay out of
//! the file.

use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ServerConfig};

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "MERCURIUS_CONFIG";

/// Location used by packaged installs.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/irods_rule_async_exec_cmd/config.yml";

/// Loads the configuration from the given file, or from the first
/// discovered location when none is given.
pub fn load_config(config_file: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let path = match config_file {
        Some(path) => path.to_path_buf(),
        None => discover_config_file().ok_or(ConfigError::ConfigNotFound)?,
    };

    load_config_from_file(&path)
}

/// Loads the configuration from a specific file.
pub fn load_config_from_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let expanded = expand_env_vars(&content)?;
    Ok(serde_yaml::from_str(&expanded)?)
}

fn discover_config_file() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    ["./mercurius.yml", "./mercurius.yaml", SYSTEM_CONFIG_PATH]
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}

/// Expands `${VAR}` references in one pass. `${VAR:-fallback}` substitutes
/// the fallback when the variable is unset; `${VAR:?message}` makes the
/// variable mandatory and reports the message when it is missing.
fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
    let reference = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([-?])([^}]*))?\}").unwrap();

    let mut expanded = String::with_capacity(content.len());
    let mut tail = 0;

    for caps in reference.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        expanded.push_str(&content[tail..whole.start()]);
        tail = whole.end();

        let name = &caps[1];
        match (env::var(name).ok(), caps.get(2).map(|m| m.as_str())) {
            (Some(value), _) => expanded.push_str(&value),
            (None, Some("-")) => expanded.push_str(&caps[3]),
            (None, Some("?")) => {
                return Err(ConfigError::EnvSubstitutionError(format!(
                    "{name} is unset: {}",
                    &caps[3]
                )));
            }
            (None, _) => {
                return Err(ConfigError::EnvSubstitutionError(format!(
                    "{name} is unset"
                )));
            }
        }
    }

    expanded.push_str(&content[tail..]);
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_splices_around_references() {
        env::set_var("MERCURIUS_TEST_ZONE", "z");
        let expanded =
            expand_env_vars("irods_root_path: /${MERCURIUS_TEST_ZONE}/home # comment").unwrap();
        assert_eq!(expanded, "irods_root_path: /z/home # comment");
        env::remove_var("MERCURIUS_TEST_ZONE");
    }

    #[test]
    fn test_fallback_applies_only_when_unset() {
        env::remove_var("MERCURIUS_TEST_FALLBACK");
        let expanded = expand_env_vars("password: ${MERCURIUS_TEST_FALLBACK:-swordfish}").unwrap();
        assert_eq!(expanded, "password: swordfish");

        env::set_var("MERCURIUS_TEST_FALLBACK", "actual");
        let expanded = expand_env_vars("password: ${MERCURIUS_TEST_FALLBACK:-swordfish}").unwrap();
        assert_eq!(expanded, "password: actual");
        env::remove_var("MERCURIUS_TEST_FALLBACK");
    }

    #[test]
    fn test_bare_reference_to_unset_variable_fails() {
        env::remove_var("MERCURIUS_TEST_MISSING");
        assert!(expand_env_vars("password: ${MERCURIUS_TEST_MISSING}").is_err());
    }

    #[test]
    fn test_mandatory_reference_reports_its_message() {
        env::remove_var("MERCURIUS_TEST_MANDATORY");
        let err = expand_env_vars("password: ${MERCURIUS_TEST_MANDATORY:?set the admin password}")
            .unwrap_err();
        assert!(err.to_string().contains("set the admin password"));
    }

    #[test]
    fn test_text_without_references_is_untouched() {
        let content = "data_root_path: /srv/relay\ndebug: false\n";
        assert_eq!(expand_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(
            &path,
            "data_root_path: /srv/relay\namqp_config:\n  url: amqp://broker/\n  exchange: ex\n",
        )
        .unwrap();

        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.amqp_config.exchange, "ex");
    }

    #[test]
    fn test_unreadable_file_reports_its_path() {
        let err = load_config_from_file(Path::new("/definitely/not/a/real/config.yml"))
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/a/real/config.yml"));
    }
}
