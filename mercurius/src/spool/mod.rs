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

//! Filesystem-backed durable request queue.
//!
//! A spool is a directory of active request files plus a `failed/`
//! subdirectory holding quarantined entries. File names follow
//! `<micro_ts>-<pid>`, so the lexical order of basenames is the processing
//! order within one drain pass.
//!
//! The directory is deliberately unlocked: producers create uniquely-named
//! files atomically (write to a hidden temp name, then rename into place),
//! and a single relay instance is the only reader. Running two relays over
//! one spool is not supported.

mod request;

pub use request::{Request, RequestPayload, RequestType};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::RelayError;

/// Quarantine subdirectory name under the spool root.
pub const FAILED_DIR_NAME: &str = "failed";

/// Result of one scrape pass: the parsed entries in processing order, plus
/// the last parse failure encountered (informational; the failing files
/// have already been quarantined).
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub items: Vec<Request>,
    pub last_error: Option<RelayError>,
}

/// A filesystem spool rooted at one directory.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
    failed_dir: PathBuf,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let failed_dir = dir.join(FAILED_DIR_NAME);
        Self { dir, failed_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn failed_dir(&self) -> &Path {
        &self.failed_dir
    }

    /// Idempotently ensures the active and failed directories exist, are
    /// directories, and are writable by the caller.
    pub fn make_dirs(&self) -> Result<(), RelayError> {
        ensure_writable_dir(&self.dir)?;
        ensure_writable_dir(&self.failed_dir)?;
        Ok(())
    }

    /// Serializes `request` and writes it into the active directory under
    /// `<micro_ts>-<pid>`.
    ///
    /// The write lands under a hidden temporary name first and is renamed
    /// into place, so a concurrent scrape sees either nothing or the
    /// complete entry. Returns the final path.
    pub fn turn_in(&self, request: &Request) -> Result<PathBuf, RelayError> {
        let bytes = request.encode()?;

        let basename = format!("{}-{}", now_micros(), std::process::id());
        let final_path = self.dir.join(&basename);
        let temp_path = self.dir.join(format!(".{basename}.tmp"));

        write_entry(&temp_path, &bytes)?;
        fs::rename(&temp_path, &final_path)?;

        debug!(path = %final_path.display(), request_type = %request.request_type(), "turned in request");
        Ok(final_path)
    }

    /// Enumerates the active directory and parses every visible entry.
    ///
    /// Entries that fail to read or decode are moved to `failed/`
    /// immediately and excluded from the result; a single bad file never
    /// aborts the scrape. The returned sequence is sorted ascending by
    /// basename.
    pub fn scrape(&self) -> Result<ScrapeOutcome, RelayError> {
        let mut items = Vec::new();
        let mut last_error = None;

        for entry in fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    last_error = Some(RelayError::Io(err));
                    continue;
                }
            };

            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            // In-flight turn-ins are hidden behind a dot prefix.
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            match read_request(&path) {
                Ok(request) => items.push(request),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "quarantining malformed spool entry");
                    self.quarantine(&path);
                    last_error = Some(err);
                }
            }
        }

        items.sort_by(|a, b| a.basename().cmp(&b.basename()));

        Ok(ScrapeOutcome { items, last_error })
    }

    /// Deletes the backing file of a successfully dispatched item.
    pub fn mark_success(&self, item: &Request) -> Result<(), RelayError> {
        match &item.file_path {
            Some(path) => {
                fs::remove_file(path)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Moves the backing file of a failed item into `failed/`.
    pub fn mark_failed(&self, item: &Request) -> Result<(), RelayError> {
        match &item.file_path {
            Some(path) => {
                let target = self.failed_target(path);
                fs::rename(path, target)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn failed_target(&self, path: &Path) -> PathBuf {
        match path.file_name() {
            Some(basename) => self.failed_dir.join(basename),
            None => self.failed_dir.join("unnamed"),
        }
    }

    fn quarantine(&self, path: &Path) {
        let target = self.failed_target(path);
        if let Err(err) = fs::rename(path, &target) {
            warn!(path = %path.display(), error = %err, "failed to quarantine spool entry");
        }
    }
}

fn read_request(path: &Path) -> Result<Request, RelayError> {
    let bytes = fs::read(path)?;
    let mut request = Request::decode(&bytes)?;
    request.file_path = Some(path.to_path_buf());
    Ok(request)
}

fn write_entry(path: &Path, bytes: &[u8]) -> Result<(), RelayError> {
    fs::write(path, bytes)?;

    // Spool entries are world-writable so any producer can re-spool them.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o666))?;
    }

    Ok(())
}

fn ensure_writable_dir(dir: &Path) -> Result<(), RelayError> {
    let environment = |reason: String| RelayError::Environment {
        path: dir.to_path_buf(),
        reason,
    };

    match fs::metadata(dir) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(environment("exists but is not a directory".to_string()));
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if metadata.permissions().mode() & 0o200 != 0o200 {
                    return Err(environment(
                        "exists but does not have write permission".to_string(),
                    ));
                }
            }

            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| environment(format!("mkdir failed: {err}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, fs::Permissions::from_mode(0o775))
                    .map_err(|err| environment(format!("chmod failed: {err}")))?;
            }

            Ok(())
        }
        Err(err) => Err(environment(format!("stat failed: {err}"))),
    }
}

fn now_micros() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_spool() -> (TempDir, Spool) {
        let tmp = TempDir::new().unwrap();
        let spool = Spool::new(tmp.path().join("spool"));
        spool.make_dirs().unwrap();
        (tmp, spool)
    }

    #[test]
    fn test_make_dirs_is_idempotent() {
        let (_tmp, spool) = make_spool();
        assert!(spool.dir().is_dir());
        assert!(spool.failed_dir().is_dir());
        spool.make_dirs().unwrap();
    }

    #[test]
    fn test_make_dirs_rejects_file_in_place_of_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("spool");
        fs::write(&path, b"occupied").unwrap();

        let spool = Spool::new(&path);
        assert!(matches!(
            spool.make_dirs(),
            Err(RelayError::Environment { .. })
        ));
    }

    #[test]
    fn test_turn_in_then_scrape_round_trip() {
        let (_tmp, spool) = make_spool();

        let request = Request::send_message("k.a", "hello");
        let path = spool.turn_in(&request).unwrap();
        assert!(path.exists());

        let outcome = spool.scrape().unwrap();
        assert!(outcome.last_error.is_none());
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].payload, request.payload);
        assert_eq!(outcome.items[0].file_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_scrape_orders_by_basename() {
        let (_tmp, spool) = make_spool();

        let body = |key: &str| {
            Request::send_message(key, "x").encode().unwrap()
        };
        fs::write(spool.dir().join("1002-1"), body("third")).unwrap();
        fs::write(spool.dir().join("1000-1"), body("first")).unwrap();
        fs::write(spool.dir().join("1001-9"), body("second")).unwrap();

        let outcome = spool.scrape().unwrap();
        let keys: Vec<_> = outcome
            .items
            .iter()
            .map(|item| match &item.payload {
                RequestPayload::SendMessage { key, .. } => key.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, ["first", "second", "third"]);
    }

    #[test]
    fn test_scrape_quarantines_malformed_entries() {
        let (_tmp, spool) = make_spool();

        fs::write(spool.dir().join("1000-1"), b"{\"type\":\"unknown\",\"x\":1}").unwrap();
        fs::write(
            spool.dir().join("1001-1"),
            Request::link_bisque("alice", "/z/home/alice/a").encode().unwrap(),
        )
        .unwrap();

        let outcome = spool.scrape().unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert!(outcome.last_error.is_some());

        // The bad entry moved to failed/ and is gone from the active dir.
        assert!(spool.failed_dir().join("1000-1").exists());
        assert!(!spool.dir().join("1000-1").exists());

        // A re-scrape never revisits quarantined entries.
        let outcome = spool.scrape().unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert!(outcome.last_error.is_none());
    }

    #[test]
    fn test_scrape_skips_hidden_temp_files() {
        let (_tmp, spool) = make_spool();
        fs::write(spool.dir().join(".12345-1.tmp"), b"partial").unwrap();

        let outcome = spool.scrape().unwrap();
        assert!(outcome.items.is_empty());
        assert!(outcome.last_error.is_none());
        assert!(spool.dir().join(".12345-1.tmp").exists());
    }

    #[test]
    fn test_mark_success_unlinks() {
        let (_tmp, spool) = make_spool();
        spool.turn_in(&Request::send_message("k", "b")).unwrap();

        let outcome = spool.scrape().unwrap();
        spool.mark_success(&outcome.items[0]).unwrap();

        let outcome = spool.scrape().unwrap();
        assert!(outcome.items.is_empty());
    }

    #[test]
    fn test_mark_failed_promotes_to_failed_dir() {
        let (_tmp, spool) = make_spool();
        let path = spool.turn_in(&Request::send_message("k", "b")).unwrap();
        let basename = path.file_name().unwrap().to_owned();

        let outcome = spool.scrape().unwrap();
        spool.mark_failed(&outcome.items[0]).unwrap();

        assert!(spool.failed_dir().join(&basename).exists());
        assert!(!path.exists());
        assert!(spool.scrape().unwrap().items.is_empty());
    }

    #[test]
    fn test_marks_tolerate_missing_file_path() {
        let (_tmp, spool) = make_spool();
        let request = Request::send_message("k", "b");
        spool.mark_success(&request).unwrap();
        spool.mark_failed(&request).unwrap();
    }
}
