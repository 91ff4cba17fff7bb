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

//! Spool protocol tests through the public API, over real files.

use std::fs;

use tempfile::TempDir;

use mercurius::spool::{Request, RequestPayload, Spool};

#[test]
fn test_on_disk_entry_is_self_describing_json() {
    let tmp = TempDir::new().unwrap();
    let spool = Spool::new(tmp.path().join("spool"));
    spool.make_dirs().unwrap();

    let path = spool
        .turn_in(&Request::link_bisque("alice", "/z/home/alice/img.tif"))
        .unwrap();

    // The file name is `<micro_ts>-<pid>`.
    let basename = path.file_name().unwrap().to_string_lossy().into_owned();
    let (micros, pid) = basename.split_once('-').expect("timestamp-pid name");
    assert!(micros.parse::<u128>().is_ok());
    assert_eq!(pid.parse::<u32>().unwrap(), std::process::id());

    // The body is UTF-8 JSON whose `type` matches the variant, with an
    // RFC 3339 creation time carrying a UTC offset.
    let body: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(body["type"], "link_bisque");
    assert_eq!(body["irods_username"], "alice");
    let creation_time = body["creation_time"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(creation_time).is_ok());
}

#[test]
fn test_quarantine_round_trip_is_lossless() {
    let tmp = TempDir::new().unwrap();
    let spool = Spool::new(tmp.path().join("spool"));
    spool.make_dirs().unwrap();

    let original = Request::move_bisque("alice", "/z/home/alice/a", "/z/home/alice/b");
    let path = spool.turn_in(&original).unwrap();
    let basename = path.file_name().unwrap().to_owned();
    let active_bytes = fs::read(&path).unwrap();

    let scraped = spool.scrape().unwrap().items.remove(0);
    spool.mark_failed(&scraped).unwrap();

    let failed_path = spool.failed_dir().join(&basename);
    assert_eq!(fs::read(&failed_path).unwrap(), active_bytes);

    // Moving the file back restores the entry byte for byte.
    fs::rename(&failed_path, &path).unwrap();
    let restored = spool.scrape().unwrap().items.remove(0);
    assert_eq!(restored.payload, original.payload);
    assert_eq!(restored.creation_time, original.creation_time);
}

#[test]
fn test_drain_pass_view_is_ordered_and_typed() {
    let tmp = TempDir::new().unwrap();
    let spool = Spool::new(tmp.path().join("spool"));
    spool.make_dirs().unwrap();

    fs::write(
        spool.dir().join("2000-1"),
        Request::link_bisque("alice", "/z/home/alice/a").encode().unwrap(),
    )
    .unwrap();
    fs::write(
        spool.dir().join("1000-1"),
        Request::send_message("k", "b").encode().unwrap(),
    )
    .unwrap();

    let items = spool.scrape().unwrap().items;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_send_message());
    assert!(items[1].is_bisque_family());

    match &items[1].payload {
        RequestPayload::LinkBisque { irods_path, .. } => {
            assert_eq!(irods_path, "/z/home/alice/a")
        }
        other => panic!("expected link_bisque, got {other:?}"),
    }
}
