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

//! Catalog client tests against a mocked HTTP catalog.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mercurius::bisque::BisqueClient;
use mercurius::config::BisqueConfig;
use mercurius::error::RelayError;
use mercurius::platform::{
    ObjectKind, ObjectStat, PlatformClient, PlatformConnector, PlatformSession,
};
use mercurius::spool::Request;

// "admin:secret" in basic-auth form.
const ADMIN_BASIC_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

type MetadataLog = Arc<Mutex<Vec<(String, String, String)>>>;

struct RecordingSession {
    metadata: MetadataLog,
}

#[async_trait]
impl PlatformSession for RecordingSession {
    async fn stat(&self, _path: &str) -> Result<Option<ObjectStat>, RelayError> {
        Ok(Some(ObjectStat {
            id: 7,
            kind: ObjectKind::DataObject,
        }))
    }

    async fn add_metadata(
        &self,
        path: &str,
        key: &str,
        value: &str,
        _units: &str,
    ) -> Result<(), RelayError> {
        self.metadata
            .lock()
            .unwrap()
            .push((path.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }
}

struct RecordingConnector {
    metadata: MetadataLog,
}

#[async_trait]
impl PlatformConnector for RecordingConnector {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, RelayError> {
        Ok(Box::new(RecordingSession {
            metadata: self.metadata.clone(),
        }))
    }
}

async fn client_for(server: &MockServer) -> (BisqueClient, MetadataLog) {
    let metadata: MetadataLog = Arc::new(Mutex::new(Vec::new()));

    let platform = Arc::new(
        PlatformClient::create(Box::new(RecordingConnector {
            metadata: metadata.clone(),
        }))
        .await,
    );

    let config = BisqueConfig {
        url: server.uri(),
        admin_username: "admin".to_string(),
        admin_password: "secret".to_string(),
        irods_username: "svc".to_string(),
        irods_zone: "z".to_string(),
        irods_base_url: "irods://data.example.org".to_string(),
        irods_root_path: "/z/home".to_string(),
    };

    (BisqueClient::new(config, platform).unwrap(), metadata)
}

#[tokio::test]
async fn test_link_posts_resource_and_writes_back_identifier() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/blob_service/paths/insert"))
        .and(query_param("user", "alice"))
        .and(header("authorization", ADMIN_BASIC_AUTH))
        .and(header("content-type", "application/xml"))
        .and(body_string_contains(r#"name="img.tif""#))
        .and(body_string_contains(r#"permission="private""#))
        .and(body_string_contains(
            r#"value="irods://data.example.org/alice/img.tif""#,
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<resource resource_uniq="00-ABC" name="img.tif" />"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, metadata) = client_for(&server).await;

    let request = Request::link_bisque("alice", "/z/home/alice/img.tif");
    client.process_item(&request).await.unwrap();

    let recorded = metadata.lock().unwrap();
    assert_eq!(
        *recorded,
        vec![(
            "/z/home/alice/img.tif".to_string(),
            "ipc-bisque-id".to_string(),
            "00-ABC".to_string()
        )]
    );
}

#[tokio::test]
async fn test_link_without_resource_uniq_fails_without_write_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/blob_service/paths/insert"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<resource name="a" />"#))
        .mount(&server)
        .await;

    let (client, metadata) = client_for(&server).await;

    let request = Request::link_bisque("alice", "/z/home/alice/a");
    let err = client.process_item(&request).await.unwrap_err();

    assert!(matches!(err, RelayError::Remote(_)));
    assert!(metadata.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_200_from_catalog_is_a_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/blob_service/paths/insert"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let (client, _) = client_for(&server).await;

    let request = Request::link_bisque("alice", "/z/home/alice/a");
    let err = client.process_item(&request).await.unwrap_err();

    assert!(matches!(err, RelayError::Remote(_)));
    assert!(!err.is_not_ready());
}

#[tokio::test]
async fn test_remove_sends_the_catalog_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blob_service/paths/remove"))
        .and(query_param("path", "irods://data.example.org/alice/img.tif"))
        .and(header("authorization", ADMIN_BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, metadata) = client_for(&server).await;

    let request = Request::remove_bisque("alice", "/z/home/alice/img.tif");
    client.process_item(&request).await.unwrap();

    // Removes never touch platform metadata.
    assert!(metadata.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_move_sends_source_and_destination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blob_service/paths/move"))
        .and(query_param("path", "irods://data.example.org/alice/a"))
        .and(query_param(
            "destination",
            "irods://data.example.org/alice/b",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server).await;

    let request = Request::move_bisque("alice", "/z/home/alice/a", "/z/home/alice/b");
    client.process_item(&request).await.unwrap();
}

#[tokio::test]
async fn test_out_of_scope_path_fails_before_any_http() {
    let server = MockServer::start().await;
    let (client, _) = client_for(&server).await;

    let request = Request::link_bisque("alice", "/other/zone/a");
    assert!(client.process_item(&request).await.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_message_requests_are_not_catalog_work() {
    let server = MockServer::start().await;
    let (client, _) = client_for(&server).await;

    let request = Request::send_message("k", "b");
    assert!(client.process_item(&request).await.is_err());
}
