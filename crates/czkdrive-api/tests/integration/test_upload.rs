//! Integration tests for the two-phase upload
//!
//! Verifies the initiate/complete handshake, the content fingerprint sent
//! to the server, and that a failed initiation never reaches completion.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::json;
use tokio::io::{AsyncRead, ReadBuf};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use czkdrive_api::CzkError;
use czkdrive_core::domain::RemoteId;
use czkdrive_core::ports::{FileStream, IStorageDriver, ProgressCallback};

use crate::common;

/// MD5 of "hello world"
const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

/// Reader whose source fails on the first read
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "source closed",
        )))
    }
}

#[tokio::test]
async fn test_upload_full_flow() {
    let (server, driver) = common::setup_driver().await;

    Mock::given(method("POST"))
        .and(path(common::api_path("/first_upload")))
        .and(body_string_contains(HELLO_MD5))
        .and(body_string_contains("hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": "ready",
            "data": {"csrf_token": "csrf-1", "file_key": "key-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(common::api_path("/ok_upload")))
        .and(body_string_contains("csrf-1"))
        .and(body_string_contains("key-1"))
        .and(body_string_contains(HELLO_MD5))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "uploaded",
            "data": {"file_id": 321}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let progress_seen = Arc::new(AtomicU64::new(0));
    let progress_clone = Arc::clone(&progress_seen);
    let progress: ProgressCallback = Box::new(move |done, _total| {
        progress_clone.store(done, Ordering::SeqCst);
    });

    let stream = FileStream::from_bytes("hello.txt", b"hello world".to_vec());
    let obj = driver
        .put(&RemoteId::root(), stream, Some(progress))
        .await
        .expect("upload succeeds");

    assert_eq!(obj.id(), "321");
    assert_eq!(obj.name(), "hello.txt");
    assert_eq!(obj.size(), 11);
    assert!(!obj.is_folder());
    assert_eq!(progress_seen.load(Ordering::SeqCst), 11);

    server.verify().await;
}

#[tokio::test]
async fn test_upload_without_returned_id_leaves_it_empty() {
    let (server, driver) = common::setup_driver().await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"code": 200, "data": {"csrf_token": "c", "file_key": "k"}}),
    )
    .await;
    common::mount_endpoint(&server, "POST", "/ok_upload", json!({"code": 200})).await;

    let stream = FileStream::from_bytes("a.bin", vec![1, 2, 3]);
    let obj = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .expect("upload succeeds");

    assert_eq!(obj.id(), "");
    assert_eq!(obj.size(), 3);
}

#[tokio::test]
async fn test_upload_takes_top_level_file_id() {
    let (server, driver) = common::setup_driver().await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"status": 200, "data": {"csrf_token": "c", "file_key": "k"}}),
    )
    .await;
    common::mount_endpoint(
        &server,
        "POST",
        "/ok_upload",
        json!({"status": 200, "file_id": "abc-9"}),
    )
    .await;

    let stream = FileStream::from_bytes("a.bin", vec![0; 16]);
    let obj = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .expect("upload succeeds");
    assert_eq!(obj.id(), "abc-9");
}

#[tokio::test]
async fn test_upload_init_missing_file_key_skips_complete() {
    let (server, driver) = common::setup_driver().await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"code": 200, "data": {"csrf_token": "c"}}),
    )
    .await;

    Mock::given(method("POST"))
        .and(path(common::api_path("/ok_upload")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
        .expect(0)
        .mount(&server)
        .await;

    let stream = FileStream::from_bytes("a.bin", vec![1, 2, 3]);
    let err = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CzkError>(),
        Some(CzkError::UploadInit(_))
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_upload_init_application_error() {
    let (server, driver) = common::setup_driver().await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"code": 413, "msg": "quota exceeded"}),
    )
    .await;

    let stream = FileStream::from_bytes("big.bin", vec![0; 32]);
    let err = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .unwrap_err();

    match err.downcast_ref::<CzkError>() {
        Some(CzkError::Application { code, message }) => {
            assert_eq!(*code, 413);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected application error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_complete_failure() {
    let (server, driver) = common::setup_driver().await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"code": 200, "data": {"csrf_token": "c", "file_key": "k"}}),
    )
    .await;
    common::mount_endpoint(
        &server,
        "POST",
        "/ok_upload",
        json!({"code": 500, "message": "storage error"}),
    )
    .await;

    let stream = FileStream::from_bytes("a.bin", vec![1]);
    let err = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("storage error"));
}

#[tokio::test]
async fn test_upload_spools_before_authenticating() {
    let server = MockServer::start().await;
    common::mount_authenticate(&server, common::ACCESS_TOKEN, 0).await;
    common::mount_refresh(&server, json!({"status": 200, "success": true}), 0).await;

    Mock::given(method("POST"))
        .and(path(common::api_path("/first_upload")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
        .expect(0)
        .mount(&server)
        .await;

    let driver = common::driver_for(&server);
    let stream = FileStream::new("broken.bin", 10, BrokenReader);
    let err = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CzkError>(),
        Some(CzkError::Io(_))
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_upload_authenticates_after_spooling() {
    let server = MockServer::start().await;
    common::mount_authenticate(&server, common::ACCESS_TOKEN, 1).await;
    common::mount_endpoint(
        &server,
        "POST",
        "/first_upload",
        json!({"code": 200, "data": {"csrf_token": "c", "file_key": "k"}}),
    )
    .await;
    common::mount_endpoint(
        &server,
        "POST",
        "/ok_upload",
        json!({"code": 200, "data": {"id": 5}}),
    )
    .await;

    let driver = common::driver_for(&server);
    let stream = FileStream::from_bytes("fresh.txt", b"abc".to_vec());
    let obj = driver
        .put(&RemoteId::root(), stream, None)
        .await
        .expect("upload succeeds");

    assert_eq!(obj.id(), "5");
    server.verify().await;
}
