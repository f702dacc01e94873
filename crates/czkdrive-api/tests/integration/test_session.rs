//! Integration tests for the session manager
//!
//! Verifies when the session authenticates, refreshes or stays offline.

use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use czkdrive_api::auth::SessionState;
use czkdrive_api::CzkError;
use czkdrive_core::domain::RemoteId;
use czkdrive_core::ports::{IStorageDriver, Tokens};

use crate::common;

fn refresh_ok(access_token: &str) -> serde_json::Value {
    json!({
        "status": 200,
        "success": true,
        "message": "ok",
        "data": {
            "access_token": access_token,
            "expires_in": 3600
        }
    })
}

#[tokio::test]
async fn test_fresh_session_makes_no_network_call() {
    let server = MockServer::start().await;
    common::mount_authenticate(&server, "unused", 0).await;
    common::mount_refresh(&server, refresh_ok("unused"), 0).await;

    let mut session = common::session_for(&server).with_tokens(common::fresh_tokens());
    let token = session.ensure_valid().await.expect("fresh token");

    assert_eq!(token, common::ACCESS_TOKEN);
    server.verify().await;
}

#[tokio::test]
async fn test_expired_session_refreshes_once() {
    let server = MockServer::start().await;
    common::mount_authenticate(&server, "unused", 0).await;

    Mock::given(method("POST"))
        .and(path(common::api_path("/refresh_token")))
        .and(body_string_contains(common::REFRESH_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_ok("refreshed-token")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = common::session_for(&server).with_tokens(common::expired_tokens());
    assert_eq!(session.state(), SessionState::Expired);

    let token = session.ensure_valid().await.expect("refresh succeeds");
    assert_eq!(token, "refreshed-token");
    assert_eq!(session.state(), SessionState::Authenticated);

    // no new refresh token was issued, so the old one is kept
    let tokens = session.tokens().expect("tokens held");
    assert_eq!(tokens.refresh_token.as_deref(), Some(common::REFRESH_TOKEN));

    server.verify().await;
}

#[tokio::test]
async fn test_refresh_replaces_refresh_token_when_supplied() {
    let server = MockServer::start().await;
    common::mount_refresh(
        &server,
        json!({
            "status": 200,
            "success": true,
            "data": {
                "access_token": "a2",
                "expires_in": 60,
                "refresh_token": "r2"
            }
        }),
        1,
    )
    .await;

    let mut session = common::session_for(&server).with_tokens(common::expired_tokens());
    session.refresh().await.expect("refresh succeeds");

    let tokens = session.tokens().expect("tokens held");
    assert_eq!(tokens.access_token, "a2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_authenticate() {
    let server = MockServer::start().await;
    common::mount_refresh(
        &server,
        json!({
            "status": 401,
            "success": false,
            "message": "无效或过期的刷新令牌"
        }),
        1,
    )
    .await;
    common::mount_authenticate(&server, "reauth-token", 1).await;

    let mut session = common::session_for(&server).with_tokens(common::expired_tokens());
    let token = session.ensure_valid().await.expect("re-authentication succeeds");

    assert_eq!(token, "reauth-token");
    assert_eq!(session.state(), SessionState::Authenticated);
    server.verify().await;
}

#[tokio::test]
async fn test_expired_session_without_refresh_token_authenticates() {
    let server = MockServer::start().await;
    common::mount_refresh(&server, refresh_ok("unused"), 0).await;
    common::mount_authenticate(&server, "reauth-token", 1).await;

    let tokens = Tokens {
        refresh_token: None,
        ..common::expired_tokens()
    };
    let mut session = common::session_for(&server).with_tokens(tokens);
    assert_eq!(session.state(), SessionState::Expired);

    let token = session.ensure_valid().await.expect("authentication succeeds");
    assert_eq!(token, "reauth-token");
    assert_eq!(session.state(), SessionState::Authenticated);
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_with_success_false_is_rejected() {
    let server = MockServer::start().await;
    common::mount_refresh(
        &server,
        json!({
            "status": 200,
            "success": false,
            "data": {"access_token": "ignored", "expires_in": 60}
        }),
        1,
    )
    .await;

    let mut session = common::session_for(&server).with_tokens(common::expired_tokens());
    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, CzkError::Auth(_)));
}

#[tokio::test]
async fn test_unauthenticated_session_authenticates_without_refresh() {
    let server = MockServer::start().await;
    common::mount_refresh(&server, refresh_ok("unused"), 0).await;
    common::mount_authenticate(&server, "first-token", 1).await;

    let mut session = common::session_for(&server);
    assert_eq!(session.state(), SessionState::Unauthenticated);

    let token = session.ensure_valid().await.expect("authentication succeeds");
    assert_eq!(token, "first-token");

    let tokens = session.tokens().expect("tokens held");
    assert_eq!(tokens.refresh_token.as_deref(), Some("new-refresh-token"));
    server.verify().await;
}

#[tokio::test]
async fn test_authenticate_accepts_success_message_without_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::api_path("/authenticate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "认证成功",
            "data": {
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 100
            }
        })))
        .mount(&server)
        .await;

    let mut session = common::session_for(&server);
    session.authenticate().await.expect("accepted by message");
    assert_eq!(session.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_authenticate_rejected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::api_path("/authenticate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 401,
            "message": "invalid api key"
        })))
        .mount(&server)
        .await;

    let mut session = common::session_for(&server);
    let err = session.authenticate().await.unwrap_err();

    match err {
        CzkError::Auth(message) => assert!(message.contains("invalid api key")),
        other => panic!("expected auth error, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_authenticate_requires_both_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::api_path("/authenticate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "data": {"access_token": "a", "expires_in": 100}
        })))
        .mount(&server)
        .await;

    let mut session = common::session_for(&server);
    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(err, CzkError::Auth(_)));
}

#[tokio::test]
async fn test_authenticate_http_error_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::api_path("/authenticate")))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let mut session = common::session_for(&server);
    let err = session.authenticate().await.unwrap_err();
    assert!(matches!(err, CzkError::Auth(_)));
}

#[tokio::test]
async fn test_driver_init_authenticates() {
    let server = MockServer::start().await;
    common::mount_authenticate(&server, common::ACCESS_TOKEN, 1).await;

    let driver = common::driver_for(&server);
    assert_eq!(driver.session_state().await, SessionState::Unauthenticated);

    driver.init().await.expect("init succeeds");
    assert_eq!(driver.session_state().await, SessionState::Authenticated);
    server.verify().await;
}

#[tokio::test]
async fn test_driver_init_fails_with_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::api_path("/authenticate")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 403,
            "message": "forbidden"
        })))
        .mount(&server)
        .await;

    let driver = common::driver_for(&server);
    let err = driver.init().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CzkError>(),
        Some(CzkError::Auth(_))
    ));
}

#[tokio::test]
async fn test_concurrent_operations_refresh_once() {
    let server = MockServer::start().await;
    common::mount_refresh(&server, refresh_ok(common::ACCESS_TOKEN), 1).await;
    common::mount_authenticate(&server, "unused", 0).await;
    common::mount_endpoint(
        &server,
        "GET",
        "/list_files",
        json!({"code": 200, "data": {"items": []}}),
    )
    .await;

    let driver = common::driver_for(&server).with_tokens(common::expired_tokens());
    let root = RemoteId::root();

    let (first, second) = tokio::join!(driver.list(&root), driver.list(&root));
    assert!(first.expect("first list").is_empty());
    assert!(second.expect("second list").is_empty());

    server.verify().await;
}
