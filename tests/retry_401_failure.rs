mod common;

use std::time::Duration;

use reqwest::StatusCode;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bearer_refresh::{CredentialStore, Error, RefreshError};
use common::{REFRESH_PATH, harness};

async fn concurrent_requests_fail_together(n: usize) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/items/\d+$"))
        .respond_with(ResponseTemplate::new(401))
        .expect(n as u64)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("refresh backend down")
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "rt-1");
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let client = h.client.clone();
            tokio::spawn(async move { client.get(&format!("/api/items/{i}")).await })
        })
        .collect();

    for handle in handles {
        match handle.await.expect("task panicked") {
            Err(Error::Refresh(RefreshError::Rejected { status, body })) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "refresh backend down");
            }
            other => panic!("expected refresh rejection, got {:?}", other),
        }
    }

    server.verify().await;
    assert_eq!(h.terminator.calls(), 1, "session terminated once per cycle");
    assert_eq!(h.store.access_token(), None);
    assert_eq!(h.store.refresh_token(), None);
    assert!(!h.client.coordinator().is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_request_fails_when_refresh_is_rejected() {
    concurrent_requests_fail_together(1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_waiters_fail_when_refresh_is_rejected() {
    concurrent_requests_fail_together(5).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_waiters_fail_when_refresh_is_rejected() {
    concurrent_requests_fail_together(50).await;
}

#[tokio::test]
async fn returns_auth_error_after_double_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "message": "token invalid", "status": 401 })),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "at-2",
            "refreshToken": "rt-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "rt-1");
    let res = h.client.get("/api/posts").await;

    match res {
        Err(Error::Auth(msg)) => {
            assert!(msg.to_lowercase().contains("401"), "{msg}");
            assert!(msg.contains("token invalid"), "{msg}");
        }
        Err(other) => panic!("expected Error::Auth, got {}", other),
        Ok(_) => panic!("expected Error::Auth, got Ok"),
    }
    assert_eq!(h.terminator.calls(), 0);
    assert_eq!(h.store.access_token().as_deref(), Some("at-2"));
}

#[tokio::test]
async fn missing_refresh_token_skips_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "");
    let err = h.client.get("/api/posts").await.expect_err("must fail");

    assert!(err.is_terminal_auth());
    assert!(matches!(
        err,
        Error::Refresh(RefreshError::MissingRefreshToken)
    ));
    assert_eq!(h.terminator.calls(), 1);
    assert_eq!(
        h.terminator.reasons(),
        vec![RefreshError::MissingRefreshToken]
    );
    assert_eq!(h.store.access_token(), None);
}

#[tokio::test]
async fn malformed_refresh_body_fails_the_cycle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "at-2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "rt-1");
    let err = h.client.get("/api/posts").await.expect_err("must fail");

    assert!(matches!(err, Error::Refresh(RefreshError::Malformed(_))), "{err}");
    assert_eq!(h.terminator.calls(), 1);
    assert_eq!(h.store.access_token(), None);
}

#[tokio::test]
async fn non_auth_failures_propagate_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "message": "no such post", "status": "404" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "rt-1");
    match h.client.get("/api/posts").await {
        Err(Error::Http(status, message)) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "no such post");
        }
        other => panic!("expected Error::Http, got {:?}", other),
    }
    assert_eq!(h.terminator.calls(), 0);
    assert_eq!(h.store.access_token().as_deref(), Some("at-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_401s_without_refresh_token_terminate_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/items/\d+$"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "");
    let handles: Vec<_> = (0..5)
        .map(|i| {
            let client = h.client.clone();
            tokio::spawn(async move { client.get(&format!("/api/items/{i}")).await })
        })
        .collect();

    for handle in handles {
        match handle.await.expect("task panicked") {
            Err(Error::Refresh(RefreshError::MissingRefreshToken)) => {}
            other => panic!("expected missing refresh token, got {:?}", other),
        }
    }

    server.verify().await;
    assert_eq!(h.terminator.calls(), 1);
    assert_eq!(
        h.terminator.reasons(),
        vec![RefreshError::MissingRefreshToken]
    );
    assert_eq!(h.store.access_token(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn late_401_after_failed_cycle_gets_the_cycle_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/fast"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("refresh backend down"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "at-1", "rt-1");
    let slow = tokio::spawn({
        let client = h.client.clone();
        async move { client.get("/api/slow").await }
    });
    let fast = tokio::spawn({
        let client = h.client.clone();
        async move { client.get("/api/fast").await }
    });

    for handle in [fast, slow] {
        match handle.await.expect("task panicked") {
            Err(Error::Refresh(RefreshError::Rejected { status, .. })) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected refresh rejection, got {:?}", other),
        }
    }

    server.verify().await;
    assert_eq!(h.terminator.calls(), 1);
    assert!(matches!(
        h.terminator.reasons().as_slice(),
        [RefreshError::Rejected { .. }]
    ));
}
