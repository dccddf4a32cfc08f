use reqwest::StatusCode;

use crate::tests::test_support::{CountingStore, ScriptedTransport, client, wait_until};
use crate::{CredentialStore, Error};

#[tokio::test]
async fn failed_refresh_rejects_every_waiter_and_logs_out_once() {
    let transport = ScriptedTransport::builder()
        .gated()
        .refresh_fails(StatusCode::INTERNAL_SERVER_ERROR)
        .build();
    let store = CountingStore::with_tokens(Some("old"), Some("rtok"));
    let client = client(&transport, &store);

    let handles = ["/api/lead", "/api/a", "/api/b", "/api/c"]
        .into_iter()
        .map(|path| {
            let client = client.clone();
            tokio::spawn(async move { client.get(path).await })
        })
        .collect::<Vec<_>>();
    wait_until(|| transport.refresh_calls() == 1 && client.pending_requests() == 3).await;
    transport.release_refresh();

    for handle in handles {
        match handle.await.unwrap() {
            Err(Error::Refresh(inner)) => {
                assert_eq!(inner.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
            }
            other => panic!("expected Error::Refresh, got {:?}", other),
        }
    }

    assert_eq!(transport.refresh_calls(), 1);
    assert_eq!(store.logouts(), 1);
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert!(transport.sent_with("new").is_empty(), "nothing is replayed");
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn unusable_refresh_body_is_a_refresh_failure() {
    let transport = ScriptedTransport::builder()
        .refresh_returns(serde_json::json!({ "message": "ok" }))
        .build();
    let store = CountingStore::with_tokens(Some("old"), Some("rtok"));
    let client = client(&transport, &store);

    let err = client.get("/api/orders").await.unwrap_err();
    match err {
        Error::Refresh(inner) => {
            assert!(matches!(*inner, Error::InvalidRefreshResponse(_)));
        }
        other => panic!("expected Error::Refresh, got {:?}", other),
    }
    assert_eq!(store.logouts(), 1);
}

#[tokio::test]
async fn missing_refresh_token_logs_out_without_calling_refresh() {
    let transport = ScriptedTransport::builder().build();
    let store = CountingStore::with_tokens(Some("old"), None);
    let client = client(&transport, &store);

    let err = client.get("/api/users/me").await.unwrap_err();

    assert!(err.is_unauthorized(), "original 401 is surfaced, got {err:?}");
    assert_eq!(transport.refresh_calls(), 0);
    assert_eq!(store.logouts(), 1);
    assert_eq!(store.access_token(), None);
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn client_recovers_after_a_failed_refresh() {
    let transport = ScriptedTransport::builder().build();
    let store = CountingStore::with_tokens(Some("old"), None);
    let client = client(&transport, &store);

    client.get("/api/users/me").await.unwrap_err();

    client.login("new", Some("rtok".to_string()));
    let resp = client.get("/api/users/me").await.expect("fresh login works");
    assert_eq!(resp.text(), "ok /api/users/me");
}
