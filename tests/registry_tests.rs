use consult_relay::session::{SessionRegistry, SessionState, SessionStatus};
use tokio::sync::watch;

fn status(state: SessionState) -> SessionStatus {
    SessionStatus {
        state,
        segments: 0,
        finalized_chars: 0,
        analysis_running: false,
    }
}

#[tokio::test]
async fn test_register_and_lookup() {
    let registry = SessionRegistry::new();
    assert!(registry.is_empty().await);

    let (_tx, rx) = watch::channel(status(SessionState::Connecting));
    let _close = registry.register("session-a", rx).await;

    assert_eq!(registry.len().await, 1);
    let info = registry.get("session-a").await.unwrap();
    assert_eq!(info.id, "session-a");
    assert_eq!(info.status.state, SessionState::Connecting);
    assert!(registry.get("session-b").await.is_none());
}

#[tokio::test]
async fn test_list_reflects_live_status() {
    let registry = SessionRegistry::new();
    let (tx, rx) = watch::channel(status(SessionState::Connecting));
    let _close = registry.register("session-a", rx).await;

    tx.send_replace(SessionStatus {
        state: SessionState::Streaming,
        segments: 4,
        finalized_chars: 120,
        analysis_running: true,
    });

    let sessions = registry.list().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status.state, SessionState::Streaming);
    assert_eq!(sessions[0].status.segments, 4);
    assert_eq!(sessions[0].status.finalized_chars, 120);
    assert!(sessions[0].status.analysis_running);
}

#[tokio::test]
async fn test_deregister_is_idempotent() {
    let registry = SessionRegistry::new();
    let (_tx, rx) = watch::channel(status(SessionState::Closed));
    let _close = registry.register("session-a", rx).await;

    registry.deregister("session-a").await;
    assert!(registry.is_empty().await);

    // A second deregister (or one for an unknown id) is harmless
    registry.deregister("session-a").await;
    registry.deregister("never-existed").await;
}

#[tokio::test]
async fn test_request_close_signals_session() {
    let registry = SessionRegistry::new();
    let (_tx, rx) = watch::channel(status(SessionState::Streaming));
    let close = registry.register("session-a", rx).await;

    assert!(registry.request_close("session-a").await);
    assert!(!registry.request_close("unknown").await);

    // The stored permit completes a later notified() immediately
    tokio::time::timeout(std::time::Duration::from_secs(1), close.notified())
        .await
        .expect("close signal was not delivered");
}

#[tokio::test]
async fn test_concurrent_register_and_deregister() {
    let registry = SessionRegistry::new();

    let mut handles = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("session-{}", i);
            let (_tx, rx) = watch::channel(SessionStatus {
                state: SessionState::Streaming,
                segments: i,
                finalized_chars: 0,
                analysis_running: false,
            });
            let _close = registry.register(&id, rx).await;
            if i % 2 == 0 {
                registry.deregister(&id).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.len().await, 16);
    let mut listed = registry.list().await;
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    assert!(listed.iter().all(|info| {
        info.id
            .strip_prefix("session-")
            .and_then(|n| n.parse::<usize>().ok())
            .is_some_and(|n| n % 2 == 1)
    }));
}

#[tokio::test]
async fn test_serialized_info_shape() {
    let registry = SessionRegistry::new();
    let (_tx, rx) = watch::channel(status(SessionState::Draining));
    let _close = registry.register("session-a", rx).await;

    let info = registry.get("session-a").await.unwrap();
    let value = serde_json::to_value(&info).unwrap();
    assert_eq!(value["id"], "session-a");
    assert_eq!(value["state"], "draining");
    assert!(value["started_at"].is_string());
    assert!(value["segments"].is_number());
    assert!(value["analysis_running"].is_boolean());
}
