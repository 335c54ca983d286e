use std::sync::Arc;

use crate::fixtures::test_app::{GROUP_ADMIN, MEMBER, OTHER_MEMBER, TestApp, UnavailableStore};
use serde_json::Value;

async fn post_signal(app: &TestApp, token: &str, body: Value) -> reqwest::Response {
    app.auth_post("/api/webrtc/signaling", token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn latest_signal_wins() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let resp = post_signal(
        &app,
        &app.member_token(MEMBER),
        serde_json::json!({ "sessionId": session_id, "type": "offer", "data": { "sdp": "first" } }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["from"], MEMBER);

    app.advance(std::time::Duration::from_millis(5));
    let resp = post_signal(
        &app,
        &app.member_token(OTHER_MEMBER),
        serde_json::json!({
            "sessionId": session_id,
            "type": "answer",
            "to": MEMBER,
            "data": { "sdp": "second" },
        }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get(
            &format!("/api/webrtc/signaling?sessionId={session_id}"),
            &app.member_token(MEMBER),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["type"], "answer");
    assert_eq!(json["data"]["from"], OTHER_MEMBER);
    assert_eq!(json["data"]["to"], MEMBER);
    assert_eq!(json["data"]["data"]["sdp"], "second");
}

#[tokio::test]
async fn signal_requests_are_validated() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;
    let token = app.member_token(MEMBER);

    let resp = post_signal(
        &app,
        &token,
        serde_json::json!({ "sessionId": session_id, "type": "hello", "data": {} }),
    )
    .await;
    assert!(resp.status().is_client_error());

    let resp = post_signal(
        &app,
        &token,
        serde_json::json!({ "sessionId": session_id, "type": "offer", "from": OTHER_MEMBER }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = post_signal(
        &app,
        &token,
        serde_json::json!({ "sessionId": "missing", "type": "offer" }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_get("/api/webrtc/signaling", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_get("/api/webrtc/signaling?sessionId=nothing-yet", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn join_and_leave_track_participants() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    for user in [MEMBER, OTHER_MEMBER, MEMBER] {
        let resp = app
            .auth_put("/api/webrtc/signaling", &app.member_token(user))
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let participants = app
        .state
        .relay
        .active_participants(&session_id)
        .await
        .unwrap();
    assert_eq!(participants, vec![MEMBER, OTHER_MEMBER]);

    // Members may only remove themselves.
    let resp = app
        .auth_delete(
            &format!("/api/webrtc/signaling?sessionId={session_id}&participantId={OTHER_MEMBER}"),
            &app.member_token(MEMBER),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(
            &format!("/api/webrtc/signaling?sessionId={session_id}&participantId={MEMBER}"),
            &app.member_token(MEMBER),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["participants"], serde_json::json!([OTHER_MEMBER]));

    let resp = app
        .auth_delete(
            &format!("/api/webrtc/signaling?sessionId={session_id}&participantId={OTHER_MEMBER}"),
            &app.token(GROUP_ADMIN, vrinda_db::models::UserRole::Admin),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn store_outage_returns_503() {
    let app = TestApp::spawn_with_store(Arc::new(UnavailableStore)).await;
    let session_id = app.schedule_session().await;

    let resp = post_signal(
        &app,
        &app.member_token(MEMBER),
        serde_json::json!({ "sessionId": session_id, "type": "offer", "data": {} }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 503);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "store_unavailable");

    let resp = app
        .auth_get(
            &format!("/api/webrtc/signaling?sessionId={session_id}"),
            &app.member_token(MEMBER),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 503);
}
