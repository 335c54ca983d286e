use std::time::Duration;

use crate::fixtures::test_app::{GROUP_ADMIN, MEMBER, OTHER_MEMBER, TestApp};
use crate::fixtures::ws::{connect, expect_event, expect_event_where, expect_silence, join, send};
use serde_json::{Value, json};

#[tokio::test]
async fn ws_rejects_invalid_token() {
    let app = TestApp::spawn().await;
    let result = tokio_tungstenite::connect_async(app.ws_url("bogus")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn joining_announces_participants() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let mut admin = connect(&app, &app.admin_token()).await;
    let snapshot = join(&mut admin, &session_id).await;
    assert_eq!(snapshot["data"]["sessionId"], session_id.as_str());
    assert_eq!(snapshot["data"]["participants"][0]["id"], GROUP_ADMIN);

    let mut member = connect(&app, &app.member_token(MEMBER)).await;
    let snapshot = join(&mut member, &session_id).await;
    assert_eq!(snapshot["data"]["participants"].as_array().unwrap().len(), 2);

    let event = expect_event(&mut admin, "participant-joined").await;
    assert_eq!(event["data"]["participant"]["id"], MEMBER);
    assert_eq!(event["data"]["participant"]["displayName"], "MEMBER-1");

    send(&mut member, "update-media", json!({ "isMuted": true })).await;
    let event = expect_event(&mut admin, "participant-updated").await;
    assert_eq!(event["data"]["participant"]["isMuted"], true);

    let resp = app
        .auth_get(&format!("/api/session/{session_id}"), &app.member_token(MEMBER))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "active");
    assert_eq!(json["live"]["participants"].as_array().unwrap().len(), 2);

    drop(member);
    let event = expect_event(&mut admin, "participant-left").await;
    assert_eq!(event["data"]["participantId"], MEMBER);
}

#[tokio::test]
async fn ws_join_outside_window_is_refused() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;
    app.set_time(12, 0);

    let mut member = connect(&app, &app.member_token(MEMBER)).await;
    send(&mut member, "join-session", json!({ "sessionId": session_id })).await;
    let error = expect_event(&mut member, "error").await;
    assert_eq!(error["data"]["code"], "outside_time_window");

    send(&mut member, "start-reading", Value::Null).await;
    let error = expect_event(&mut member, "error").await;
    assert_eq!(error["data"]["code"], "not_joined");
}

#[tokio::test]
async fn reading_turns_flow_through_the_queue() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let mut admin = connect(&app, &app.admin_token()).await;
    join(&mut admin, &session_id).await;
    let mut a = connect(&app, &app.member_token(MEMBER)).await;
    join(&mut a, &session_id).await;
    let mut b = connect(&app, &app.member_token(OTHER_MEMBER)).await;
    join(&mut b, &session_id).await;

    send(&mut b, "start-reading", Value::Null).await;
    let error = expect_event(&mut b, "error").await;
    assert_eq!(error["data"]["code"], "empty_queue");

    send(&mut a, "add-to-queue", Value::Null).await;
    expect_event(&mut b, "queue-updated").await;
    send(&mut a, "add-to-queue", json!({ "participantId": OTHER_MEMBER })).await;
    let error = expect_event(&mut a, "error").await;
    assert_eq!(error["data"]["code"], "forbidden");

    send(&mut admin, "add-to-queue", json!({ "participantId": OTHER_MEMBER })).await;
    let event = expect_event(&mut a, "queue-updated").await;
    assert_eq!(event["data"]["readingQueue"]["queue"], json!([MEMBER, OTHER_MEMBER]));

    send(&mut b, "start-reading", Value::Null).await;
    let event = expect_event(&mut admin, "reading-started").await;
    assert_eq!(event["data"]["participantId"], MEMBER);
    assert_eq!(event["data"]["readingQueue"]["currentReader"], MEMBER);

    send(&mut a, "change-verse", json!({ "verse": { "chapter": 2, "verse": 47 } })).await;
    let event = expect_event(&mut b, "verse-changed").await;
    assert_eq!(event["data"]["verse"]["verse"], 47);
    assert_eq!(event["data"]["changedBy"], MEMBER);

    send(&mut b, "skip-reading", Value::Null).await;
    let error = expect_event(&mut b, "error").await;
    assert_eq!(error["data"]["code"], "forbidden");

    send(&mut admin, "skip-reading", Value::Null).await;
    let event = expect_event(&mut b, "reading-finished").await;
    assert_eq!(event["data"]["participantId"], MEMBER);
    assert_eq!(event["data"]["skipped"], true);
    assert_eq!(event["data"]["readingQueue"]["currentReader"], Value::Null);
    assert_eq!(event["data"]["readingQueue"]["queue"], json!([OTHER_MEMBER]));

    send(&mut a, "clear-queue", Value::Null).await;
    let error = expect_event(&mut a, "error").await;
    assert_eq!(error["data"]["code"], "forbidden");
}

#[tokio::test]
async fn signals_reach_only_their_target() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let mut admin = connect(&app, &app.admin_token()).await;
    join(&mut admin, &session_id).await;
    let mut a = connect(&app, &app.member_token(MEMBER)).await;
    join(&mut a, &session_id).await;
    let mut b = connect(&app, &app.member_token(OTHER_MEMBER)).await;
    join(&mut b, &session_id).await;
    expect_event(&mut admin, "participant-joined").await;
    expect_event(&mut admin, "participant-joined").await;
    expect_event(&mut a, "participant-joined").await;

    send(&mut admin, "webrtc-offer", json!({ "to": OTHER_MEMBER, "data": { "sdp": "v=0" } })).await;
    let event = expect_event(&mut b, "webrtc-signal").await;
    assert_eq!(event["data"]["type"], "offer");
    assert_eq!(event["data"]["from"], GROUP_ADMIN);
    expect_silence(&mut a).await;

    send(&mut b, "webrtc-ice-candidate", json!({ "data": { "candidate": "c1" } })).await;
    let event = expect_event(&mut a, "webrtc-signal").await;
    assert_eq!(event["data"]["type"], "ice-candidate");
    expect_event(&mut admin, "webrtc-signal").await;
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn timer_runs_out_and_ends_the_session() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let mut admin = connect(&app, &app.admin_token()).await;
    join(&mut admin, &session_id).await;
    let mut member = connect(&app, &app.member_token(MEMBER)).await;
    join(&mut member, &session_id).await;

    send(&mut member, "start-timer", json!({ "minutes": 1 })).await;
    let error = expect_event(&mut member, "error").await;
    assert_eq!(error["data"]["code"], "forbidden");

    send(&mut admin, "start-timer", json!({ "minutes": 1 })).await;
    let update = expect_event(&mut member, "session-timer-update").await;
    assert_eq!(update["data"]["timeRemaining"], 60);
    assert_eq!(update["data"]["isActive"], true);

    app.advance(Duration::from_secs(20));
    send(&mut admin, "pause-timer", Value::Null).await;
    let update = expect_event_where(&mut member, "session-timer-update", |d| d["isPaused"] == true).await;
    assert_eq!(update["data"]["timeRemaining"], 40);

    app.advance(Duration::from_secs(600));
    send(&mut admin, "resume-timer", Value::Null).await;
    let update = expect_event_where(&mut member, "session-timer-update", |d| d["isPaused"] == false).await;
    assert_eq!(update["data"]["timeRemaining"], 40);

    app.advance(Duration::from_secs(41));
    let ended = expect_event(&mut member, "session-ended").await;
    assert_eq!(ended["data"]["reason"], "time_up");
    expect_event(&mut admin, "session-ended").await;

    assert!(!app.state.hub.is_live(&session_id));
    send(&mut member, "start-reading", Value::Null).await;
    let error = expect_event(&mut member, "error").await;
    assert_eq!(error["data"]["code"], "not_joined");
}

#[tokio::test]
async fn moderator_ends_session() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    let mut admin = connect(&app, &app.admin_token()).await;
    join(&mut admin, &session_id).await;
    let mut member = connect(&app, &app.member_token(MEMBER)).await;
    join(&mut member, &session_id).await;

    send(&mut member, "end-session", Value::Null).await;
    let error = expect_event(&mut member, "error").await;
    assert_eq!(error["data"]["code"], "forbidden");

    send(&mut admin, "end-session", Value::Null).await;
    let ended = expect_event(&mut member, "session-ended").await;
    assert_eq!(ended["data"]["reason"], "ended_by_moderator");

    let participants = app
        .state
        .relay
        .active_participants(&session_id)
        .await
        .unwrap();
    assert!(participants.is_empty());
}
