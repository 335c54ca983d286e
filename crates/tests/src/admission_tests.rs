use crate::fixtures::test_app::{GROUP_ID, MEMBER, READING_TIME, TestApp};
use serde_json::Value;

async fn matching_time(app: &TestApp, token: &str) -> Value {
    let resp = app
        .auth_get(&format!("/api/group/{GROUP_ID}/matching-time"), token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn member_admitted_inside_window() {
    let app = TestApp::spawn().await;
    let token = app.member_token(MEMBER);

    app.set_time(18, 45);
    let json = matching_time(&app, &token).await;
    assert_eq!(json["canJoin"], true);
    assert_eq!(json["reason"], "within_time_window");
    assert_eq!(json["currentTime"], "18:45");
    assert_eq!(json["timeDifference"], 15);
    assert_eq!(json["userRole"], "USER");
    assert_eq!(json["group"]["id"], GROUP_ID);
    assert_eq!(json["group"]["name"], "Gita Circle");
    assert_eq!(json["group"]["readingTime"], READING_TIME);

    app.set_time(21, 0);
    let json = matching_time(&app, &token).await;
    assert_eq!(json["canJoin"], true);
    assert_eq!(json["timeDifference"], 120);
}

#[tokio::test]
async fn member_refused_outside_window_with_next_reading() {
    let app = TestApp::spawn().await;
    let token = app.member_token(MEMBER);

    app.set_time(18, 44);
    let json = matching_time(&app, &token).await;
    assert_eq!(json["canJoin"], false);
    assert_eq!(json["reason"], "outside_time_window");
    assert_eq!(json["nextReadingTime"], "2026-05-10T19:00:00+00:00");
    assert_eq!(json["group"]["readingTime"], READING_TIME);

    app.set_time(21, 1);
    let json = matching_time(&app, &token).await;
    assert_eq!(json["canJoin"], false);
    assert_eq!(json["timeDifference"], 121);
    assert_eq!(json["nextReadingTime"], "2026-05-11T19:00:00+00:00");
}

#[tokio::test]
async fn admins_bypass_the_window() {
    let app = TestApp::spawn().await;
    app.set_time(3, 0);

    let json = matching_time(&app, &app.admin_token()).await;
    assert_eq!(json["canJoin"], true);
    assert_eq!(json["reason"], "group_admin");

    let json = matching_time(&app, &app.super_admin_token()).await;
    assert_eq!(json["reason"], "super_admin");
    assert!(json.get("currentTime").is_none());
    assert_eq!(json["userRole"], "SUPER_ADMIN");
    assert_eq!(json["group"]["id"], GROUP_ID);
}

#[tokio::test]
async fn group_without_reading_time_refuses_members() {
    let app = TestApp::spawn().await;

    let resp = app
        .auth_post("/api/group", &app.super_admin_token())
        .json(&serde_json::json!({
            "id": "bhagavatam",
            "name": "Bhagavatam Study",
            "adminId": "admin-2",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get("/api/group/bhagavatam/matching-time", &app.member_token(MEMBER))
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["canJoin"], false);
    assert_eq!(json["reason"], "no_reading_time");
    assert_eq!(json["group"]["name"], "Bhagavatam Study");
    assert!(json["group"]["readingTime"].is_null());
}

#[tokio::test]
async fn only_super_admin_registers_groups() {
    let app = TestApp::spawn().await;
    let resp = app
        .auth_post("/api/group", &app.admin_token())
        .json(&serde_json::json!({ "name": "Mine", "adminId": "admin-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn reading_time_updates_are_validated() {
    let app = TestApp::spawn().await;
    let path = format!("/api/group/{GROUP_ID}/reading-time");

    let resp = app
        .auth_put(&path, &app.member_token(MEMBER))
        .json(&serde_json::json!({ "readingTime": "06:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_put(&path, &app.admin_token())
        .json(&serde_json::json!({ "readingTime": "24:00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid_input");

    let resp = app
        .auth_put(&path, &app.admin_token())
        .json(&serde_json::json!({ "readingTime": "6:30" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["readingTime"], "06:30");

    app.set_time(6, 20);
    let json = matching_time(&app, &app.member_token(MEMBER)).await;
    assert_eq!(json["canJoin"], true);
}

#[tokio::test]
async fn http_join_is_admission_gated() {
    let app = TestApp::spawn().await;
    let session_id = app.schedule_session().await;

    app.set_time(17, 0);
    let resp = app
        .auth_put("/api/webrtc/signaling", &app.member_token(MEMBER))
        .json(&serde_json::json!({ "sessionId": session_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "forbidden");
    assert_eq!(json["reason"], "outside_time_window");

    let resp = app
        .auth_put("/api/webrtc/signaling", &app.admin_token())
        .json(&serde_json::json!({ "sessionId": session_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::spawn().await;
    let resp = app
        .client
        .get(app.url(&format!("/api/group/{GROUP_ID}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .auth_get(&format!("/api/group/{GROUP_ID}"), "not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "unauthorized");
}
