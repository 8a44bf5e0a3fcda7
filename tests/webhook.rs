//! Event callback handling and broadcast fan-out.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{Harness, RecordingBroadcaster, TABLE_ID};

fn record_changed(table_id: &str) -> serde_json::Value {
    json!({
        "schema": "2.0",
        "header": { "event_id": "ev-1", "event_type": "drive.file.bitable_record_changed_v1" },
        "event": {
            "file_token": "bascnLeads",
            "table_id": table_id,
            "action_list": [
                { "action": "record_edited", "record_id": "rec1",
                  "after_value": [{ "field_id": "fldStage", "field_value": "Won" }] }
            ]
        }
    })
}

#[tokio::test]
async fn test_url_verification_echoes_challenge() {
    let h = Harness::start().await;
    let (status, body) = h
        .post("/api/webhook", json!({ "type": "url_verification", "challenge": "abc", "token": "v" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "challenge": "abc" }));
    assert!(h.broadcaster.calls().is_empty());
}

#[tokio::test]
async fn test_watched_table_change_is_broadcast() {
    let h = Harness::start().await;
    let event = record_changed(TABLE_ID);

    let (_, body) = h.post("/api/webhook", event.clone()).await;
    assert_eq!(body, json!({ "code": 0, "msg": "ok" }));

    let calls = h.broadcaster.calls();
    assert_eq!(calls.len(), 1);
    let (channel, name, data) = &calls[0];
    assert_eq!(channel, "leads-channel");
    assert_eq!(name, "record-changed");
    assert_eq!(data["table_id"], TABLE_ID);
    assert_eq!(data["actions"], event["event"]["action_list"]);
    assert!(data["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_unwatched_table_is_acked_silently() {
    let h = Harness::start().await;
    let (_, body) = h.post("/api/webhook", record_changed("tblOther")).await;
    assert_eq!(body, json!({ "code": 0, "msg": "ok" }));
    assert!(h.broadcaster.calls().is_empty());
}

#[tokio::test]
async fn test_other_events_are_acked() {
    let h = Harness::start().await;
    let (_, body) = h
        .post(
            "/api/webhook",
            json!({ "header": { "event_type": "im.message.receive_v1" }, "event": { "table_id": TABLE_ID } }),
        )
        .await;
    assert_eq!(body, json!({ "code": 0, "msg": "ok" }));
    assert!(h.broadcaster.calls().is_empty());
}

#[tokio::test]
async fn test_broadcast_failure_still_acks() {
    let h = Harness::with_broadcaster(RecordingBroadcaster::failing()).await;
    let (status, body) = h.post("/api/webhook", record_changed(TABLE_ID)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "code": 0, "msg": "ok" }));
    assert_eq!(h.broadcaster.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_action_list_broadcasts_empty_list() {
    let h = Harness::start().await;
    let (_, body) = h
        .post(
            "/api/webhook",
            json!({
                "header": { "event_type": "drive.file.bitable_record_changed_v1" },
                "event": { "table_id": TABLE_ID }
            }),
        )
        .await;
    assert_eq!(body["code"], 0);
    assert_eq!(h.broadcaster.calls()[0].2["actions"], json!([]));
}
