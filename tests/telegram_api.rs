// tests/telegram_api.rs
// Wire-level checks for the Bot API client against a mock server.

use httpmock::prelude::*;
use serde_json::json;

use kwork_monitor::notify::telegram::TelegramApi;
use kwork_monitor::notify::{MessageTransport, SendOptions};

fn api(server: &MockServer) -> TelegramApi {
    TelegramApi::new("123:abc").with_base_url(server.base_url())
}

#[tokio::test]
async fn send_message_posts_html_payload() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bot123:abc/sendMessage")
                .json_body_includes(
                    r#"{"chat_id":"42","text":"hello","parse_mode":"HTML","disable_web_page_preview":false}"#,
                );
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 1 } }));
        })
        .await;

    let opts = SendOptions {
        html: true,
        link_preview: true,
        reply_keyboard: None,
    };
    api(&server)
        .send_message("42", "hello", opts)
        .await
        .expect("sendMessage ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn reply_keyboard_is_serialized_as_reply_markup() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bot123:abc/sendMessage")
                .json_body_includes(
                    r#"{"reply_markup":{"keyboard":[[{"text":"/monitor"},{"text":"/stop"}]],"resize_keyboard":true}}"#,
                );
            then.status(200)
                .json_body(json!({ "ok": true, "result": { "message_id": 2 } }));
        })
        .await;

    let opts = SendOptions {
        html: true,
        link_preview: false,
        reply_keyboard: Some(vec![vec!["/monitor".into(), "/stop".into()]]),
    };
    api(&server)
        .send_message("42", "меню", opts)
        .await
        .expect("sendMessage with keyboard");
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_send_surfaces_description() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/bot123:abc/sendMessage");
            then.status(200).json_body(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            }));
        })
        .await;

    let err = api(&server)
        .send_message("42", "hello", SendOptions::notification())
        .await
        .expect_err("rejected send must error");
    assert!(err.to_string().contains("chat not found"));
}

#[tokio::test]
async fn get_me_reads_the_profile() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/bot123:abc/getMe");
            then.status(200).json_body(json!({
                "ok": true,
                "result": { "id": 99, "username": "kwork_monitor_bot", "is_bot": true }
            }));
        })
        .await;

    let me = api(&server).get_me().await.expect("getMe");
    assert_eq!(me.id, 99);
    assert_eq!(me.username.as_deref(), Some("kwork_monitor_bot"));
}

#[tokio::test]
async fn get_updates_decodes_messages() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/bot123:abc/getUpdates");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 5,
                            "chat": { "id": 555, "type": "private" },
                            "from": { "id": 7, "is_bot": false, "first_name": "T" },
                            "text": "/status"
                        }
                    },
                    { "update_id": 11, "edited_message": {} }
                ]
            }));
        })
        .await;

    let updates = api(&server).get_updates(0).await.expect("getUpdates");
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].update_id, 10);
    let msg = updates[0].message.as_ref().unwrap();
    assert_eq!(msg.chat.id, 555);
    assert_eq!(msg.text.as_deref(), Some("/status"));
    assert!(updates[1].message.is_none(), "non-message updates pass through");
}
