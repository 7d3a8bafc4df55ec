//! End-to-end tests against a per-session server with a real WebSocket
//! client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use moot_sessions::{
    GetAnswerInput, GetNextAnswerInput, SeedQuestion, SessionStore, SessionStoreConfig,
};
use moot_core::{QuestionStatus, QuestionType};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn test_store() -> Arc<SessionStore> {
    SessionStore::new(SessionStoreConfig {
        skip_browser: true,
        ..SessionStoreConfig::default()
    })
}

async fn connect(url: &str) -> WsStream {
    let ws_url = format!("{}/ws", url.replacen("http", "ws", 1));
    let (ws, _) = timeout(TIMEOUT, connect_async(&ws_url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("invalid frame JSON");
        }
    }
}

#[tokio::test]
async fn connect_replays_pending_questions_in_insertion_order() {
    let store = test_store();
    let out = store
        .start_session(
            None,
            vec![
                SeedQuestion {
                    question_type: QuestionType::AskText,
                    config: json!({"question": "Which services?"}),
                },
                SeedQuestion {
                    question_type: QuestionType::PickOne,
                    config: json!({"question": "JSON or plain?", "options": []}),
                },
            ],
        )
        .await
        .unwrap();

    // Push one more before anyone connects.
    let late = store
        .push_question(&out.session_id, QuestionType::Confirm, json!({"question": "Go?"}))
        .unwrap();

    let mut ws = connect(&out.url).await;
    let _ = ws
        .send(Message::Text(r#"{"type":"connected"}"#.into()))
        .await;

    // Exactly one frame per pending question, in insertion order.
    let first = next_json(&mut ws).await;
    assert_eq!(first["type"], "question");
    assert_eq!(first["id"], out.question_ids[0].as_str());
    let second = next_json(&mut ws).await;
    assert_eq!(second["id"], out.question_ids[1].as_str());
    let third = next_json(&mut ws).await;
    assert_eq!(third["id"], late.as_str());

    assert!(store.end_session(&out.session_id).await);
}

#[tokio::test]
async fn response_over_ws_resolves_blocking_consumer() {
    let store = test_store();
    let out = store
        .start_session(
            None,
            vec![SeedQuestion {
                question_type: QuestionType::AskText,
                config: json!({"question": "Which services?"}),
            }],
        )
        .await
        .unwrap();
    let qid = out.question_ids[0].clone();

    let store2 = Arc::clone(&store);
    let qid2 = qid.clone();
    let waiter = tokio::spawn(async move {
        store2
            .get_answer(GetAnswerInput {
                question_id: qid2,
                block: true,
                timeout_ms: Some(5_000),
            })
            .await
    });

    let mut ws = connect(&out.url).await;
    let _ = next_json(&mut ws).await; // replayed question frame
    let frame = format!(r#"{{"type":"response","id":"{qid}","answer":{{"text":"api, worker"}}}}"#);
    ws.send(Message::Text(frame.into())).await.unwrap();

    let answer = timeout(TIMEOUT, waiter).await.unwrap().unwrap();
    assert!(answer.completed);
    assert_eq!(answer.status, QuestionStatus::Answered);
    assert_eq!(answer.response.unwrap()["text"], "api, worker");

    assert!(store.end_session(&out.session_id).await);
}

#[tokio::test]
async fn responses_feed_session_scoped_consumer_in_order() {
    let store = test_store();
    let out = store.start_session(None, vec![]).await.unwrap();
    let sid = out.session_id.clone();
    let q1 = store
        .push_question(&sid, QuestionType::AskText, json!({"question": "Q1"}))
        .unwrap();
    let q2 = store
        .push_question(&sid, QuestionType::AskText, json!({"question": "Q2"}))
        .unwrap();

    let mut ws = connect(&out.url).await;
    let _ = next_json(&mut ws).await;
    let _ = next_json(&mut ws).await;

    for (qid, text) in [(&q1, "one"), (&q2, "two")] {
        let frame = format!(r#"{{"type":"response","id":"{qid}","answer":{{"text":"{text}"}}}}"#);
        ws.send(Message::Text(frame.into())).await.unwrap();
    }

    let first = store
        .get_next_answer(GetNextAnswerInput {
            session_id: sid.clone(),
            block: true,
            timeout_ms: Some(5_000),
        })
        .await;
    assert!(first.completed);
    assert_eq!(first.question_id.unwrap(), q1);

    let second = store
        .get_next_answer(GetNextAnswerInput {
            session_id: sid.clone(),
            block: true,
            timeout_ms: Some(5_000),
        })
        .await;
    assert!(second.completed);
    assert_eq!(second.question_id.unwrap(), q2);

    assert!(store.end_session(&sid).await);
}

#[tokio::test]
async fn cancel_emits_cancel_frame() {
    let store = test_store();
    let out = store.start_session(None, vec![]).await.unwrap();
    let qid = store
        .push_question(&out.session_id, QuestionType::Confirm, json!({"question": "?"}))
        .unwrap();

    let mut ws = connect(&out.url).await;
    let _ = next_json(&mut ws).await; // replay

    assert!(store.cancel_question(&qid));
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "cancel");
    assert_eq!(frame["id"], qid.as_str());

    assert!(store.end_session(&out.session_id).await);
}

#[tokio::test]
async fn end_session_emits_end_frame_and_stops_server() {
    let store = test_store();
    let out = store.start_session(None, vec![]).await.unwrap();
    let mut ws = connect(&out.url).await;

    assert!(store.end_session(&out.session_id).await);
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["type"], "end");

    // The server is gone; a fresh connection attempt fails.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let ws_url = format!("{}/ws", out.url.replacen("http", "ws", 1));
    assert!(connect_async(&ws_url).await.is_err());
}

#[tokio::test]
async fn ui_bundle_is_served_at_root() {
    let store = SessionStore::new(SessionStoreConfig {
        skip_browser: true,
        ui_html: Arc::from("<html><body>moot test bundle</body></html>"),
        ..SessionStoreConfig::default()
    });
    let out = store.start_session(None, vec![]).await.unwrap();

    let body = reqwest::get(&out.url).await.unwrap().text().await.unwrap();
    assert!(body.contains("moot test bundle"));

    assert!(store.end_session(&out.session_id).await);
}

#[tokio::test]
async fn disconnect_does_not_cancel_questions() {
    let store = test_store();
    let out = store
        .start_session(
            None,
            vec![SeedQuestion {
                question_type: QuestionType::Confirm,
                config: json!({"question": "?"}),
            }],
        )
        .await
        .unwrap();

    {
        let mut ws = connect(&out.url).await;
        let _ = next_json(&mut ws).await;
        ws.close(None).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!store.is_connected(&out.session_id));

    let listed = store.list_questions(Some(&out.session_id));
    assert_eq!(listed[0].status, QuestionStatus::Pending);

    // A reconnect replays the still-pending question.
    let mut ws = connect(&out.url).await;
    let frame = next_json(&mut ws).await;
    assert_eq!(frame["id"], out.question_ids[0].as_str());

    assert!(store.end_session(&out.session_id).await);
}
