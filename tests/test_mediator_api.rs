//! API-mode mediator against a mock HTTP server.

use std::error::Error as _;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ragbot::mediator::{
    ApiSession, BackendError, BackendHandles, HistoryEntry, Mediator, MediatorError, Mode,
    Operation, RagRoute,
};

fn mediator(server: &MockServer, route: RagRoute) -> Mediator {
    let session = ApiSession::new(&server.uri(), Duration::from_secs(5), route).unwrap();
    let handles = BackendHandles { api: Some(session), ..Default::default() };
    Mediator::new(handles).unwrap()
}

#[tokio::test]
async fn test_api_mode_is_resolved() {
    let server = MockServer::start().await;
    assert_eq!(mediator(&server, RagRoute::Global).mode(), Mode::Api);
}

#[tokio::test]
async fn test_add_to_history_puts_entry() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/history/7"))
        .and(body_json(json!({ "role": "user", "text": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    mediator(&server, RagRoute::Global)
        .add_to_history(7, "user", "hello")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_history_accepts_wrapped_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": [
                { "role": "user", "text": "hi" },
                { "role": "assistant", "text": "hello!" }
            ]
        })))
        .mount(&server)
        .await;

    let history = mediator(&server, RagRoute::Global).get_user_history(3).await.unwrap();
    assert_eq!(
        history,
        vec![HistoryEntry::new("user", "hi"), HistoryEntry::new("assistant", "hello!")]
    );
}

#[tokio::test]
async fn test_get_history_accepts_raw_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let history = mediator(&server, RagRoute::Global).get_user_history(3).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_clear_history_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/history/5"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let m = mediator(&server, RagRoute::Global);
    m.clear_history(5).await.unwrap();
    m.clear_history(5).await.unwrap();
}

#[tokio::test]
async fn test_clear_history_treats_missing_history_as_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/history/5"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/history/5"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no history"))
        .expect(1)
        .mount(&server)
        .await;

    let m = mediator(&server, RagRoute::Global);
    m.clear_history(5).await.unwrap();
    m.clear_history(5).await.unwrap();
}

#[tokio::test]
async fn test_clear_history_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/history/5"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let err = mediator(&server, RagRoute::Global).clear_history(5).await.unwrap_err();
    assert!(matches!(
        err,
        MediatorError::Backend {
            operation: Operation::ClearHistory,
            source: BackendError::Status { status: 503, .. }
        }
    ));
}

#[tokio::test]
async fn test_add_to_history_ignores_response_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/history/7"))
        .respond_with(ResponseTemplate::new(422).set_body_string("dup"))
        .expect(1)
        .mount(&server)
        .await;

    mediator(&server, RagRoute::Global)
        .add_to_history(7, "user", "hello")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ask_gpt_unwraps_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gpt/42"))
        .and(body_json(json!({ "question": "2+2?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "4" })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = mediator(&server, RagRoute::Global).ask_gpt("2+2?", 42).await.unwrap();
    assert_eq!(answer, "4");
}

#[tokio::test]
async fn test_rag_answer_without_user_hits_global_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/"))
        .and(body_json(json!({ "question": "what is a module?" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "answer": "A module groups code." })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let answer = mediator(&server, RagRoute::Global)
        .rag_answer("what is a module?", None)
        .await
        .unwrap();
    assert_eq!(answer, "A module groups code.");
}

#[tokio::test]
async fn test_rag_answer_per_user_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "personal" })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = mediator(&server, RagRoute::PerUser)
        .rag_answer("q", Some(9))
        .await
        .unwrap();
    assert_eq!(answer, "personal");
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gpt/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = mediator(&server, RagRoute::Global).ask_gpt("q", 1).await.unwrap_err();
    match err {
        MediatorError::Backend { operation, source: BackendError::Status { status, body } } => {
            assert_eq!(operation, Operation::AskGpt);
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gpt/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = mediator(&server, RagRoute::Global).ask_gpt("q", 1).await.unwrap_err();
    assert!(matches!(
        err,
        MediatorError::Backend { source: BackendError::Decode(_), .. }
    ));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let session =
        ApiSession::new(&server.uri(), Duration::from_millis(100), RagRoute::Global).unwrap();
    let m = Mediator::new(BackendHandles { api: Some(session), ..Default::default() }).unwrap();

    let err = m.get_user_history(1).await.unwrap_err();
    let MediatorError::Backend { source: BackendError::Transport(e), .. } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(e.is_timeout());
    assert!(err.source().is_some());
}
