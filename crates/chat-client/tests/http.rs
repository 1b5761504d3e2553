//! End-to-end tests over real HTTP using the default reqwest transport.

use std::sync::Arc;

use chat_client::{CallRequest, ChatClient, ClientConfig, Error, HttpTransport};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn success_body() -> serde_json::Value {
    json!({
        "choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}],
        "usage": {"total_tokens": 5}
    })
}

fn client_for(server: &MockServer) -> ChatClient {
    ChatClient::new(
        ClientConfig::builder()
            .base_url(format!("{}/v1", server.uri()))
            .api_key("test-key".to_string())
            .model("m")
            .build(),
    )
}

#[tokio::test]
async fn posts_the_assembled_body_and_parses_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "m",
            "stream": false,
            "max_tokens": 100,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .call(
            CallRequest::builder()
                .user_message("hi")
                .max_tokens(100)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(result.content, "hello");
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert_eq!(result.usage.unwrap().total_tokens, Some(5));
}

#[tokio::test]
async fn overflow_rejection_is_retried_once_over_http() {
    let server = MockServer::start().await;

    let rejection = json!({
        "error": {"message": "'max_tokens' is too large: 8000. This model's maximum context length is 32768 tokens and your request has 25060 input tokens (8000 > 32768-25060)."}
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 8000})))
        .respond_with(ResponseTemplate::new(400).set_body_json(rejection))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 7452})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .call(
            CallRequest::builder()
                .user_message("hi")
                .max_tokens(8000)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(result.content, "hello");
}

#[tokio::test]
async fn custom_reqwest_client_is_carried_by_the_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("user-agent", "quote-bot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .user_agent("quote-bot/1.0")
        .build()
        .unwrap();
    let client = ChatClient::builder()
        .base_url(format!("{}/v1", server.uri()))
        .model("m")
        .transport(Arc::new(HttpTransport::new(http)))
        .build();

    let result = client
        .call(CallRequest::builder().user_message("hi").build())
        .await
        .unwrap();

    assert_eq!(result.content, "hello");
}

#[tokio::test]
async fn html_error_page_is_classified_as_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<!DOCTYPE html><html><body>502</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call(CallRequest::builder().user_message("hi").build())
        .await
        .unwrap_err();

    match err {
        Error::MalformedResponse { status, message } => {
            assert_eq!(status, 200);
            assert!(message.contains("HTML"));
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "invalid api key"}})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call(CallRequest::builder().user_message("hi").build())
        .await
        .unwrap_err();

    match err {
        Error::Api {
            status, message, ..
        } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
