//! `ChatCompletionsClient` against a mocked chat-completions endpoint.

use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use bugline::config::EnrichmentConfig;
use bugline::enrichment::openai::ChatCompletionsClient;
use bugline::enrichment::{EnrichmentClient, EnrichmentRequest, PromptImage};
use bugline::http::RetryPolicy;
use bugline::AppError;

fn client(server: &mockito::ServerGuard) -> ChatCompletionsClient {
    let config = EnrichmentConfig {
        api_url: format!("{}/v1/chat/completions", server.url()),
        api_key: "sk-test".into(),
        ..EnrichmentConfig::default()
    };
    let policy = RetryPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 1,
        base_delay: Duration::from_millis(10),
    };
    ChatCompletionsClient::new(&config, policy).expect("client")
}

fn request() -> EnrichmentRequest {
    EnrichmentRequest {
        model: "gpt-4o".into(),
        system_instruction: "format it".into(),
        user_prompt: "the submit button does nothing".into(),
        temperature: 0.5,
        images: Vec::new(),
    }
}

#[tokio::test]
async fn completion_text_is_returned() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "temperature": 0.5,
            "messages": [
                { "role": "system", "content": "format it" },
                { "role": "user", "content": "the submit button does nothing" }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "choices": [{ "message": { "role": "assistant", "content": "**Title:** Submit broken" } }] })
                .to_string(),
        )
        .create_async()
        .await;

    let text = client(&server).complete(&request()).await.expect("completion");

    assert_eq!(text, "**Title:** Submit broken");
    mock.assert_async().await;
}

#[tokio::test]
async fn screenshots_are_sent_as_image_parts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                { "role": "system", "content": "format it" },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "the submit button does nothing" },
                        { "type": "image_url", "image_url": { "url": "data:image/png;base64,iVBORw0KGgo=" } }
                    ]
                }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [{ "message": { "content": "**Title:** Submit broken" } }] }).to_string())
        .create_async()
        .await;

    let mut with_image = request();
    with_image.images.push(PromptImage {
        filename: "shot.png".into(),
        data_url: "data:image/png;base64,iVBORw0KGgo=".into(),
    });
    let text = client(&server).complete(&with_image).await.expect("completion");

    assert_eq!(text, "**Title:** Submit broken");
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_choices_are_an_enrichment_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    let err = client(&server).complete(&request()).await.expect_err("fails");
    assert!(matches!(err, AppError::Enrichment(_)));
}

#[tokio::test]
async fn rate_limit_is_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(json!({ "error": { "message": "Rate limit reached" } }).to_string())
        .expect(2)
        .create_async()
        .await;

    let err = client(&server).complete(&request()).await.expect_err("fails");
    assert!(matches!(&err, AppError::Enrichment(msg) if msg.contains("429")), "{err}");
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_body_is_an_enrichment_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let err = client(&server).complete(&request()).await.expect_err("fails");
    assert!(matches!(err, AppError::Enrichment(_)));
}
