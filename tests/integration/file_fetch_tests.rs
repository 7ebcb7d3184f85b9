//! `SlackFileFetcher` downloads with the bot token.

use std::time::Duration;

use bugline::http::RetryPolicy;
use bugline::models::report::Attachment;
use bugline::pipeline::relay::AttachmentSource;
use bugline::slack::files::SlackFileFetcher;
use bugline::AppError;

fn fetcher() -> SlackFileFetcher {
    let policy = RetryPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 1,
        base_delay: Duration::from_millis(10),
    };
    SlackFileFetcher::new("xoxb-test", policy).expect("fetcher")
}

#[tokio::test]
async fn downloads_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/files-pri/T1-F1/shot.png")
        .match_header("authorization", "Bearer xoxb-test")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(b"\x89PNG\r\n\x1a\n")
        .create_async()
        .await;

    let attachment = Attachment::new(
        format!("{}/files-pri/T1-F1/shot.png", server.url()),
        "shot.png",
        "image/png",
    );
    let payload = fetcher().fetch(&attachment).await.expect("downloaded");

    assert_eq!(payload.as_ref(), b"\x89PNG\r\n\x1a\n");
    mock.assert_async().await;
}

#[tokio::test]
async fn sign_in_page_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/files-pri/T1-F1/shot.png")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<!DOCTYPE html><title>Slack</title>")
        .create_async()
        .await;

    let attachment = Attachment::new(
        format!("{}/files-pri/T1-F1/shot.png", server.url()),
        "shot.png",
        "image/png",
    );
    let err = fetcher().fetch(&attachment).await.expect_err("rejected");
    assert!(matches!(err, AppError::Attachment(msg) if msg.contains("sign-in")));
}

#[tokio::test]
async fn missing_file_is_an_attachment_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/files-pri/T1-F1/gone.png")
        .with_status(404)
        .create_async()
        .await;

    let attachment = Attachment::new(
        format!("{}/files-pri/T1-F1/gone.png", server.url()),
        "gone.png",
        "image/png",
    );
    let err = fetcher().fetch(&attachment).await.expect_err("fails");
    assert!(matches!(err, AppError::Attachment(msg) if msg.contains("404")));
}
