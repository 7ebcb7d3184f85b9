//! End-to-end pipeline behaviour against in-process fakes.

use std::sync::Arc;

use bugline::models::report::Attachment;
use bugline::pipeline::{handle_event, normalizer::GUIDANCE};

use super::test_helpers::{context, inbound, FakeEnrichment, FakeFiles, FakeTracker, PNG_BYTES};

const DRAFT: &str = "\
**Title:** Submit Button Unresponsive on Feedback Form

**Description:** Clicking the submit button on the feedback form has no effect.

**Priority:** High

**Recommended Assignee:** Nikolas Ioannou (Co-Founder)

**Labels:** Bug

**Steps to Reproduce:**
1. Open the feedback form.
2. Click submit.

**Expected Behavior:** The form is submitted.

**Actual Behavior:** Nothing happens.

**Attachments:** None
";

#[tokio::test]
async fn report_becomes_ticket_and_reply_links_it() {
    let enrichment = FakeEnrichment::replying(DRAFT);
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[]);
    let ctx = context(Arc::clone(&enrichment), Arc::clone(&tracker), files);

    let reply = handle_event(&ctx, inbound("the submit button does nothing when clicked", Vec::new())).await;

    assert_eq!(reply.channel_id, "C_BUGS");
    assert_eq!(reply.thread_ts.as_deref(), Some("1700000000.000100"));
    assert_eq!(
        reply.text,
        "Thanks for reporting the bug, <@U_REPORTER>! A ticket has been created in Linear: \
         https://linear.app/test/issue/BUG-1"
    );

    let created = tracker.created();
    assert_eq!(created.len(), 1);
    let ticket = &created[0];
    assert_eq!(ticket.team_id, "team-test");
    assert_eq!(ticket.title, "Submit Button Unresponsive on Feedback Form");
    assert_eq!(ticket.priority_ordinal, 2);
    assert_eq!(ticket.assignee_id.as_deref(), Some("user-nikolas"));
    assert_eq!(ticket.label_ids, vec!["label-bug"]);
    assert!(ticket.description.contains("**Steps to Reproduce:**"));
    assert!(!ticket.description.contains("Attachments"));

    let requests = enrichment.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-test");
    assert!(requests[0]
        .user_prompt
        .contains("the submit button does nothing when clicked"));
}

#[tokio::test]
async fn short_report_makes_no_network_calls() {
    let enrichment = FakeEnrichment::replying(DRAFT);
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[]);
    let ctx = context(Arc::clone(&enrichment), Arc::clone(&tracker), Arc::clone(&files));

    let reply = handle_event(
        &ctx,
        inbound(
            "broken",
            vec![Attachment::new("https://files/shot.png", "shot.png", "image/png")],
        ),
    )
    .await;

    assert!(reply.text.contains(GUIDANCE));
    assert!(reply.text.contains("<@U_REPORTER>"));
    assert_eq!(enrichment.calls(), 0);
    assert!(tracker.created().is_empty());
    assert!(files.fetched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn enrichment_failure_creates_no_ticket() {
    let enrichment = FakeEnrichment::failing();
    let tracker = Arc::new(FakeTracker::default());
    let ctx = context(enrichment, Arc::clone(&tracker), FakeFiles::with(&[]));

    let reply = handle_event(&ctx, inbound("login page spins forever after submit", Vec::new())).await;

    assert_eq!(
        reply.text,
        "Sorry <@U_REPORTER>, there was an error processing your bug report."
    );
    assert!(tracker.created().is_empty());
}

#[tokio::test]
async fn submission_failure_gets_a_distinct_reply() {
    let tracker = Arc::new(FakeTracker {
        fail_create: true,
        ..FakeTracker::default()
    });
    let ctx = context(FakeEnrichment::replying(DRAFT), tracker, FakeFiles::with(&[]));

    let reply = handle_event(&ctx, inbound("login page spins forever after submit", Vec::new())).await;

    assert!(reply.text.contains("could not be created in Linear"), "{}", reply.text);
    assert!(!reply.text.contains("https://"));
}

#[tokio::test]
async fn unparseable_draft_still_creates_a_ticket_with_defaults() {
    let tracker = Arc::new(FakeTracker::default());
    let ctx = context(
        FakeEnrichment::replying("I'm sorry, I can't help with that."),
        Arc::clone(&tracker),
        FakeFiles::with(&[]),
    );

    let reply = handle_event(&ctx, inbound("the export button downloads an empty file", Vec::new())).await;

    assert!(reply.text.contains("A ticket has been created"));
    let ticket = &tracker.created()[0];
    assert_eq!(ticket.title, "Bug Report Ticket");
    assert_eq!(ticket.description, "No description provided.");
    assert_eq!(ticket.priority_ordinal, 1);
    assert_eq!(ticket.assignee_id.as_deref(), Some("user-rushil"));
    assert_eq!(ticket.label_ids, vec!["label-bug"]);
}

#[tokio::test]
async fn one_failed_attachment_does_not_block_the_others() {
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[("https://files/second.png", PNG_BYTES)]);
    let ctx = context(FakeEnrichment::replying(DRAFT), Arc::clone(&tracker), Arc::clone(&files));

    let reply = handle_event(
        &ctx,
        inbound(
            "the submit button does nothing when clicked",
            vec![
                Attachment::new("https://files/first.png", "first.png", "image/png"),
                Attachment::new("https://files/second.png", "second.png", "image/png"),
            ],
        ),
    )
    .await;

    assert!(reply.text.contains("A ticket has been created"));
    assert_eq!(files.fetched.lock().unwrap().len(), 2);

    let ticket = &tracker.created()[0];
    assert!(ticket
        .description
        .ends_with("**Attachments:**\n- https://assets.test/second.png"));
    assert!(!ticket.description.contains("first.png"));
    assert_eq!(ticket.description.matches("**Attachments:**").count(), 1);
}

#[tokio::test]
async fn attachments_keep_input_order_and_corrected_types() {
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[
        ("https://files/a", PNG_BYTES),
        ("https://files/b", b"plain log output".as_slice()),
    ]);
    let ctx = context(FakeEnrichment::replying(DRAFT), Arc::clone(&tracker), files);

    handle_event(
        &ctx,
        inbound(
            "the submit button does nothing when clicked",
            vec![
                Attachment::new("https://files/a", "screenshot", "image/jpeg"),
                Attachment::new("https://files/b", "console.log", "text/plain"),
            ],
        ),
    )
    .await;

    let mut requests = tracker.upload_requests.lock().unwrap().clone();
    requests.sort();
    assert_eq!(
        requests,
        vec![
            ("image/png".to_owned(), "screenshot.png".to_owned(), PNG_BYTES.len()),
            ("text/plain".to_owned(), "console.log".to_owned(), 16),
        ]
    );

    let ticket = &tracker.created()[0];
    assert!(ticket.description.ends_with(
        "**Attachments:**\n- https://assets.test/screenshot.png\n- https://assets.test/console.log"
    ));
}

#[tokio::test]
async fn screenshot_is_shown_to_the_model_and_fetched_once() {
    let enrichment = FakeEnrichment::replying(DRAFT);
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[
        ("https://files/shot", PNG_BYTES),
        ("https://files/log", b"plain log output".as_slice()),
    ]);
    let ctx = context(Arc::clone(&enrichment), Arc::clone(&tracker), Arc::clone(&files));

    handle_event(
        &ctx,
        inbound(
            "the submit button does nothing when clicked",
            vec![
                Attachment::new("https://files/shot", "shot", "image/png"),
                Attachment::new("https://files/log", "console.log", "text/plain"),
            ],
        ),
    )
    .await;

    let requests = enrichment.requests.lock().unwrap();
    let images = &requests[0].images;
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].filename, "shot.png");
    assert!(images[0].data_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    assert!(requests[0].user_prompt.contains("- shot.png"));

    assert_eq!(files.fetched.lock().unwrap().len(), 2);
    assert_eq!(tracker.uploads.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn screenshots_stay_out_of_the_prompt_when_disabled() {
    let enrichment = FakeEnrichment::replying(DRAFT);
    let tracker = Arc::new(FakeTracker::default());
    let files = FakeFiles::with(&[("https://files/shot.png", PNG_BYTES)]);
    let mut ctx = context(Arc::clone(&enrichment), Arc::clone(&tracker), files);
    ctx.prompt.include_image_urls = false;

    handle_event(
        &ctx,
        inbound(
            "the submit button does nothing when clicked",
            vec![Attachment::new("https://files/shot.png", "shot.png", "image/png")],
        ),
    )
    .await;

    assert!(enrichment.requests.lock().unwrap()[0].images.is_empty());
    assert_eq!(tracker.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_upload_is_skipped() {
    let tracker = Arc::new(FakeTracker {
        fail_uploads_for: vec!["shot.png".into()],
        ..FakeTracker::default()
    });
    let files = FakeFiles::with(&[("https://files/shot.png", PNG_BYTES)]);
    let ctx = context(FakeEnrichment::replying(DRAFT), Arc::clone(&tracker), files);

    handle_event(
        &ctx,
        inbound(
            "the submit button does nothing when clicked",
            vec![Attachment::new("https://files/shot.png", "shot.png", "image/png")],
        ),
    )
    .await;

    let ticket = &tracker.created()[0];
    assert!(!ticket.description.contains("**Attachments:**"));
    assert!(tracker.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn identical_reports_create_separate_tickets() {
    let tracker = Arc::new(FakeTracker::default());
    let ctx = context(FakeEnrichment::replying(DRAFT), Arc::clone(&tracker), FakeFiles::with(&[]));

    let text = "the submit button does nothing when clicked";
    let first = handle_event(&ctx, inbound(text, Vec::new())).await;
    let second = handle_event(&ctx, inbound(text, Vec::new())).await;

    assert_eq!(tracker.created().len(), 2);
    assert_ne!(first.text, second.text);
}
