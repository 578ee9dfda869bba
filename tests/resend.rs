//! End-to-end resend behaviour of the `RegisterBook` service.

use mqframe::header::{ResendFlag, StatusCode};
use mqframe_testing::{Harness, book, summary};
use rstest::rstest;

fn two_books() -> Vec<mqframe::record::Record> {
    vec![book("Dune", 412), book("Hyperion", 482), summary(2)]
}

#[rstest]
#[tokio::test]
async fn resend_replays_the_stored_reply() {
    let harness = Harness::start(2);

    let first = harness.exchange("C-1", Some(ResendFlag::FirstSend), &two_books()).await;
    let (header, records) = harness.parse(&first);
    assert_eq!(header.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(header.request_id(), Some("RegisterBook"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("bookCount"), Some("2"));
    assert_eq!(harness.rows(), 2);
    assert_eq!(harness.sent_rows(), 1);

    let second = harness.exchange("C-1", Some(ResendFlag::Resend), &two_books()).await;
    assert_eq!(second.body(), first.body());
    assert_eq!(second.correlation_id(), Some("C-1"));
    assert_eq!(harness.rows(), 2);
    assert_eq!(harness.action().runs(), 1);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn duplicate_first_send_is_replayed_like_a_resend() {
    let harness = Harness::start(1);

    let first = harness.exchange("C-2", Some(ResendFlag::FirstSend), &two_books()).await;
    let again = harness.exchange("C-2", Some(ResendFlag::FirstSend), &two_books()).await;

    assert_eq!(again.body(), first.body());
    assert_eq!(harness.action().runs(), 1);
    assert_eq!(harness.rows(), 2);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn resend_after_rollback_runs_again() {
    let harness = Harness::start(1);
    harness.action().fail_next();

    let failed = harness.exchange("C-3", Some(ResendFlag::FirstSend), &two_books()).await;
    let (header, records) = harness.parse(&failed);
    assert_eq!(header.status_code(), Some(StatusCode::FAILURE));
    assert!(records.is_empty());
    assert_eq!(harness.rows(), 0);
    assert_eq!(harness.sent_rows(), 0);

    let retried = harness.exchange("C-3", Some(ResendFlag::Resend), &two_books()).await;
    let (header, _) = harness.parse(&retried);
    assert_eq!(header.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(harness.rows(), 2);
    assert_eq!(harness.sent_rows(), 1);
    assert_eq!(harness.action().runs(), 2);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn requests_without_flag_always_run() {
    let harness = Harness::start(1);

    for _ in 0..2 {
        let reply = harness.exchange("C-4", None, &two_books()).await;
        assert_eq!(harness.parse(&reply).0.status_code(), Some(StatusCode::SUCCESS));
    }

    assert_eq!(harness.action().runs(), 2);
    assert_eq!(harness.rows(), 4);
    assert_eq!(harness.sent_rows(), 0);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn mismatched_summary_is_rejected_and_not_stored() {
    let harness = Harness::start(1);

    let reply = harness
        .exchange("C-5", Some(ResendFlag::FirstSend), &[book("Dune", 412), summary(3)])
        .await;

    assert_eq!(harness.parse(&reply).0.status_code(), Some(StatusCode::INVALID_FORMAT));
    assert_eq!(harness.rows(), 0);
    assert_eq!(harness.sent_rows(), 0);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_copies_commit_once() {
    let harness = Harness::start(4);
    let body = harness.encode(Some(ResendFlag::FirstSend), &two_books());

    for _ in 0..4 {
        harness.send_body("C-6", body.clone()).await;
    }
    let mut replies = Vec::new();
    for _ in 0..4 {
        replies.push(harness.reply("C-6").await);
    }

    assert!(replies.iter().all(|r| r.body() == replies[0].body()));
    assert_eq!(harness.parse(&replies[0]).0.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(harness.rows(), 2);
    assert_eq!(harness.sent_rows(), 1);

    harness.stop().await.expect("clean shutdown");
}
