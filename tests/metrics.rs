#![cfg(feature = "metrics")]
//! Counters recorded while serving requests.
//!
//! The server runs on a current-thread runtime inside
//! `metrics::with_local_recorder`, so every worker task records into the
//! test's `DebuggingRecorder`.

use mqframe::{
    header::ResendFlag,
    metrics::{CLIENT_RESENDS, ERRORS_TOTAL, REPLIES_SENT, REQUESTS_PROCESSED, inc_errors, inc_resends},
};
use mqframe_testing::{Harness, book, counter_value, recorder, summary};
use rstest::rstest;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

#[rstest]
fn outcomes_are_counted_by_label() {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || {
        block_on(async {
            let harness = Harness::start(1);
            let books = [book("Dune", 412), summary(1)];
            harness.exchange("M-1", Some(ResendFlag::FirstSend), &books).await;
            harness.exchange("M-1", Some(ResendFlag::Resend), &books).await;
            harness.exchange("M-2", None, &[summary(1)]).await;
            harness.stop().await.expect("clean shutdown");
        });
    });

    assert_eq!(counter_value(&snapshotter, REQUESTS_PROCESSED, Some(("outcome", "fresh"))), 1);
    assert_eq!(counter_value(&snapshotter, REQUESTS_PROCESSED, Some(("outcome", "replayed"))), 1);
    assert_eq!(counter_value(&snapshotter, REQUESTS_PROCESSED, Some(("outcome", "failed"))), 1);
    assert_eq!(counter_value(&snapshotter, REPLIES_SENT, None), 3);
}

#[rstest]
#[case(1)]
#[case(3)]
fn resend_counter_accumulates(#[case] resends: u64) {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || {
        for _ in 0..resends {
            inc_resends();
        }
    });
    assert_eq!(counter_value(&snapshotter, CLIENT_RESENDS, None), resends);
}

#[rstest]
fn error_counter_carries_kind() {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || inc_errors(mqframe::metrics::ErrorKind::Store));
    assert_eq!(counter_value(&snapshotter, ERRORS_TOTAL, Some(("kind", "store"))), 1);
    assert_eq!(counter_value(&snapshotter, ERRORS_TOTAL, Some(("kind", "format"))), 0);
}
