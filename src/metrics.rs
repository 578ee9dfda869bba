//! Metric helpers for `mqframe`.
//!
//! Names and thin wrappers over the [`metrics`](https://docs.rs/metrics)
//! crate. Without the `metrics` feature every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Gauge tracking running server workers.
pub const WORKERS_ACTIVE: &str = "mqframe_workers_active";
/// Counter of handled requests, labelled by outcome.
pub const REQUESTS_PROCESSED: &str = "mqframe_requests_processed_total";
/// Counter of reply messages put on reply queues.
pub const REPLIES_SENT: &str = "mqframe_replies_sent_total";
/// Counter of resends issued by the client after a reply timeout.
pub const CLIENT_RESENDS: &str = "mqframe_client_resends_total";
/// Counter of error occurrences, labelled by kind.
pub const ERRORS_TOTAL: &str = "mqframe_errors_total";

/// Category recorded with [`inc_errors`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Format,
    Store,
    Action,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Format => "format",
            ErrorKind::Store => "store",
            ErrorKind::Action => "action",
        }
    }
}

/// Increment the running workers gauge.
pub fn inc_workers() {
    #[cfg(feature = "metrics")]
    gauge!(WORKERS_ACTIVE).increment(1.0);
}

/// Decrement the running workers gauge.
pub fn dec_workers() {
    #[cfg(feature = "metrics")]
    gauge!(WORKERS_ACTIVE).decrement(1.0);
}

/// Record a handled request under the `outcome` label.
pub fn inc_requests(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_PROCESSED, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a reply put on a reply queue.
pub fn inc_replies() {
    #[cfg(feature = "metrics")]
    counter!(REPLIES_SENT).increment(1);
}

/// Record a client resend.
pub fn inc_resends() {
    #[cfg(feature = "metrics")]
    counter!(CLIENT_RESENDS).increment(1);
}

/// Record an error occurrence.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind.as_str();
}
