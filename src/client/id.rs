//! Correlation id generation for outgoing requests.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Numbers requests per generator target.
pub trait IdGenerator: Send + Sync {
    /// Next id for `target`. Ids for one target are strictly increasing.
    fn generate(&self, target: &str) -> u64;
}

/// Renders a generated number as a correlation id.
pub trait IdFormatter: Send + Sync {
    fn format(&self, id: u64) -> String;
}

/// In-process sequence per target id, starting at 1.
///
/// # Examples
///
/// ```
/// use mqframe::client::{IdGenerator, SequenceIdGenerator};
///
/// let ids = SequenceIdGenerator::new();
/// assert_eq!(ids.generate("ORDERS"), 1);
/// assert_eq!(ids.generate("ORDERS"), 2);
/// assert_eq!(ids.generate("USERS"), 1);
/// ```
#[derive(Debug, Default)]
pub struct SequenceIdGenerator(DashMap<String, AtomicU64>);

impl SequenceIdGenerator {
    #[must_use]
    pub fn new() -> Self { Self::default() }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self, target: &str) -> u64 {
        if let Some(sequence) = self.0.get(target) {
            return sequence.fetch_add(1, Ordering::SeqCst) + 1;
        }
        self.0
            .entry(target.to_owned())
            .or_default()
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }
}

/// Left-pads the id with zeros to a fixed width.
///
/// Ids wider than `width` are rendered in full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZeroPadFormatter {
    width: usize,
}

impl ZeroPadFormatter {
    /// Width used by [`ZeroPadFormatter::default`].
    pub const DEFAULT_WIDTH: usize = 20;

    #[must_use]
    pub const fn new(width: usize) -> Self { Self { width } }

    #[must_use]
    pub const fn width(&self) -> usize { self.width }
}

impl Default for ZeroPadFormatter {
    fn default() -> Self { Self::new(Self::DEFAULT_WIDTH) }
}

impl IdFormatter for ZeroPadFormatter {
    fn format(&self, id: u64) -> String { format!("{id:0width$}", width = self.width) }
}
