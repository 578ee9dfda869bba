//! Buffered read cursor over a message body.

use bytes::Bytes;

/// Read position over an immutable, fully buffered message body.
///
/// Cloning the underlying [`Bytes`] is cheap, so [`BodyCursor::snapshot`]
/// hands out an independent cursor without copying the payload. Two
/// consumers holding separate cursors never disturb each other's position.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use mqframe::record::BodyCursor;
///
/// let mut cursor = BodyCursor::new(Bytes::from_static(b"abcdef"));
/// let first = cursor.take(2).expect("two bytes available");
/// let snapshot = cursor.snapshot();
/// cursor.take(4);
/// assert_eq!(&first[..], b"ab");
/// assert!(cursor.is_empty());
/// assert_eq!(snapshot.remaining(), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyCursor {
    data: Bytes,
    position: usize,
}

impl BodyCursor {
    #[must_use]
    pub fn new(data: Bytes) -> Self { Self { data, position: 0 } }

    /// Return an independent cursor positioned where this one is.
    #[must_use]
    pub fn snapshot(&self) -> Self { self.clone() }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize { self.data.len() - self.position }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.remaining() == 0 }

    #[must_use]
    pub fn position(&self) -> usize { self.position }

    /// Borrow the unread bytes without advancing.
    #[must_use]
    pub fn peek(&self) -> &[u8] { &self.data[self.position..] }

    /// Consume exactly `len` bytes, or nothing when fewer remain.
    pub fn take(&mut self, len: usize) -> Option<Bytes> {
        if len > self.remaining() {
            return None;
        }
        let chunk = self.data.slice(self.position..self.position + len);
        self.position += len;
        Some(chunk)
    }

    /// Consume and return all unread bytes.
    pub fn take_rest(&mut self) -> Bytes {
        let rest = self.data.slice(self.position..);
        self.position = self.data.len();
        rest
    }

    /// The complete body, independent of the read position.
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes { &self.data }
}
