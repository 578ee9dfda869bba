use crate::header::FwHeader;

/// Identifiers of the request currently being handled.
///
/// Owned by the caller of [`HeaderReader::read`](super::HeaderReader::read)
/// and cleared at the start of every read, so nothing from the previous
/// request leaks into the next one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestScope {
    request_id: Option<String>,
    internal_request_id: Option<String>,
    user_id: Option<String>,
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn clear(&mut self) { *self = Self::default(); }

    pub(crate) fn enter(&mut self, header: &FwHeader) {
        self.request_id = header.request_id().map(str::to_owned);
        self.internal_request_id.clone_from(&self.request_id);
        self.user_id = header.user_id().map(str::to_owned);
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> { self.request_id.as_deref() }

    /// Request id as seen by actions; identical to the wire request id.
    #[must_use]
    pub fn internal_request_id(&self) -> Option<&str> { self.internal_request_id.as_deref() }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }
}
