//! Describing panics raised by user-supplied layouts and actions.
//!
//! Layout code and action handlers run inside `catch_unwind`; the payload is
//! turned into a message so the failure can be logged and reported as an
//! ordinary error instead of tearing down a worker.

use std::any::Any;

/// Best-effort text of a panic payload.
///
/// ```
/// use mqframe::panic::panic_message;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(panic_message(payload.as_ref()), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
/// assert_eq!(panic_message(payload.as_ref()), "<non-string panic>");
/// ```
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn formats_owned_string_payload() {
        let caught = std::panic::catch_unwind(|| panic!("{} failed", "layout"))
            .expect_err("closure panics");
        assert_eq!(panic_message(caught.as_ref()), "layout failed");
    }
}
