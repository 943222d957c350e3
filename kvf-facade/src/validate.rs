//! Argument checks run before a connection is leased.
//!
//! Blank means empty or whitespace-only; the rejected argument is named in the
//! error so callers can tell `key`, `field` and `value` apart.

use crate::error::InvalidArgument;

/// Rejects empty or whitespace-only text.
pub(crate) fn ensure_not_blank(argument: &'static str, value: &str) -> Result<(), InvalidArgument> {
    if value.trim().is_empty() {
        tracing::debug!(argument, "rejected blank argument");
        return Err(InvalidArgument { argument });
    }
    Ok(())
}
