//! Gateway-wrapped platform operations.
//!
//! Every call here is transparently offloaded to a pooled worker and
//! falls back to the primary session when offloading is unavailable or
//! fails. Command operations report a success boolean; queries return
//! the fetched value.

pub mod channels;
pub mod members;

pub use channels::Channels;
pub use members::Members;

use crate::platform::DEFAULT_REASON;

/// Resolve the audit reason, defaulting when the caller gives none.
fn audit_reason(reason: Option<&str>) -> String {
    reason.unwrap_or(DEFAULT_REASON).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_reason_defaults() {
        assert_eq!(audit_reason(None), "No reason provided");
        assert_eq!(audit_reason(Some("raid cleanup")), "raid cleanup");
    }
}
