//! evpack Format - Core primitives for the event-log repacker
//!
//! This crate provides the schema and primitives shared by every evpack stage
//! with no I/O dependencies. It includes:
//!
//! - Fixed locations and the default batch byte budget
//! - Original and transformed record types
//! - URL normalization
//! - Error types
//! - Resource limits
//! - Flush policy selection

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod limits;
pub mod record;
pub mod url_object;

// Re-export commonly used types
pub use error::{EvpackError, Result};
pub use limits::Limits;
pub use record::{EventContent, OriginalRecord, TransformedRecord, UrlObject};
pub use url_object::parse_url;

/// What happens to the chunk whose size pushes a batch over its byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// The triggering chunk opens the next batch with its records and size
    #[default]
    Carry,
    /// The triggering chunk's size is counted but its records are discarded
    ///
    /// Reproduces the historical repacker output byte for byte, including an
    /// empty batch when the very first chunk alone exceeds the budget.
    DropTriggering,
}

impl FlushPolicy {
    /// Short name used in logs and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            FlushPolicy::Carry => "carry",
            FlushPolicy::DropTriggering => "drop-triggering",
        }
    }

    /// Whether records of the triggering chunk survive a flush
    pub fn keeps_triggering_records(&self) -> bool {
        matches!(self, FlushPolicy::Carry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_policy_default_is_carry() {
        assert_eq!(FlushPolicy::default(), FlushPolicy::Carry);
    }

    #[test]
    fn test_flush_policy_names() {
        assert_eq!(FlushPolicy::Carry.name(), "carry");
        assert_eq!(FlushPolicy::DropTriggering.name(), "drop-triggering");
    }

    #[test]
    fn test_flush_policy_keeps_records() {
        assert!(FlushPolicy::Carry.keeps_triggering_records());
        assert!(!FlushPolicy::DropTriggering.keeps_triggering_records());
    }
}
