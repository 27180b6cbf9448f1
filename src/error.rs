//! Outcome codes shared by all field, layer, and message operations

use thiserror::Error;

/// Errors that can occur while reading or writing wire data.
///
/// Every codec operation in this crate reports its outcome through this
/// enum. The set is closed and stable so that embedding applications can
/// translate the codes onto their own wire-visible diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The input holds fewer bytes than the operation needs.
    ///
    /// `missing` is the minimal number of additional bytes that might
    /// allow the read to make progress (never zero). It is an
    /// under-approximation: exact only when the downstream length is
    /// fully known.
    #[error("not enough input data ({missing} more byte(s) needed)")]
    NotEnoughData {
        /// Minimal additional byte count that might allow progress.
        missing: usize,
    },
    /// A framing constraint was violated (sync mismatch, bad checksum,
    /// size field inconsistent with the actual payload, value outside
    /// a strict validity range).
    #[error("protocol constraint violated")]
    ProtocolError,
    /// The decoded message id names no known message kind.
    #[error("unknown message id")]
    InvalidMsgId,
    /// The message body or a composite field is malformed (unknown
    /// variant key, element overrun inside a byte-counted sequence).
    #[error("invalid message data")]
    InvalidMsgData,
    /// Message allocation failed (pool slot for the kind already live).
    #[error("message allocation failure")]
    MsgAllocFailure,
    /// The output destination cannot hold the serialized data.
    #[error("output buffer overflow")]
    BufferOverflow,
    /// The operation is not available in this stack configuration.
    #[error("operation not supported")]
    NotSupported,
}

impl Error {
    /// Build a [`Error::NotEnoughData`] for an operation that needs
    /// `needed` bytes while only `available` are present.
    #[inline]
    pub(crate) fn not_enough(needed: usize, available: usize) -> Self {
        Error::NotEnoughData {
            missing: needed.saturating_sub(available).max(1),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of a successful write pass.
///
/// A write that went through a push-back destination may have left
/// placeholder bytes in slots whose values are only known once the
/// inner data has been emitted (size prefixes, checksums). Such a
/// write reports [`WriteOutcome::UpdateRequired`]; the produced buffer
/// must not be transmitted before an `update` pass patched the
/// placeholders through a random-access writer.
#[must_use = "an UpdateRequired outcome leaves placeholder bytes in the buffer"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All bytes hold their final values.
    Complete,
    /// At least one placeholder slot needs a subsequent `update` pass.
    UpdateRequired,
}

impl WriteOutcome {
    /// Whether an `update` pass is required before the data is usable.
    #[inline]
    pub fn update_required(self) -> bool {
        matches!(self, WriteOutcome::UpdateRequired)
    }

    /// Combine with a nested outcome; any deferred slot wins.
    #[inline]
    pub fn merge(self, other: WriteOutcome) -> WriteOutcome {
        if self.update_required() || other.update_required() {
            WriteOutcome::UpdateRequired
        } else {
            WriteOutcome::Complete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_never_zero() {
        assert_eq!(Error::not_enough(4, 4), Error::NotEnoughData { missing: 1 });
        assert_eq!(Error::not_enough(4, 1), Error::NotEnoughData { missing: 3 });
        assert_eq!(Error::not_enough(0, 9), Error::NotEnoughData { missing: 1 });
    }

    #[test]
    fn outcome_merge() {
        assert_eq!(
            WriteOutcome::Complete.merge(WriteOutcome::Complete),
            WriteOutcome::Complete
        );
        assert!(WriteOutcome::Complete
            .merge(WriteOutcome::UpdateRequired)
            .update_required());
        assert!(WriteOutcome::UpdateRequired
            .merge(WriteOutcome::Complete)
            .update_required());
    }

    #[test]
    fn display_text() {
        let err = Error::NotEnoughData { missing: 3 };
        assert_eq!(
            err.to_string(),
            "not enough input data (3 more byte(s) needed)"
        );
        assert_eq!(
            Error::ProtocolError.to_string(),
            "protocol constraint violated"
        );
    }
}
