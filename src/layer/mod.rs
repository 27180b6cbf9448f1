//! Protocol layer stack
//!
//! A stack is a linear nesting of framing layers around a payload:
//!
//! ```text
//! [ outer field ][ ... ][ inner field ][ payload ]
//! ```
//!
//! Each layer owns one framing field and wraps the next inner layer;
//! the bottommost [`PayloadLayer`] reads and writes the message body.
//! All layers expose the same read/write/update contract, so stacks
//! compose freely:
//!
//! - reads run outermost first, each layer consuming its field before
//!   handing the reduced byte budget to the inner layer;
//! - writes run outermost first as well; a layer whose field value
//!   depends on inner bytes (size, checksum) patches it afterwards
//!   when the writer is random access, or leaves a placeholder and
//!   reports [`WriteOutcome::UpdateRequired`](crate::WriteOutcome)
//!   otherwise;
//! - the update pass walks the written buffer outermost first and
//!   fills every placeholder slot.
//!
//! The `*_fields` variants additionally record each layer's field
//! value in the stack's [`Layer::AllFields`] tuple, outermost first,
//! terminated by the payload's `()` sentinel.

use crate::alloc::MsgPtr;
use crate::error::{Error, Result, WriteOutcome};
use crate::field::Field;
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::message::MsgId;

pub mod checksum;
pub mod id;
pub mod payload;
pub mod size;
pub mod sync;

pub use checksum::ChecksumLayer;
pub use id::{MsgIdLayer, Registry};
pub use payload::PayloadLayer;
pub use size::SizeLayer;
pub use sync::SyncPrefixLayer;

/// Common contract of every framing layer.
///
/// `Msg` and `Id` are threaded up from the payload layer so that an
/// assembled stack exposes the dialect's types at its outermost layer.
pub trait Layer {
    /// Message type produced by reads and accepted by writes.
    type Msg;

    /// Message id type of the dialect.
    type Id: MsgId;

    /// Ordered tuple of this layer's field and everything inside it.
    type AllFields;

    /// Deserialize a frame, allocating the message into `slot`.
    ///
    /// On success `slot` is guaranteed to hold a message. On error no
    /// decoded message is produced and the cursor pinpoints the
    /// failure: at the start of the starved field for
    /// [`Error::NotEnoughData`], at the failing byte otherwise.
    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()>;

    /// Like [`Layer::read`], recording each layer's field value.
    fn read_fields(
        &self,
        all: &mut Self::AllFields,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()>;

    /// Serialize `msg` wrapped in this layer's framing.
    fn write(
        &self,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome>;

    /// Like [`Layer::write`], recording each layer's field value.
    fn write_fields(
        &self,
        all: &mut Self::AllFields,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome>;

    /// Second pass filling placeholder slots left by a push-back
    /// write. `size` is the number of bytes the write produced from
    /// this layer inward.
    fn update(&self, w: &mut SliceWriter<'_>, size: usize) -> Result<()>;

    /// Like [`Layer::update`], recording each layer's field value.
    fn update_fields(
        &self,
        all: &mut Self::AllFields,
        w: &mut SliceWriter<'_>,
        size: usize,
    ) -> Result<()>;

    /// Message-independent minimum frame length.
    fn min_length(&self) -> usize;

    /// Exact frame length for a specific message.
    fn length_of(&self, msg: &Self::Msg) -> usize;

    /// Allocate the message kind registered for `id`.
    ///
    /// `idx` selects among kinds sharing one id. Delegated down to the
    /// id layer; a stack without one reports [`Error::NotSupported`].
    fn create_msg(&self, id: Self::Id, idx: usize) -> Result<MsgPtr<Self::Msg>>;

    /// Fresh field tuple ready for the `*_fields` operations.
    fn fresh_fields(&self) -> Self::AllFields;

    /// Convenience wrapper around [`Layer::read`] returning the
    /// decoded message.
    fn read_msg(&self, r: &mut SliceReader<'_>, size: usize) -> Result<MsgPtr<Self::Msg>> {
        let mut slot = None;
        self.read(&mut slot, r, size)?;
        slot.ok_or(Error::NotSupported)
    }
}

/// Move an update-pass writer past a layer field that needs no fixing.
///
/// Fixed-length fields are skipped outright; variable-length fields
/// are re-read from the written bytes to learn how far to advance.
pub(crate) fn advance_over_field<F: Field + Clone>(
    proto: &F,
    w: &mut SliceWriter<'_>,
    size: usize,
) -> Result<usize> {
    let min = proto.min_length();
    if proto.max_length() == min {
        if size < min {
            return Err(Error::BufferOverflow);
        }
        w.advance(min)?;
        return Ok(min);
    }

    let start = w.position();
    let end = start.saturating_add(size).min(w.as_slice().len());
    let len = {
        let mut field = proto.clone();
        let mut r = SliceReader::new(&w.as_slice()[start..end]);
        field.read(&mut r, size)?;
        field.length()
    };
    w.advance(len)?;
    Ok(len)
}
