//! Remaining-size layer
//!
//! The layer's field holds the byte count of everything framed inside
//! it. Reads clip the inner layers to exactly that window; a window
//! that disagrees with the actual inner frame is a
//! [`Error::ProtocolError`]. Writes emit the field first, so its value
//! is patched in afterwards (random-access writers) or deferred to the
//! update pass (push-back writers).

use tracing::debug;

use crate::alloc::MsgPtr;
use crate::error::{Error, Result, WriteOutcome};
use crate::field::{rewind_on_starvation, Field, IntField};
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::layer::Layer;

/// Layer framing the inner layers with their byte count.
#[derive(Debug, Clone)]
pub struct SizeLayer<N> {
    size_field: IntField<u64>,
    next: N,
}

impl<N: Layer> SizeLayer<N> {
    /// Wrap `next` with a size field.
    ///
    /// # Panics
    /// Panics when the field is not fixed width; the reserved slot
    /// must keep its byte count across the placeholder and the final
    /// value.
    pub fn new(size_field: IntField<u64>, next: N) -> Self {
        assert!(
            size_field.min_length() == size_field.max_length(),
            "size field must be fixed width"
        );
        Self { size_field, next }
    }

    fn read_with<'a>(
        &self,
        field: &mut IntField<u64>,
        slot: &mut Option<MsgPtr<N::Msg>>,
        r: &mut SliceReader<'a>,
        size: usize,
        next: &mut dyn FnMut(
            &mut Option<MsgPtr<N::Msg>>,
            &mut SliceReader<'a>,
            usize,
        ) -> Result<()>,
    ) -> Result<()> {
        let start = r.position();
        rewind_on_starvation(r, |r| field.read(r, size))?;

        let flen = field.length();
        let claimed = field.value() as usize;
        let avail = size.saturating_sub(flen).min(r.remaining());
        if claimed > avail {
            r.set_position(start);
            return Err(Error::not_enough(claimed.saturating_add(flen), flen + avail));
        }

        let inner_start = r.position();
        match next(slot, r, claimed) {
            Ok(()) => {
                let used = r.position() - inner_start;
                if used != claimed {
                    debug!(claimed, used, "inner frame left bytes inside the size window");
                    *slot = None;
                    return Err(Error::ProtocolError);
                }
                Ok(())
            }
            Err(Error::NotEnoughData { .. }) => {
                // The claimed window is fully present, so a starved
                // inner read means the size value lies about the frame.
                debug!(claimed, "inner frame starved inside a complete size window");
                *slot = None;
                Err(Error::ProtocolError)
            }
            Err(e) => Err(e),
        }
    }

    fn write_with(
        &self,
        field: &mut IntField<u64>,
        w: &mut dyn ByteWriter,
        size: usize,
        next: &mut dyn FnMut(&mut dyn ByteWriter, usize) -> Result<WriteOutcome>,
    ) -> Result<WriteOutcome> {
        let flen = field.length();
        let start = w.position();

        let mut placeholder = field.clone();
        placeholder.set_value(0);
        placeholder.write(w, size)?;

        let outcome = next(w, size.saturating_sub(flen))?;

        let inner_len = w.position() - start - flen;
        field.set_value(inner_len as u64);

        let mut scratch = [0u8; 16];
        {
            let mut tw = SliceWriter::new(&mut scratch);
            field.write(&mut tw, flen)?;
        }
        if w.patch(start, &scratch[..flen]) {
            Ok(outcome)
        } else {
            Ok(WriteOutcome::UpdateRequired)
        }
    }

    fn update_with<'a>(
        &self,
        field: &mut IntField<u64>,
        w: &mut SliceWriter<'a>,
        size: usize,
        next: &mut dyn FnMut(&mut SliceWriter<'a>, usize) -> Result<()>,
    ) -> Result<()> {
        let flen = field.length();
        if size < flen {
            return Err(Error::BufferOverflow);
        }
        let inner = size - flen;
        field.set_value(inner as u64);
        field.write(w, flen)?;
        next(w, inner)
    }
}

impl<N: Layer> Layer for SizeLayer<N> {
    type Msg = N::Msg;
    type Id = N::Id;
    type AllFields = (IntField<u64>, N::AllFields);

    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let mut field = self.size_field.clone();
        self.read_with(&mut field, slot, r, size, &mut |slot, r, size| {
            self.next.read(slot, r, size)
        })
    }

    fn read_fields(
        &self,
        all: &mut Self::AllFields,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let (field, rest) = all;
        *field = self.size_field.clone();
        self.read_with(field, slot, r, size, &mut |slot, r, size| {
            self.next.read_fields(rest, slot, r, size)
        })
    }

    fn write(
        &self,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome> {
        let mut field = self.size_field.clone();
        self.write_with(&mut field, w, size, &mut |w, size| {
            self.next.write(msg, w, size)
        })
    }

    fn write_fields(
        &self,
        all: &mut Self::AllFields,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome> {
        let (field, rest) = all;
        *field = self.size_field.clone();
        self.write_with(field, w, size, &mut |w, size| {
            self.next.write_fields(rest, msg, w, size)
        })
    }

    fn update(&self, w: &mut SliceWriter<'_>, size: usize) -> Result<()> {
        let mut field = self.size_field.clone();
        self.update_with(&mut field, w, size, &mut |w, size| self.next.update(w, size))
    }

    fn update_fields(
        &self,
        all: &mut Self::AllFields,
        w: &mut SliceWriter<'_>,
        size: usize,
    ) -> Result<()> {
        let (field, rest) = all;
        self.update_with(field, w, size, &mut |w, size| {
            self.next.update_fields(rest, w, size)
        })
    }

    fn min_length(&self) -> usize {
        self.size_field.min_length() + self.next.min_length()
    }

    fn length_of(&self, msg: &Self::Msg) -> usize {
        self.size_field.min_length() + self.next.length_of(msg)
    }

    fn create_msg(&self, id: Self::Id, idx: usize) -> Result<MsgPtr<Self::Msg>> {
        self.next.create_msg(id, idx)
    }

    fn fresh_fields(&self) -> Self::AllFields {
        (self.size_field.clone(), self.next.fresh_fields())
    }
}
