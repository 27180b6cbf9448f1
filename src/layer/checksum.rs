//! Checksum layer
//!
//! Appends a checksum computed over the bytes written by all inner
//! layers and verifies it on read. By default the inner frame is read
//! first and the checksum verified afterwards;
//! [`ChecksumLayer::verify_before_read`] flips the order so corrupt
//! input is rejected before any message is allocated.
//!
//! Reading requires the byte budget to span this layer's frame
//! exactly, since the checksum trails the data it covers.

use tracing::debug;

use crate::alloc::MsgPtr;
use crate::checksum::Checksum;
use crate::error::{Error, Result, WriteOutcome};
use crate::field::{bit_mask, rewind_on_starvation, Field, IntField};
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::layer::Layer;

/// Layer appending a trailing checksum over the inner frame.
#[derive(Debug, Clone)]
pub struct ChecksumLayer<C, N> {
    cksum_field: IntField<u64>,
    calc: C,
    verify_first: bool,
    next: N,
}

impl<C, N> ChecksumLayer<C, N>
where
    C: Checksum,
    N: Layer,
{
    /// Wrap `next`, protecting it with the given calculator.
    ///
    /// # Panics
    /// Panics when the checksum field is not fixed width.
    pub fn new(cksum_field: IntField<u64>, calc: C, next: N) -> Self {
        assert!(
            cksum_field.min_length() == cksum_field.max_length(),
            "checksum field must be fixed width"
        );
        Self {
            cksum_field,
            calc,
            verify_first: false,
            next,
        }
    }

    /// Verify the checksum before the inner layers read anything.
    pub fn verify_before_read(mut self) -> Self {
        self.verify_first = true;
        self
    }

    fn masked(&self, sum: u64) -> u64 {
        sum & bit_mask(self.cksum_field.length() as u32 * 8)
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
        let flen = field.length();
        let avail = size.min(r.remaining());
        if avail < flen {
            return Err(Error::not_enough(flen, avail));
        }

        if self.verify_first {
            self.verify_then_read(field, slot, r, size, next)
        } else {
            self.read_then_verify(field, slot, r, size, next)
        }
    }

    fn read_then_verify<'a>(
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
        let flen = field.length();
        let from = r.position();

        next(slot, r, size - flen)?;

        let covered = r.position() - from;
        if let Err(e) = rewind_on_starvation(r, |r| field.read(r, size - covered)) {
            *slot = None;
            return Err(e);
        }

        let actual = self.masked(self.calc.compute(r.slice_between(from, from + covered)));
        if field.value() != actual {
            debug!(stored = field.value(), actual, "checksum mismatch");
            *slot = None;
            return Err(Error::ProtocolError);
        }
        Ok(())
    }

    fn verify_then_read<'a>(
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
        let flen = field.length();
        let from = r.position();
        if r.remaining() < size {
            return Err(Error::not_enough(size, r.remaining()));
        }
        let window = size - flen;

        let mut tail = r.clone();
        tail.set_position(from + window);
        field.read(&mut tail, flen)?;

        let actual = self.masked(self.calc.compute(r.slice_between(from, from + window)));
        if field.value() != actual {
            debug!(stored = field.value(), actual, "checksum mismatch");
            return Err(Error::ProtocolError);
        }

        next(slot, r, window)?;
        r.set_position(tail.position());
        Ok(())
    }

    fn write_with(
        &self,
        field: &mut IntField<u64>,
        w: &mut dyn ByteWriter,
        size: usize,
        next: &mut dyn FnMut(&mut dyn ByteWriter, usize) -> Result<WriteOutcome>,
    ) -> Result<WriteOutcome> {
        let flen = field.length();
        if size < flen {
            return Err(Error::BufferOverflow);
        }
        let from = w.position();

        let outcome = next(w, size - flen)?;

        let end = w.position();
        let budget = size - (end - from);
        let computed = w
            .view(from, end)
            .map(|bytes| self.masked(self.calc.compute(bytes)));

        match computed {
            Some(sum) if !outcome.update_required() => {
                field.set_value(sum);
                field.write(w, budget)?;
                Ok(WriteOutcome::Complete)
            }
            _ => {
                field.set_value(0);
                field.write(w, budget)?;
                Ok(WriteOutcome::UpdateRequired)
            }
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
        let from = w.position();

        next(w, size - flen)?;

        let covered = w.position() - from;
        let sum = self.masked(self.calc.compute(&w.as_slice()[from..from + covered]));
        field.set_value(sum);
        field.write(w, size - covered)
    }
}

impl<C, N> Layer for ChecksumLayer<C, N>
where
    C: Checksum,
    N: Layer,
{
    type Msg = N::Msg;
    type Id = N::Id;
    type AllFields = (IntField<u64>, N::AllFields);

    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let mut field = self.cksum_field.clone();
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
        *field = self.cksum_field.clone();
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
        let mut field = self.cksum_field.clone();
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
        *field = self.cksum_field.clone();
        self.write_with(field, w, size, &mut |w, size| {
            self.next.write_fields(rest, msg, w, size)
        })
    }

    fn update(&self, w: &mut SliceWriter<'_>, size: usize) -> Result<()> {
        let mut field = self.cksum_field.clone();
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
        self.cksum_field.min_length() + self.next.min_length()
    }

    fn length_of(&self, msg: &Self::Msg) -> usize {
        self.cksum_field.min_length() + self.next.length_of(msg)
    }

    fn create_msg(&self, id: Self::Id, idx: usize) -> Result<MsgPtr<Self::Msg>> {
        self.next.create_msg(id, idx)
    }

    fn fresh_fields(&self) -> Self::AllFields {
        (self.cksum_field.clone(), self.next.fresh_fields())
    }
}
