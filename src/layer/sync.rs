//! Synchronization prefix layer
//!
//! Frames every message with a constant prefix (the magic bytes). On
//! read, anything other than the expected constant is a
//! [`Error::ProtocolError`]; the caller's resynchronization policy can
//! then advance one byte and retry.

use core::fmt::Debug;

use tracing::debug;

use crate::alloc::MsgPtr;
use crate::error::{Error, Result, WriteOutcome};
use crate::field::{rewind_on_starvation, Field};
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::layer::{advance_over_field, Layer};

/// Layer prepending a constant synchronization prefix.
///
/// The prefix field's configured value is the expected constant.
#[derive(Debug, Clone)]
pub struct SyncPrefixLayer<F, N> {
    prefix: F,
    next: N,
}

impl<F, N> SyncPrefixLayer<F, N>
where
    F: Field + Clone + PartialEq + Debug,
    N: Layer,
{
    /// Wrap `next` with the given prefix constant.
    pub fn new(prefix: F, next: N) -> Self {
        Self { prefix, next }
    }

    fn read_with<'a>(
        &self,
        field: &mut F,
        slot: &mut Option<MsgPtr<N::Msg>>,
        r: &mut SliceReader<'a>,
        size: usize,
        next: &mut dyn FnMut(
            &mut Option<MsgPtr<N::Msg>>,
            &mut SliceReader<'a>,
            usize,
        ) -> Result<()>,
    ) -> Result<()> {
        rewind_on_starvation(r, |r| field.read(r, size))?;

        if *field != self.prefix {
            debug!(got = ?field, expected = ?self.prefix, "sync prefix mismatch");
            return Err(Error::ProtocolError);
        }

        next(slot, r, size.saturating_sub(field.length()))
    }

    fn write_with(
        &self,
        field: &mut F,
        w: &mut dyn ByteWriter,
        size: usize,
        next: &mut dyn FnMut(&mut dyn ByteWriter, usize) -> Result<WriteOutcome>,
    ) -> Result<WriteOutcome> {
        field.write(w, size)?;
        next(w, size.saturating_sub(field.length()))
    }

    fn update_with<'a>(
        &self,
        w: &mut SliceWriter<'a>,
        size: usize,
        next: &mut dyn FnMut(&mut SliceWriter<'a>, usize) -> Result<()>,
    ) -> Result<()> {
        let len = advance_over_field(&self.prefix, w, size)?;
        next(w, size - len)
    }
}

impl<F, N> Layer for SyncPrefixLayer<F, N>
where
    F: Field + Clone + PartialEq + Debug,
    N: Layer,
{
    type Msg = N::Msg;
    type Id = N::Id;
    type AllFields = (F, N::AllFields);

    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let mut field = self.prefix.clone();
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
        *field = self.prefix.clone();
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
        let mut field = self.prefix.clone();
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
        *field = self.prefix.clone();
        self.write_with(field, w, size, &mut |w, size| {
            self.next.write_fields(rest, msg, w, size)
        })
    }

    fn update(&self, w: &mut SliceWriter<'_>, size: usize) -> Result<()> {
        self.update_with(w, size, &mut |w, size| self.next.update(w, size))
    }

    fn update_fields(
        &self,
        all: &mut Self::AllFields,
        w: &mut SliceWriter<'_>,
        size: usize,
    ) -> Result<()> {
        let (_, rest) = all;
        self.update_with(w, size, &mut |w, size| self.next.update_fields(rest, w, size))
    }

    fn min_length(&self) -> usize {
        self.prefix.min_length() + self.next.min_length()
    }

    fn length_of(&self, msg: &Self::Msg) -> usize {
        self.prefix.length() + self.next.length_of(msg)
    }

    fn create_msg(&self, id: Self::Id, idx: usize) -> Result<MsgPtr<Self::Msg>> {
        self.next.create_msg(id, idx)
    }

    fn fresh_fields(&self) -> Self::AllFields {
        (self.prefix.clone(), self.next.fresh_fields())
    }
}
