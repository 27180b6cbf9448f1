//! Payload layer: the base of every stack
//!
//! Owns no framing field; it reads the byte budget into the message's
//! body fields and writes them back out. Above it, some layer (usually
//! the id layer) must have allocated the message into the read slot.

use core::marker::PhantomData;

use crate::alloc::MsgPtr;
use crate::error::{Error, Result, WriteOutcome};
use crate::field::rewind_on_starvation;
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::layer::Layer;
use crate::message::{IdInfo, LengthInfo, ReadMsg, WriteMsg};

/// Innermost layer reading and writing the message body.
#[derive(Debug, Clone, Default)]
pub struct PayloadLayer<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> PayloadLayer<M> {
    /// Create the payload layer.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Layer for PayloadLayer<M>
where
    M: IdInfo + ReadMsg + WriteMsg + LengthInfo,
{
    type Msg = M;
    type Id = <M as IdInfo>::Id;
    type AllFields = ();

    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let msg = slot.as_mut().ok_or(Error::NotSupported)?;
        rewind_on_starvation(r, |r| msg.read(r, size))
    }

    fn read_fields(
        &self,
        _all: &mut Self::AllFields,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        self.read(slot, r, size)
    }

    fn write(
        &self,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome> {
        msg.write(w, size)?;
        Ok(WriteOutcome::Complete)
    }

    fn write_fields(
        &self,
        _all: &mut Self::AllFields,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome> {
        self.write(msg, w, size)
    }

    fn update(&self, w: &mut SliceWriter<'_>, size: usize) -> Result<()> {
        // Nothing to fix up; move past the body so an outer checksum
        // layer lands on its trailing field.
        w.advance(size)
    }

    fn update_fields(
        &self,
        _all: &mut Self::AllFields,
        w: &mut SliceWriter<'_>,
        size: usize,
    ) -> Result<()> {
        self.update(w, size)
    }

    fn min_length(&self) -> usize {
        0
    }

    fn length_of(&self, msg: &Self::Msg) -> usize {
        msg.length()
    }

    fn create_msg(&self, _id: Self::Id, _idx: usize) -> Result<MsgPtr<Self::Msg>> {
        Err(Error::NotSupported)
    }

    fn fresh_fields(&self) -> Self::AllFields {}
}
