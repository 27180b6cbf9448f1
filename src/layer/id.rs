//! Message-id layer
//!
//! Owns the id-to-constructor mapping of the dialect. On read it
//! decodes the id, allocates the registered message kind, and hands
//! the payload window to the inner layers; on write it emits the id
//! reported by the message itself.
//!
//! A dialect may register several kinds under one id (disambiguated by
//! payload shape); the layer then tries them in registration order
//! until one decodes.

use tracing::debug;

use crate::alloc::{AllocPolicy, MsgPtr, PoolState};
use crate::error::{Error, Result, WriteOutcome};
use crate::field::{rewind_on_starvation, Field, IntField};
use crate::io::{ByteWriter, SliceReader, SliceWriter};
use crate::layer::{advance_over_field, Layer};
use crate::message::{IdInfo, MsgId};

struct RegEntry<M, I> {
    id: I,
    make: Box<dyn Fn() -> M>,
    kind: usize,
}

/// Id-to-constructor mapping with an allocation policy.
pub struct Registry<M, I: MsgId> {
    entries: Vec<RegEntry<M, I>>,
    policy: AllocPolicy,
}

impl<M, I: MsgId> Registry<M, I> {
    /// Registry allocating every message on the heap.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            policy: AllocPolicy::Dynamic,
        }
    }

    /// Registry allowing at most one live instance per kind.
    pub fn pooled() -> Self {
        Self {
            entries: Vec::new(),
            policy: AllocPolicy::Pooled(PoolState::new()),
        }
    }

    /// Register a message kind under `id`.
    ///
    /// Registering the same id again appends a fallback kind tried
    /// when earlier ones fail to decode.
    pub fn register(mut self, id: I, make: impl Fn() -> M + 'static) -> Self {
        let kind = self.entries.len();
        self.entries.push(RegEntry {
            id,
            make: Box::new(make),
            kind,
        });
        self
    }

    /// Number of kinds registered under `id`.
    pub fn count_for(&self, id: I) -> usize {
        self.entries.iter().filter(|e| e.id == id).count()
    }

    /// Allocate the `idx`-th kind registered under `id`.
    pub fn create(&self, id: I, idx: usize) -> Result<MsgPtr<M>> {
        let entry = self
            .entries
            .iter()
            .filter(|e| e.id == id)
            .nth(idx)
            .ok_or(Error::InvalidMsgId)?;
        self.policy.alloc(entry.kind, entry.make.as_ref())
    }
}

impl<M, I: MsgId> Default for Registry<M, I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer decoding the message id and allocating the message.
pub struct MsgIdLayer<I: MsgId, N: Layer> {
    id_field: IntField<u64>,
    registry: Registry<N::Msg, I>,
    next: N,
}

impl<I, N> MsgIdLayer<I, N>
where
    I: MsgId,
    N: Layer<Id = I>,
{
    /// Wrap `next` with an id field and the dialect registry.
    pub fn new(id_field: IntField<u64>, registry: Registry<N::Msg, I>, next: N) -> Self {
        Self {
            id_field,
            registry,
            next,
        }
    }

    /// The dialect registry.
    pub fn registry(&self) -> &Registry<N::Msg, I> {
        &self.registry
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

        let raw = field.value();
        let id = match I::from_raw(raw) {
            Some(id) if self.registry.count_for(id) > 0 => id,
            _ => {
                debug!(raw, "message id names no registered kind");
                r.set_position(start);
                return Err(Error::InvalidMsgId);
            }
        };

        let flen = field.length();
        let body_start = r.position();
        let candidates = self.registry.count_for(id);
        let mut last = Error::InvalidMsgId;

        for idx in 0..candidates {
            let msg = self.registry.create(id, idx)?;
            *slot = Some(msg);
            r.set_position(body_start);
            match next(slot, r, size.saturating_sub(flen)) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    *slot = None;
                    last = e;
                }
            }
        }
        Err(last)
    }

    fn update_with<'a>(
        &self,
        w: &mut SliceWriter<'a>,
        size: usize,
        next: &mut dyn FnMut(&mut SliceWriter<'a>, usize) -> Result<()>,
    ) -> Result<()> {
        let len = advance_over_field(&self.id_field, w, size)?;
        next(w, size - len)
    }
}

impl<I, N> Layer for MsgIdLayer<I, N>
where
    I: MsgId,
    N: Layer<Id = I>,
    N::Msg: IdInfo<Id = I>,
{
    type Msg = N::Msg;
    type Id = I;
    type AllFields = (IntField<u64>, N::AllFields);

    fn read(
        &self,
        slot: &mut Option<MsgPtr<Self::Msg>>,
        r: &mut SliceReader<'_>,
        size: usize,
    ) -> Result<()> {
        let mut field = self.id_field.clone();
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
        *field = self.id_field.clone();
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
        let mut field = self.id_field.clone();
        field.set_value(msg.get_id().to_raw());
        field.write(w, size)?;
        self.next
            .write(msg, w, size.saturating_sub(field.length()))
    }

    fn write_fields(
        &self,
        all: &mut Self::AllFields,
        msg: &Self::Msg,
        w: &mut dyn ByteWriter,
        size: usize,
    ) -> Result<WriteOutcome> {
        let (field, rest) = all;
        *field = self.id_field.clone();
        field.set_value(msg.get_id().to_raw());
        field.write(w, size)?;
        self.next
            .write_fields(rest, msg, w, size.saturating_sub(field.length()))
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
        self.id_field.min_length() + self.next.min_length()
    }

    fn length_of(&self, msg: &Self::Msg) -> usize {
        let mut field = self.id_field.clone();
        field.set_value(msg.get_id().to_raw());
        field.length() + self.next.length_of(msg)
    }

    fn create_msg(&self, id: Self::Id, idx: usize) -> Result<MsgPtr<Self::Msg>> {
        self.registry.create(id, idx)
    }

    fn fresh_fields(&self) -> Self::AllFields {
        (self.id_field.clone(), self.next.fresh_fields())
    }
}
