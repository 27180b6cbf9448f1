//! Message capability traits and visitor dispatch
//!
//! A message is a named collection of fields identified by an id. Its
//! capabilities are split into one trait per operation; a dialect
//! includes a capability by implementing the matching trait on its
//! message kinds (and on its trait object, for which forwarding impls
//! over `Box` are provided). Framing layers bound themselves on
//! exactly the capabilities they touch.

use core::fmt::Debug;

use crate::error::Result;
use crate::io::{ByteWriter, SliceReader};

/// Message id values carried on the wire.
///
/// Implemented for the unsigned integers; dialects with an enum id
/// implement the projection themselves.
pub trait MsgId: Copy + PartialEq + Debug + 'static {
    /// Widen to the raw wire representation.
    fn to_raw(self) -> u64;

    /// Project a raw wire value onto an id, `None` when out of range.
    fn from_raw(raw: u64) -> Option<Self>;
}

macro_rules! impl_msg_id {
    ($($ty:ty),+) => {
        $(
            impl MsgId for $ty {
                #[inline]
                fn to_raw(self) -> u64 {
                    u64::from(self)
                }

                #[inline]
                fn from_raw(raw: u64) -> Option<Self> {
                    Self::try_from(raw).ok()
                }
            }
        )+
    };
}

impl_msg_id!(u8, u16, u32, u64);

/// Capability: the message knows its own id.
pub trait IdInfo {
    /// Id type of the dialect.
    type Id: MsgId;

    /// Id identifying this message's kind.
    fn get_id(&self) -> Self::Id;
}

/// Capability: the message body can be decoded from wire bytes.
pub trait ReadMsg {
    /// Decode the body fields from the reader, consuming at most
    /// `size` bytes.
    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()>;
}

/// Capability: the message body can be encoded to wire bytes.
pub trait WriteMsg {
    /// Encode the body fields into the writer within a `size` byte
    /// budget.
    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()>;
}

/// Capability: the message knows its serialized body length.
pub trait LengthInfo {
    /// Serialized body length in bytes.
    fn length(&self) -> usize;
}

/// Capability: the message can check its semantic validity.
pub trait ValidCheck {
    /// Whether every body field holds a valid value.
    fn valid(&self) -> bool;
}

/// Capability: the message can recompute derived state.
pub trait Refresh {
    /// Bring derived fields (stored size prefixes) up to date.
    /// Returns `true` iff anything was mutated; an immediately
    /// repeated call returns `false`.
    fn refresh(&mut self) -> bool;
}

/// Visitor receiving messages by concrete kind.
///
/// Dialects extend this with one `handle_*` method per kind plus a
/// catch-all; the return type is uniform across all of them.
pub trait Handler {
    /// Uniform return type of all the visit methods.
    type Ret;
}

/// Capability: double dispatch onto a dialect handler.
pub trait Dispatch<H: Handler> {
    /// Invoke the handler method matching this message's concrete
    /// kind.
    fn dispatch(&self, handler: &mut H) -> H::Ret;
}

/// Umbrella bound for dialects that include every capability.
pub trait ProtoMsg: IdInfo + ReadMsg + WriteMsg + LengthInfo + ValidCheck + Refresh {}

impl<M> ProtoMsg for M where M: IdInfo + ReadMsg + WriteMsg + LengthInfo + ValidCheck + Refresh {}

impl<T: IdInfo + ?Sized> IdInfo for Box<T> {
    type Id = T::Id;

    fn get_id(&self) -> Self::Id {
        (**self).get_id()
    }
}

impl<T: ReadMsg + ?Sized> ReadMsg for Box<T> {
    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        (**self).read(r, size)
    }
}

impl<T: WriteMsg + ?Sized> WriteMsg for Box<T> {
    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        (**self).write(w, size)
    }
}

impl<T: LengthInfo + ?Sized> LengthInfo for Box<T> {
    fn length(&self) -> usize {
        (**self).length()
    }
}

impl<T: ValidCheck + ?Sized> ValidCheck for Box<T> {
    fn valid(&self) -> bool {
        (**self).valid()
    }
}

impl<T: Refresh + ?Sized> Refresh for Box<T> {
    fn refresh(&mut self) -> bool {
        (**self).refresh()
    }
}
