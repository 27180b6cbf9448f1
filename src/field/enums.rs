//! Enumeration fields
//!
//! An enum field is an integer field whose decoded value projects onto
//! a closed set of declared variants. The raw integer is always kept,
//! so an unknown value survives a read/write round trip; `valid()`
//! reports whether the raw value names a declared variant.

use core::fmt::Debug;

use crate::error::{Error, Result};
use crate::field::{BitsField, Field, IntField, WireInt};
use crate::io::{ByteWriter, Endian, SliceReader};

/// Enumerations an [`EnumField`] can carry.
pub trait WireEnum: Copy + PartialEq + Debug + 'static {
    /// Underlying integer representation.
    type Repr: WireInt;

    /// Project a raw value onto a variant, `None` for undeclared
    /// values.
    fn from_repr(raw: Self::Repr) -> Option<Self>;

    /// Raw value of this variant.
    fn to_repr(self) -> Self::Repr;
}

/// Integer field constrained to a declared variant set.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumField<E: WireEnum> {
    inner: IntField<E::Repr>,
    strict: bool,
}

impl<E: WireEnum> EnumField<E> {
    /// Create a field serialized at the representation's full width.
    pub fn new(endian: Endian) -> Self {
        Self {
            inner: IntField::new(endian),
            strict: false,
        }
    }

    /// Narrow the serialized width to `bytes`.
    pub fn with_width(mut self, bytes: usize) -> Self {
        self.inner = self.inner.with_width(bytes);
        self
    }

    /// Set the default (and current) variant.
    pub fn with_default(mut self, variant: E) -> Self {
        self.inner = self.inner.with_default(variant.to_repr());
        self
    }

    /// Declare the bit width used when the field is a bitfield member.
    pub fn with_bit_length(mut self, bits: u32) -> Self {
        self.inner = self.inner.with_bit_length(bits);
        self
    }

    /// Make reads fail with [`Error::ProtocolError`] when the decoded
    /// value names no declared variant.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Decoded variant, `None` when the raw value is undeclared.
    #[inline]
    pub fn value(&self) -> Option<E> {
        E::from_repr(self.inner.value())
    }

    /// Raw integer value as read off the wire.
    #[inline]
    pub fn raw(&self) -> E::Repr {
        self.inner.value()
    }

    /// Select a variant.
    #[inline]
    pub fn set_value(&mut self, variant: E) {
        self.inner.set_value(variant.to_repr());
    }

    /// Overwrite the raw integer value directly.
    #[inline]
    pub fn set_raw(&mut self, raw: E::Repr) {
        self.inner.set_value(raw);
    }
}

impl<E: WireEnum> Field for EnumField<E> {
    fn length(&self) -> usize {
        self.inner.length()
    }

    fn min_length(&self) -> usize {
        self.inner.min_length()
    }

    fn max_length(&self) -> usize {
        self.inner.max_length()
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        self.inner.read(r, size)?;
        if self.strict && self.value().is_none() {
            return Err(Error::ProtocolError);
        }
        Ok(())
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        self.inner.write(w, size)
    }

    fn valid(&self) -> bool {
        self.value().is_some()
    }
}

impl<E: WireEnum> BitsField for EnumField<E> {
    fn bit_length(&self) -> u32 {
        self.inner.bit_length()
    }

    fn raw_bits(&self) -> u64 {
        self.inner.raw_bits()
    }

    fn set_raw_bits(&mut self, bits: u64) {
        self.inner.set_raw_bits(bits);
    }
}
