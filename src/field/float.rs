//! Floating-point fields
//!
//! IEEE-754 values at their native width (4 or 8 bytes) under the
//! ambient endian. NaN is treated as invalid unless explicitly allowed.

use core::fmt::Debug;

use crate::error::Result;
use crate::field::{check_read, check_write, Field};
use crate::io::{ByteWriter, Endian, SliceReader};

/// Primitive float types a [`FloatField`] can carry.
pub trait WireFloat: Copy + PartialEq + Debug + 'static {
    /// Width of the type in bytes.
    const BYTES: usize;

    /// Raw bit pattern, widened to 64 bits.
    fn to_raw(self) -> u64;

    /// Value from a raw bit pattern.
    fn from_raw(raw: u64) -> Self;

    /// Whether the value is a NaN.
    fn is_nan(self) -> bool;
}

impl WireFloat for f32 {
    const BYTES: usize = 4;

    #[inline]
    fn to_raw(self) -> u64 {
        u64::from(self.to_bits())
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }

    #[inline]
    fn is_nan(self) -> bool {
        self.is_nan()
    }
}

impl WireFloat for f64 {
    const BYTES: usize = 8;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }

    #[inline]
    fn is_nan(self) -> bool {
        self.is_nan()
    }
}

/// Fixed-width IEEE-754 field.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatField<F: WireFloat> {
    value: F,
    endian: Endian,
    allow_nan: bool,
}

impl<F: WireFloat> FloatField<F> {
    /// Create a field holding zero.
    pub fn new(endian: Endian) -> Self {
        Self {
            value: F::from_raw(0),
            endian,
            allow_nan: false,
        }
    }

    /// Accept NaN values as valid.
    pub fn allow_nan(mut self) -> Self {
        self.allow_nan = true;
        self
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Replace the value.
    #[inline]
    pub fn set_value(&mut self, value: F) {
        self.value = value;
    }
}

impl<F: WireFloat> Field for FloatField<F> {
    fn length(&self) -> usize {
        F::BYTES
    }

    fn min_length(&self) -> usize {
        F::BYTES
    }

    fn max_length(&self) -> usize {
        F::BYTES
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        check_read(r, size, F::BYTES)?;
        let raw = r.read_uint(F::BYTES, self.endian)?;
        self.value = F::from_raw(raw);
        Ok(())
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        check_write(w, size, F::BYTES)?;
        w.write_uint(self.value.to_raw(), F::BYTES, self.endian)
    }

    fn valid(&self) -> bool {
        self.allow_nan || !self.value.is_nan()
    }
}
