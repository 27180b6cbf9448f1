//! Integer fields
//!
//! The workhorse codec: fixed or variable serialized width, optional
//! value offset (the stored value is the logical value plus the
//! offset), optional validity ranges, optional strictness on read, and
//! an optional bit width for bitfield membership.

use core::fmt::Debug;
use core::ops::RangeInclusive;

use crate::error::{Error, Result};
use crate::field::{bit_mask, check_read, check_write, BitsField, Field};
use crate::io::{ByteWriter, Endian, SliceReader};
use crate::varint;

/// Primitive integer types an [`IntField`] can carry.
pub trait WireInt: Copy + PartialEq + PartialOrd + Debug + 'static {
    /// Native width of the type in bytes.
    const BYTES: usize;
    /// Whether the type is signed.
    const SIGNED: bool;

    /// Widen to a signed value for offset arithmetic.
    fn to_i128(self) -> i128;

    /// Narrow back, truncating to the type's domain.
    fn from_i128(v: i128) -> Self;
}

macro_rules! impl_wire_int {
    ($($ty:ty => $signed:expr),+ $(,)?) => {
        $(
            impl WireInt for $ty {
                const BYTES: usize = core::mem::size_of::<$ty>();
                const SIGNED: bool = $signed;

                #[inline]
                fn to_i128(self) -> i128 {
                    self as i128
                }

                #[inline]
                fn from_i128(v: i128) -> Self {
                    v as $ty
                }
            }
        )+
    };
}

impl_wire_int! {
    u8 => false, u16 => false, u32 => false, u64 => false,
    i8 => true, i16 => true, i32 => true, i64 => true,
}

/// Serialized width of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// Exactly this many bytes on the wire.
    Fixed(usize),
    /// LEB128 variable-length encoding.
    Var,
}

/// Integer field with configurable width, offset, and validity ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct IntField<T: WireInt> {
    value: T,
    default: T,
    width: IntWidth,
    endian: Endian,
    offset: i64,
    ranges: Vec<RangeInclusive<T>>,
    bit_len: Option<u32>,
    fail_on_invalid: bool,
}

impl<T: WireInt> IntField<T> {
    /// Create a field serialized at the type's full width with a zero
    /// value.
    pub fn new(endian: Endian) -> Self {
        Self {
            value: T::from_i128(0),
            default: T::from_i128(0),
            width: IntWidth::Fixed(T::BYTES),
            endian,
            offset: 0,
            ranges: Vec::new(),
            bit_len: None,
            fail_on_invalid: false,
        }
    }

    /// Narrow the serialized width to `bytes` (1 up to the native
    /// width).
    ///
    /// # Panics
    /// Panics when `bytes` is zero or wider than the native type.
    pub fn with_width(mut self, bytes: usize) -> Self {
        assert!(
            (1..=T::BYTES).contains(&bytes),
            "serialized width must be 1..={} bytes",
            T::BYTES
        );
        self.width = IntWidth::Fixed(bytes);
        self
    }

    /// Switch to LEB128 variable-length serialization.
    pub fn var_length(mut self) -> Self {
        self.width = IntWidth::Var;
        self
    }

    /// Add a serialization offset: stored = logical + `offset`.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the default (and current) value.
    pub fn with_default(mut self, value: T) -> Self {
        self.default = value;
        self.value = value;
        self
    }

    /// Add a validity interval. Intervals accumulate; the value is
    /// valid when it lies in any of them. No intervals means every
    /// value is valid.
    pub fn with_range(mut self, range: RangeInclusive<T>) -> Self {
        self.ranges.push(range);
        self
    }

    /// Declare the bit width used when the field is a bitfield member.
    ///
    /// # Panics
    /// Panics when `bits` is zero or wider than the native type.
    pub fn with_bit_length(mut self, bits: u32) -> Self {
        assert!(
            (1..=(T::BYTES as u32 * 8)).contains(&bits),
            "bit length must be 1..={}",
            T::BYTES * 8
        );
        self.bit_len = Some(bits);
        self
    }

    /// Make reads fail with [`Error::ProtocolError`] when the decoded
    /// value falls outside the configured validity intervals.
    pub fn strict(mut self) -> Self {
        self.fail_on_invalid = true;
        self
    }

    /// Current logical value.
    #[inline]
    pub fn value(&self) -> T {
        self.value
    }

    /// Replace the logical value.
    #[inline]
    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    /// Configured default value.
    #[inline]
    pub fn default_value(&self) -> T {
        self.default
    }

    /// Whether the current value equals the configured default.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.value == self.default
    }

    /// Endian this field serializes under.
    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Stored representation (logical + offset) as a raw word, masked
    /// to the serialized width for fixed-width fields.
    fn stored_raw(&self) -> u64 {
        let stored = self.value.to_i128() + i128::from(self.offset);
        let raw = stored as u64;
        match self.width {
            IntWidth::Fixed(w) => raw & bit_mask(w as u32 * 8),
            IntWidth::Var => raw,
        }
    }

    /// Interpret a stored word back into the logical value.
    fn apply_stored(&mut self, raw: u64, bits: u32) {
        let stored = sign_extend(raw, bits, T::SIGNED);
        self.value = T::from_i128(stored - i128::from(self.offset));
    }
}

/// Sign-extend the low `bits` bits of `raw`.
fn sign_extend(raw: u64, bits: u32, signed: bool) -> i128 {
    let masked = raw & bit_mask(bits);
    if signed && bits < 64 && (masked >> (bits - 1)) & 1 == 1 {
        i128::from(masked) - (1i128 << bits)
    } else {
        i128::from(masked)
    }
}

impl<T: WireInt> Field for IntField<T> {
    fn length(&self) -> usize {
        match self.width {
            IntWidth::Fixed(w) => w,
            IntWidth::Var => varint::encoded_len(self.stored_raw()),
        }
    }

    fn min_length(&self) -> usize {
        match self.width {
            IntWidth::Fixed(w) => w,
            IntWidth::Var => 1,
        }
    }

    fn max_length(&self) -> usize {
        match self.width {
            IntWidth::Fixed(w) => w,
            IntWidth::Var => varint::MAX_VARINT_LEN,
        }
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        match self.width {
            IntWidth::Fixed(w) => {
                check_read(r, size, w)?;
                let raw = r.read_uint(w, self.endian)?;
                self.apply_stored(raw, w as u32 * 8);
            }
            IntWidth::Var => {
                let start = r.position();
                let (raw, consumed) = varint::decode(r)?;
                if consumed > size {
                    r.set_position(start);
                    return Err(Error::not_enough(consumed, size));
                }
                self.apply_stored(raw, 64);
            }
        }

        if self.fail_on_invalid && !self.valid() {
            return Err(Error::ProtocolError);
        }
        Ok(())
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        match self.width {
            IntWidth::Fixed(width) => {
                check_write(w, size, width)?;
                w.write_uint(self.stored_raw(), width, self.endian)
            }
            IntWidth::Var => {
                check_write(w, size, self.length())?;
                varint::encode(self.stored_raw(), w).map(|_| ())
            }
        }
    }

    fn valid(&self) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|range| range.contains(&self.value))
    }
}

impl<T: WireInt> BitsField for IntField<T> {
    fn bit_length(&self) -> u32 {
        self.bit_len.unwrap_or_else(|| match self.width {
            IntWidth::Fixed(w) => w as u32 * 8,
            IntWidth::Var => T::BYTES as u32 * 8,
        })
    }

    fn raw_bits(&self) -> u64 {
        let stored = (self.value.to_i128() + i128::from(self.offset)) as u64;
        stored & bit_mask(self.bit_length())
    }

    fn set_raw_bits(&mut self, bits: u64) {
        self.apply_stored(bits, self.bit_length());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SliceWriter;

    fn round_trip<T: WireInt>(field: &IntField<T>) -> IntField<T> {
        let mut buf = vec![0u8; field.length()];
        {
            let buf_len = buf.len();
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, buf_len).unwrap();
        }
        let mut decoded = field.clone();
        decoded.set_value(T::from_i128(0));
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        decoded
    }

    #[test]
    fn full_width_big_endian() {
        let mut field = IntField::<u32>::new(Endian::Big);
        field.set_value(0x0102_0304);

        let mut buf = [0u8; 4];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 4).unwrap();
        }
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(round_trip(&field).value(), 0x0102_0304);
    }

    #[test]
    fn narrowed_width_truncates() {
        let mut field = IntField::<u32>::new(Endian::Big).with_width(2);
        field.set_value(0x0001_0203);

        let mut buf = [0u8; 2];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 2).unwrap();
        }
        assert_eq!(buf, [2, 3]);
        assert_eq!(field.length(), 2);
    }

    #[test]
    fn narrow_signed_sign_extends() {
        let mut field = IntField::<i16>::new(Endian::Big).with_width(1);
        field.set_value(-5);
        assert_eq!(round_trip(&field).value(), -5);
    }

    #[test]
    fn offset_shifts_stored_value() {
        // Classic two-digit year: stored = year - 2000
        let mut field = IntField::<u16>::new(Endian::Big)
            .with_width(1)
            .with_offset(-2000);
        field.set_value(2015);

        let mut buf = [0u8; 1];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 1).unwrap();
        }
        assert_eq!(buf, [15]);
        assert_eq!(round_trip(&field).value(), 2015);
    }

    #[test]
    fn validity_ranges_union() {
        let mut field = IntField::<u8>::new(Endian::Big)
            .with_range(1..=5)
            .with_range(10..=10);

        field.set_value(3);
        assert!(field.valid());
        field.set_value(10);
        assert!(field.valid());
        field.set_value(7);
        assert!(!field.valid());
    }

    #[test]
    fn no_ranges_means_all_valid() {
        let mut field = IntField::<u8>::new(Endian::Big);
        field.set_value(0xFF);
        assert!(field.valid());
    }

    #[test]
    fn strict_read_rejects_out_of_range() {
        let mut field = IntField::<u8>::new(Endian::Big).with_range(1..=2).strict();
        let buf = [9u8];
        let mut r = SliceReader::new(&buf);
        assert_eq!(field.read(&mut r, 1), Err(Error::ProtocolError));
    }

    #[test]
    fn var_length_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 1 << 20, u64::MAX] {
            let mut field = IntField::<u64>::new(Endian::Big).var_length();
            field.set_value(value);
            assert_eq!(field.length(), varint::encoded_len(value));
            assert_eq!(round_trip(&field).value(), value);
        }
    }

    #[test]
    fn short_input_rewinds_cursor() {
        let mut field = IntField::<u32>::new(Endian::Big);
        let buf = [1u8, 2];
        let mut r = SliceReader::new(&buf);
        assert_eq!(
            field.read(&mut r, 4),
            Err(Error::NotEnoughData { missing: 2 })
        );
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn budget_caps_read() {
        let mut field = IntField::<u16>::new(Endian::Big);
        let buf = [1u8, 2, 3, 4];
        let mut r = SliceReader::new(&buf);
        // only 1 byte granted although the buffer has 4
        assert_eq!(
            field.read(&mut r, 1),
            Err(Error::NotEnoughData { missing: 1 })
        );
    }

    #[test]
    fn bit_member_round_trip() {
        let mut field = IntField::<u8>::new(Endian::Big).with_bit_length(3);
        field.set_value(5);
        assert_eq!(field.bit_length(), 3);
        assert_eq!(field.raw_bits(), 5);

        field.set_raw_bits(0b111_1010); // oversized bits are masked
        assert_eq!(field.value(), 0b010);
    }

    #[test]
    fn default_value_tracking() {
        let field = IntField::<u16>::new(Endian::Big).with_default(0xCAFE);
        assert_eq!(field.value(), 0xCAFE);
        assert!(field.is_default());

        let mut changed = field.clone();
        changed.set_value(1);
        assert!(!changed.is_default());
    }
}
