//! Bitfields: sub-byte members packed into whole bytes
//!
//! Members declare their width in bits; the widths must sum to a
//! multiple of eight (checked at construction). On the wire the group
//! is one packed word serialized under the ambient endian; member `i`
//! sits at the bit offset accumulated over the members declared before
//! it, lowest bits first.
//!
//! Member values wider than their declared bit width are truncated
//! silently when packing.

use crate::error::Result;
use crate::field::{bit_mask, check_read, check_write, BitsField, Field};
use crate::io::{ByteWriter, Endian, SliceReader};

/// Tuple of bitfield members.
///
/// Implemented for tuples of [`BitsField`] values up to eight members.
pub trait BitMembers {
    /// Sum of the members' bit widths.
    fn total_bits(&self) -> u32;

    /// Pack the members into a single word, first member at bit 0.
    fn pack(&self) -> u64;

    /// Distribute a packed word back onto the members.
    fn unpack(&mut self, word: u64);

    /// Whether every member holds a valid value.
    fn members_valid(&self) -> bool;

    /// Refresh every member; `true` iff any member mutated.
    fn refresh_members(&mut self) -> bool;
}

macro_rules! impl_bit_members_for_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: BitsField),+> BitMembers for ($($name,)+) {
            fn total_bits(&self) -> u32 {
                0u32 $(+ self.$idx.bit_length())+
            }

            fn pack(&self) -> u64 {
                let mut word = 0u64;
                let mut shift = 0u32;
                $(
                    let bits = self.$idx.bit_length();
                    word |= (self.$idx.raw_bits() & bit_mask(bits)) << shift;
                    shift += bits;
                )+
                let _ = shift;
                word
            }

            fn unpack(&mut self, word: u64) {
                let mut shift = 0u32;
                $(
                    let bits = self.$idx.bit_length();
                    self.$idx.set_raw_bits((word >> shift) & bit_mask(bits));
                    shift += bits;
                )+
                let _ = shift;
            }

            fn members_valid(&self) -> bool {
                true $(&& self.$idx.valid())+
            }

            fn refresh_members(&mut self) -> bool {
                let mut changed = false;
                $(
                    changed |= self.$idx.refresh();
                )+
                changed
            }
        }
    };
}

impl_bit_members_for_tuple!(A: 0);
impl_bit_members_for_tuple!(A: 0, B: 1);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_bit_members_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// Packed group of sub-byte members serialized as whole bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitfield<M: BitMembers> {
    members: M,
    endian: Endian,
    validator: Option<fn(u64) -> bool>,
}

impl<M: BitMembers> Bitfield<M> {
    /// Wrap the member tuple.
    ///
    /// # Panics
    /// Panics when the members' bit widths do not sum to a multiple of
    /// eight, or exceed 64 bits.
    pub fn new(endian: Endian, members: M) -> Self {
        let bits = members.total_bits();
        assert!(
            bits > 0 && bits % 8 == 0 && bits <= 64,
            "member bit widths must sum to a multiple of 8 within 64 bits, got {bits}"
        );
        Self {
            members,
            endian,
            validator: None,
        }
    }

    /// Add a validator observing the whole packed word, on top of the
    /// per-member validity checks.
    pub fn with_validator(mut self, validator: fn(u64) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }

    /// The member tuple.
    #[inline]
    pub fn members(&self) -> &M {
        &self.members
    }

    /// Mutable access to the member tuple.
    #[inline]
    pub fn members_mut(&mut self) -> &mut M {
        &mut self.members
    }

    fn byte_len(&self) -> usize {
        self.members.total_bits() as usize / 8
    }
}

impl<M: BitMembers> Field for Bitfield<M> {
    fn length(&self) -> usize {
        self.byte_len()
    }

    fn min_length(&self) -> usize {
        self.byte_len()
    }

    fn max_length(&self) -> usize {
        self.byte_len()
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        let len = self.byte_len();
        check_read(r, size, len)?;
        let word = r.read_uint(len, self.endian)?;
        self.members.unpack(word);
        Ok(())
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        let len = self.byte_len();
        check_write(w, size, len)?;
        w.write_uint(self.members.pack(), len, self.endian)
    }

    fn valid(&self) -> bool {
        self.members.members_valid()
            && self
                .validator
                .map_or(true, |check| check(self.members.pack()))
    }

    fn refresh(&mut self) -> bool {
        self.members.refresh_members()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::IntField;
    use crate::io::SliceWriter;

    type Abc = (IntField<u8>, IntField<u8>, IntField<u8>);

    fn abc(endian: Endian) -> Bitfield<Abc> {
        Bitfield::new(
            endian,
            (
                IntField::<u8>::new(endian).with_bit_length(3),
                IntField::<u8>::new(endian).with_bit_length(5),
                IntField::<u8>::new(endian).with_bit_length(8),
            ),
        )
    }

    #[test]
    fn packs_members_low_bits_first() {
        let mut field = abc(Endian::Big);
        field.members_mut().0.set_value(5);
        field.members_mut().1.set_value(17);
        field.members_mut().2.set_value(0xAA);

        // word = (0xAA << 8) | (17 << 3) | 5 = 0xAA8D
        let mut buf = [0u8; 2];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 2).unwrap();
        }
        assert_eq!(buf, [0xAA, 0x8D]);
    }

    #[test]
    fn unpacks_by_cumulative_offset() {
        let buf = [0xAA, 0x8D];
        let mut field = abc(Endian::Big);
        let mut r = SliceReader::new(&buf);
        field.read(&mut r, 2).unwrap();

        assert_eq!(field.members().0.value(), 5);
        assert_eq!(field.members().1.value(), 17);
        assert_eq!(field.members().2.value(), 0xAA);
    }

    #[test]
    fn oversized_member_values_truncate() {
        let mut field = abc(Endian::Big);
        field.members_mut().0.set_value(0xFF); // 3 bits keep 0b111

        let mut buf = [0u8; 2];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 2).unwrap();
        }

        let mut decoded = abc(Endian::Big);
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, 2).unwrap();
        assert_eq!(decoded.members().0.value(), 0xFF % 8);
    }

    #[test]
    fn little_endian_group() {
        let mut field = abc(Endian::Little);
        field.members_mut().2.set_value(0xAA);

        let mut buf = [0u8; 2];
        {
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, 2).unwrap();
        }
        // word 0xAA00 laid out least significant byte first
        assert_eq!(buf, [0x00, 0xAA]);
    }

    #[test]
    #[should_panic(expected = "multiple of 8")]
    fn ragged_widths_rejected() {
        let _ = Bitfield::new(
            Endian::Big,
            (
                IntField::<u8>::new(Endian::Big).with_bit_length(3),
                IntField::<u8>::new(Endian::Big).with_bit_length(4),
            ),
        );
    }

    #[test]
    fn whole_group_validator() {
        let field = abc(Endian::Big).with_validator(|word| word != 0);
        assert!(!field.valid()); // all members zero

        let mut nonzero = abc(Endian::Big).with_validator(|word| word != 0);
        nonzero.members_mut().2.set_value(1);
        assert!(nonzero.valid());
    }
}
