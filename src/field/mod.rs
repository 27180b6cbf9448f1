//! Typed field codecs
//!
//! A field is a value-semantic object that knows how to serialize one
//! typed piece of wire data. Composite fields (arrays, tuples,
//! variants, bitfields, optionals) nest other fields; framing layers
//! own one field each.
//!
//! Every field upholds two invariants:
//! - `min_length() <= length() <= max_length()` for every value;
//! - writing a valid value and reading it back over a random-access
//!   buffer reproduces the value.

use crate::error::{Error, Result};
use crate::io::{ByteWriter, SliceReader};

pub mod array;
pub mod bitfield;
pub mod bundle;
pub mod enums;
pub mod float;
pub mod int;
pub mod optional;
pub mod strings;
pub mod variant;

pub use array::{ArrayField, CountUnit};
pub use bitfield::{BitMembers, Bitfield};
pub use enums::{EnumField, WireEnum};
pub use float::{FloatField, WireFloat};
pub use int::{IntField, IntWidth, WireInt};
pub use optional::{OptionalField, Presence};
pub use strings::StringField;
pub use variant::{Alternatives, VariantField};

/// Serialization contract shared by all field kinds.
pub trait Field {
    /// Serialized byte length of the current value.
    fn length(&self) -> usize;

    /// Smallest serialized length over all values.
    fn min_length(&self) -> usize;

    /// Largest serialized length over all values.
    fn max_length(&self) -> usize;

    /// Deserialize the value from the reader.
    ///
    /// `size` is the byte budget granted by the enclosing layer; the
    /// field consumes at most that many bytes even when the reader
    /// holds more. On [`Error::NotEnoughData`] the cursor is left at
    /// the position the read started from.
    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()>;

    /// Serialize the value into the writer.
    ///
    /// `size` is the byte budget granted by the enclosing layer;
    /// exceeding it (or the writer capacity) reports
    /// [`Error::BufferOverflow`].
    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()>;

    /// Whether the value satisfies the field's semantic constraints.
    fn valid(&self) -> bool {
        true
    }

    /// Recompute state derived from other parts of the value (stored
    /// size prefixes). Returns `true` iff the value was mutated.
    fn refresh(&mut self) -> bool {
        false
    }
}

/// Extra contract for fields that can live inside a bitfield.
///
/// Members expose their value as a raw group of bits; the enclosing
/// [`Bitfield`] packs members into a single word and serializes the
/// word as whole bytes.
pub trait BitsField: Field {
    /// Width of this member in bits.
    fn bit_length(&self) -> u32;

    /// Current value as raw bits, masked to [`BitsField::bit_length`].
    fn raw_bits(&self) -> u64;

    /// Replace the value from raw bits extracted out of the packed
    /// word.
    fn set_raw_bits(&mut self, bits: u64);
}

/// Verify a read of `needed` bytes fits both the reader and the layer
/// budget, reporting how much input is missing otherwise.
#[inline]
pub(crate) fn check_read(r: &SliceReader<'_>, size: usize, needed: usize) -> Result<()> {
    let available = size.min(r.remaining());
    if available < needed {
        return Err(Error::not_enough(needed, available));
    }
    Ok(())
}

/// Verify a write of `needed` bytes fits both the writer and the layer
/// budget.
#[inline]
pub(crate) fn check_write(w: &dyn ByteWriter, size: usize, needed: usize) -> Result<()> {
    if size < needed {
        return Err(Error::BufferOverflow);
    }
    if let Some(cap) = w.capacity_left() {
        if cap < needed {
            return Err(Error::BufferOverflow);
        }
    }
    Ok(())
}

/// Run a read closure, rewinding the cursor to its starting position
/// when the input turns out to be too short.
#[inline]
pub(crate) fn rewind_on_starvation<T>(
    r: &mut SliceReader<'_>,
    op: impl FnOnce(&mut SliceReader<'_>) -> Result<T>,
) -> Result<T> {
    let start = r.position();
    match op(r) {
        Err(e @ Error::NotEnoughData { .. }) => {
            r.set_position(start);
            Err(e)
        }
        other => other,
    }
}

/// Mask covering the low `bits` bits of a word.
#[inline]
pub(crate) fn bit_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
