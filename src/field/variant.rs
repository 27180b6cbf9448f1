//! Variant fields: tagged unions over a closed alternative set
//!
//! A variant field serializes a key followed by the body of the
//! alternative the key selects. The closed set of alternatives is a
//! dialect-defined enum implementing [`Alternatives`]; only the
//! selected alternative ever reaches the wire.

use core::fmt::Debug;

use crate::error::{Error, Result};
use crate::field::{Field, IntField, WireInt};
use crate::io::{ByteWriter, Endian, SliceReader};

/// Closed set of alternatives a [`VariantField`] can carry.
///
/// Implemented on a dialect-defined enum whose variants wrap the
/// per-alternative field layouts.
pub trait Alternatives: Clone + Debug + Sized {
    /// Integer key type selecting the alternative.
    type Key: WireInt;

    /// Key identifying this alternative.
    fn key(&self) -> Self::Key;

    /// Decode the alternative selected by `key`.
    ///
    /// Returns [`Error::InvalidMsgData`] for an unrecognized key.
    fn read_alternative(
        key: Self::Key,
        r: &mut SliceReader<'_>,
        size: usize,
        endian: Endian,
    ) -> Result<Self>;

    /// Serialize the alternative's body (the key is written by the
    /// enclosing field).
    fn write_body(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()>;

    /// Serialized body length.
    fn body_length(&self) -> usize;

    /// Semantic validity of the body.
    fn body_valid(&self) -> bool {
        true
    }
}

/// Key-selected union over a closed alternative set.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantField<A: Alternatives> {
    key_field: IntField<A::Key>,
    value: Option<A>,
    endian: Endian,
}

impl<A: Alternatives> VariantField<A> {
    /// Create an unselected variant; the key serializes at the key
    /// type's full width.
    pub fn new(endian: Endian) -> Self {
        Self {
            key_field: IntField::new(endian),
            value: None,
            endian,
        }
    }

    /// Narrow the serialized key width to `bytes`.
    pub fn with_key_width(mut self, bytes: usize) -> Self {
        self.key_field = self.key_field.with_width(bytes);
        self
    }

    /// Currently selected alternative.
    #[inline]
    pub fn value(&self) -> Option<&A> {
        self.value.as_ref()
    }

    /// Select an alternative.
    #[inline]
    pub fn select(&mut self, alternative: A) {
        self.value = Some(alternative);
    }

    /// Drop the selection.
    #[inline]
    pub fn clear(&mut self) {
        self.value = None;
    }

    fn key_length_for(&self, alternative: &A) -> usize {
        let mut key = self.key_field.clone();
        key.set_value(alternative.key());
        key.length()
    }
}

impl<A: Alternatives> Field for VariantField<A> {
    fn length(&self) -> usize {
        match &self.value {
            Some(alt) => self.key_length_for(alt) + alt.body_length(),
            None => self.key_field.min_length(),
        }
    }

    fn min_length(&self) -> usize {
        self.key_field.min_length()
    }

    fn max_length(&self) -> usize {
        usize::MAX
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        let start = r.position();
        let mut key_field = self.key_field.clone();
        key_field.read(r, size)?;

        let used = r.position() - start;
        let alt = A::read_alternative(
            key_field.value(),
            r,
            size.saturating_sub(used),
            self.endian,
        )?;
        self.key_field = key_field;
        self.value = Some(alt);
        Ok(())
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        let alt = self.value.as_ref().ok_or(Error::InvalidMsgData)?;
        let start = w.position();

        let mut key_field = self.key_field.clone();
        key_field.set_value(alt.key());
        key_field.write(w, size)?;

        let used = w.position() - start;
        alt.write_body(w, size.saturating_sub(used))
    }

    fn valid(&self) -> bool {
        match &self.value {
            Some(alt) => alt.body_valid(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FloatField;
    use crate::io::SliceWriter;

    /// Property value that is either a counter or a reading.
    #[derive(Debug, Clone, PartialEq)]
    enum Property {
        Counter(IntField<u32>),
        Reading(FloatField<f32>),
    }

    impl Alternatives for Property {
        type Key = u8;

        fn key(&self) -> u8 {
            match self {
                Property::Counter(_) => 1,
                Property::Reading(_) => 2,
            }
        }

        fn read_alternative(
            key: u8,
            r: &mut SliceReader<'_>,
            size: usize,
            endian: Endian,
        ) -> Result<Self> {
            match key {
                1 => {
                    let mut field = IntField::<u32>::new(endian);
                    field.read(r, size)?;
                    Ok(Property::Counter(field))
                }
                2 => {
                    let mut field = FloatField::<f32>::new(endian);
                    field.read(r, size)?;
                    Ok(Property::Reading(field))
                }
                _ => Err(Error::InvalidMsgData),
            }
        }

        fn write_body(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
            match self {
                Property::Counter(field) => field.write(w, size),
                Property::Reading(field) => field.write(w, size),
            }
        }

        fn body_length(&self) -> usize {
            match self {
                Property::Counter(field) => field.length(),
                Property::Reading(field) => field.length(),
            }
        }
    }

    #[test]
    fn round_trip_selected_alternative() {
        let mut field = VariantField::<Property>::new(Endian::Big);
        let mut counter = IntField::<u32>::new(Endian::Big);
        counter.set_value(0xDEAD);
        field.select(Property::Counter(counter));

        let mut buf = vec![0u8; field.length()];
        {
            let buf_len = buf.len();
            let mut w = SliceWriter::new(&mut buf);
            field.write(&mut w, buf_len).unwrap();
        }
        assert_eq!(buf, [1, 0, 0, 0xDE, 0xAD]);

        let mut decoded = VariantField::<Property>::new(Endian::Big);
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        match decoded.value().unwrap() {
            Property::Counter(f) => assert_eq!(f.value(), 0xDEAD),
            other => panic!("wrong alternative: {other:?}"),
        }
    }

    #[test]
    fn unknown_key_is_malformed() {
        let buf = [7u8, 0, 0, 0, 0];
        let mut field = VariantField::<Property>::new(Endian::Big);
        let mut r = SliceReader::new(&buf);
        assert_eq!(field.read(&mut r, buf.len()), Err(Error::InvalidMsgData));
    }

    #[test]
    fn unselected_write_is_rejected() {
        let field = VariantField::<Property>::new(Endian::Big);
        let mut buf = [0u8; 8];
        let mut w = SliceWriter::new(&mut buf);
        assert_eq!(field.write(&mut w, 8), Err(Error::InvalidMsgData));
        assert!(!field.valid());
    }
}
