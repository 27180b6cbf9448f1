//! Sequence fields
//!
//! An array field carries a homogeneous sequence of element fields.
//! Three length policies cover the usual wire layouts: a size prefix
//! (counting elements or bytes), a statically known element count, and
//! a trailing sequence that consumes the rest of its window.

use crate::error::{Error, Result};
use crate::field::{Field, IntField};
use crate::io::{ByteWriter, SliceReader};

/// What a size prefix counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountUnit {
    /// The prefix holds the number of elements.
    Elements,
    /// The prefix holds the number of payload bytes.
    Bytes,
}

#[derive(Debug, Clone, PartialEq)]
enum Policy {
    Fixed(usize),
    Prefixed {
        prefix: IntField<u64>,
        unit: CountUnit,
    },
    Trailing,
}

/// Homogeneous sequence of element fields.
///
/// New elements decode from a prototype, so per-element configuration
/// (width, endian, ranges) is set once on the prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField<F: Field + Clone> {
    proto: F,
    elements: Vec<F>,
    policy: Policy,
    count_bounds: Option<(usize, usize)>,
}

impl<F: Field + Clone> ArrayField<F> {
    /// Sequence with a statically known element count.
    pub fn fixed(proto: F, count: usize) -> Self {
        let elements = vec![proto.clone(); count];
        Self {
            proto,
            elements,
            policy: Policy::Fixed(count),
            count_bounds: None,
        }
    }

    /// Sequence preceded by a size prefix.
    pub fn prefixed(proto: F, prefix: IntField<u64>, unit: CountUnit) -> Self {
        Self {
            proto,
            elements: Vec::new(),
            policy: Policy::Prefixed { prefix, unit },
            count_bounds: None,
        }
    }

    /// Sequence consuming the remainder of its window.
    pub fn trailing(proto: F) -> Self {
        Self {
            proto,
            elements: Vec::new(),
            policy: Policy::Trailing,
            count_bounds: None,
        }
    }

    /// Constrain the element count; `valid()` reports violations.
    pub fn with_count_bounds(mut self, min: usize, max: usize) -> Self {
        assert!(min <= max, "count bounds inverted");
        self.count_bounds = Some((min, max));
        self
    }

    /// Elements currently held.
    #[inline]
    pub fn elements(&self) -> &[F] {
        &self.elements
    }

    /// Mutable access to the elements.
    #[inline]
    pub fn elements_mut(&mut self) -> &mut Vec<F> {
        &mut self.elements
    }

    /// Append an element.
    #[inline]
    pub fn push(&mut self, element: F) {
        self.elements.push(element);
    }

    /// Clone of the element prototype, ready to be filled and pushed.
    #[inline]
    pub fn new_element(&self) -> F {
        self.proto.clone()
    }

    fn elements_byte_len(&self) -> usize {
        self.elements.iter().map(Field::length).sum()
    }

    /// Value the size prefix should hold for the current elements.
    fn expected_prefix(&self, unit: CountUnit) -> u64 {
        match unit {
            CountUnit::Elements => self.elements.len() as u64,
            CountUnit::Bytes => self.elements_byte_len() as u64,
        }
    }

    fn count_ok(&self) -> bool {
        match self.count_bounds {
            Some((min, max)) => (min..=max).contains(&self.elements.len()),
            None => true,
        }
    }

    fn read_n_elements(&mut self, n: usize, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        self.elements.clear();
        let start = r.position();
        for _ in 0..n {
            let used = r.position() - start;
            let mut element = self.proto.clone();
            element.read(r, size.saturating_sub(used))?;
            self.elements.push(element);
        }
        Ok(())
    }
}

impl<F: Field + Clone> Field for ArrayField<F> {
    fn length(&self) -> usize {
        match &self.policy {
            Policy::Fixed(_) | Policy::Trailing => self.elements_byte_len(),
            Policy::Prefixed { prefix, unit } => {
                let mut p = prefix.clone();
                p.set_value(self.expected_prefix(*unit));
                p.length() + self.elements_byte_len()
            }
        }
    }

    fn min_length(&self) -> usize {
        let min_count = self.count_bounds.map_or(0, |(min, _)| min);
        match &self.policy {
            Policy::Fixed(n) => n * self.proto.min_length(),
            Policy::Prefixed { prefix, .. } => {
                prefix.min_length() + min_count * self.proto.min_length()
            }
            Policy::Trailing => min_count * self.proto.min_length(),
        }
    }

    fn max_length(&self) -> usize {
        match (&self.policy, self.count_bounds) {
            (Policy::Fixed(n), _) => n * self.proto.max_length(),
            (Policy::Prefixed { prefix, .. }, Some((_, max))) => prefix
                .max_length()
                .saturating_add(max.saturating_mul(self.proto.max_length())),
            (Policy::Trailing, Some((_, max))) => max.saturating_mul(self.proto.max_length()),
            _ => usize::MAX,
        }
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        match self.policy.clone() {
            Policy::Fixed(n) => self.read_n_elements(n, r, size),
            Policy::Prefixed { mut prefix, unit } => {
                let pstart = r.position();
                prefix.read(r, size)?;
                let claimed = prefix.value() as usize;
                let left = size.saturating_sub(r.position() - pstart);

                match unit {
                    CountUnit::Elements => {
                        let need = claimed.saturating_mul(self.proto.min_length());
                        if need > left.min(r.remaining()) {
                            r.set_position(pstart);
                            return Err(Error::not_enough(need, left.min(r.remaining())));
                        }
                        self.read_n_elements(claimed, r, left)?;
                    }
                    CountUnit::Bytes => {
                        if claimed > left.min(r.remaining()) {
                            r.set_position(pstart);
                            return Err(Error::not_enough(claimed, left.min(r.remaining())));
                        }
                        self.elements.clear();
                        let start = r.position();
                        while r.position() - start < claimed {
                            let before = r.position();
                            let budget = claimed - (before - start);
                            let mut element = self.proto.clone();
                            // The window is fully present, so an element
                            // overrunning it is malformed data rather
                            // than starved input.
                            match element.read(r, budget) {
                                Ok(()) => self.elements.push(element),
                                Err(Error::NotEnoughData { .. }) => {
                                    return Err(Error::InvalidMsgData)
                                }
                                Err(e) => return Err(e),
                            }
                            if r.position() == before {
                                return Err(Error::InvalidMsgData);
                            }
                        }
                    }
                }

                // Keep the stored prefix in sync with what was read.
                if let Policy::Prefixed { prefix: stored, .. } = &mut self.policy {
                    *stored = prefix;
                }
                Ok(())
            }
            Policy::Trailing => {
                self.elements.clear();
                let start = r.position();
                while r.position() - start < size && !r.is_at_end() {
                    let before = r.position();
                    let budget = size - (before - start);
                    let mut element = self.proto.clone();
                    element.read(r, budget)?;
                    self.elements.push(element);
                    if r.position() == before {
                        return Err(Error::InvalidMsgData);
                    }
                }
                Ok(())
            }
        }
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        let start = w.position();
        if let Policy::Prefixed { prefix, unit } = &self.policy {
            let mut p = prefix.clone();
            p.set_value(self.expected_prefix(*unit));
            p.write(w, size)?;
        }
        for element in &self.elements {
            let used = w.position() - start;
            element.write(w, size.saturating_sub(used))?;
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        self.count_ok() && self.elements.iter().all(Field::valid)
    }

    fn refresh(&mut self) -> bool {
        let mut changed = false;
        for element in &mut self.elements {
            changed |= element.refresh();
        }
        let expected = match &self.policy {
            Policy::Prefixed { unit, .. } => Some(self.expected_prefix(*unit)),
            _ => None,
        };
        if let (Some(expected), Policy::Prefixed { prefix, .. }) = (expected, &mut self.policy) {
            if prefix.value() != expected {
                prefix.set_value(expected);
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{Endian, SliceWriter};

    fn u16_proto() -> IntField<u16> {
        IntField::new(Endian::Big)
    }

    fn byte_prefix() -> IntField<u64> {
        IntField::new(Endian::Big).with_width(1)
    }

    fn write_to_vec<F: Field + Clone>(field: &ArrayField<F>) -> Vec<u8> {
        let mut buf = vec![0u8; field.length()];
        let mut w = SliceWriter::new(&mut buf);
        field.write(&mut w, usize::MAX).unwrap();
        buf
    }

    #[test]
    fn fixed_round_trip() {
        let mut field = ArrayField::fixed(u16_proto(), 3);
        for (i, el) in field.elements_mut().iter_mut().enumerate() {
            el.set_value(i as u16 + 1);
        }

        let buf = write_to_vec(&field);
        assert_eq!(buf, [0, 1, 0, 2, 0, 3]);

        let mut decoded = ArrayField::fixed(u16_proto(), 3);
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        let values: Vec<u16> = decoded.elements().iter().map(|e| e.value()).collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn element_prefixed_round_trip() {
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Elements);
        for v in [10u16, 20] {
            let mut el = field.new_element();
            el.set_value(v);
            field.push(el);
        }

        let buf = write_to_vec(&field);
        assert_eq!(buf, [2, 0, 10, 0, 20]);

        let mut decoded = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Elements);
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        assert_eq!(decoded.elements().len(), 2);
        assert_eq!(decoded.elements()[1].value(), 20);
    }

    #[test]
    fn byte_prefixed_round_trip() {
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Bytes);
        let mut el = field.new_element();
        el.set_value(7);
        field.push(el);

        let buf = write_to_vec(&field);
        assert_eq!(buf, [2, 0, 7]); // 2 payload bytes, one u16

        let mut decoded = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Bytes);
        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        assert_eq!(decoded.elements().len(), 1);
    }

    #[test]
    fn prefix_beyond_input_is_starved() {
        // claims 5 elements, supplies one
        let buf = [5u8, 0, 1];
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Elements);
        let mut r = SliceReader::new(&buf);
        let err = field.read(&mut r, buf.len()).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData { .. }));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn byte_window_overrun_is_malformed() {
        // window of 3 bytes cannot hold a whole number of u16 elements
        let buf = [3u8, 0, 1, 0];
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Bytes);
        let mut r = SliceReader::new(&buf);
        assert_eq!(field.read(&mut r, buf.len()), Err(Error::InvalidMsgData));
    }

    #[test]
    fn trailing_consumes_window() {
        let buf = [0u8, 1, 0, 2, 0, 3, 0xFF];
        let mut field = ArrayField::trailing(u16_proto());
        let mut r = SliceReader::new(&buf);
        // window excludes the trailing 0xFF byte
        field.read(&mut r, 6).unwrap();
        assert_eq!(field.elements().len(), 3);
        assert_eq!(r.position(), 6);
    }

    #[test]
    fn refresh_restores_stale_prefix() {
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Elements);
        let mut el = field.new_element();
        el.set_value(1);
        field.push(el);

        assert!(field.refresh()); // prefix was 0, now 1
        assert!(!field.refresh()); // second pass finds nothing stale
    }

    #[test]
    fn count_bounds_checked_by_valid() {
        let mut field = ArrayField::prefixed(u16_proto(), byte_prefix(), CountUnit::Elements)
            .with_count_bounds(1, 2);
        assert!(!field.valid()); // empty

        let mut el = field.new_element();
        el.set_value(1);
        field.push(el);
        assert!(field.valid());

        for _ in 0..2 {
            let el = field.new_element();
            field.push(el);
        }
        assert!(!field.valid()); // three elements
    }
}
