//! Byte-string fields
//!
//! A string field is a sequence of raw bytes with one of four wire
//! layouts: length-prefixed, terminated by a sentinel byte sequence,
//! fixed length (padded), or trailing (consuming the rest of its
//! window). Values are kept as raw bytes; text interpretation is up to
//! the dialect.

use crate::error::{Error, Result};
use crate::field::{check_read, check_write, Field, IntField};
use crate::io::{ByteWriter, SliceReader};

#[derive(Debug, Clone, PartialEq)]
enum Layout {
    Prefixed(IntField<u64>),
    Terminated(Vec<u8>),
    Fixed { len: usize, pad: u8 },
    Trailing,
}

/// Raw byte string with a configurable wire layout.
#[derive(Debug, Clone, PartialEq)]
pub struct StringField {
    value: Vec<u8>,
    layout: Layout,
}

impl StringField {
    /// String preceded by a length prefix counting bytes.
    pub fn prefixed(prefix: IntField<u64>) -> Self {
        Self {
            value: Vec::new(),
            layout: Layout::Prefixed(prefix),
        }
    }

    /// String followed by a sentinel byte sequence.
    ///
    /// # Panics
    /// Panics when the terminator is empty.
    pub fn terminated(terminator: impl Into<Vec<u8>>) -> Self {
        let terminator = terminator.into();
        assert!(!terminator.is_empty(), "terminator must not be empty");
        Self {
            value: Vec::new(),
            layout: Layout::Terminated(terminator),
        }
    }

    /// String stored in exactly `len` bytes, padded with `pad`.
    ///
    /// Values longer than `len` are truncated on write.
    pub fn fixed(len: usize, pad: u8) -> Self {
        Self {
            value: Vec::new(),
            layout: Layout::Fixed { len, pad },
        }
    }

    /// String consuming the remainder of its window.
    pub fn trailing() -> Self {
        Self {
            value: Vec::new(),
            layout: Layout::Trailing,
        }
    }

    /// Current bytes.
    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Replace the bytes.
    #[inline]
    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }

    /// Value interpreted as UTF-8, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Bytes that end up on the wire for the current value (truncated
    /// or padded for the fixed layout).
    fn wire_value_len(&self) -> usize {
        match &self.layout {
            Layout::Fixed { len, .. } => *len,
            _ => self.value.len(),
        }
    }
}

impl Field for StringField {
    fn length(&self) -> usize {
        match &self.layout {
            Layout::Prefixed(prefix) => {
                let mut p = prefix.clone();
                p.set_value(self.value.len() as u64);
                p.length() + self.value.len()
            }
            Layout::Terminated(term) => self.value.len() + term.len(),
            Layout::Fixed { len, .. } => *len,
            Layout::Trailing => self.value.len(),
        }
    }

    fn min_length(&self) -> usize {
        match &self.layout {
            Layout::Prefixed(prefix) => prefix.min_length(),
            Layout::Terminated(term) => term.len(),
            Layout::Fixed { len, .. } => *len,
            Layout::Trailing => 0,
        }
    }

    fn max_length(&self) -> usize {
        match &self.layout {
            Layout::Fixed { len, .. } => *len,
            _ => usize::MAX,
        }
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        match self.layout.clone() {
            Layout::Prefixed(mut prefix) => {
                let start = r.position();
                prefix.read(r, size)?;
                let claimed = prefix.value() as usize;
                let left = size.saturating_sub(r.position() - start);

                if claimed > left.min(r.remaining()) {
                    r.set_position(start);
                    return Err(Error::not_enough(claimed, left.min(r.remaining())));
                }
                self.value = r.take(claimed)?.to_vec();
                if let Layout::Prefixed(stored) = &mut self.layout {
                    *stored = prefix;
                }
                Ok(())
            }
            Layout::Terminated(term) => {
                let window = size.min(r.remaining());
                let haystack = r.peek(window)?;
                match find_terminator(haystack, &term) {
                    Some(at) => {
                        self.value = haystack[..at].to_vec();
                        let consumed = at + term.len();
                        r.set_position(r.position() + consumed);
                        Ok(())
                    }
                    // The terminator may still arrive with more input.
                    None => Err(Error::NotEnoughData { missing: 1 }),
                }
            }
            Layout::Fixed { len, pad } => {
                check_read(r, size, len)?;
                let mut bytes = r.take(len)?.to_vec();
                while bytes.last() == Some(&pad) {
                    bytes.pop();
                }
                self.value = bytes;
                Ok(())
            }
            Layout::Trailing => {
                let window = size.min(r.remaining());
                self.value = r.take(window)?.to_vec();
                Ok(())
            }
        }
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        match &self.layout {
            Layout::Prefixed(prefix) => {
                let mut p = prefix.clone();
                p.set_value(self.value.len() as u64);
                let total = p.length() + self.value.len();
                check_write(w, size, total)?;
                p.write(w, size)?;
                w.write_slice(&self.value)
            }
            Layout::Terminated(term) => {
                let total = self.value.len() + term.len();
                check_write(w, size, total)?;
                w.write_slice(&self.value)?;
                w.write_slice(term)
            }
            Layout::Fixed { len, pad } => {
                check_write(w, size, *len)?;
                let keep = self.value.len().min(*len);
                w.write_slice(&self.value[..keep])?;
                for _ in keep..*len {
                    w.write_byte(*pad)?;
                }
                Ok(())
            }
            Layout::Trailing => {
                check_write(w, size, self.value.len())?;
                w.write_slice(&self.value)
            }
        }
    }

    fn valid(&self) -> bool {
        match &self.layout {
            // A value containing the terminator cannot round-trip.
            Layout::Terminated(term) => find_terminator(&self.value, term).is_none(),
            _ => true,
        }
    }

    fn refresh(&mut self) -> bool {
        let expected = self.wire_value_len() as u64;
        match &mut self.layout {
            Layout::Prefixed(prefix) if prefix.value() != expected => {
                prefix.set_value(expected);
                true
            }
            _ => false,
        }
    }
}

fn find_terminator(haystack: &[u8], term: &[u8]) -> Option<usize> {
    if term.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - term.len()).find(|&i| &haystack[i..i + term.len()] == term)
}
