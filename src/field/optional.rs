//! Optional fields
//!
//! Wraps another field with a presence tri-state. A missing field
//! serializes to nothing; a tentative field decides its presence from
//! the remaining input on read and behaves as present on write.

use crate::error::Result;
use crate::field::Field;
use crate::io::{ByteWriter, SliceReader};

/// Presence state of an [`OptionalField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The field exists on the wire.
    Present,
    /// The field does not exist on the wire.
    Missing,
    /// Presence is decided from remaining input on read.
    Tentative,
}

/// Field that may or may not exist on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalField<F: Field> {
    inner: F,
    presence: Presence,
}

impl<F: Field> OptionalField<F> {
    /// Wrap `inner`, initially missing.
    pub fn missing(inner: F) -> Self {
        Self {
            inner,
            presence: Presence::Missing,
        }
    }

    /// Wrap `inner`, initially present.
    pub fn present(inner: F) -> Self {
        Self {
            inner,
            presence: Presence::Present,
        }
    }

    /// Wrap `inner` in the tentative state.
    pub fn tentative(inner: F) -> Self {
        Self {
            inner,
            presence: Presence::Tentative,
        }
    }

    /// Current presence state.
    #[inline]
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// Change the presence state.
    #[inline]
    pub fn set_presence(&mut self, presence: Presence) {
        self.presence = presence;
    }

    /// Whether the field currently exists (tentative counts as
    /// existing, matching its write behavior).
    #[inline]
    pub fn exists(&self) -> bool {
        !matches!(self.presence, Presence::Missing)
    }

    /// The wrapped field.
    #[inline]
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Mutable access to the wrapped field.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.inner
    }
}

impl<F: Field> Field for OptionalField<F> {
    fn length(&self) -> usize {
        if self.exists() {
            self.inner.length()
        } else {
            0
        }
    }

    fn min_length(&self) -> usize {
        0
    }

    fn max_length(&self) -> usize {
        self.inner.max_length()
    }

    fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
        match self.presence {
            Presence::Missing => Ok(()),
            Presence::Present => self.inner.read(r, size),
            Presence::Tentative => {
                if size.min(r.remaining()) >= self.inner.min_length() {
                    self.presence = Presence::Present;
                    self.inner.read(r, size)
                } else {
                    self.presence = Presence::Missing;
                    Ok(())
                }
            }
        }
    }

    fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
        if self.exists() {
            self.inner.write(w, size)
        } else {
            Ok(())
        }
    }

    fn valid(&self) -> bool {
        !self.exists() || self.inner.valid()
    }

    fn refresh(&mut self) -> bool {
        if self.exists() {
            self.inner.refresh()
        } else {
            false
        }
    }
}
