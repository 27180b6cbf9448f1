//! Bundles: tuples of fields laid out back to back
//!
//! A heterogeneous group of fields with no framing of its own is
//! simply a tuple; `Field` is implemented for tuples up to twelve
//! children. Children are read and written in declared order, the
//! aggregate length is the sum, and the first child failure aborts the
//! aggregate operation.

use crate::error::Result;
use crate::field::Field;
use crate::io::{ByteWriter, SliceReader};

macro_rules! impl_field_for_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Field),+> Field for ($($name,)+) {
            fn length(&self) -> usize {
                0usize $(+ self.$idx.length())+
            }

            fn min_length(&self) -> usize {
                0usize $(+ self.$idx.min_length())+
            }

            fn max_length(&self) -> usize {
                0usize $(.saturating_add(self.$idx.max_length()))+
            }

            fn read(&mut self, r: &mut SliceReader<'_>, size: usize) -> Result<()> {
                let start = r.position();
                $(
                    let used = r.position() - start;
                    self.$idx.read(r, size.saturating_sub(used))?;
                )+
                Ok(())
            }

            fn write(&self, w: &mut dyn ByteWriter, size: usize) -> Result<()> {
                let start = w.position();
                $(
                    let used = w.position() - start;
                    self.$idx.write(w, size.saturating_sub(used))?;
                )+
                Ok(())
            }

            fn valid(&self) -> bool {
                true $(&& self.$idx.valid())+
            }

            fn refresh(&mut self) -> bool {
                let mut changed = false;
                $(
                    changed |= self.$idx.refresh();
                )+
                changed
            }
        }
    };
}

impl_field_for_tuple!(A: 0);
impl_field_for_tuple!(A: 0, B: 1);
impl_field_for_tuple!(A: 0, B: 1, C: 2);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9, K: 10);
impl_field_for_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7, I: 8, J: 9, K: 10, L: 11);

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::field::{Field, IntField, StringField};
    use crate::io::{Endian, SliceReader, SliceWriter};

    fn sample() -> (IntField<u8>, IntField<u16>, StringField) {
        let mut tag = IntField::<u8>::new(Endian::Big);
        tag.set_value(0x7F);
        let mut count = IntField::<u16>::new(Endian::Big);
        count.set_value(0x0102);
        let mut name =
            StringField::prefixed(IntField::new(Endian::Big).with_width(1));
        name.set_value(*b"ab");
        (tag, count, name)
    }

    #[test]
    fn children_in_declared_order() {
        let bundle = sample();
        assert_eq!(bundle.length(), 1 + 2 + 3);

        let mut buf = vec![0u8; bundle.length()];
        {
            let buf_len = buf.len();
            let mut w = SliceWriter::new(&mut buf);
            bundle.write(&mut w, buf_len).unwrap();
        }
        assert_eq!(buf, [0x7F, 0x01, 0x02, 2, b'a', b'b']);

        let mut decoded = sample();
        decoded.0.set_value(0);
        decoded.1.set_value(0);
        decoded.2.set_value(Vec::new());

        let mut r = SliceReader::new(&buf);
        decoded.read(&mut r, buf.len()).unwrap();
        assert_eq!(decoded.0.value(), 0x7F);
        assert_eq!(decoded.1.value(), 0x0102);
        assert_eq!(decoded.2.value(), b"ab");
    }

    #[test]
    fn first_child_failure_aborts() {
        let mut bundle = sample();
        let buf = [0x7F, 0x01]; // second child starved
        let mut r = SliceReader::new(&buf);
        let err = bundle.read(&mut r, buf.len()).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData { .. }));
        // first child consumed, second rewound to its own start
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn refresh_reaches_all_children() {
        let mut bundle = sample();
        // make the string prefix stale
        bundle.2.set_value(*b"longer");
        assert!(bundle.refresh());
        assert!(!bundle.refresh());
    }
}
