//! wirestack: a compositional framework for binary wire protocols
//!
//! The crate separates a protocol into three cooperating parts:
//!
//! - **Field codecs** ([`field`]): value-semantic objects serializing
//!   one typed piece of wire data under an explicit [`Endian`] —
//!   integers (fixed or variable width, offsets, validity ranges),
//!   enums, floats, arrays, strings, tuples, tagged unions, packed
//!   bitfields, and optionals.
//! - **Messages** ([`message`]): named field collections identified by
//!   an id, with capabilities (read, write, length, validity, refresh,
//!   visitor dispatch) split into one trait each.
//! - **Layer stack** ([`layer`]): composable framing layers
//!   (sync prefix, size, message id, checksum) nested around a payload
//!   layer, sharing one read/write/update contract.
//!
//! A typical frame produced by a `Sync + Size + MsgId + Payload` stack:
//!
//! ```text
//! +-------------+------------+-----------+-------------------+
//! | Sync prefix | Size       | MsgId     | Body (Size bytes  |
//! | (constant)  | (of inner) |           | minus id)         |
//! +-------------+------------+-----------+-------------------+
//! ```
//!
//! Writes into a push-back destination ([`VecWriter`]) cannot patch
//! the size or checksum slots after the fact; they return
//! [`WriteOutcome::UpdateRequired`] and the buffer is finalized by the
//! stack's `update` pass through a random-access [`SliceWriter`].
//!
//! # Example
//!
//! ```rust
//! use wirestack::{Endian, Field, IntField, SliceReader, SliceWriter};
//!
//! let mut seq = IntField::<u16>::new(Endian::Big);
//! seq.set_value(7);
//!
//! let mut buf = [0u8; 2];
//! let mut w = SliceWriter::new(&mut buf);
//! seq.write(&mut w, 2)?;
//! assert_eq!(buf, [0x00, 0x07]);
//!
//! let mut decoded = IntField::<u16>::new(Endian::Big);
//! let mut r = SliceReader::new(&buf);
//! decoded.read(&mut r, 2)?;
//! assert_eq!(decoded.value(), 7);
//! # Ok::<(), wirestack::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod alloc;
pub mod checksum;
pub mod error;
pub mod field;
pub mod io;
pub mod layer;
pub mod message;
pub mod varint;

pub use alloc::{AllocPolicy, MsgPtr, PoolState, MAX_POOL_KINDS};
pub use checksum::{Checksum, Crc32c, SumOfBytes, XorSum};
pub use error::{Error, Result, WriteOutcome};
pub use field::{
    Alternatives, ArrayField, BitMembers, Bitfield, BitsField, CountUnit, EnumField, Field,
    FloatField, IntField, IntWidth, OptionalField, Presence, StringField, VariantField, WireEnum,
    WireFloat, WireInt,
};
pub use io::{ByteWriter, Endian, SliceReader, SliceWriter, VecWriter};
pub use layer::{
    ChecksumLayer, Layer, MsgIdLayer, PayloadLayer, Registry, SizeLayer, SyncPrefixLayer,
};
pub use message::{
    Dispatch, Handler, IdInfo, LengthInfo, MsgId, ProtoMsg, ReadMsg, Refresh, ValidCheck, WriteMsg,
};
