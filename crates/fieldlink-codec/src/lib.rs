//! Conversion between typed scalar/array values and raw device buffers.
//!
//! Device registers arrive as byte buffers whose layout depends on two
//! independent settings:
//! - [`Endian`]: how each element is packed (`<` / `>` in struct notation)
//! - [`WordOrder`]: how 16-bit words are permuted on the wire (ABCD, BADC, CDAB, DCBA)
//!
//! [`convert`] combines both: pack the source values, permute, and unpack as
//! the target kind.

pub mod bits;
pub mod convert;
pub mod error;
pub mod kind;
pub mod order;
pub mod pack;
pub mod value;

pub use bits::{bit, format_bytes, pack_bools, parse_hex, unpack_bools, with_bit};
pub use convert::{convert, Converted};
pub use error::{CodecError, Result};
pub use kind::ValueKind;
pub use order::{reorder_chunks, reorder_words, Endian, WordOrder};
pub use pack::{
    bytes_to_values, value_to_bytes, values_to_bytes, width_and_format, PackFormat,
};
pub use value::{TextEncoding, Value};
