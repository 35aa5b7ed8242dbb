//! Binary stream codec between `GeoETL` imports and external import modules.
//!
//! Everything an import writes to a module's standard input goes through
//! [`Encoder`]; the [`Decoder`] is the reference reader used by tests and by
//! tooling that inspects captured streams.
//!
//! # Wire format
//!
//! All integers and doubles are big-endian.
//!
//! | Item | Encoding |
//! |---|---|
//! | bool | one byte, `0` or `1` |
//! | i32 / i64 / f64 | 4 / 8 / 8 bytes |
//! | string | i32 byte length + UTF-8 |
//! | byte block | i32 length + bytes |
//! | extent | xmin, ymin, xmax, ymax as f64 |
//! | field schema | i32 count, then name, type tag, length, precision per field |
//! | attribute | i32 tag + payload |
//! | geometry | byte block holding 2D WKB, empty when the feature has none |
//! | feature | id (i64), attributes (i32 count + values), geometry, valid (bool) |
//!
//! Raster streams start with a [`RasterHeader`] and continue with one record per
//! row: a cancel flag, then (if not cancelled) the row bytes as a byte block.
//! Vector streams start with a [`VectorHeader`] and continue with one record per
//! feature: a cancel flag, then (if not cancelled) the feature. Each pass over
//! the source ends with a non-cancelled invalid feature.

pub mod decode;
pub mod encode;
pub mod error;
pub mod frame;

pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{DecodeError, EncodeError};
pub use frame::{RasterHeader, VectorHeader};
