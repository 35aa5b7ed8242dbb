//! Big-endian record encoder.
//!
//! Records are assembled in memory and handed out whole with
//! [`Encoder::split`], so a writer never leaves half a record in a pipe.

use bytes::{BufMut, Bytes, BytesMut};
use geo_types::Geometry;
use geozero::{CoordDimensions, ToWkb};

use geoetl_core_common::{AttributeValue, Extent, Feature, Field};

use crate::error::EncodeError;
use crate::frame::{RasterHeader, VectorHeader};

/// Result type for encoding.
pub type Result<T> = std::result::Result<T, EncodeError>;

fn length_prefix(what: &'static str, len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| EncodeError::TooLarge { what, len })
}

/// Accumulates encoded items in a reusable buffer.
///
/// # Examples
///
/// ```
/// use geoetl_stream::{Decoder, Encoder};
///
/// let mut encoder = Encoder::new();
/// encoder.put_i32(7).put_bool(true);
/// let bytes = encoder.split();
/// assert_eq!(&bytes[..], &[0, 0, 0, 7, 1]);
///
/// let mut decoder = Decoder::new(&bytes);
/// assert_eq!(decoder.get_i32().unwrap(), 7);
/// assert!(decoder.get_bool().unwrap());
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes waiting to be split off.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been encoded since the last split.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Takes everything encoded so far, leaving the encoder empty.
    pub fn split(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Encodes a bool as one byte.
    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    /// Encodes a 32-bit integer.
    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    /// Encodes a 64-bit integer.
    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.put_i64(value);
        self
    }

    /// Encodes an IEEE-754 double.
    pub fn put_f64(&mut self, value: f64) -> &mut Self {
        self.buf.put_f64(value);
        self
    }

    /// Encodes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] if the string is longer than `i32::MAX` bytes.
    pub fn put_str(&mut self, value: &str) -> Result<&mut Self> {
        let len = length_prefix("string", value.len())?;
        self.buf.put_i32(len);
        self.buf.put_slice(value.as_bytes());
        Ok(self)
    }

    /// Encodes a length-prefixed byte block.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] if the block is longer than `i32::MAX` bytes.
    pub fn put_block(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let len = length_prefix("byte block", bytes.len())?;
        self.buf.put_i32(len);
        self.buf.put_slice(bytes);
        Ok(self)
    }

    /// Encodes an extent as xmin, ymin, xmax, ymax.
    pub fn put_extent(&mut self, extent: &Extent) -> &mut Self {
        self.put_f64(extent.xmin)
            .put_f64(extent.ymin)
            .put_f64(extent.xmax)
            .put_f64(extent.ymax)
    }

    /// Encodes an attribute schema.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] for oversized names or schemas.
    pub fn put_fields(&mut self, fields: &[Field]) -> Result<&mut Self> {
        self.put_i32(length_prefix("field schema", fields.len())?);
        for field in fields {
            self.put_str(&field.name)?
                .put_i32(field.field_type.tag())
                .put_i32(field.length)
                .put_i32(field.precision);
        }
        Ok(self)
    }

    /// Encodes a tagged attribute value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] for oversized strings.
    pub fn put_attribute(&mut self, value: &AttributeValue) -> Result<&mut Self> {
        self.put_i32(value.tag());
        match value {
            AttributeValue::Null => {},
            AttributeValue::Bool(v) => {
                self.put_bool(*v);
            },
            AttributeValue::Int32(v) => {
                self.put_i32(*v);
            },
            AttributeValue::Int64(v) => {
                self.put_i64(*v);
            },
            AttributeValue::Float64(v) => {
                self.put_f64(*v);
            },
            AttributeValue::String(v) => {
                self.put_str(v)?;
            },
        }
        Ok(self)
    }

    /// Encodes an optional geometry as a WKB byte block.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Geometry`] if the geometry cannot be written as WKB.
    pub fn put_geometry(&mut self, geometry: Option<&Geometry<f64>>) -> Result<&mut Self> {
        match geometry {
            Some(geometry) => {
                let wkb = geometry.to_wkb(CoordDimensions::xy())?;
                self.put_block(&wkb)
            },
            None => self.put_block(&[]),
        }
    }

    /// Encodes a feature: id, attributes, geometry, validity.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute or the geometry cannot be encoded.
    pub fn put_feature(&mut self, feature: &Feature) -> Result<&mut Self> {
        self.put_i64(feature.id);
        self.put_i32(length_prefix("attribute list", feature.attributes.len())?);
        for value in &feature.attributes {
            self.put_attribute(value)?;
        }
        self.put_geometry(feature.geometry.as_ref())?;
        Ok(self.put_bool(feature.valid))
    }

    /// Encodes a raster stream header.
    pub fn put_raster_header(&mut self, header: &RasterHeader) -> &mut Self {
        self.put_extent(&header.extent)
            .put_i32(header.width)
            .put_i32(header.height)
            .put_i32(header.output_type.tag())
    }

    /// Encodes a vector stream header.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] for oversized schemas.
    pub fn put_vector_header(&mut self, header: &VectorHeader) -> Result<&mut Self> {
        self.put_i32(header.kind.wkb_code());
        self.put_fields(&header.fields)
    }

    /// Encodes a cancel record telling the module to stop.
    pub fn put_cancel(&mut self) -> &mut Self {
        self.put_bool(true)
    }

    /// Encodes a raster row record: `false` followed by the row bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] for oversized rows.
    pub fn put_row(&mut self, row: &[u8]) -> Result<&mut Self> {
        self.put_bool(false);
        self.put_block(row)
    }

    /// Encodes a feature record: `false` followed by the feature.
    ///
    /// # Errors
    ///
    /// Returns an error if the feature cannot be encoded.
    pub fn put_feature_record(&mut self, feature: &Feature) -> Result<&mut Self> {
        self.put_bool(false);
        self.put_feature(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoetl_core_common::{FieldType, GeometryKind, OutputType};

    #[test]
    fn test_primitives_are_big_endian() {
        let mut encoder = Encoder::new();
        encoder.put_i32(1).put_i64(-2).put_bool(false);
        let bytes = encoder.split();
        assert_eq!(
            &bytes[..],
            &[0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0]
        );
        assert!(encoder.is_empty());
    }

    #[test]
    fn test_f64_exact_bits() {
        let mut encoder = Encoder::new();
        encoder.put_f64(0.1);
        assert_eq!(&encoder.split()[..], &0.1f64.to_be_bytes());
    }

    #[test]
    fn test_block_is_length_prefixed() {
        let mut encoder = Encoder::new();
        encoder.put_block(&[9, 8, 7]).unwrap();
        assert_eq!(&encoder.split()[..], &[0, 0, 0, 3, 9, 8, 7]);
    }

    #[test]
    fn test_raster_header_layout() {
        let header = RasterHeader {
            extent: Extent::new(0.0, 1.0, 2.0, 3.0),
            width: 100,
            height: 50,
            output_type: OutputType::Float32,
        };
        let mut encoder = Encoder::new();
        encoder.put_raster_header(&header);
        let bytes = encoder.split();
        assert_eq!(bytes.len(), 4 * 8 + 3 * 4);
        assert_eq!(&bytes[8..16], &1.0f64.to_be_bytes());
        assert_eq!(&bytes[32..36], &100i32.to_be_bytes());
        assert_eq!(&bytes[40..44], &6i32.to_be_bytes());
    }

    #[test]
    fn test_vector_header_layout() {
        let header = VectorHeader {
            kind: GeometryKind::Polygon,
            fields: vec![Field::new("id", FieldType::Int64)],
        };
        let mut encoder = Encoder::new();
        encoder.put_vector_header(&header).unwrap();
        let bytes = encoder.split();
        // kind, count, name len, "id", type, length, precision
        assert_eq!(bytes.len(), 4 + 4 + 4 + 2 + 4 + 4 + 4);
        assert_eq!(&bytes[0..4], &3i32.to_be_bytes());
        assert_eq!(&bytes[12..14], b"id");
    }

    #[test]
    fn test_sentinel_feature_layout() {
        let mut encoder = Encoder::new();
        encoder.put_feature_record(&Feature::invalid()).unwrap();
        let bytes = encoder.split();
        // cancel flag, id, attribute count, empty geometry block, valid flag
        assert_eq!(bytes.len(), 1 + 8 + 4 + 4 + 1);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[bytes.len() - 1], 0);
    }

    #[test]
    fn test_cancel_is_single_true_byte() {
        let mut encoder = Encoder::new();
        encoder.put_cancel();
        assert_eq!(&encoder.split()[..], &[1]);
    }
}
