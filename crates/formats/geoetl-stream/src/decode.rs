//! Reference decoder for the import stream.

use bytes::Buf;
use geo_types::Geometry;
use geozero::ToGeo;
use geozero::wkb::Wkb;

use geoetl_core_common::{
    AttributeValue, Extent, Feature, Field, FieldType, GeometryKind, OutputType,
};

use crate::error::DecodeError;
use crate::frame::{RasterHeader, VectorHeader};

/// Result type for decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Reads items off a byte slice in stream order.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes left to decode.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Returns `true` once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, what: &'static str, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                what,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn get_len(&mut self, what: &'static str) -> Result<usize> {
        let len = self.get_i32()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::NegativeLength { what, len })?;
        self.ensure(what, len)?;
        Ok(len)
    }

    /// Decodes a bool; any non-zero byte is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at end of stream.
    pub fn get_bool(&mut self) -> Result<bool> {
        self.ensure("bool", 1)?;
        Ok(self.buf.get_u8() != 0)
    }

    /// Decodes a 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at end of stream.
    pub fn get_i32(&mut self) -> Result<i32> {
        self.ensure("i32", 4)?;
        Ok(self.buf.get_i32())
    }

    /// Decodes a 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at end of stream.
    pub fn get_i64(&mut self) -> Result<i64> {
        self.ensure("i64", 8)?;
        Ok(self.buf.get_i64())
    }

    /// Decodes a double.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at end of stream.
    pub fn get_f64(&mut self) -> Result<f64> {
        self.ensure("f64", 8)?;
        Ok(self.buf.get_f64())
    }

    /// Decodes a length-prefixed string.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation, negative length or invalid UTF-8.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_len("string")?;
        let bytes = self.buf.copy_to_bytes(len);
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Decodes a length-prefixed byte block.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or negative length.
    pub fn get_block(&mut self) -> Result<Vec<u8>> {
        let len = self.get_len("byte block")?;
        Ok(self.buf.copy_to_bytes(len).to_vec())
    }

    /// Decodes an extent.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at end of stream.
    pub fn get_extent(&mut self) -> Result<Extent> {
        Ok(Extent::new(
            self.get_f64()?,
            self.get_f64()?,
            self.get_f64()?,
            self.get_f64()?,
        ))
    }

    /// Decodes an attribute schema.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or an unknown field type tag.
    pub fn get_fields(&mut self) -> Result<Vec<Field>> {
        let count = self.get_i32()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::NegativeLength {
            what: "field schema",
            len: count,
        })?;
        let mut fields = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let name = self.get_string()?;
            let tag = self.get_i32()?;
            let field_type = FieldType::from_tag(tag).ok_or(DecodeError::UnknownTag {
                what: "field type",
                tag,
            })?;
            let length = self.get_i32()?;
            let precision = self.get_i32()?;
            fields.push(Field {
                name,
                field_type,
                length,
                precision,
            });
        }
        Ok(fields)
    }

    /// Decodes a tagged attribute value.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or an unknown value tag.
    pub fn get_attribute(&mut self) -> Result<AttributeValue> {
        let tag = self.get_i32()?;
        let value = match tag {
            0 => AttributeValue::Null,
            1 => AttributeValue::Bool(self.get_bool()?),
            2 => AttributeValue::Int32(self.get_i32()?),
            3 => AttributeValue::Int64(self.get_i64()?),
            4 => AttributeValue::Float64(self.get_f64()?),
            5 => AttributeValue::String(self.get_string()?),
            _ => {
                return Err(DecodeError::UnknownTag {
                    what: "attribute",
                    tag,
                });
            },
        };
        Ok(value)
    }

    /// Decodes an optional WKB geometry.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or invalid WKB.
    pub fn get_geometry(&mut self) -> Result<Option<Geometry<f64>>> {
        let wkb = self.get_block()?;
        if wkb.is_empty() {
            return Ok(None);
        }
        Ok(Some(Wkb(wkb).to_geo()?))
    }

    /// Decodes a feature.
    ///
    /// # Errors
    ///
    /// Returns an error if any part of the feature is malformed.
    pub fn get_feature(&mut self) -> Result<Feature> {
        let id = self.get_i64()?;
        let count = self.get_i32()?;
        let count = usize::try_from(count).map_err(|_| DecodeError::NegativeLength {
            what: "attribute list",
            len: count,
        })?;
        let mut attributes = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            attributes.push(self.get_attribute()?);
        }
        let geometry = self.get_geometry()?;
        let valid = self.get_bool()?;
        Ok(Feature {
            id,
            geometry,
            attributes,
            valid,
        })
    }

    /// Decodes a raster stream header.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or an unknown output type tag.
    pub fn get_raster_header(&mut self) -> Result<RasterHeader> {
        let extent = self.get_extent()?;
        let width = self.get_i32()?;
        let height = self.get_i32()?;
        let tag = self.get_i32()?;
        let output_type = OutputType::from_tag(tag).ok_or(DecodeError::UnknownTag {
            what: "output type",
            tag,
        })?;
        Ok(RasterHeader {
            extent,
            width,
            height,
            output_type,
        })
    }

    /// Decodes a vector stream header.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation or an unknown tag.
    pub fn get_vector_header(&mut self) -> Result<VectorHeader> {
        let tag = self.get_i32()?;
        let kind = GeometryKind::from_wkb_code(tag).ok_or(DecodeError::UnknownTag {
            what: "geometry kind",
            tag,
        })?;
        let fields = self.get_fields()?;
        Ok(VectorHeader { kind, fields })
    }

    /// Decodes a raster row record. `None` means the producer cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed.
    pub fn get_row_record(&mut self) -> Result<Option<Vec<u8>>> {
        if self.get_bool()? {
            return Ok(None);
        }
        self.get_block().map(Some)
    }

    /// Decodes a feature record. `None` means the producer cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed.
    pub fn get_feature_record(&mut self) -> Result<Option<Feature>> {
        if self.get_bool()? {
            return Ok(None);
        }
        self.get_feature().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_i32() {
        let mut decoder = Decoder::new(&[0, 0, 1]);
        let err = decoder.get_i32().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                needed: 4,
                remaining: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_block_length() {
        let bytes = (-1i32).to_be_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert!(matches!(
            decoder.get_block(),
            Err(DecodeError::NegativeLength { len: -1, .. })
        ));
    }

    #[test]
    fn test_block_longer_than_stream() {
        let mut decoder = Decoder::new(&[0, 0, 0, 5, 1, 2]);
        assert!(matches!(
            decoder.get_block(),
            Err(DecodeError::Truncated { needed: 5, .. })
        ));
    }

    #[test]
    fn test_unknown_attribute_tag() {
        let bytes = 99i32.to_be_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(
            decoder.get_attribute().unwrap_err().to_string(),
            "Unknown attribute tag 99"
        );
    }

    #[test]
    fn test_cancel_record() {
        let mut decoder = Decoder::new(&[1]);
        assert_eq!(decoder.get_row_record().unwrap(), None);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_non_zero_bool_is_true() {
        let mut decoder = Decoder::new(&[0x7f]);
        assert!(decoder.get_bool().unwrap());
    }
}
