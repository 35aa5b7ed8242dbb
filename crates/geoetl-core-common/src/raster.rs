//! Raster pixel types, blocks and extents.
//!
//! Sources hand out [`RasterBlock`]s holding typed samples in their native
//! [`PixelType`]. Before a block goes on the wire it is converted to one of the
//! three [`OutputType`]s an import module understands, and its rows are
//! serialized as big-endian samples.

use std::fmt;

use thiserror::Error;

/// Axis-aligned spatial extent in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Minimum x (west edge)
    pub xmin: f64,
    /// Minimum y (south edge)
    pub ymin: f64,
    /// Maximum x (east edge)
    pub xmax: f64,
    /// Maximum y (north edge)
    pub ymax: f64,
}

impl Extent {
    /// Creates an extent from its four bounds.
    #[must_use]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Width in map units.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Height in map units.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Returns `true` if the extent covers no area (or contains NaN bounds).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.xmax > self.xmin && self.ymax > self.ymin)
    }

    /// Sub-extent covering `rows` grid rows starting at row `top` of a grid with
    /// `total_rows` rows laid over this extent. Rows are counted from the north edge.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn row_band(&self, top: usize, rows: usize, total_rows: usize) -> Self {
        let cell = self.height() / total_rows as f64;
        let bottom = top + rows;
        Self {
            xmin: self.xmin,
            xmax: self.xmax,
            ymax: self.ymax - top as f64 * cell,
            ymin: if bottom >= total_rows {
                self.ymin
            } else {
                self.ymax - bottom as f64 * cell
            },
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} : {},{}",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Native pixel type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    /// Unsigned 8-bit integer
    Byte,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 32-bit integer
    Int32,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Complex signed 16-bit integer
    CInt16,
    /// Complex signed 32-bit integer
    CInt32,
    /// Complex 32-bit float
    CFloat32,
    /// Complex 64-bit float
    CFloat64,
    /// Packed colour, 8 bits per channel
    Argb32,
    /// Packed colour with premultiplied alpha
    Argb32Premultiplied,
    /// Type could not be determined
    Unknown,
}

impl PixelType {
    /// Name used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelType::Byte => "Byte",
            PixelType::UInt16 => "UInt16",
            PixelType::Int16 => "Int16",
            PixelType::UInt32 => "UInt32",
            PixelType::Int32 => "Int32",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
            PixelType::CInt16 => "CInt16",
            PixelType::CInt32 => "CInt32",
            PixelType::CFloat32 => "CFloat32",
            PixelType::CFloat64 => "CFloat64",
            PixelType::Argb32 => "ARGB32",
            PixelType::Argb32Premultiplied => "ARGB32_Premultiplied",
            PixelType::Unknown => "Unknown",
        }
    }

    /// Output type this pixel type is streamed as, or `None` when the type
    /// cannot be represented by an import module (complex and unknown types).
    #[must_use]
    pub fn output_type(&self) -> Option<OutputType> {
        match self {
            PixelType::Byte
            | PixelType::UInt16
            | PixelType::Int16
            | PixelType::UInt32
            | PixelType::Int32
            | PixelType::Argb32
            | PixelType::Argb32Premultiplied => Some(OutputType::Int32),
            PixelType::Float32 => Some(OutputType::Float32),
            PixelType::Float64 => Some(OutputType::Float64),
            PixelType::CInt16
            | PixelType::CInt32
            | PixelType::CFloat32
            | PixelType::CFloat64
            | PixelType::Unknown => None,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample type written to an import module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    /// Signed 32-bit integer (CELL)
    Int32,
    /// 32-bit float (FCELL)
    Float32,
    /// 64-bit float (DCELL)
    Float64,
}

impl OutputType {
    /// Wire tag of the output type.
    #[must_use]
    pub const fn tag(&self) -> i32 {
        match self {
            OutputType::Int32 => 5,
            OutputType::Float32 => 6,
            OutputType::Float64 => 7,
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            5 => Some(OutputType::Int32),
            6 => Some(OutputType::Float32),
            7 => Some(OutputType::Float64),
            _ => None,
        }
    }

    /// Size of one sample in bytes.
    #[must_use]
    pub const fn sample_size(&self) -> usize {
        match self {
            OutputType::Int32 | OutputType::Float32 => 4,
            OutputType::Float64 => 8,
        }
    }

    /// Pixel type holding samples of this output type.
    #[must_use]
    pub const fn pixel_type(&self) -> PixelType {
        match self {
            OutputType::Int32 => PixelType::Int32,
            OutputType::Float32 => PixelType::Float32,
            OutputType::Float64 => PixelType::Float64,
        }
    }
}

/// Errors converting a block between pixel types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The conversion is not defined for this pair of types.
    #[error("Cannot convert data type {from} to {to}")]
    Unsupported {
        /// Source pixel type
        from: PixelType,
        /// Target pixel type
        to: PixelType,
    },

    /// Block size does not match its sample buffer.
    #[error("Block of {width}x{height} holds {len} samples")]
    SizeMismatch {
        /// Block width
        width: usize,
        /// Block height
        height: usize,
        /// Number of samples actually held
        len: usize,
    },

    /// Requested row lies outside the block.
    #[error("Row {row} is outside a block of height {height}")]
    RowOutOfBounds {
        /// Requested row
        row: usize,
        /// Block height
        height: usize,
    },
}

/// Typed sample buffer, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    /// Unsigned 8-bit samples
    Byte(Vec<u8>),
    /// Unsigned 16-bit samples
    UInt16(Vec<u16>),
    /// Signed 16-bit samples
    Int16(Vec<i16>),
    /// Unsigned 32-bit samples
    UInt32(Vec<u32>),
    /// Signed 32-bit samples
    Int32(Vec<i32>),
    /// 32-bit float samples
    Float32(Vec<f32>),
    /// 64-bit float samples
    Float64(Vec<f64>),
    /// Packed ARGB colours
    Argb32(Vec<u32>),
}

impl RasterData {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RasterData::Byte(v) => v.len(),
            RasterData::UInt16(v) => v.len(),
            RasterData::Int16(v) => v.len(),
            RasterData::UInt32(v) | RasterData::Argb32(v) => v.len(),
            RasterData::Int32(v) => v.len(),
            RasterData::Float32(v) => v.len(),
            RasterData::Float64(v) => v.len(),
        }
    }

    /// Returns `true` when the buffer holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel type of the samples.
    #[must_use]
    pub fn pixel_type(&self) -> PixelType {
        match self {
            RasterData::Byte(_) => PixelType::Byte,
            RasterData::UInt16(_) => PixelType::UInt16,
            RasterData::Int16(_) => PixelType::Int16,
            RasterData::UInt32(_) => PixelType::UInt32,
            RasterData::Int32(_) => PixelType::Int32,
            RasterData::Float32(_) => PixelType::Float32,
            RasterData::Float64(_) => PixelType::Float64,
            RasterData::Argb32(_) => PixelType::Argb32,
        }
    }

    fn to_int32(&self) -> Result<Vec<i32>, ConversionError> {
        let from = self.pixel_type();
        match self {
            RasterData::Byte(v) => Ok(v.iter().map(|&s| i32::from(s)).collect()),
            RasterData::UInt16(v) => Ok(v.iter().map(|&s| i32::from(s)).collect()),
            RasterData::Int16(v) => Ok(v.iter().map(|&s| i32::from(s)).collect()),
            RasterData::Int32(v) => Ok(v.clone()),
            // high UInt32 values wrap to negatives; packed colour keeps its bits
            RasterData::UInt32(v) | RasterData::Argb32(v) => Ok(v
                .iter()
                .map(|&s| i32::from_ne_bytes(s.to_ne_bytes()))
                .collect()),
            RasterData::Float32(_) | RasterData::Float64(_) => Err(ConversionError::Unsupported {
                from,
                to: PixelType::Int32,
            }),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn to_float32(&self) -> Result<Vec<f32>, ConversionError> {
        match self {
            RasterData::Byte(v) => Ok(v.iter().map(|&s| f32::from(s)).collect()),
            RasterData::UInt16(v) => Ok(v.iter().map(|&s| f32::from(s)).collect()),
            RasterData::Int16(v) => Ok(v.iter().map(|&s| f32::from(s)).collect()),
            RasterData::UInt32(v) => Ok(v.iter().map(|&s| s as f32).collect()),
            RasterData::Int32(v) => Ok(v.iter().map(|&s| s as f32).collect()),
            RasterData::Float32(v) => Ok(v.clone()),
            RasterData::Float64(v) => Ok(v.iter().map(|&s| s as f32).collect()),
            RasterData::Argb32(_) => Err(ConversionError::Unsupported {
                from: PixelType::Argb32,
                to: PixelType::Float32,
            }),
        }
    }

    fn to_float64(&self) -> Result<Vec<f64>, ConversionError> {
        match self {
            RasterData::Byte(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::UInt16(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::Int16(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::UInt32(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::Int32(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::Float32(v) => Ok(v.iter().map(|&s| f64::from(s)).collect()),
            RasterData::Float64(v) => Ok(v.clone()),
            RasterData::Argb32(_) => Err(ConversionError::Unsupported {
                from: PixelType::Argb32,
                to: PixelType::Float64,
            }),
        }
    }
}

fn be_bytes<T: Copy, const N: usize>(
    samples: &[T],
    to_bytes: impl Fn(T) -> [u8; N],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * N);
    for &sample in samples {
        out.extend_from_slice(&to_bytes(sample));
    }
    out
}

/// A rectangular block of samples read from one band of a raster source.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBlock {
    width: usize,
    height: usize,
    data: RasterData,
}

impl RasterBlock {
    /// Creates a block, checking that `data` holds exactly `width * height` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::SizeMismatch`] if the buffer length is wrong.
    pub fn new(width: usize, height: usize, data: RasterData) -> Result<Self, ConversionError> {
        if data.len() != width * height {
            return Err(ConversionError::SizeMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Block width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Block height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample buffer.
    #[must_use]
    pub fn data(&self) -> &RasterData {
        &self.data
    }

    /// Pixel type of the samples.
    #[must_use]
    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    /// Converts the block to `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if a sample does not fit the target type or
    /// the conversion is not defined.
    pub fn convert(&self, target: OutputType) -> Result<Self, ConversionError> {
        let data = match target {
            OutputType::Int32 => RasterData::Int32(self.data.to_int32()?),
            OutputType::Float32 => RasterData::Float32(self.data.to_float32()?),
            OutputType::Float64 => RasterData::Float64(self.data.to_float64()?),
        };
        Ok(Self {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Big-endian bytes of one row.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::RowOutOfBounds`] if `row >= height`.
    pub fn row_bytes(&self, row: usize) -> Result<Vec<u8>, ConversionError> {
        if row >= self.height {
            return Err(ConversionError::RowOutOfBounds {
                row,
                height: self.height,
            });
        }
        let range = row * self.width..(row + 1) * self.width;
        let bytes = match &self.data {
            RasterData::Byte(v) => v[range].to_vec(),
            RasterData::UInt16(v) => be_bytes(&v[range], u16::to_be_bytes),
            RasterData::Int16(v) => be_bytes(&v[range], i16::to_be_bytes),
            RasterData::UInt32(v) | RasterData::Argb32(v) => be_bytes(&v[range], u32::to_be_bytes),
            RasterData::Int32(v) => be_bytes(&v[range], i32::to_be_bytes),
            RasterData::Float32(v) => be_bytes(&v[range], f32::to_be_bytes),
            RasterData::Float64(v) => be_bytes(&v[range], f64::to_be_bytes),
        };
        Ok(bytes)
    }
}
