//! Stream headers written before any record.

use geoetl_core_common::{Extent, Field, GeometryKind, OutputType};

/// Header of a raster stream: target grid and sample type.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterHeader {
    /// Spatial extent of the output map
    pub extent: Extent,
    /// Number of columns
    pub width: i32,
    /// Number of rows
    pub height: i32,
    /// Sample type of every row
    pub output_type: OutputType,
}

/// Header of a vector stream: geometry kind and attribute schema.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHeader {
    /// Declared geometry kind of the layer
    pub kind: GeometryKind,
    /// Attribute schema
    pub fields: Vec<Field>,
}
