//! File-backed raster and feature sources for `GeoETL` imports.
//!
//! - [`GeoJsonSource`] reads a `GeoJSON` document or a newline-delimited
//!   `GeoJSON` sequence and infers an attribute schema from the properties.
//! - [`AsciiGridSource`] reads an ESRI ASCII grid as a single-band raster.
//!
//! Both read their whole input up front; imports then iterate in memory.

mod ascii;
mod error;
mod geojson_source;

pub use ascii::AsciiGridSource;
pub use error::{SourceError, SourcePosition, SourceResult};
pub use geojson_source::GeoJsonSource;
