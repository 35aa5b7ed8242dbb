//! Common types and traits shared across `GeoETL` import crates.
//!
//! This crate provides the core abstractions that are shared between
//! `geoetl-core`, the stream codec and the source implementations, preventing
//! circular dependencies.

pub mod io;
pub mod raster;
pub mod store;
pub mod vector;

// Re-export commonly used types
pub use io::{
    CoordinateTransform, FeatureIter, FeatureSource, RasterSource, StoreCopier, TransformFactory,
};
pub use raster::{ConversionError, Extent, OutputType, PixelType, RasterBlock, RasterData};
pub use store::{ObjectKind, StoreObject};
pub use vector::{AttributeValue, Crs, Feature, Field, FieldType, GeometryKind};
