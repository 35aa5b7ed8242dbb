//! Collaborator traits for reading source data and manipulating the store.
//!
//! Imports treat these as opaque: a raster source hands out typed blocks, a
//! feature source hands out a fresh feature iterator on every call, and a store
//! copier duplicates a map without any streaming protocol.

use anyhow::Result;
use geo_types::Geometry;

use crate::raster::{Extent, PixelType, RasterBlock};
use crate::store::StoreObject;
use crate::vector::{Crs, Feature, Field, GeometryKind};

/// Trait for reading tiled blocks from a multi-band raster.
///
/// Bands are numbered from 1.
pub trait RasterSource: Send {
    /// Returns `false` if the source failed to open.
    fn is_valid(&self) -> bool;

    /// Number of bands.
    fn band_count(&self) -> usize;

    /// Native pixel type of `band`.
    fn data_type(&self, band: usize) -> PixelType;

    /// Reads `band` resampled to a `width` x `height` grid over `extent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying data cannot be read.
    fn read_block(
        &mut self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
    ) -> Result<RasterBlock>;

    /// Human readable data source URI.
    fn uri(&self) -> String;
}

/// Boxed iterator over the features of a source.
pub type FeatureIter<'a> = Box<dyn Iterator<Item = Result<Feature>> + Send + 'a>;

/// Trait for reading features from a vector layer.
pub trait FeatureSource: Send {
    /// Returns `false` if the source failed to open.
    fn is_valid(&self) -> bool;

    /// Coordinate reference system of the geometries.
    fn crs(&self) -> Crs;

    /// Declared geometry kind of the layer.
    fn geometry_kind(&self) -> GeometryKind;

    /// Attribute schema, in the order of [`Feature::attributes`].
    fn fields(&self) -> Vec<Field>;

    /// Opens a new iterator starting at the first feature. There is no rewind;
    /// callers re-open to iterate again.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be read.
    fn features(&mut self) -> Result<FeatureIter<'_>>;

    /// Human readable data source URI.
    fn uri(&self) -> String;
}

/// Reprojects geometries in place between two coordinate reference systems.
pub trait CoordinateTransform: Send + Sync {
    /// Transforms every coordinate of `geometry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate cannot be projected.
    fn transform(&self, geometry: &mut Geometry<f64>) -> Result<()>;
}

/// Creates transforms for pairs of coordinate reference systems.
pub trait TransformFactory: Send + Sync {
    /// Transform from `source` to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair is not supported.
    fn create(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>>;
}

/// Copies a map directly inside the store.
pub trait StoreCopier: Send + Sync {
    /// Copies `source` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be performed.
    fn copy_object(&self, source: &StoreObject, destination: &StoreObject) -> Result<()>;
}
