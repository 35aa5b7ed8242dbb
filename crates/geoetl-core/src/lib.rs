//! `geoetl-core` streams geospatial data into a GRASS-style store through
//! external import modules.
//!
//! This crate includes:
//! - **Import Worker**: runs one raster, vector or copy strategy and reports
//!   success or an error message, optionally as a background tokio task.
//! - **Raster Import**: every band resampled, converted and written row by row
//!   to its own `r.in.stream` process.
//! - **Vector Import**: features reprojected to the location CRS and written to
//!   `v.in.stream`, twice for polygon layers.
//! - **Object Copy**: direct map copies between mapsets.
//!
//! The wire format is defined by the `geoetl-stream` crate; source traits and
//! shared types come from `geoetl-core-common`.
//!
//! # Example
//!
//! ```no_run
//! use geoetl_core::{ImportConfig, ImportWorker, ObjectCopy};
//! use geoetl_core_common::{ObjectKind, StoreObject};
//!
//! # async fn run() {
//! let source = StoreObject::new("/data/grass", "world", "PERMANENT", "dem", ObjectKind::Raster);
//! let copy = ObjectCopy::new(source.clone(), source.with_name("dem_backup"));
//! let mut worker = ImportWorker::new(copy, ImportConfig::from_env());
//! if !worker.import().await {
//!     eprintln!("{}", worker.error().unwrap_or_default());
//! }
//! # }
//! ```

pub mod config;
pub mod copy;
pub mod crs;
pub mod error;
mod process;
pub mod raster;
pub mod vector;
pub mod worker;

pub use config::ImportConfig;
pub use copy::{MapsetCopier, ObjectCopy};
pub use crs::{BuiltinTransforms, WebMercator, location_crs};
pub use error::{ConfigError, ImportError, Result};
pub use raster::RasterImport;
pub use vector::VectorImport;
pub use worker::{ImportFinished, ImportId, ImportState, ImportTask, ImportWorker, Strategy};
