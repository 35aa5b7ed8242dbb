//! Vector import: a feature layer streamed into one `v.in.stream` process.
//!
//! Polygon layers are sent twice. The module builds boundaries from the first
//! pass and attaches centroids and attributes from the second, so the source
//! iterator is re-opened for every pass.

use geoetl_core_common::{
    CoordinateTransform, Crs, Feature, FeatureSource, StoreObject, TransformFactory,
};
use geoetl_stream::{Encoder, VectorHeader};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::{ImportConfig, VECTOR_MODULE};
use crate::crs::{BuiltinTransforms, location_crs};
use crate::error::{ImportError, Result};
use crate::process::{self, ModuleProcess};

/// Streams a feature layer into a store vector map.
pub struct VectorImport {
    source: Box<dyn FeatureSource>,
    object: StoreObject,
    transforms: Box<dyn TransformFactory>,
    target_crs: Option<Crs>,
}

impl VectorImport {
    /// Imports `source` into `object`, reprojecting to the location CRS with
    /// the built-in transforms.
    #[must_use]
    pub fn new(source: Box<dyn FeatureSource>, object: StoreObject) -> Self {
        Self {
            source,
            object,
            transforms: Box::new(BuiltinTransforms),
            target_crs: None,
        }
    }

    /// Uses `transforms` to build the reprojection.
    #[must_use]
    pub fn with_transforms(mut self, transforms: Box<dyn TransformFactory>) -> Self {
        self.transforms = transforms;
        self
    }

    /// Overrides the target CRS instead of reading it from the location.
    #[must_use]
    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = Some(crs);
        self
    }

    /// Target descriptor.
    #[must_use]
    pub fn object(&self) -> &StoreObject {
        &self.object
    }

    /// Name of the map this import creates.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        vec![self.object.name().to_string()]
    }

    /// Source URI.
    #[must_use]
    pub fn src_description(&self) -> String {
        self.source.uri()
    }

    fn transform(&self) -> Result<Option<Box<dyn CoordinateTransform>>> {
        let source_crs = self.source.crs();
        let target_crs = self
            .target_crs
            .clone()
            .unwrap_or_else(|| location_crs(&self.object));
        if !source_crs.is_valid() || !target_crs.is_valid() || source_crs == target_crs {
            debug!("No reprojection: source {source_crs}, target {target_crs}");
            return Ok(None);
        }
        debug!("Reprojecting from {source_crs} to {target_crs}");
        self.transforms
            .create(&source_crs, &target_crs)
            .map(Some)
            .map_err(|e| {
                ImportError::Precondition(format!(
                    "Cannot transform from {source_crs} to {target_crs}: {e:#}"
                ))
            })
    }

    pub(crate) async fn run(&mut self, config: &ImportConfig, cancel: &CancellationToken) -> Result<()> {
        if !self.source.is_valid() {
            return Err(ImportError::Precondition(format!(
                "Vector source '{}' is not valid",
                self.source.uri()
            )));
        }
        let transform = self.transform()?;
        let header = VectorHeader {
            kind: self.source.geometry_kind(),
            fields: self.source.fields(),
        };
        let passes = if header.kind.is_polygon() { 2 } else { 1 };

        let mut process = ModuleProcess::start(
            config,
            VECTOR_MODULE,
            &self.object,
            &[format!("output={}", self.object.name())],
        )?;
        let streamed = stream_features(
            self.source.as_mut(),
            &mut process,
            &header,
            passes,
            transform.as_deref(),
            cancel,
        )
        .await;
        if streamed.is_ok() {
            match process.read_ack(config.vector_timeout).await {
                Some(true) => debug!("Module acknowledged the import"),
                Some(false) => warn!("Module reported a failed import"),
                None => warn!("Module did not acknowledge the import"),
            }
        }
        process::complete(process, streamed, config.vector_timeout).await?;

        if cancel.is_cancelled() {
            warn!("Vector import of {} canceled", self.source.uri());
        } else {
            info!("Imported {} as '{}'", self.source.uri(), self.object.name());
        }
        Ok(())
    }
}

async fn stream_features(
    source: &mut dyn FeatureSource,
    process: &mut ModuleProcess,
    header: &VectorHeader,
    passes: usize,
    transform: Option<&dyn CoordinateTransform>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut encoder = Encoder::new();
    encoder.put_vector_header(header)?;
    process.write(&encoder.split()).await?;

    for pass in 1..=passes {
        let mut sent = 0usize;
        let mut skipped = 0usize;
        for feature in source.features()? {
            let mut feature = feature?;
            if !feature.is_valid() {
                skipped += 1;
                continue;
            }
            if let (Some(transform), Some(geometry)) = (transform, feature.geometry.as_mut()) {
                transform
                    .transform(geometry)
                    .map_err(|e| ImportError::Transform {
                        feature_id: feature.id,
                        message: format!("{e:#}"),
                    })?;
            }
            if cancel.is_cancelled() {
                debug!("Pass {pass} canceled after {sent} features");
                encoder.put_cancel();
                process.write(&encoder.split()).await?;
                break;
            }
            encoder.put_feature_record(&feature)?;
            process.write(&encoder.split()).await?;
            sent += 1;
        }
        encoder.put_feature_record(&Feature::invalid())?;
        process.write(&encoder.split()).await?;
        debug!("Pass {pass}/{passes}: {sent} features sent, {skipped} skipped");
    }
    Ok(())
}
