//! Copying maps between mapsets of one location.
//!
//! No module and no stream are involved; the store copier does the work.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use geoetl_core_common::{ObjectKind, StoreCopier, StoreObject};
use log::{debug, info};

use crate::error::{ImportError, Result};

/// Raster map elements, one file or directory per map in each.
const RASTER_ELEMENTS: &[&str] = &["cellhd", "cell", "fcell", "cats", "colr", "hist", "cell_misc"];

/// Vector maps live in one directory per map.
const VECTOR_ELEMENTS: &[&str] = &["vector"];

fn elements(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Raster => RASTER_ELEMENTS,
        ObjectKind::Vector => VECTOR_ELEMENTS,
    }
}

/// Copies map files directly inside a mapset directory tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapsetCopier;

impl StoreCopier for MapsetCopier {
    fn copy_object(&self, source: &StoreObject, destination: &StoreObject) -> anyhow::Result<()> {
        if source.kind() != destination.kind() {
            bail!(
                "Cannot copy {} map '{}' to a {} map",
                source.kind(),
                source.name(),
                destination.kind()
            );
        }
        if !source.same_location(destination) {
            bail!(
                "Cannot copy '{}' across locations ({} to {})",
                source.name(),
                source.location_path().display(),
                destination.location_path().display()
            );
        }

        let elements = elements(source.kind());
        let source_mapset = source.mapset_path();
        let destination_mapset = destination.mapset_path();
        // the first element identifies the map
        let main = elements[0];
        if !source_mapset.join(main).join(source.name()).exists() {
            bail!(
                "{} map '{}' not found in mapset '{}'",
                source.kind(),
                source.name(),
                source.mapset()
            );
        }
        if destination_mapset.join(main).join(destination.name()).exists() {
            bail!(
                "{} map '{}' already exists in mapset '{}'",
                destination.kind(),
                destination.name(),
                destination.mapset()
            );
        }

        for element in elements {
            let from = source_mapset.join(element).join(source.name());
            if !from.exists() {
                continue;
            }
            let to = destination_mapset.join(element).join(destination.name());
            debug!("Copying {} to {}", from.display(), to.display());
            copy_path(&from, &to)
                .with_context(|| format!("Cannot copy {} to {}", from.display(), to.display()))?;
        }
        Ok(())
    }
}

fn copy_path(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_path(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
    }
    Ok(())
}

/// Copies a store map to another mapset or name.
pub struct ObjectCopy {
    source: StoreObject,
    destination: StoreObject,
    copier: Arc<dyn StoreCopier>,
}

impl ObjectCopy {
    /// Copies `source` to `destination` with a [`MapsetCopier`].
    #[must_use]
    pub fn new(source: StoreObject, destination: StoreObject) -> Self {
        Self {
            source,
            destination,
            copier: Arc::new(MapsetCopier),
        }
    }

    /// Uses `copier` instead of the filesystem copier.
    #[must_use]
    pub fn with_copier(mut self, copier: Box<dyn StoreCopier>) -> Self {
        self.copier = Arc::from(copier);
        self
    }

    /// Destination descriptor.
    #[must_use]
    pub fn object(&self) -> &StoreObject {
        &self.destination
    }

    /// Source descriptor.
    #[must_use]
    pub fn source(&self) -> &StoreObject {
        &self.source
    }

    /// Name of the map this copy creates.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        vec![self.destination.name().to_string()]
    }

    /// Full path of the source map.
    #[must_use]
    pub fn src_description(&self) -> String {
        self.source.to_string()
    }

    /// Runs the copier on the blocking thread pool.
    pub(crate) async fn run(&self) -> Result<()> {
        let copier = Arc::clone(&self.copier);
        let source = self.source.clone();
        let destination = self.destination.clone();
        tokio::task::spawn_blocking(move || copier.copy_object(&source, &destination))
            .await
            .map_err(|e| ImportError::Join(e.to_string()))?
            .map_err(ImportError::Source)?;
        info!("Copied {} to {}", self.source, self.destination);
        Ok(())
    }
}
