//! In-memory sources and module helpers shared by the import tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use geoetl_core::ImportConfig;
use geoetl_core_common::{
    Crs, Extent, Feature, FeatureIter, FeatureSource, Field, GeometryKind, ObjectKind, PixelType,
    RasterBlock, RasterData, RasterSource, StoreObject,
};
use tokio_util::sync::CancellationToken;

pub const LOCATION: &str = "world";
pub const MAPSET: &str = "PERMANENT";

/// Directory of the shell modules, made executable.
pub fn modules_dir() -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("modules");
    for module in ["r.in.stream", "v.in.stream"] {
        let path = dir.join(module);
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
    }
    dir
}

pub fn config() -> ImportConfig {
    ImportConfig::default()
        .with_module_dir(modules_dir())
        .with_raster_timeout(Duration::from_secs(10))
        .with_vector_timeout(Duration::from_secs(10))
}

pub fn object(db: &Path, name: &str, kind: ObjectKind) -> StoreObject {
    StoreObject::new(db, LOCATION, MAPSET, name, kind)
}

/// Bytes a module captured for the map `name`.
pub fn captured(db: &Path, name: &str) -> Vec<u8> {
    fs::read(stream_path(db, name)).unwrap()
}

pub fn stream_path(db: &Path, name: &str) -> PathBuf {
    db.join(LOCATION).join(MAPSET).join(format!("{name}.stream"))
}

/// Writes the location CRS file.
pub fn set_location_epsg(db: &Path, code: u32) {
    let permanent = db.join(LOCATION).join("PERMANENT");
    fs::create_dir_all(&permanent).unwrap();
    fs::write(permanent.join("PROJ_EPSG"), format!("epsg: {code}\n")).unwrap();
}

/// Raster whose sample at (row, col) of band `b` is `b * 1000 + row * width + col`.
/// Can fire a cancellation token while serving its n-th block read.
pub struct GridSource {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<PixelType>,
    pub reads: Arc<AtomicUsize>,
    pub cancel_at_read: Option<(usize, CancellationToken)>,
    band: usize,
    next_row: usize,
}

impl GridSource {
    pub fn new(width: usize, height: usize, bands: Vec<PixelType>) -> Self {
        Self {
            width,
            height,
            bands,
            reads: Arc::new(AtomicUsize::new(0)),
            cancel_at_read: None,
            band: 0,
            next_row: 0,
        }
    }

    pub fn value(&self, band: usize, row: usize, col: usize) -> usize {
        band * 1000 + row * self.width + col
    }
}

impl RasterSource for GridSource {
    fn is_valid(&self) -> bool {
        true
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn data_type(&self, band: usize) -> PixelType {
        self.bands[band - 1]
    }

    fn read_block(
        &mut self,
        band: usize,
        _extent: &Extent,
        width: usize,
        height: usize,
    ) -> anyhow::Result<RasterBlock> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, token)) = &self.cancel_at_read
            && *at == read
        {
            token.cancel();
        }
        if band != self.band {
            self.band = band;
            self.next_row = 0;
        }
        let values: Vec<usize> = (self.next_row..self.next_row + height)
            .flat_map(|row| (0..width).map(move |col| (row, col)))
            .map(|(row, col)| self.value(band, row, col))
            .collect();
        self.next_row += height;
        let data = match self.bands[band - 1] {
            PixelType::UInt16 => RasterData::UInt16(values.iter().map(|&v| v as u16).collect()),
            PixelType::Int32 => RasterData::Int32(values.iter().map(|&v| v as i32).collect()),
            PixelType::Float32 => RasterData::Float32(values.iter().map(|&v| v as f32).collect()),
            PixelType::Float64 => RasterData::Float64(values.iter().map(|&v| v as f64).collect()),
            _ => RasterData::Byte(values.iter().map(|&v| v as u8).collect()),
        };
        Ok(RasterBlock::new(width, height, data)?)
    }

    fn uri(&self) -> String {
        "memory://grid".to_string()
    }
}

/// Feature layer held in memory. Counts how often it is opened and can fire a
/// cancellation token just before handing out a given feature.
pub struct MemoryLayer {
    pub kind: GeometryKind,
    pub fields: Vec<Field>,
    pub features: Vec<Feature>,
    pub crs: Crs,
    pub opened: Arc<AtomicUsize>,
    pub cancel_at: Option<(usize, CancellationToken)>,
}

impl MemoryLayer {
    pub fn new(kind: GeometryKind, fields: Vec<Field>, features: Vec<Feature>) -> Self {
        Self {
            kind,
            fields,
            features,
            crs: Crs::invalid(),
            opened: Arc::new(AtomicUsize::new(0)),
            cancel_at: None,
        }
    }
}

impl FeatureSource for MemoryLayer {
    fn is_valid(&self) -> bool {
        true
    }

    fn crs(&self) -> Crs {
        self.crs.clone()
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.kind
    }

    fn fields(&self) -> Vec<Field> {
        self.fields.clone()
    }

    fn features(&mut self) -> anyhow::Result<FeatureIter<'_>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let cancel_at = self.cancel_at.clone();
        Ok(Box::new(self.features.iter().cloned().enumerate().map(
            move |(index, feature)| {
                if let Some((at, token)) = &cancel_at
                    && *at == index
                {
                    token.cancel();
                }
                Ok(feature)
            },
        )))
    }

    fn uri(&self) -> String {
        "memory://layer".to_string()
    }
}
