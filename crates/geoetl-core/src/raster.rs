//! Raster import: every band of a source streamed row by row into its own
//! `r.in.stream` process.

use geoetl_core_common::{Extent, RasterSource, StoreObject};
use geoetl_stream::{Encoder, RasterHeader};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::{ImportConfig, RASTER_MODULE};
use crate::error::{ImportError, Result};
use crate::process::{self, ModuleProcess};

/// Streams a multi-band raster into one store map per band.
pub struct RasterImport {
    source: Box<dyn RasterSource>,
    object: StoreObject,
    extent: Extent,
    width: usize,
    height: usize,
}

impl RasterImport {
    /// Imports `source` resampled to a `width` x `height` grid over `extent`.
    ///
    /// `object` names the target; multi-band sources get one map per band,
    /// suffixed `_1`, `_2` and so on.
    #[must_use]
    pub fn new(
        source: Box<dyn RasterSource>,
        object: StoreObject,
        extent: Extent,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            source,
            object,
            extent,
            width,
            height,
        }
    }

    /// Target descriptor.
    #[must_use]
    pub fn object(&self) -> &StoreObject {
        &self.object
    }

    /// Requested extent.
    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Names of the maps this import creates, one per band.
    ///
    /// A source without bands still reports the base name.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self.source.band_count() {
            0 => vec![self.object.name().to_string()],
            count => (1..=count).map(|band| self.band_name(band)).collect(),
        }
    }

    /// Source URI.
    #[must_use]
    pub fn src_description(&self) -> String {
        self.source.uri()
    }

    fn band_name(&self, band: usize) -> String {
        if self.source.band_count() > 1 {
            format!("{}_{band}", self.object.name())
        } else {
            self.object.name().to_string()
        }
    }

    fn check(&self) -> Result<(i32, i32)> {
        if !self.source.is_valid() {
            return Err(ImportError::Precondition(format!(
                "Raster source '{}' is not valid",
                self.source.uri()
            )));
        }
        if self.source.band_count() == 0 {
            return Err(ImportError::Precondition(format!(
                "Raster source '{}' has no bands",
                self.source.uri()
            )));
        }
        if self.extent.is_empty() {
            return Err(ImportError::Precondition(format!(
                "Raster extent {} is empty",
                self.extent
            )));
        }
        let size_error = || {
            ImportError::Precondition(format!(
                "Invalid raster size {}x{}",
                self.width, self.height
            ))
        };
        if self.width == 0 || self.height == 0 {
            return Err(size_error());
        }
        let width = i32::try_from(self.width).map_err(|_| size_error())?;
        let height = i32::try_from(self.height).map_err(|_| size_error())?;
        Ok((width, height))
    }

    /// Streams every band, stopping after the band in progress when `cancel`
    /// fires.
    pub(crate) async fn run(&mut self, config: &ImportConfig, cancel: &CancellationToken) -> Result<()> {
        let (width, height) = self.check()?;
        let band_count = self.source.band_count();

        for band in 1..=band_count {
            let pixel_type = self.source.data_type(band);
            let output_type = pixel_type
                .output_type()
                .ok_or(ImportError::UnsupportedDataType { band, pixel_type })?;
            let name = self.band_name(band);
            debug!("Band {band}/{band_count}: {pixel_type} sent as {output_type:?} to '{name}'");

            let header = RasterHeader {
                extent: self.extent,
                width,
                height,
                output_type,
            };
            let mut process =
                ModuleProcess::start(config, RASTER_MODULE, &self.object, &[format!("output={name}")])?;
            let streamed = self
                .stream_band(&mut process, band, &header, config.chunk_bytes, cancel)
                .await;
            process::complete(process, streamed, config.raster_timeout).await?;

            if cancel.is_cancelled() {
                warn!("Raster import canceled during band {band}");
                return Ok(());
            }
            info!("Imported band {band} of {} as '{name}'", self.source.uri());
        }
        Ok(())
    }

    async fn stream_band(
        &mut self,
        process: &mut ModuleProcess,
        band: usize,
        header: &RasterHeader,
        chunk_bytes: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut encoder = Encoder::new();
        encoder.put_raster_header(header);
        process.write(&encoder.split()).await?;

        let chunk_rows = (chunk_bytes / self.width).max(1);
        for tile in RowTiles::new(self.extent, self.height, chunk_rows) {
            let block = self
                .source
                .read_block(band, &tile.extent, self.width, tile.rows)?;
            if block.width() != self.width || block.height() != tile.rows {
                return Err(ImportError::Source(anyhow::anyhow!(
                    "Source returned a {}x{} block for a {}x{} request",
                    block.width(),
                    block.height(),
                    self.width,
                    tile.rows
                )));
            }
            let block = block
                .convert(header.output_type)
                .map_err(|source| ImportError::Conversion { band, source })?;

            for row in 0..tile.rows {
                if cancel.is_cancelled() {
                    debug!("Band {band} canceled at row {}", tile.top + row);
                    encoder.put_cancel();
                    process.write(&encoder.split()).await?;
                    return Ok(());
                }
                let bytes = block
                    .row_bytes(row)
                    .map_err(|source| ImportError::Conversion { band, source })?;
                encoder.put_row(&bytes)?;
                process.write(&encoder.split()).await?;
            }
        }
        Ok(())
    }
}

/// A horizontal strip of grid rows.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RowTile {
    top: usize,
    rows: usize,
    extent: Extent,
}

/// Splits a grid into strips of at most `chunk_rows` rows, north to south.
struct RowTiles {
    extent: Extent,
    height: usize,
    chunk_rows: usize,
    next: usize,
}

impl RowTiles {
    fn new(extent: Extent, height: usize, chunk_rows: usize) -> Self {
        Self {
            extent,
            height,
            chunk_rows: chunk_rows.max(1),
            next: 0,
        }
    }
}

impl Iterator for RowTiles {
    type Item = RowTile;

    fn next(&mut self) -> Option<RowTile> {
        if self.next >= self.height {
            return None;
        }
        let top = self.next;
        let rows = self.chunk_rows.min(self.height - top);
        self.next += rows;
        Some(RowTile {
            top,
            rows,
            extent: self.extent.row_band(top, rows, self.height),
        })
    }
}
