//! ESRI ASCII grid raster source.

use std::path::Path;

use anyhow::{Result, bail};
use geoetl_core_common::{Extent, PixelType, RasterBlock, RasterData, RasterSource};
use log::debug;

use crate::error::{SourceError, SourcePosition, SourceResult};

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

/// Single-band raster read from an ESRI ASCII grid (`.asc`).
///
/// Samples are `Int32` when every value, including the no-data value, is an
/// integer in range, and `Float32` otherwise. Blocks are resampled by nearest
/// neighbour; pixels outside the grid get the no-data value, or 0 without one.
#[derive(Debug, Clone)]
pub struct AsciiGridSource {
    uri: String,
    width: usize,
    height: usize,
    extent: Extent,
    cellsize: f64,
    nodata: Option<f64>,
    pixel_type: PixelType,
    values: Vec<f64>,
}

impl AsciiGridSource {
    /// Reads and parses the grid at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid grid.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let uri = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SourceError::from(e).with_additional_context(uri.clone()))?;
        Self::from_text(&text, uri)
    }

    /// Parses grid `text`; `uri` names the data in errors and logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is incomplete or the cell count does not
    /// match `ncols * nrows`.
    pub fn from_text(text: &str, uri: impl Into<String>) -> SourceResult<Self> {
        let uri = uri.into();
        parse(text, uri.clone()).map_err(|e| e.with_additional_context(uri))
    }

    /// Native extent of the grid.
    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// No-data value from the header, if any.
    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Cell value at the map coordinate `(x, y)`, or `None` outside the grid.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let col = ((x - self.extent.xmin) / self.cellsize).floor();
        let row = ((self.extent.ymax - y) / self.cellsize).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }
}

impl RasterSource for AsciiGridSource {
    fn is_valid(&self) -> bool {
        true
    }

    fn band_count(&self) -> usize {
        1
    }

    fn data_type(&self, band: usize) -> PixelType {
        if band == 1 {
            self.pixel_type
        } else {
            PixelType::Unknown
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn read_block(
        &mut self,
        band: usize,
        extent: &Extent,
        width: usize,
        height: usize,
    ) -> Result<RasterBlock> {
        if band != 1 {
            bail!("{} has a single band, band {band} requested", self.uri);
        }
        let fill = self.nodata.unwrap_or(0.0);
        let dx = extent.width() / width as f64;
        let dy = extent.height() / height as f64;
        let mut samples = Vec::with_capacity(width * height);
        for row in 0..height {
            let y = extent.ymax - (row as f64 + 0.5) * dy;
            for col in 0..width {
                let x = extent.xmin + (col as f64 + 0.5) * dx;
                samples.push(self.sample(x, y).unwrap_or(fill));
            }
        }
        let data = match self.pixel_type {
            PixelType::Int32 => RasterData::Int32(samples.into_iter().map(|v| v as i32).collect()),
            _ => RasterData::Float32(samples.into_iter().map(|v| v as f32).collect()),
        };
        Ok(RasterBlock::new(width, height, data)?)
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }
}

fn parse(text: &str, uri: String) -> SourceResult<AsciiGridSource> {
    let mut header = Header::default();
    let mut values = Vec::new();
    let mut in_data = false;

    for (line_idx, line) in text.lines().enumerate() {
        let line_no = line_idx as u64 + 1;
        let mut tokens = line.split_whitespace().peekable();
        let Some(first) = tokens.peek().copied() else {
            continue;
        };
        if !in_data && first.parse::<f64>().is_err() {
            let key = first.to_ascii_lowercase();
            tokens.next();
            let value = tokens.next().ok_or_else(|| {
                SourceError::parse(
                    format!("Header '{first}' has no value"),
                    Some(SourcePosition::line(line_no)),
                )
            })?;
            apply_header(&mut header, &key, value, line_no)?;
            continue;
        }
        in_data = true;
        for (value_idx, token) in tokens.enumerate() {
            let value = token.parse::<f64>().map_err(|_| {
                SourceError::parse(
                    format!("Invalid cell value '{token}'"),
                    Some(SourcePosition {
                        line: Some(line_no),
                        value: Some(value_idx as u64 + 1),
                    }),
                )
            })?;
            values.push(value);
        }
    }

    let missing = |name: &str| SourceError::parse(format!("Header '{name}' is missing"), None);
    let width = header.ncols.ok_or_else(|| missing("ncols"))?;
    let height = header.nrows.ok_or_else(|| missing("nrows"))?;
    let (xll, x_center) = header.xll.ok_or_else(|| missing("xllcorner"))?;
    let (yll, y_center) = header.yll.ok_or_else(|| missing("yllcorner"))?;
    let cellsize = header.cellsize.ok_or_else(|| missing("cellsize"))?;
    if width == 0 || height == 0 {
        return Err(SourceError::parse(
            format!("Grid size {width}x{height} is empty"),
            None,
        ));
    }
    if cellsize.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater) {
        return Err(SourceError::parse(
            format!("Cell size {cellsize} must be positive"),
            None,
        ));
    }
    if values.len() != width * height {
        return Err(SourceError::parse(
            format!(
                "Expected {} cell values for a {width}x{height} grid, found {}",
                width * height,
                values.len()
            ),
            None,
        ));
    }

    let xmin = if x_center { xll - cellsize / 2.0 } else { xll };
    let ymin = if y_center { yll - cellsize / 2.0 } else { yll };
    #[allow(clippy::cast_precision_loss)]
    let extent = Extent::new(
        xmin,
        ymin,
        xmin + width as f64 * cellsize,
        ymin + height as f64 * cellsize,
    );
    let pixel_type = if values.iter().chain(header.nodata.iter()).all(|v| is_int32(*v)) {
        PixelType::Int32
    } else {
        PixelType::Float32
    };
    debug!("{uri}: {width}x{height} {pixel_type} grid over {extent}");

    Ok(AsciiGridSource {
        uri,
        width,
        height,
        extent,
        cellsize,
        nodata: header.nodata,
        pixel_type,
        values,
    })
}

fn apply_header(header: &mut Header, key: &str, value: &str, line_no: u64) -> SourceResult<()> {
    let position = Some(SourcePosition::line(line_no));
    let number = value.parse::<f64>().map_err(|_| {
        SourceError::parse(
            format!("Header '{key}' has an invalid value '{value}'"),
            position.clone(),
        )
    })?;
    let count = || {
        value.parse::<usize>().map_err(|_| {
            SourceError::parse(
                format!("Header '{key}' must be a non-negative integer, got '{value}'"),
                position.clone(),
            )
        })
    };
    match key {
        "ncols" => header.ncols = Some(count()?),
        "nrows" => header.nrows = Some(count()?),
        "xllcorner" => header.xll = Some((number, false)),
        "xllcenter" => header.xll = Some((number, true)),
        "yllcorner" => header.yll = Some((number, false)),
        "yllcenter" => header.yll = Some((number, true)),
        "cellsize" => header.cellsize = Some(number),
        "nodata_value" => header.nodata = Some(number),
        _ => {
            return Err(SourceError::parse(
                format!("Unknown header '{key}'"),
                position,
            ));
        },
    }
    Ok(())
}

fn is_int32(value: f64) -> bool {
    value.fract() == 0.0 && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEM: &str = "ncols 4
nrows 3
xllcorner 100
yllcorner 200
cellsize 10
NODATA_value -9999
1 2 3 4
5 6 -9999 8
9 10 11 12
";

    fn int32(block: &RasterBlock) -> Vec<i32> {
        match block.data() {
            RasterData::Int32(values) => values.clone(),
            other => panic!("expected Int32 samples, got {other:?}"),
        }
    }

    #[test]
    fn parse_header_and_extent() {
        let grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        assert_eq!((grid.width(), grid.height()), (4, 3));
        assert_eq!(grid.extent(), Extent::new(100.0, 200.0, 140.0, 230.0));
        assert_eq!(grid.nodata(), Some(-9999.0));
        assert_eq!(grid.data_type(1), PixelType::Int32);
        assert_eq!(grid.data_type(2), PixelType::Unknown);
    }

    #[test]
    fn read_native_block() {
        let mut grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        let extent = grid.extent();
        let block = grid.read_block(1, &extent, 4, 3).unwrap();
        assert_eq!(int32(&block), vec![1, 2, 3, 4, 5, 6, -9999, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn read_row_band() {
        let mut grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        let band = grid.extent().row_band(1, 2, 3);
        let block = grid.read_block(1, &band, 4, 2).unwrap();
        assert_eq!(int32(&block), vec![5, 6, -9999, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn resample_nearest_neighbour() {
        let mut grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        let extent = grid.extent();
        let block = grid.read_block(1, &extent, 2, 1).unwrap();
        // centres fall in row 1, columns 1 and 3
        assert_eq!(int32(&block), vec![6, 8]);
    }

    #[test]
    fn outside_cells_get_nodata() {
        let mut grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        let extent = Extent::new(130.0, 220.0, 150.0, 230.0);
        let block = grid.read_block(1, &extent, 2, 1).unwrap();
        assert_eq!(int32(&block), vec![4, -9999]);
    }

    #[test]
    fn fractional_values_are_float32() {
        let text = "NCOLS 2\nNROWS 1\nXLLCENTER 0.5\nYLLCENTER 0.5\nCELLSIZE 1\n0.25 7\n";
        let mut grid = AsciiGridSource::from_text(text, "frac.asc").unwrap();
        assert_eq!(grid.data_type(1), PixelType::Float32);
        assert_eq!(grid.extent(), Extent::new(0.0, 0.0, 2.0, 1.0));
        let extent = grid.extent();
        let block = grid.read_block(1, &extent, 2, 1).unwrap();
        assert_eq!(block.data(), &RasterData::Float32(vec![0.25, 7.0]));
    }

    #[test]
    fn wrong_value_count() {
        let text = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        let err = AsciiGridSource::from_text(text, "short.asc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error while reading short.asc: Expected 4 cell values for a 2x2 grid, found 3"
        );
    }

    #[test]
    fn missing_header() {
        let text = "ncols 2\nnrows 1\nxllcorner 0\ncellsize 1\n1 2\n";
        let err = AsciiGridSource::from_text(text, "nohdr.asc").unwrap_err();
        assert!(err.to_string().ends_with("Header 'yllcorner' is missing"));
    }

    #[test]
    fn invalid_cell_position() {
        let text = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 x\n";
        let err = AsciiGridSource::from_text(text, "bad.asc").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error while reading bad.asc at line 6, value 2: Invalid cell value 'x'"
        );
    }

    #[test]
    fn second_band_is_an_error() {
        let mut grid = AsciiGridSource::from_text(DEM, "dem.asc").unwrap();
        let extent = grid.extent();
        assert!(grid.read_block(2, &extent, 4, 3).is_err());
    }

    #[test]
    fn open_missing_file() {
        let err = AsciiGridSource::open("/nonexistent/dem.asc").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
