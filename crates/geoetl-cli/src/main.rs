//! Command-line interface for `GeoETL` imports.
//!
//! This binary streams rasters and vector layers into a mapset through the
//! `r.in.stream` and `v.in.stream` modules, or copies maps between mapsets
//! directly, using the [`geoetl_core`] library.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It parses arguments, configures logging, opens the input with [`geoetl_sources`] and
//! runs a single [`ImportWorker`]. Ctrl-C cancels the running import.
//!
//! # Available Commands
//!
//! - `raster` - Import an ESRI ASCII grid
//! - `vector` - Import a `GeoJSON` file
//! - `copy` - Copy a map to another mapset or name
//! - `names` - List the maps an import would create

mod display;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{Level, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use geoetl_core::{ImportConfig, ImportWorker, ObjectCopy, RasterImport, VectorImport};
use geoetl_core_common::{Crs, Extent, ObjectKind, StoreObject};
use geoetl_sources::{AsciiGridSource, GeoJsonSource};

#[derive(Parser)]
#[command(
    name = "geoetl",
    version,
    about = "Stream geospatial data into GRASS-style mapsets",
    long_about = "GeoETL imports rasters and vector layers into a mapset by streaming them to\n\
                  the r.in.stream and v.in.stream modules, and copies maps between mapsets."
)]
/// Command-line arguments and options for the `GeoETL` CLI.
///
/// Global flags control logging verbosity and the import configuration shared
/// by every subcommand.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Directory holding the r.in.stream and v.in.stream modules.
    #[arg(long, global = true, env = "GEOETL_MODULE_PATH", value_name = "DIR")]
    module_dir: Option<PathBuf>,

    /// Store installation root, exported to the modules.
    #[arg(long, global = true, env = "GISBASE", value_name = "DIR")]
    gisbase: Option<PathBuf>,

    /// Seconds a raster module may take to exit after its input is closed.
    #[arg(long, global = true, value_name = "SECONDS", value_parser = parse_seconds)]
    raster_timeout: Option<Duration>,

    /// Seconds a vector module may take to acknowledge and exit.
    #[arg(long, global = true, value_name = "SECONDS", value_parser = parse_seconds)]
    vector_timeout: Option<Duration>,

    /// Target size in bytes of one raster read; rows per block are BYTES / width.
    #[arg(long, global = true, value_name = "BYTES")]
    chunk_bytes: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// The map an import writes.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Database directory holding all locations.
    #[arg(long, value_name = "DIR")]
    gisdbase: PathBuf,

    /// Location inside the database.
    #[arg(long)]
    location: String,

    /// Mapset receiving the map.
    #[arg(long, default_value = "PERMANENT")]
    mapset: String,

    /// Name of the new map.
    #[arg(long)]
    name: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum KindArg {
    Raster,
    Vector,
}

impl From<KindArg> for ObjectKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Raster => ObjectKind::Raster,
            KindArg::Vector => ObjectKind::Vector,
        }
    }
}

/// Available subcommands for the `GeoETL` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Imports an ESRI ASCII grid as a raster map.
    ///
    /// The extent and size default to the grid's own; overriding them
    /// resamples by nearest neighbour.
    Raster {
        /// Path to the input grid.
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Output extent as xmin,ymin,xmax,ymax.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        extent: Option<Vec<f64>>,

        /// Output width in pixels.
        #[arg(long)]
        width: Option<usize>,

        /// Output height in pixels.
        #[arg(long)]
        height: Option<usize>,
    },

    /// Imports a `GeoJSON` file as a vector map.
    Vector {
        /// Path to the input `GeoJSON` file.
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// CRS of the input coordinates (default EPSG:4326).
        #[arg(long)]
        crs: Option<String>,
    },

    /// Copies a map to another mapset or name of the same location.
    Copy {
        /// Database directory holding all locations.
        #[arg(long, value_name = "DIR")]
        gisdbase: PathBuf,

        /// Location holding both mapsets.
        #[arg(long)]
        location: String,

        /// Map type.
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Mapset holding the source map.
        #[arg(long, default_value = "PERMANENT")]
        from_mapset: String,

        /// Name of the source map.
        #[arg(long)]
        from_name: String,

        /// Mapset receiving the copy.
        #[arg(long)]
        to_mapset: String,

        /// Name of the copy (defaults to the source name).
        #[arg(long)]
        to_name: Option<String>,
    },

    /// Lists the maps an import of the input would create.
    Names {
        /// Input type.
        #[arg(value_enum)]
        kind: KindArg,

        /// Path to the input file.
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Base name of the new maps.
        #[arg(long)]
        name: String,
    },
}

/// Entry point for the `GeoETL` command-line interface.
///
/// This function parses command-line arguments, configures the logging system based on
/// verbosity flags, and dispatches to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the command fails or if the logging system cannot be initialized.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true) // Show module paths for better context
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(&cli);
    config.validate()?;

    match cli.command {
        Commands::Raster {
            input,
            target,
            extent,
            width,
            height,
        } => {
            info!("Importing raster {}", input.display());
            let worker = raster_worker(&input, &target, extent.as_deref(), width, height, config)?;
            run_import(worker).await?;
        },
        Commands::Vector { input, target, crs } => {
            info!("Importing vector {}", input.display());
            let worker = vector_worker(&input, &target, crs.as_deref(), config)?;
            run_import(worker).await?;
        },
        Commands::Copy {
            gisdbase,
            location,
            kind,
            from_mapset,
            from_name,
            to_mapset,
            to_name,
        } => {
            let source = StoreObject::new(gisdbase, location, from_mapset, from_name, kind.into());
            let to_name = to_name.unwrap_or_else(|| source.name().to_string());
            let destination = StoreObject::new(
                source.gisdbase(),
                source.location(),
                to_mapset,
                to_name,
                kind.into(),
            );
            info!("Copying {source} to {destination}");
            run_import(ImportWorker::new(ObjectCopy::new(source, destination), config)).await?;
        },
        Commands::Names { kind, input, name } => {
            let target = TargetArgs {
                gisdbase: PathBuf::from("."),
                location: String::new(),
                mapset: "PERMANENT".to_string(),
                name,
            };
            let worker = match kind {
                KindArg::Raster => raster_worker(&input, &target, None, None, None, config)?,
                KindArg::Vector => vector_worker(&input, &target, None, config)?,
            };
            display::display_names(&worker);
        },
    }

    Ok(())
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}

fn build_config(cli: &Cli) -> ImportConfig {
    let mut config = ImportConfig::default();
    if let Some(dir) = &cli.module_dir {
        config = config.with_module_dir(dir);
    }
    if let Some(gisbase) = &cli.gisbase {
        config = config.with_gisbase(gisbase);
    }
    if let Some(timeout) = cli.raster_timeout {
        config = config.with_raster_timeout(timeout);
    }
    if let Some(timeout) = cli.vector_timeout {
        config = config.with_vector_timeout(timeout);
    }
    if let Some(chunk_bytes) = cli.chunk_bytes {
        config = config.with_chunk_bytes(chunk_bytes);
    }
    config
}

fn target_object(target: &TargetArgs, kind: ObjectKind) -> StoreObject {
    StoreObject::new(
        &target.gisdbase,
        &target.location,
        &target.mapset,
        &target.name,
        kind,
    )
}

fn raster_worker(
    input: &std::path::Path,
    target: &TargetArgs,
    extent: Option<&[f64]>,
    width: Option<usize>,
    height: Option<usize>,
    config: ImportConfig,
) -> Result<ImportWorker> {
    let grid = AsciiGridSource::open(input)?;
    let extent = match extent {
        Some(&[xmin, ymin, xmax, ymax]) => Extent::new(xmin, ymin, xmax, ymax),
        Some(other) => return Err(anyhow!("Extent needs 4 values, got {}", other.len())),
        None => grid.extent(),
    };
    let width = width.unwrap_or_else(|| grid.width());
    let height = height.unwrap_or_else(|| grid.height());
    let object = target_object(target, ObjectKind::Raster);
    let import = RasterImport::new(Box::new(grid), object, extent, width, height);
    Ok(ImportWorker::new(import, config))
}

fn vector_worker(
    input: &std::path::Path,
    target: &TargetArgs,
    crs: Option<&str>,
    config: ImportConfig,
) -> Result<ImportWorker> {
    let mut layer = GeoJsonSource::open(input)?;
    if let Some(crs) = crs {
        layer = layer.with_crs(Crs::new(crs));
    }
    let object = target_object(target, ObjectKind::Vector);
    Ok(ImportWorker::new(VectorImport::new(Box::new(layer), object), config))
}

/// Runs `worker` to completion, cancelling it on Ctrl-C.
///
/// # Errors
///
/// Returns the worker's error text when the import fails.
async fn run_import(mut worker: ImportWorker) -> Result<()> {
    let token = worker.cancellation_token();
    let signals = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling import");
            token.cancel();
        }
    });

    let success = worker.import().await;
    signals.abort();
    display::display_summary(&worker);

    if success {
        if worker.is_canceled() {
            warn!("Import was cancelled; maps may be incomplete");
        }
        Ok(())
    } else {
        if let Some(suggestion) = worker.recovery_suggestion() {
            eprintln!("Hint: {suggestion}");
        }
        Err(anyhow!("{}", worker.error().unwrap_or("Import failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("1.5"), Ok(Duration::from_millis(1500)));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn test_build_config_overrides() {
        let cli = parse(&[
            "geoetl",
            "--module-dir",
            "/opt/modules",
            "--raster-timeout",
            "60",
            "--vector-timeout",
            "0.5",
            "--chunk-bytes",
            "1000",
            "names",
            "raster",
            "--input",
            "dem.asc",
            "--name",
            "dem",
        ]);
        let config = build_config(&cli);
        assert_eq!(config.module_dir, PathBuf::from("/opt/modules"));
        assert_eq!(config.raster_timeout, Duration::from_secs(60));
        assert_eq!(config.vector_timeout, Duration::from_millis(500));
        assert_eq!(config.chunk_bytes, 1000);
    }

    #[test]
    fn test_parse_copy_defaults() {
        let cli = parse(&[
            "geoetl",
            "copy",
            "--gisdbase",
            "/db",
            "--location",
            "world",
            "--kind",
            "vector",
            "--from-name",
            "roads",
            "--to-mapset",
            "user1",
        ]);
        let Commands::Copy {
            from_mapset,
            to_name,
            kind,
            ..
        } = cli.command
        else {
            panic!("expected the copy command");
        };
        assert_eq!(from_mapset, "PERMANENT");
        assert_eq!(to_name, None);
        assert_eq!(kind, KindArg::Vector);
    }

    #[test]
    fn test_parse_raster_extent() {
        let cli = parse(&[
            "geoetl",
            "raster",
            "--input",
            "dem.asc",
            "--gisdbase",
            "/db",
            "--location",
            "world",
            "--name",
            "dem",
            "--extent=-10,-5.5,10,5.5",
        ]);
        let Commands::Raster { extent, target, .. } = cli.command else {
            panic!("expected the raster command");
        };
        assert_eq!(extent, Some(vec![-10.0, -5.5, 10.0, 5.5]));
        assert_eq!(target.mapset, "PERMANENT");
    }
}
