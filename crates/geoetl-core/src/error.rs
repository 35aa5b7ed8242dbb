//! Error types for `GeoETL` imports.
//!
//! Every failure of an import funnels into [`ImportError`]. The worker keeps
//! only the rendered message, so the `Display` text of each variant is what a
//! user ends up seeing.

use std::time::Duration;

use geoetl_core_common::{ConversionError, PixelType};
use geoetl_stream::EncodeError;
use thiserror::Error;

/// Main error type for import operations.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source or target is unusable; raised before any module is started.
    #[error("{0}")]
    Precondition(String),

    /// A raster band has a pixel type no import module can represent.
    #[error("Data type {pixel_type} not supported")]
    UnsupportedDataType {
        /// Band number, starting at 1
        band: usize,
        /// Native pixel type of the band
        pixel_type: PixelType,
    },

    /// The import module could not be launched.
    #[error("Cannot start module '{module}': {source}")]
    Spawn {
        /// Module path
        module: String,
        /// Underlying launch error
        #[source]
        source: std::io::Error,
    },

    /// A raster block could not be converted to the output type.
    #[error("Cannot convert data type of band {band}: {source}")]
    Conversion {
        /// Band number, starting at 1
        band: usize,
        /// Underlying conversion error
        #[source]
        source: ConversionError,
    },

    /// A feature geometry could not be reprojected.
    #[error("Cannot transform feature {feature_id}: {message}")]
    Transform {
        /// Id of the offending feature
        feature_id: i64,
        /// Transform error description
        message: String,
    },

    /// Writing to or reading from the module's standard streams failed.
    #[error("Module stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("Cannot encode record: {0}")]
    Encode(#[from] EncodeError),

    /// The module was terminated by a signal.
    #[error("Module '{module}' terminated abnormally ({status})")]
    ModuleCrashed {
        /// Module path
        module: String,
        /// Exit status description
        status: String,
    },

    /// The module exited with a non-zero code. Displays the module's standard
    /// error text when there is any.
    #[error("{}", module_failure(module, *code, stderr))]
    ModuleFailed {
        /// Module path
        module: String,
        /// Exit code
        code: i32,
        /// Captured standard error, trailing whitespace removed
        stderr: String,
    },

    /// The module did not exit within the allotted time and was killed.
    #[error("Module '{module}' did not finish within {timeout:?}")]
    Timeout {
        /// Module path
        module: String,
        /// Wait limit
        timeout: Duration,
    },

    /// `import()` was called on a worker that already ran.
    #[error("Import has already been run")]
    AlreadyRun,

    /// Background import task panicked or was aborted.
    #[error("Import task failed: {0}")]
    Join(String),

    /// Errors from collaborators: sources, store copier, transforms factories.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

fn module_failure(module: &str, code: i32, stderr: &str) -> String {
    if stderr.is_empty() {
        format!("Module '{module}' exited with code {code}")
    } else {
        stderr.to_string()
    }
}

/// Configuration errors.
///
/// These errors occur when options or configuration are invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },
}

/// Type alias for Results using `ImportError`.
pub type Result<T> = std::result::Result<T, ImportError>;

impl ImportError {
    /// Returns `true` if the module closed its input early. The exit status of
    /// the module then decides how the import is reported.
    #[must_use]
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Stream(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }

    /// Get recovery suggestions if available.
    ///
    /// Returns helpful suggestions on how to fix or work around the error.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Spawn { .. } => Some(
                "Check that the module directory contains the import modules \
                 (set GEOETL_MODULE_PATH or --module-dir)."
                    .to_string(),
            ),
            Self::UnsupportedDataType { .. } => Some(
                "Convert the raster to an integer or floating point type before importing."
                    .to_string(),
            ),
            Self::Timeout { .. } => {
                Some("Increase the wait limit with --raster-timeout or --vector-timeout.".to_string())
            },
            Self::AlreadyRun => Some("Create a new import for every run.".to_string()),
            _ => None,
        }
    }
}
