//! Import configuration.
//!
//! Where to find the import modules, how long to wait for them to exit and how
//! much raster data to read per block.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Name of the raster import module.
pub const RASTER_MODULE: &str = "r.in.stream";

/// Name of the vector import module.
pub const VECTOR_MODULE: &str = "v.in.stream";

/// Environment variable overriding the module directory.
pub const MODULE_PATH_ENV: &str = "GEOETL_MODULE_PATH";

/// Environment variable naming the store installation root.
pub const GISBASE_ENV: &str = "GISBASE";

const DEFAULT_MODULE_DIR: &str = "modules";
const DEFAULT_RASTER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_VECTOR_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CHUNK_BYTES: usize = 5_000_000;

/// Settings shared by all imports of a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Directory holding `r.in.stream` and `v.in.stream`
    pub module_dir: PathBuf,
    /// Store installation root, exported to modules as `GISBASE`
    pub gisbase: Option<PathBuf>,
    /// How long a raster module may take to exit after its input is closed
    pub raster_timeout: Duration,
    /// How long a vector module may take to acknowledge and exit
    pub vector_timeout: Duration,
    /// Target size in bytes of a raster read; a block holds
    /// `max(1, chunk_bytes / width)` rows
    pub chunk_bytes: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from(DEFAULT_MODULE_DIR),
            gisbase: None,
            raster_timeout: DEFAULT_RASTER_TIMEOUT,
            vector_timeout: DEFAULT_VECTOR_TIMEOUT,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl ImportConfig {
    /// Default configuration with the module directory and `GISBASE` taken
    /// from the environment when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(MODULE_PATH_ENV).filter(|v| !v.is_empty()) {
            config.module_dir = PathBuf::from(dir);
        }
        config.gisbase = std::env::var_os(GISBASE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        config
    }

    #[must_use]
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_gisbase(mut self, gisbase: impl Into<PathBuf>) -> Self {
        self.gisbase = Some(gisbase.into());
        self
    }

    #[must_use]
    pub fn with_raster_timeout(mut self, timeout: Duration) -> Self {
        self.raster_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_vector_timeout(mut self, timeout: Duration) -> Self {
        self.vector_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Full path of the module called `module`.
    #[must_use]
    pub fn module_path(&self, module: &str) -> PathBuf {
        self.module_dir.join(module)
    }

    /// Module directory.
    #[must_use]
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for a zero chunk size or a zero
    /// timeout, and [`ConfigError::MissingRequired`] for an empty module
    /// directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                option: "module-dir".to_string(),
            });
        }
        if self.chunk_bytes == 0 {
            return Err(ConfigError::InvalidOption {
                option: "chunk-bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        for (option, timeout) in [
            ("raster-timeout", self.raster_timeout),
            ("vector-timeout", self.vector_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidOption {
                    option: option.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.raster_timeout, Duration::from_secs(30));
        assert_eq!(config.vector_timeout, Duration::from_secs(5));
        assert_eq!(config.chunk_bytes, 5_000_000);
        assert_eq!(
            config.module_path(RASTER_MODULE),
            PathBuf::from("modules/r.in.stream")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = ImportConfig::default()
            .with_module_dir("/opt/modules")
            .with_gisbase("/opt/grass")
            .with_chunk_bytes(10)
            .with_vector_timeout(Duration::from_millis(500));
        assert_eq!(
            config.module_path(VECTOR_MODULE),
            PathBuf::from("/opt/modules/v.in.stream")
        );
        assert_eq!(config.gisbase.as_deref(), Some(Path::new("/opt/grass")));
        assert_eq!(config.chunk_bytes, 10);
        assert_eq!(config.vector_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let err = ImportConfig::default()
            .with_chunk_bytes(0)
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid chunk-bytes option: must be greater than zero"
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let err = ImportConfig::default()
            .with_raster_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("raster-timeout"));
    }

    #[test]
    fn test_validate_rejects_empty_module_dir() {
        let err = ImportConfig::default()
            .with_module_dir("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }
}
