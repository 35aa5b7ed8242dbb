//! Destination store descriptors.
//!
//! A store object lives in a mapset, which lives in a location, which lives in a
//! database directory (`GISDBASE`). The four parts together address one raster or
//! vector map.

use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of map a store object holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raster map (`cell`, `cellhd`, ... elements).
    Raster,
    /// Vector map (`vector/<name>` directory).
    Vector,
}

impl ObjectKind {
    /// Returns the lowercase name used on the command line and in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Raster => "raster",
            ObjectKind::Vector => "vector",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-part address of a map inside a store: database, location, mapset and name.
///
/// Immutable once handed to an import; use [`StoreObject::with_name`] to derive
/// sibling objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreObject {
    gisdbase: PathBuf,
    location: String,
    mapset: String,
    name: String,
    kind: ObjectKind,
}

impl StoreObject {
    /// Creates a descriptor for `name` in `gisdbase/location/mapset`.
    #[must_use]
    pub fn new(
        gisdbase: impl Into<PathBuf>,
        location: impl Into<String>,
        mapset: impl Into<String>,
        name: impl Into<String>,
        kind: ObjectKind,
    ) -> Self {
        Self {
            gisdbase: gisdbase.into(),
            location: location.into(),
            mapset: mapset.into(),
            name: name.into(),
            kind,
        }
    }

    /// Database directory holding all locations.
    #[must_use]
    pub fn gisdbase(&self) -> &Path {
        &self.gisdbase
    }

    /// Location name.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Mapset name.
    #[must_use]
    pub fn mapset(&self) -> &str {
        &self.mapset
    }

    /// Map name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map kind.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Directory of the location.
    #[must_use]
    pub fn location_path(&self) -> PathBuf {
        self.gisdbase.join(&self.location)
    }

    /// Directory of the mapset.
    #[must_use]
    pub fn mapset_path(&self) -> PathBuf {
        self.location_path().join(&self.mapset)
    }

    /// Returns a copy of this descriptor pointing at another map name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns `true` when both objects live in the same database and location.
    #[must_use]
    pub fn same_location(&self, other: &StoreObject) -> bool {
        self.gisdbase == other.gisdbase && self.location == other.location
    }
}

impl fmt::Display for StoreObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.gisdbase.display(),
            self.location,
            self.mapset,
            self.name
        )
    }
}
