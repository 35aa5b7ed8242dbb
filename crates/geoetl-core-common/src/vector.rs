//! Vector feature model: geometry kinds, field schema, attribute values and CRS.

use std::fmt;

use geo_types::Geometry;

/// Declared geometry kind of a feature source, identified by its WKB type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Unknown or mixed geometry
    Unknown,
    /// Point
    Point,
    /// LineString
    LineString,
    /// Polygon
    Polygon,
    /// MultiPoint
    MultiPoint,
    /// MultiLineString
    MultiLineString,
    /// MultiPolygon
    MultiPolygon,
    /// GeometryCollection
    GeometryCollection,
    /// Attribute-only table
    NoGeometry,
}

impl GeometryKind {
    /// WKB type code, used as the wire tag.
    #[must_use]
    pub const fn wkb_code(&self) -> i32 {
        match self {
            GeometryKind::Unknown => 0,
            GeometryKind::Point => 1,
            GeometryKind::LineString => 2,
            GeometryKind::Polygon => 3,
            GeometryKind::MultiPoint => 4,
            GeometryKind::MultiLineString => 5,
            GeometryKind::MultiPolygon => 6,
            GeometryKind::GeometryCollection => 7,
            GeometryKind::NoGeometry => 100,
        }
    }

    /// Parses a WKB type code.
    #[must_use]
    pub const fn from_wkb_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GeometryKind::Unknown),
            1 => Some(GeometryKind::Point),
            2 => Some(GeometryKind::LineString),
            3 => Some(GeometryKind::Polygon),
            4 => Some(GeometryKind::MultiPoint),
            5 => Some(GeometryKind::MultiLineString),
            6 => Some(GeometryKind::MultiPolygon),
            7 => Some(GeometryKind::GeometryCollection),
            100 => Some(GeometryKind::NoGeometry),
            _ => None,
        }
    }

    /// Returns `true` for single and multi polygons.
    #[must_use]
    pub const fn is_polygon(&self) -> bool {
        matches!(self, GeometryKind::Polygon | GeometryKind::MultiPolygon)
    }

    /// Kind of a concrete geometry. Lines, rectangles and triangles map to their
    /// WKB equivalents.
    #[must_use]
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryKind::Polygon
            },
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Unknown => "Unknown",
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "GeometryCollection",
            GeometryKind::NoGeometry => "NoGeometry",
        };
        f.write_str(name)
    }
}

/// Attribute field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean
    Boolean,
    /// 32-bit integer
    Int32,
    /// 64-bit integer
    Int64,
    /// Double precision float
    Float64,
    /// UTF-8 string
    String,
}

impl FieldType {
    /// Wire tag; shares numbering with [`AttributeValue::tag`].
    #[must_use]
    pub const fn tag(&self) -> i32 {
        match self {
            FieldType::Boolean => 1,
            FieldType::Int32 => 2,
            FieldType::Int64 => 3,
            FieldType::Float64 => 4,
            FieldType::String => 5,
        }
    }

    /// Parses a wire tag.
    #[must_use]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(FieldType::Boolean),
            2 => Some(FieldType::Int32),
            3 => Some(FieldType::Int64),
            4 => Some(FieldType::Float64),
            5 => Some(FieldType::String),
            _ => None,
        }
    }
}

/// One column of the attribute schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name
    pub name: String,
    /// Column type
    pub field_type: FieldType,
    /// Declared length, 0 when unknown
    pub length: i32,
    /// Declared precision, 0 when unknown
    pub precision: i32,
}

impl Field {
    /// Creates a field without length or precision.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: 0,
            precision: 0,
        }
    }

    /// Set declared length and precision
    #[must_use]
    pub fn with_size(mut self, length: i32, precision: i32) -> Self {
        self.length = length;
        self.precision = precision;
        self
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Missing value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// Double precision float
    Float64(f64),
    /// UTF-8 string
    String(String),
}

impl AttributeValue {
    /// Wire tag of the value.
    #[must_use]
    pub const fn tag(&self) -> i32 {
        match self {
            AttributeValue::Null => 0,
            AttributeValue::Bool(_) => 1,
            AttributeValue::Int32(_) => 2,
            AttributeValue::Int64(_) => 3,
            AttributeValue::Float64(_) => 4,
            AttributeValue::String(_) => 5,
        }
    }

    /// Field type matching the value, `None` for nulls.
    #[must_use]
    pub const fn field_type(&self) -> Option<FieldType> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(_) => Some(FieldType::Boolean),
            AttributeValue::Int32(_) => Some(FieldType::Int32),
            AttributeValue::Int64(_) => Some(FieldType::Int64),
            AttributeValue::Float64(_) => Some(FieldType::Float64),
            AttributeValue::String(_) => Some(FieldType::String),
        }
    }
}

/// One vector record: a geometry plus an ordered list of attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature id
    pub id: i64,
    /// Geometry, if any
    pub geometry: Option<Geometry<f64>>,
    /// Attribute values in schema order
    pub attributes: Vec<AttributeValue>,
    /// Invalid features are skipped by imports and mark the end of a pass on the wire
    pub valid: bool,
}

impl Feature {
    /// Creates a valid feature.
    #[must_use]
    pub fn new(id: i64, geometry: Option<Geometry<f64>>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            id,
            geometry,
            attributes,
            valid: true,
        }
    }

    /// Empty invalid feature, the end-of-pass sentinel.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            id: 0,
            geometry: None,
            attributes: Vec::new(),
            valid: false,
        }
    }

    /// Returns `true` unless the feature was marked invalid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Coordinate reference system identifier such as `EPSG:4326`.
///
/// An empty identifier is an invalid CRS; comparisons use the normalized
/// (trimmed, uppercase) identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Crs(Option<String>);

impl Crs {
    /// Creates a CRS from an authority identifier.
    #[must_use]
    pub fn new(id: &str) -> Self {
        let normalized = id.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            Self(None)
        } else {
            Self(Some(normalized))
        }
    }

    /// Shorthand for `EPSG:<code>`.
    #[must_use]
    pub fn epsg(code: u32) -> Self {
        Self(Some(format!("EPSG:{code}")))
    }

    /// The invalid CRS.
    #[must_use]
    pub const fn invalid() -> Self {
        Self(None)
    }

    /// Returns `true` if the CRS has an identifier.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// Normalized identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// EPSG code if the identifier is in the `EPSG` authority.
    #[must_use]
    pub fn epsg_code(&self) -> Option<u32> {
        self.0
            .as_deref()
            .and_then(|id| id.strip_prefix("EPSG:"))
            .and_then(|code| code.parse().ok())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or("<invalid>"))
    }
}
