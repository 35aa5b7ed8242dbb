//! `GeoJSON` feature source.

use std::collections::BTreeMap;
use std::convert::TryInto;
use std::path::Path;

use geo_types::Geometry;
use geoetl_core_common::{
    AttributeValue, Crs, Feature, FeatureIter, FeatureSource, Field, FieldType, GeometryKind,
};
use geojson::feature::Id;
use geojson::{GeoJson, Geometry as GeoJsonGeometry, JsonObject, JsonValue};
use log::debug;

use crate::error::{SourceError, SourcePosition, SourceResult};

/// Parsed `GeoJSON` feature with materialized properties and geometry.
#[derive(Debug, Clone)]
struct FeatureRecord {
    id: Option<i64>,
    properties: JsonObject,
    geometry: Option<Geometry<f64>>,
}

/// Feature source reading a `GeoJSON` document or sequence into memory.
///
/// The attribute schema is inferred from the properties of all features and
/// sorted by name. Coordinates are WGS 84 (`EPSG:4326`) unless overridden with
/// [`GeoJsonSource::with_crs`].
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    uri: String,
    crs: Crs,
    kind: GeometryKind,
    fields: Vec<Field>,
    features: Vec<Feature>,
}

impl GeoJsonSource {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid `GeoJSON`.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let uri = path.display().to_string();
        let bytes = std::fs::read(path)
            .map_err(|e| SourceError::from(e).with_additional_context(uri.clone()))?;
        Self::from_bytes(&bytes, uri)
    }

    /// Parses `bytes`; `uri` names the data in errors and logs.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not valid `GeoJSON`.
    pub fn from_bytes(bytes: &[u8], uri: impl Into<String>) -> SourceResult<Self> {
        let uri = uri.into();
        let records =
            parse_geojson_bytes(bytes).map_err(|e| e.with_additional_context(uri.clone()))?;
        let fields = infer_fields(&records);
        let kind = infer_kind(&records);
        let features = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| to_feature(index, record, &fields))
            .collect::<Vec<_>>();
        debug!(
            "{uri}: {} features, {kind} geometries, {} fields",
            features.len(),
            fields.len()
        );
        Ok(Self {
            uri,
            crs: Crs::epsg(4326),
            kind,
            fields,
            features,
        })
    }

    /// Overrides the coordinate reference system.
    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if the source holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FeatureSource for GeoJsonSource {
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
        Ok(Box::new(self.features.iter().cloned().map(Ok::<_, anyhow::Error>)))
    }

    fn uri(&self) -> String {
        self.uri.clone()
    }
}

fn parse_geojson_bytes(bytes: &[u8]) -> SourceResult<Vec<FeatureRecord>> {
    match GeoJson::from_reader(bytes) {
        Ok(geojson) => geojson_to_records(geojson),
        Err(primary_err) => {
            let primary_err_message = primary_err.to_string();
            parse_geojson_sequence(bytes).map_err(|sequence_err| {
                SourceError::parse(
                    format!(
                        "Failed to parse GeoJSON as FeatureCollection ({primary_err_message}); \
                         also failed to parse as GeoJSON sequence: {sequence_err}"
                    ),
                    None,
                )
            })
        },
    }
}

fn geojson_to_records(geojson: GeoJson) -> SourceResult<Vec<FeatureRecord>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .map(feature_to_record)
            .collect(),
        GeoJson::Feature(feature) => Ok(vec![feature_to_record(feature)?]),
        GeoJson::Geometry(geometry) => Ok(vec![FeatureRecord {
            id: None,
            properties: JsonObject::new(),
            geometry: Some(convert_geometry(geometry)?),
        }]),
    }
}

fn feature_to_record(feature: geojson::Feature) -> SourceResult<FeatureRecord> {
    let geometry = feature.geometry.map(convert_geometry).transpose()?;
    let id = match feature.id {
        Some(Id::Number(n)) => n.as_i64(),
        Some(Id::String(s)) => s.parse().ok(),
        None => None,
    };
    Ok(FeatureRecord {
        id,
        properties: feature.properties.unwrap_or_default(),
        geometry,
    })
}

fn convert_geometry(geometry: GeoJsonGeometry) -> SourceResult<Geometry<f64>> {
    geometry.try_into().map_err(|err| {
        SourceError::parse(format!("Failed to convert GeoJSON geometry: {err}"), None)
    })
}

fn parse_geojson_sequence(bytes: &[u8]) -> SourceResult<Vec<FeatureRecord>> {
    let mut records = Vec::new();
    for (line_idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let position = Some(SourcePosition::line(line_idx as u64 + 1));
        let line = std::str::from_utf8(raw_line)
            .map_err(|err| {
                SourceError::parse(format!("GeoJSON line is not valid UTF-8: {err}"), position.clone())
            })?
            .trim();
        if line.is_empty() {
            continue;
        }
        let geojson = line.parse::<GeoJson>().map_err(|err| {
            SourceError::parse(format!("Failed to parse GeoJSON feature: {err}"), position.clone())
        })?;
        records.append(&mut geojson_to_records(geojson)?);
    }

    if records.is_empty() {
        Err(SourceError::parse("No GeoJSON features found", None))
    } else {
        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredScalarType {
    Null,
    Boolean,
    Int64,
    Float64,
    String,
}

impl InferredScalarType {
    fn update(self, value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => self,
            JsonValue::Bool(_) => match self {
                Self::Null | Self::Boolean => Self::Boolean,
                _ => Self::String,
            },
            JsonValue::Number(n) => match self {
                Self::Null | Self::Int64 if n.is_i64() => Self::Int64,
                Self::Null | Self::Int64 | Self::Float64 => Self::Float64,
                _ => Self::String,
            },
            JsonValue::String(_) | JsonValue::Array(_) | JsonValue::Object(_) => Self::String,
        }
    }

    fn field_type(self) -> FieldType {
        match self {
            Self::Null | Self::String => FieldType::String,
            Self::Boolean => FieldType::Boolean,
            Self::Int64 => FieldType::Int64,
            Self::Float64 => FieldType::Float64,
        }
    }
}

fn infer_fields(records: &[FeatureRecord]) -> Vec<Field> {
    let mut inferred: BTreeMap<String, InferredScalarType> = BTreeMap::new();
    for record in records {
        for (key, value) in &record.properties {
            let entry = inferred
                .entry(key.clone())
                .or_insert(InferredScalarType::Null);
            *entry = entry.update(value);
        }
    }
    inferred
        .into_iter()
        .map(|(name, ty)| Field::new(name, ty.field_type()))
        .collect()
}

/// Common kind of all geometries; single and multi variants of one family
/// merge into the multi kind.
fn infer_kind(records: &[FeatureRecord]) -> GeometryKind {
    let mut kinds = records
        .iter()
        .filter_map(|r| r.geometry.as_ref())
        .map(GeometryKind::of);
    let Some(first) = kinds.next() else {
        return GeometryKind::NoGeometry;
    };
    kinds.fold(first, |acc, kind| match (acc, kind) {
        (a, b) if a == b => a,
        (GeometryKind::Point | GeometryKind::MultiPoint, GeometryKind::Point | GeometryKind::MultiPoint) => {
            GeometryKind::MultiPoint
        },
        (
            GeometryKind::LineString | GeometryKind::MultiLineString,
            GeometryKind::LineString | GeometryKind::MultiLineString,
        ) => GeometryKind::MultiLineString,
        (
            GeometryKind::Polygon | GeometryKind::MultiPolygon,
            GeometryKind::Polygon | GeometryKind::MultiPolygon,
        ) => GeometryKind::MultiPolygon,
        _ => GeometryKind::Unknown,
    })
}

fn to_feature(index: usize, record: FeatureRecord, fields: &[Field]) -> Feature {
    let id = record
        .id
        .unwrap_or_else(|| i64::try_from(index + 1).unwrap_or(i64::MAX));
    let attributes = fields
        .iter()
        .map(|field| attribute(record.properties.get(&field.name), field.field_type))
        .collect();
    Feature::new(id, record.geometry, attributes)
}

#[allow(clippy::cast_precision_loss)]
fn attribute(value: Option<&JsonValue>, field_type: FieldType) -> AttributeValue {
    match (value, field_type) {
        (None | Some(JsonValue::Null), _) => AttributeValue::Null,
        (Some(JsonValue::Bool(b)), FieldType::Boolean) => AttributeValue::Bool(*b),
        (Some(JsonValue::Number(n)), FieldType::Int64) => {
            n.as_i64().map_or(AttributeValue::Null, AttributeValue::Int64)
        },
        (Some(JsonValue::Number(n)), FieldType::Float64) => {
            n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float64)
        },
        (Some(JsonValue::String(s)), _) => AttributeValue::String(s.clone()),
        (Some(other), _) => AttributeValue::String(other.to_string()),
    }
}
