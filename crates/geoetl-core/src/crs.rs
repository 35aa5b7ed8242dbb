//! Store CRS lookup and the built-in coordinate transforms.

use std::cell::RefCell;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use geo::MapCoordsInPlace;
use geo::{Coord, Geometry};
use geoetl_core_common::{CoordinateTransform, Crs, StoreObject, TransformFactory};
use log::debug;

/// Reads the CRS of the location holding `object`.
///
/// Locations record their EPSG code in `PERMANENT/PROJ_EPSG` as a
/// `epsg: <code>` line. A missing or unreadable file yields the invalid CRS,
/// which disables reprojection.
#[must_use]
pub fn location_crs(object: &StoreObject) -> Crs {
    let path = object.location_path().join("PERMANENT").join("PROJ_EPSG");
    read_proj_epsg(&path)
}

fn read_proj_epsg(path: &Path) -> Crs {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_proj_epsg(&text),
        Err(e) => {
            debug!("No location CRS at {}: {e}", path.display());
            Crs::invalid()
        },
    }
}

fn parse_proj_epsg(text: &str) -> Crs {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("epsg"))
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .map_or_else(Crs::invalid, Crs::epsg)
}

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
const MAX_MERCATOR: f64 = 20_037_508.342_789_244;

/// Transforms between geographic WGS 84 (EPSG:4326) and Web Mercator
/// (EPSG:3857).
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTransforms;

impl TransformFactory for BuiltinTransforms {
    fn create(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>> {
        match (source.epsg_code(), target.epsg_code()) {
            (Some(4326), Some(3857)) => Ok(Box::new(WebMercator::Forward)),
            (Some(3857), Some(4326)) => Ok(Box::new(WebMercator::Inverse)),
            _ => bail!("No transform available from {source} to {target}"),
        }
    }
}

/// Spherical Web Mercator projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebMercator {
    /// Longitude/latitude degrees to metres
    Forward,
    /// Metres to longitude/latitude degrees
    Inverse,
}

impl WebMercator {
    fn project(self, c: Coord<f64>) -> Result<Coord<f64>> {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(anyhow!("Non-finite coordinate ({}, {})", c.x, c.y));
        }
        match self {
            WebMercator::Forward => {
                if c.y.abs() > MAX_LATITUDE || c.x.abs() > 180.0 {
                    bail!("Coordinate ({}, {}) is outside the Web Mercator area", c.x, c.y);
                }
                Ok(Coord {
                    x: EARTH_RADIUS * c.x.to_radians(),
                    y: EARTH_RADIUS * (FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln(),
                })
            },
            WebMercator::Inverse => {
                // small tolerance for rounding at the edges
                let limit = MAX_MERCATOR * 1.000_001;
                if c.x.abs() > limit || c.y.abs() > limit {
                    bail!("Coordinate ({}, {}) is outside the Web Mercator area", c.x, c.y);
                }
                Ok(Coord {
                    x: (c.x / EARTH_RADIUS).to_degrees(),
                    y: (2.0 * (c.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees(),
                })
            },
        }
    }
}

impl CoordinateTransform for WebMercator {
    fn transform(&self, geometry: &mut Geometry<f64>) -> Result<()> {
        let direction = *self;
        // first failure wins; remaining coordinates are left as they are
        let failure = RefCell::new(None);
        geometry.map_coords_in_place(|c| match direction.project(c) {
            Ok(projected) => projected,
            Err(e) => {
                let mut slot = failure.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                c
            },
        });
        match failure.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Point, point};
    use geoetl_core_common::ObjectKind;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_parse_proj_epsg() {
        assert_eq!(parse_proj_epsg("epsg: 32633\n"), Crs::epsg(32633));
        assert_eq!(parse_proj_epsg("EPSG:4326"), Crs::epsg(4326));
        assert_eq!(parse_proj_epsg("name: foo\n"), Crs::invalid());
        assert_eq!(parse_proj_epsg("epsg: abc"), Crs::invalid());
    }

    #[test]
    fn test_location_crs_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let permanent = dir.path().join("world").join("PERMANENT");
        std::fs::create_dir_all(&permanent).unwrap();
        std::fs::write(permanent.join("PROJ_EPSG"), "epsg: 3857\n").unwrap();
        let object = StoreObject::new(dir.path(), "world", "user1", "roads", ObjectKind::Vector);
        assert_eq!(location_crs(&object), Crs::epsg(3857));
    }

    #[test]
    fn test_location_crs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoreObject::new(dir.path(), "world", "user1", "roads", ObjectKind::Vector);
        assert!(!location_crs(&object).is_valid());
    }

    #[test]
    fn test_forward_and_inverse() {
        let mut geometry = Geometry::Point(point!(x: 10.0, y: 45.0));
        WebMercator::Forward.transform(&mut geometry).unwrap();
        let Geometry::Point(p) = geometry else {
            panic!("expected a point");
        };
        assert_close(p.x(), 1_113_194.907_932_735_7);
        assert_close(p.y(), 5_621_521.486_192_066);

        let mut geometry = Geometry::Point(p);
        WebMercator::Inverse.transform(&mut geometry).unwrap();
        let Geometry::Point(p) = geometry else {
            panic!("expected a point");
        };
        assert_close(p.x(), 10.0);
        assert_close(p.y(), 45.0);
    }

    #[test]
    fn test_forward_rejects_pole() {
        let mut geometry = Geometry::Point(Point::new(0.0, 90.0));
        assert!(WebMercator::Forward.transform(&mut geometry).is_err());
    }

    #[test]
    fn test_collection_reports_first_failure() {
        let mut geometry = Geometry::GeometryCollection(geo::GeometryCollection(vec![
            Geometry::Point(Point::new(10.0, 45.0)),
            Geometry::Point(Point::new(0.0, 89.5)),
            Geometry::Point(Point::new(0.0, 95.0)),
        ]));
        let err = WebMercator::Forward.transform(&mut geometry).unwrap_err();
        assert!(err.to_string().contains("89.5"), "{err}");
    }

    #[test]
    fn test_collection_is_projected() {
        let mut geometry = Geometry::GeometryCollection(geo::GeometryCollection(vec![
            Geometry::Point(Point::new(10.0, 45.0)),
        ]));
        WebMercator::Forward.transform(&mut geometry).unwrap();
        let Geometry::GeometryCollection(collection) = geometry else {
            panic!("expected a collection");
        };
        let Geometry::Point(p) = &collection.0[0] else {
            panic!("expected a point");
        };
        assert_close(p.x(), 1_113_194.907_932_735_7);
    }

    #[test]
    fn test_factory_pairs() {
        let factory = BuiltinTransforms;
        assert!(factory.create(&Crs::epsg(4326), &Crs::epsg(3857)).is_ok());
        assert!(factory.create(&Crs::epsg(3857), &Crs::epsg(4326)).is_ok());
        let err = factory
            .create(&Crs::epsg(4326), &Crs::epsg(32633))
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "No transform available from EPSG:4326 to EPSG:32633"
        );
    }
}
