//! End-to-end tests of the `geoetl` binary against the shell test modules.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use geoetl_stream::Decoder;
use predicates::prelude::*;

const GRID: &str = "ncols 4
nrows 3
xllcorner 100
yllcorner 200
cellsize 10
NODATA_value -9999
1 2 3 4
5 6 -9999 8
9 10 11 12
";

const POINTS: &str = r#"{"type":"FeatureCollection","features":[
{"type":"Feature","geometry":{"type":"Point","coordinates":[10.0,45.0]},"properties":{"name":"Turin"}},
{"type":"Feature","geometry":{"type":"Point","coordinates":[11.0,46.0]},"properties":{"name":"Trento"}}
]}"#;

fn modules_dir() -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("geoetl-core")
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

fn geoetl() -> Command {
    let mut cmd = Command::cargo_bin("geoetl").unwrap();
    cmd.env_remove("GEOETL_MODULE_PATH")
        .env_remove("GISBASE")
        .arg("--module-dir")
        .arg(modules_dir());
    cmd
}

fn write_input(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    fs::write(&path, content).unwrap();
    path
}

fn stream_path(db: &Path, name: &str) -> PathBuf {
    db.join("world").join("PERMANENT").join(format!("{name}.stream"))
}

/// Test that help lists every subcommand
#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("geoetl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("raster"))
        .stdout(predicate::str::contains("vector"))
        .stdout(predicate::str::contains("copy"))
        .stdout(predicate::str::contains("names"));
}

/// Test that the chunk size flag is documented in bytes
#[test]
fn test_help_chunk_bytes_unit() {
    Command::cargo_bin("geoetl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--chunk-bytes <BYTES>"))
        .stdout(predicate::str::contains("PIXELS").not());
}

/// Test importing an ASCII grid streams its native size
#[test]
fn test_raster_import() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "dem.asc", GRID);
    let db = dir.path().join("db");

    geoetl()
        .arg("raster")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(&db)
        .args(["--location", "world", "--name", "dem"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Succeeded"));

    let bytes = fs::read(stream_path(&db, "dem"))?;
    let mut decoder = Decoder::new(&bytes);
    let header = decoder.get_raster_header()?;
    assert_eq!((header.width, header.height), (4, 3));
    let row = decoder.get_row_record()?.expect("row record");
    assert_eq!(&row[0..4], &1i32.to_be_bytes());
    Ok(())
}

/// Test that an explicit extent and size resample the grid
#[test]
fn test_raster_import_with_extent() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "dem.asc", GRID);
    let db = dir.path().join("db");

    geoetl()
        .arg("raster")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(&db)
        .args(["--location", "world", "--name", "coarse"])
        .args(["--extent=100,200,140,230", "--width", "2", "--height", "1"])
        .assert()
        .success();

    let bytes = fs::read(stream_path(&db, "coarse"))?;
    let mut decoder = Decoder::new(&bytes);
    let header = decoder.get_raster_header()?;
    assert_eq!((header.width, header.height), (2, 1));
    let row = decoder.get_row_record()?.expect("row record");
    assert_eq!(row, [6i32.to_be_bytes(), 8i32.to_be_bytes()].concat());
    assert!(decoder.is_empty());
    Ok(())
}

/// Test importing a GeoJSON file sends every feature and the end-of-pass sentinel
#[test]
fn test_vector_import() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "cities.geojson", POINTS);
    let db = dir.path().join("db");

    geoetl()
        .arg("vector")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(&db)
        .args(["--location", "world", "--name", "cities"])
        .assert()
        .success();

    let bytes = fs::read(stream_path(&db, "cities"))?;
    let mut decoder = Decoder::new(&bytes);
    let header = decoder.get_vector_header()?;
    assert_eq!(header.fields.len(), 1);
    assert_eq!(decoder.get_feature_record()?.map(|f| f.id), Some(1));
    assert_eq!(decoder.get_feature_record()?.map(|f| f.id), Some(2));
    assert!(!decoder.get_feature_record()?.expect("sentinel").is_valid());
    assert!(decoder.is_empty());
    Ok(())
}

/// Test that a failing module exits non-zero with its error output
#[test]
fn test_module_failure_exit_code() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "cities.geojson", POINTS);

    geoetl()
        .arg("vector")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(dir.path().join("db"))
        .args(["--location", "world", "--name", "fail_cities"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad input"));
    Ok(())
}

/// Test that a missing module prints a hint about the module directory
#[test]
fn test_missing_module_prints_hint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "dem.asc", GRID);

    Command::cargo_bin("geoetl")?
        .env_remove("GEOETL_MODULE_PATH")
        .arg("--module-dir")
        .arg(dir.path().join("no-modules"))
        .arg("raster")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(dir.path().join("db"))
        .args(["--location", "world", "--name", "dem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot start module"))
        .stderr(predicate::str::contains("GEOETL_MODULE_PATH"));
    Ok(())
}

/// Test that an unreadable input fails before any module starts
#[test]
fn test_missing_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    geoetl()
        .arg("vector")
        .arg("--input")
        .arg(dir.path().join("missing.geojson"))
        .arg("--gisdbase")
        .arg(dir.path())
        .args(["--location", "world", "--name", "roads"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("I/O error while reading"));
    Ok(())
}

/// Test that a zero chunk size is rejected
#[test]
fn test_zero_chunk_bytes_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "dem.asc", GRID);
    geoetl()
        .args(["--chunk-bytes", "0"])
        .arg("raster")
        .arg("--input")
        .arg(&input)
        .arg("--gisdbase")
        .arg(dir.path())
        .args(["--location", "world", "--name", "dem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Invalid chunk-bytes option: must be greater than zero",
        ));
    Ok(())
}

/// Test copying a raster map to another mapset
#[test]
fn test_copy_raster() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path();
    let permanent = db.join("world").join("PERMANENT");
    fs::create_dir_all(permanent.join("cellhd"))?;
    fs::create_dir_all(permanent.join("cell"))?;
    fs::write(permanent.join("cellhd").join("dem"), "rows: 3\n")?;
    fs::write(permanent.join("cell").join("dem"), [1u8, 2, 3])?;

    geoetl()
        .arg("copy")
        .arg("--gisdbase")
        .arg(db)
        .args(["--location", "world", "--kind", "raster"])
        .args(["--from-name", "dem", "--to-mapset", "user1"])
        .assert()
        .success();

    let user1 = db.join("world").join("user1");
    assert_eq!(fs::read_to_string(user1.join("cellhd").join("dem"))?, "rows: 3\n");
    assert_eq!(fs::read(user1.join("cell").join("dem"))?, vec![1u8, 2, 3]);
    Ok(())
}

/// Test that copying a missing map fails
#[test]
fn test_copy_missing_map() -> Result<()> {
    let dir = tempfile::tempdir()?;
    geoetl()
        .arg("copy")
        .arg("--gisdbase")
        .arg(dir.path())
        .args(["--location", "world", "--kind", "vector"])
        .args(["--from-name", "roads", "--to-mapset", "user1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vector map 'roads' not found"));
    Ok(())
}

/// Test that names lists one map per raster band
#[test]
fn test_names_raster() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_input(dir.path(), "dem.asc", GRID);
    geoetl()
        .args(["names", "raster", "--name", "elevation", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Maps (1 total)"))
        .stdout(predicate::str::contains("elevation"));
    Ok(())
}
