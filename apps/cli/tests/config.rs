use std::error::Error;
use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn config_init_writes_defaults_once() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("conf").join("engine.json");

    Command::cargo_bin("printpreview")?
        .args(["config", "init", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(value["throttle"]["threshold"], 3);
    assert_eq!(value["raster"]["dpi"], 72);

    Command::cargo_bin("printpreview")?
        .args(["config", "init", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    Command::cargo_bin("printpreview")?
        .args(["config", "init", "--force", path.to_str().unwrap()])
        .assert()
        .success();
    Ok(())
}

#[test]
fn configured_paper_is_used_by_geometry() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.json");
    fs::write(
        &path,
        r#"{ "page_setup": { "paper": { "id": "a3", "width_mm": 297.0, "height_mm": 420.0 }, "orientation": "landscape" } }"#,
    )?;

    Command::cargo_bin("printpreview")?
        .args(["--config", path.to_str().unwrap(), "geometry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"a3\""))
        .stdout(predicate::str::contains("\"landscape\""));
    Ok(())
}

#[test]
fn malformed_config_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("engine.json");
    fs::write(&path, "{ broken")?;

    Command::cargo_bin("printpreview")?
        .args(["--config", path.to_str().unwrap(), "geometry"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse engine config"));
    Ok(())
}
