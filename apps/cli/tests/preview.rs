use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn write_source(dir: &Path, lines: usize) -> Result<std::path::PathBuf, Box<dyn Error>> {
    let path = dir.join("source.rs");
    let text: String = (0..lines)
        .map(|n| format!("    let value_{n} = {n};\n"))
        .collect();
    fs::write(&path, text)?;
    Ok(path)
}

#[test]
fn preview_writes_one_png_per_page() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), 150)?;
    let out_dir = dir.path().join("pages");

    Command::cargo_bin("printpreview")?
        .args([
            "preview",
            input.to_str().unwrap(),
            "--out-dir",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("rendered 3 pages"))
        .stdout(predicate::str::contains("Ok"));

    for page in 1..=3 {
        let bytes = fs::read(out_dir.join(format!("page-{page}.png")))?;
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
    assert!(!out_dir.join("page-4.png").exists());
    Ok(())
}

#[test]
fn preview_honours_page_ranges() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), 150)?;
    let out_dir = dir.path().join("pages");

    Command::cargo_bin("printpreview")?
        .args([
            "preview",
            input.to_str().unwrap(),
            "--pages",
            "3,1",
            "--grayscale",
            "--out-dir",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("rendered 2 pages"));

    assert!(out_dir.join("page-1.png").exists());
    assert!(!out_dir.join("page-2.png").exists());
    assert!(out_dir.join("page-3.png").exists());
    Ok(())
}

#[test]
fn preview_rejects_invalid_settings() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), 10)?;

    Command::cargo_bin("printpreview")?
        .args(["preview", input.to_str().unwrap(), "--copies", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("`copies`"));

    Command::cargo_bin("printpreview")?
        .args(["preview", input.to_str().unwrap(), "--pages", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("`pageRange`"));
    Ok(())
}

#[test]
fn preview_of_empty_file_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("empty.txt");
    fs::write(&input, "")?;

    Command::cargo_bin("printpreview")?
        .args(["preview", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no renderable pages"));
    Ok(())
}

#[test]
fn local_job_settings_need_a_printer() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = write_source(dir.path(), 10)?;
    let job = dir.path().join("job.json");

    fs::write(&job, r#"{ "copies": 2 }"#)?;
    Command::cargo_bin("printpreview")?
        .args([
            "preview",
            input.to_str().unwrap(),
            "--job-settings",
            job.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("`printerName`"));

    fs::write(
        &job,
        r#"{ "printerName": "Office", "copies": 2, "marginsType": "none", "color": false }"#,
    )?;
    Command::cargo_bin("printpreview")?
        .args([
            "preview",
            input.to_str().unwrap(),
            "--job-settings",
            job.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("rendered 1 pages"));
    Ok(())
}

#[test]
fn geometry_reports_margins_as_json() -> Result<(), Box<dyn Error>> {
    let output = Command::cargo_bin("printpreview")?
        .args(["geometry", "--paper", "letter", "--margins", "none"])
        .output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["paper"], "letter");
    assert_eq!(report["orientation"], "portrait");
    assert_eq!(report["geometry"]["margin_top"], 0.0);
    assert!(report["geometry"]["content_width"].as_f64().unwrap_or_default() > 570.0);
    Ok(())
}
