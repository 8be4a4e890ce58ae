use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LABEL: &str = r#"{
    "input_path": "label_01.jpg",
    "parsing_res_list": [],
    "overall_ocr_res": {
        "rec_texts": ["Recipe", ":", "AB CD", "BadgeNo.", "SV2-250301-0042", "Min",
                      "0.100", "0.200", "1", "3.000", "Max", "4"],
        "rec_scores": [0.99, 0.80, 0.97, 0.98, 0.96, 0.99, 0.95, 0.95, 0.93, 0.95, 0.97, 0.92],
        "rec_boxes": [
            [40, 42, 120, 70], [130, 42, 140, 70], [200, 45, 300, 72],
            [40, 100, 150, 128], [205, 101, 380, 130], [70, 160, 120, 178],
            [70, 192, 150, 208], [230, 191, 300, 209], [400, 193, 440, 207],
            [70, 592, 150, 608], [230, 594, 300, 610], [400, 590, 440, 606]
        ]
    }
}"#;

/// Command with the user config directory pointed into the temp dir.
fn formscan(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("formscan").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path()).env("HOME", dir.path());
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_process_json() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "label_01_res.json", LABEL);

    formscan(&dir)
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""recipe": "AB CD""#))
        .stdout(predicate::str::contains(r#""badge_number": "SV2-250301-0042""#))
        .stdout(predicate::str::contains(r#""count": "4""#));
}

#[test]
fn test_process_csv() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "label_01_res.json", LABEL);

    formscan(&dir)
        .args(["process", "--format", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("badge_number,recipe,min,max,count\n"))
        .stdout(predicate::str::contains("SV2-250301-0042,AB CD,0.100,0.200,1\n"))
        .stdout(predicate::str::contains("SV2-250301-0042,AB CD,0.300,1.000,12\n"));
}

#[test]
fn test_process_shows_sources() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "label_01_res.json", LABEL);

    formscan(&dir)
        .args(["process", "--show-sources"])
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("recipe: coordinate_window"))
        .stderr(predicate::str::contains("2 rows detected, 4 from template"));
}

#[test]
fn test_process_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "label_01_res.json", LABEL);
    let output = dir.path().join("record.txt");

    formscan(&dir)
        .args(["process", "--format", "text", "--output"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written to"));

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("badge_number: SV2-250301-0042\nrecipe: AB CD\n"));
}

#[test]
fn test_process_empty_document_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "blank_res.json", "{}");

    formscan(&dir)
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""recipe": "IP PR""#))
        .stdout(predicate::str::contains(r#""badge_number": "SV2-250113-0370""#))
        .stdout(predicate::str::contains(r#""count": "12""#));
}

#[test]
fn test_process_missing_file() {
    let dir = TempDir::new().unwrap();

    formscan(&dir)
        .args(["process", "does_not_exist_res.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_process_malformed_json() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "broken_res.json", "{ not json");

    formscan(&dir)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read OCR result"));
}

#[test]
fn test_config_init_and_check() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("formscan.json");

    formscan(&dir)
        .args(["config", "init", "--output"])
        .arg(&config)
        .assert()
        .success();
    assert!(config.exists());

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Layout is valid"));
}

#[test]
fn test_config_set_is_checked() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("formscan.json");

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "layout.fields.0.adjacency_offset", "0"])
        .assert()
        .success();

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recipe.adjacency_offset of 0"));
}

#[test]
fn test_config_overrides_fallback() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("formscan.json");
    let input = write(dir.path(), "blank_res.json", "{}");

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "layout.fields.1.fallback_value", "SV9-000000-0000"])
        .assert()
        .success();

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "layout.fields.1.fallback_value"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SV9-000000-0000"));

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""badge_number": "SV9-000000-0000""#));
}

#[test]
fn test_batch_with_summary() {
    let dir = TempDir::new().unwrap();
    let input_dir = dir.path().join("in");
    let output_dir = dir.path().join("out");
    fs::create_dir_all(&input_dir).unwrap();
    write(&input_dir, "label_01_res.json", LABEL);
    write(&input_dir, "label_02_res.json", "{}");
    write(&input_dir, "label_03_res.json", "{ not json");

    let pattern = format!("{}/*.json", input_dir.display());
    formscan(&dir)
        .args(["batch", &pattern, "--summary", "--continue-on-error", "-j", "2", "--output-dir"])
        .arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files to process"))
        .stdout(predicate::str::contains("label_03_res.json"));

    assert!(output_dir.join("label_01.json").exists());
    assert!(output_dir.join("label_02.json").exists());
    assert!(!output_dir.join("label_03.json").exists());

    let summary = fs::read_to_string(output_dir.join("summary.csv")).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(
        lines[0],
        "filename,status,recipe,badge_number,detected_rows,filled_rows,processing_time_ms,error"
    );
    assert!(lines[1].starts_with("label_01_res.json,success,AB CD,SV2-250301-0042,2,4,"));
    assert!(lines[2].starts_with("label_02_res.json,success,IP PR,SV2-250113-0370,0,6,"));
    assert!(lines[3].starts_with("label_03_res.json,error,,,,,"));
}

#[test]
fn test_batch_stops_on_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken_res.json", "{ not json");

    let pattern = format!("{}/*.json", dir.path().display());
    formscan(&dir)
        .args(["batch", &pattern])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn test_batch_no_matches() {
    let dir = TempDir::new().unwrap();

    let pattern = format!("{}/*.json", dir.path().display());
    formscan(&dir)
        .args(["batch", &pattern])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files found"));
}

#[test]
fn test_batch_keeps_outputs_apart() {
    let dir = TempDir::new().unwrap();
    let input_dir = dir.path().join("in");
    let output_dir = dir.path().join("out");
    fs::create_dir_all(&input_dir).unwrap();
    write(&input_dir, "a.json", "{}");
    write(&input_dir, "a_res.json", LABEL);

    let pattern = format!("{}/*.json", input_dir.display());
    formscan(&dir)
        .args(["batch", &pattern, "--output-dir"])
        .arg(&output_dir)
        .assert()
        .success()
        .stderr(predicate::str::contains("already used"));

    let blank = fs::read_to_string(output_dir.join("a.json")).unwrap();
    let label = fs::read_to_string(output_dir.join("a_res.json")).unwrap();
    assert!(blank.contains(r#""recipe": "IP PR""#));
    assert!(label.contains(r#""recipe": "AB CD""#));
}

#[test]
fn test_reserved_field_name_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("formscan.json");
    let input = write(dir.path(), "blank_res.json", "{}");

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "layout.fields.0.name", "table"])
        .assert()
        .success();

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Field name table is reserved"));

    formscan(&dir)
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&input)
        .assert()
        .stderr(predicate::str::contains("Layout issue: Field name table is reserved"));
}
