use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn molminer() -> Command {
    let mut cmd: Command = cargo_bin_cmd!("molminer").into();
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Minimal PNG header, enough for the magic-byte check.
fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"\x89PNG\r\n\x1a\n0000").unwrap();
    path
}

// --- Binary startup ---

#[test]
fn binary_runs() {
    molminer()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("molminer"));
}

#[test]
fn help_lists_subcommands() {
    molminer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ocsr"))
        .stdout(predicate::str::contains("ner"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("extract"));
}

// --- Dry runs ---

#[test]
fn ocsr_dry_run_prints_command_line() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "figure.png");
    molminer()
        .args(["ocsr", "--dry-run"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("osra "))
        .stdout(predicate::str::contains("--format can"))
        .stdout(predicate::str::contains("--print"));
}

#[test]
fn ner_dry_run_prints_command_line() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("paper.txt");
    fs::write(&input, "benzene").unwrap();
    molminer()
        .args(["ner", "--dry-run"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("chemspot"))
        .stdout(predicate::str::contains("-t"));
}

#[test]
fn convert_dry_run_prints_command_line() {
    molminer()
        .args(["convert", "--dry-run", "ethanol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opsin"))
        .stdout(predicate::str::contains("--output smi"));
}

// --- Configuration errors ---

#[test]
fn missing_osra_binary_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "figure.png");
    molminer()
        .args(["ocsr", "--osra-path", "/nonexistent/osra", "--no-annotation"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn unsupported_input_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("data.bin");
    fs::write(&input, [0u8, 1, 2, 3, 0xff, 0xfe]).unwrap();
    molminer()
        .args(["ocsr", "--no-annotation"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported"));
}

// --- Empty input ---

#[test]
fn empty_text_input_yields_header_only_report() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("empty.txt");
    fs::write(&input, "").unwrap();
    // ChemSpot is never launched for empty text, so a bogus path is fine.
    molminer()
        .args([
            "ner",
            "--chemspot-path",
            "/nonexistent/chemspot",
            "--no-annotation",
        ])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("source;type;page"));
}

#[test]
fn ocsr_direct_pdf_flag_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let input = write_png(tmp.path(), "figure.png");
    molminer()
        .args(["ocsr", "--no-gm", "--dry-run"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("osra "));
}

#[test]
fn no_normalize_text_feeds_chemspot_as_is() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("markers.txt");
    fs::write(&input, "(2b)").unwrap();
    // Normalization strips the lone reference marker, leaving nothing to
    // tag, so ChemSpot is never launched.
    molminer()
        .args([
            "ner",
            "--chemspot-path",
            "/nonexistent/chemspot",
            "--no-annotation",
        ])
        .arg(&input)
        .assert()
        .success();
    // Without normalization the marker survives and ChemSpot is required.
    molminer()
        .args([
            "ner",
            "--no-normalize-text",
            "--chemspot-path",
            "/nonexistent/chemspot",
            "--no-annotation",
        ])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// --- Conversion through a stub binary ---

#[cfg(unix)]
fn write_fake_opsin(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("opsin");
    fs::write(
        &path,
        "#!/bin/sh\n\
         echo 'OPSIN stub' >&2\n\
         while IFS= read -r line || [ -n \"$line\" ]; do\n\
         if [ -n \"$line\" ]; then echo 'CCO'; fi\n\
         done\n",
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn convert_writes_conversion_report() {
    let tmp = TempDir::new().unwrap();
    let opsin = write_fake_opsin(tmp.path());
    let out = tmp.path().join("out.csv");
    molminer()
        .args(["convert", "Ethanol", "-o"])
        .arg(&out)
        .arg("--opsin-path")
        .arg(&opsin)
        .assert()
        .success();

    let content = fs::read_to_string(&out).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next().unwrap(), "iupac;smiles;inchi;inchikey;error");
    let row = lines.next().unwrap();
    // Names are normalized to lowercase before conversion.
    assert!(row.starts_with("ethanol;CCO;"), "unexpected row: {row}");
}

#[cfg(unix)]
#[test]
fn convert_reads_names_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let opsin = write_fake_opsin(tmp.path());
    molminer()
        .arg("convert")
        .arg("--opsin-path")
        .arg(&opsin)
        .arg("--no-header")
        .write_stdin("ethanol\nmethanol\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ethanol;CCO"))
        .stdout(predicate::str::contains("methanol;CCO"));
}

#[cfg(unix)]
#[test]
fn convert_raw_output_prints_tool_lines() {
    let tmp = TempDir::new().unwrap();
    let opsin = write_fake_opsin(tmp.path());
    molminer()
        .args(["convert", "--raw-output", "ethanol"])
        .arg("--opsin-path")
        .arg(&opsin)
        .assert()
        .success()
        .stdout(predicate::str::contains("CCO"));
}
