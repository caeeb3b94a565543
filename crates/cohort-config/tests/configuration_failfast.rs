//! Malformed configuration never falls back to defaults.

use std::ffi::OsString;
use std::fs;

use cohort_config::{Config, LogFormat};
use rstest::rstest;
use tempfile::TempDir;

fn launcher_args(extra: &[&str]) -> Vec<OsString> {
    std::iter::once("cohort-launch")
        .chain(extra.iter().copied())
        .map(OsString::from)
        .collect()
}

#[rstest]
#[case("poll_interval_ms = \"soon\"")]
#[case("paffinity_processor = -1")]
#[case("debug_trace = 3")]
fn ill_typed_file_entries_fail_the_load(#[case] entry: &str) {
    let dir = TempDir::new().expect("temporary directory");
    let path = dir.path().join("cohort.toml");
    fs::write(&path, format!("{entry}\n")).expect("write configuration file");

    let mut args = launcher_args(&["--config-path"]);
    args.push(path.into_os_string());

    assert!(Config::load_from_iter(args).is_err(), "{entry} was accepted");
}

#[test]
fn unknown_log_format_fails_the_load() {
    let args = launcher_args(&["--log-format", "xml"]);

    assert!(Config::load_from_iter(args).is_err());
    assert!("xml".parse::<LogFormat>().is_err());
}
