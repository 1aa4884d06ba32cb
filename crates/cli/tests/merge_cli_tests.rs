// Integration tests for `dublist run | validate | stats`.
// Run with: cargo test -p dublist-cli --test merge_cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn dublist() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dublist"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../merge/tests/fixtures")
}

/// Write a config into `dir` that reads the shared fixture sources and writes
/// its output inside `dir`.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let fixtures = fixtures_dir();
    let f = |rel: &str| fixtures.join(rel).display().to_string().replace('\\', "/");
    let toml = format!(
        r#"
name = "CLI fixture"

[sources.mal]
dir = "{mal}"
canonical = true
mapping = "{mal_map}"

[sources.anilist]
dir = "{anilist}"
mapping = "{anilist_map}"

[sources.kitsu]
dir = "{kitsu}"
mapping = "{kitsu_map}"

[overrides]
dir = "{manual}"

{extra}
"#,
        mal = f("sources/mal"),
        mal_map = f("mappings/mal.csv"),
        anilist = f("sources/anilist"),
        anilist_map = f("mappings/anilist.csv"),
        kitsu = f("sources/kitsu"),
        kitsu_map = f("mappings/kitsu.csv"),
        manual = f("manual"),
    );
    let path = dir.join("dublist.merge.toml");
    std::fs::write(&path, toml).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    dublist().args(args).output().expect("dublist")
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(stdout: &str) -> serde_json::Value {
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed).unwrap_or_else(|e| {
        panic!(
            "stdout must be valid JSON.\nParse error: {}\nstdout:\n{}",
            e, trimmed
        )
    })
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// dublist run
// ===========================================================================

#[test]
fn run_writes_tiers_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[output]\ndir = \"final\"\nlegacy_tier = \"low\"");

    let output = run(&["run", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty(), "human mode keeps stdout clean");

    let err = stderr(&output);
    assert!(err.contains("merge 'CLI fixture'"), "{err}");
    assert!(err.contains("low 6, normal 3, high 1, very_high 0"), "{err}");
    assert!(err.contains("1 unmapped ids"), "{err}");

    let root = dir.path().join("final");
    assert!(root.join("low/dubbed_english.json").is_file());
    assert!(root.join("very_high/dubbed_french.json").is_file());
    assert!(root.join("dubbed_german.json").is_file());
    assert!(root.join("_merged.json").is_file());
    assert!(root.join("_diagnostics.json").is_file());
}

#[test]
fn run_json_is_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&["run", config.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    assert_eq!(val["meta"]["config_name"], "CLI fixture");
    assert_eq!(val["meta"]["incomplete_policy"], "annotate");
    assert_eq!(val["summary"]["entries"], 7);
    assert_eq!(val["summary"]["tier_counts"]["normal"], 3);
    assert_eq!(val["diagnostics"]["conflicting"][0]["canonical_id"], 40);
    assert_eq!(val["output"]["committed"], true);
    assert_eq!(val["output"]["dry_run"], false);

    let languages = val["output"]["languages"].as_array().unwrap();
    let low_english = languages
        .iter()
        .find(|d| d["tier"] == "low" && d["language"] == "english")
        .unwrap();
    assert_eq!(low_english["added_dubbed"], 3);
    assert_eq!(low_english["removed_dubbed"], 0);
    assert!(stderr(&output).contains("low/english: +3 dubbed"));
}

#[test]
fn second_run_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let config = config.to_str().unwrap();

    let first = run(&["run", config, "--json"]);
    assert!(first.status.success());
    let merged_before = std::fs::read(dir.path().join("final/_merged.json")).unwrap();

    let second = run(&["run", config, "--json"]);
    assert!(second.status.success());
    let val = assert_single_json(&String::from_utf8_lossy(&second.stdout));
    assert_eq!(val["output"]["committed"], false);
    assert_eq!(val["output"]["added"], serde_json::json!([]));
    assert_eq!(val["output"]["changed"], serde_json::json!([]));
    assert_eq!(val["output"]["languages"], serde_json::json!([]));
    assert!(stderr(&second).contains("unchanged"));

    let merged_after = std::fs::read(dir.path().join("final/_merged.json")).unwrap();
    assert_eq!(merged_before, merged_after);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&["run", config.to_str().unwrap(), "--dry-run"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("would write"));
    assert!(!dir.path().join("final").exists());
}

#[test]
fn report_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let report = dir.path().join("report.json");

    let output = run(&[
        "run",
        config.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(val["diagnostics"]["unmapped"][0]["source"], "anilist");
}

#[test]
fn strict_fails_on_diagnostics_exit_63() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&["run", config.to_str().unwrap(), "--strict"]);
    assert_eq!(output.status.code(), Some(63), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("diagnostics present"));
    // The dataset is still written.
    assert!(dir.path().join("final/_diagnostics.json").is_file());
}

#[test]
fn readme_stats_refreshed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "# Dataset\n").unwrap();
    let config = write_config(dir.path(), "[output]\nreadme = \"README.md\"");

    let output = run(&["run", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let readme = std::fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert!(readme.contains("<!-- LANG-STATS:START -->"));
    assert!(readme.contains("`final/low/dubbed_english.json`"));
}

#[test]
fn readme_failure_after_commit_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be read as a README.
    std::fs::create_dir_all(dir.path().join("README.md")).unwrap();
    let config = write_config(dir.path(), "[output]\nreadme = \"README.md\"");

    let output = run(&["run", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("README stats not refreshed"));
    assert!(dir.path().join("final/_merged.json").is_file());
}

#[test]
fn path_like_language_exits_61() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("proj/mal")).unwrap();
    std::fs::write(
        dir.path().join("proj/mal/dubbed_english.json"),
        r#"{"language": "x/../../../escaped", "dubbed": [1]}"#,
    )
    .unwrap();
    let config = dir.path().join("proj/dublist.merge.toml");
    std::fs::write(
        &config,
        "name = \"escape\"\n[sources.mal]\ndir = \"mal\"\ncanonical = true\n",
    )
    .unwrap();

    let output = run(&["run", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(61), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("not usable as a file name"));
    assert!(!dir.path().join("proj/final").exists());
    assert!(!dir.path().join("escaped.json").exists());
}

// ===========================================================================
// Error exits
// ===========================================================================

#[test]
fn missing_config_exits_2() {
    let output = run(&["run", "does-not-exist.merge.toml"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).starts_with("error: cannot read config"));
}

#[test]
fn invalid_config_exits_60() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.merge.toml");
    std::fs::write(
        &config,
        "name = \"bad\"\n[[tiers]]\nname = \"low\"\nmin_sources = 2\n[[tiers]]\nname = \"normal\"\nmin_sources = 1\n",
    )
    .unwrap();

    let output = run(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
    assert!(stderr(&output).contains("higher threshold"));

    let output = run(&["run", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn malformed_input_exits_61() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("mal")).unwrap();
    std::fs::write(dir.path().join("mal/dubbed_english.json"), "{\"dubbed\": [1,").unwrap();
    let config = dir.path().join("dublist.merge.toml");
    std::fs::write(
        &config,
        "name = \"broken\"\n[sources.mal]\ndir = \"mal\"\ncanonical = true\n",
    )
    .unwrap();

    let output = run(&["run", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(61), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("final").exists());
}

// ===========================================================================
// dublist validate / stats
// ===========================================================================

#[test]
fn validate_reports_shape() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&["validate", config.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("3 source(s)"), "{err}");
    assert!(err.contains("low>=1 normal>=2 high>=3 very_high>=4"), "{err}");
}

#[test]
fn stats_before_run_hints() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let output = run(&["stats", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(61));
    assert!(stderr(&output).contains("hint:  run `dublist run"));
}

#[test]
fn stats_json_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let config = config.to_str().unwrap();
    assert!(run(&["run", config]).status.success());

    let output = run(&["stats", config, "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = assert_single_json(&String::from_utf8_lossy(&output.stdout));
    let languages = val["languages"].as_array().unwrap();
    assert_eq!(languages[0]["key"], "english");
    assert_eq!(languages[0]["dubbed_count"], 3);

    let output = run(&["stats", config]);
    let table = String::from_utf8_lossy(&output.stdout);
    assert!(table.starts_with("| Language |"));
    assert!(table.contains("| German | Deutsch | 2 | 0 |"));
}
