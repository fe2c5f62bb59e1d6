//! CLI smoke tests through the built binary: init, status, cleanup, and the
//! run command's dry-run path. Nothing here touches the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dugout_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dugout");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(
        root.join("targets.csv"),
        "school_name,division,conference,athletics_base_url,roster_url,stats_url\n\
         State University,D1,Big Conf,https://gostate.example.invalid,,\n\
         Tech College,D2,Small Conf,https://gotech.example.invalid,/custom/roster,\n\
         Coastal College,D3,,https://coastal.example.invalid,,\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/dugout.db"

[targets]
path = "{root}/targets.csv"

[schedule]
max_targets_per_day = 2
season_start = "2026-02-01"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("dugout.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dugout(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dugout_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dugout binary at {binary:?}: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn init_creates_the_database() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, ok) = run_dugout(&config_path, &["init"]);
    assert!(ok, "init failed: {stderr}");
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("dugout.db").exists());

    // Idempotent.
    let (_, stderr, ok) = run_dugout(&config_path, &["init"]);
    assert!(ok, "second init failed: {stderr}");
}

#[test]
fn status_reports_zero_coverage_on_a_fresh_database() {
    let (_tmp, config_path) = setup_test_env();
    run_dugout(&config_path, &["init"]);

    let (stdout, stderr, ok) = run_dugout(&config_path, &["status"]);
    assert!(ok, "status failed: {stderr}");
    assert!(stdout.contains("initial scrape"), "unexpected: {stdout}");
    assert!(stdout.contains("0/3"), "unexpected: {stdout}");
    assert!(stdout.contains("D1: 0/1"), "unexpected: {stdout}");
}

#[test]
fn run_dry_run_lists_the_initial_batch_without_fetching() {
    let (_tmp, config_path) = setup_test_env();
    run_dugout(&config_path, &["init"]);

    let (_, stderr, ok) = run_dugout(&config_path, &["run", "--dry-run", "--force"]);
    assert!(ok, "dry run failed: {stderr}");
    // Cap is 2, tier order puts D1 and D2 ahead of D3.
    assert!(stderr.contains("State University"), "unexpected: {stderr}");
    assert!(stderr.contains("Tech College"), "unexpected: {stderr}");
    assert!(!stderr.contains("Coastal College"), "unexpected: {stderr}");
}

#[test]
fn recover_dry_run_lists_missing_targets() {
    let (_tmp, config_path) = setup_test_env();
    run_dugout(&config_path, &["init"]);

    let (_, stderr, ok) = run_dugout(&config_path, &["recover", "--dry-run"]);
    assert!(ok, "recover failed: {stderr}");
    assert!(stderr.contains("Coastal College"), "unexpected: {stderr}");
}

#[test]
fn cleanup_on_a_clean_database_finds_nothing() {
    let (_tmp, config_path) = setup_test_env();
    run_dugout(&config_path, &["init"]);

    let (stdout, stderr, ok) = run_dugout(&config_path, &["cleanup"]);
    assert!(ok, "cleanup failed: {stderr}");
    assert!(stdout.contains("No bad records found"));
}

#[test]
fn missing_config_is_a_clean_error() {
    let (_tmp, config_path) = setup_test_env();
    let bogus = config_path.with_file_name("nope.toml");
    let (_, stderr, ok) = run_dugout(&bogus, &["status"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
