//! CLI command integration tests.
//! Each test uses a temp directory via SWIPE_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn swipe_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("swipe").unwrap();
    cmd.env("SWIPE_DATA_DIR", data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn with_catalog(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let entries: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, n)| format!(r#"{{"name":"{n}","posts":{}}}"#, 1000 - i))
        .collect();
    std::fs::write(
        dir.path().join("popular_character_tags.json"),
        format!("[{}]", entries.join(",")),
    )
    .unwrap();
    dir
}

fn extract_stat_value<'a>(stdout: &'a str, key: &str) -> &'a str {
    stdout
        .lines()
        .find(|l| l.starts_with(key))
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("")
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    swipe_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("pick"))
        .stdout(predicate::str::contains("interact"));
}

#[test]
fn stats_fresh_data_dir() {
    let dir = with_catalog(&["zelda", "link", "ganondorf"]);
    let output = swipe_cmd(&dir).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "characters:"), "3");
    assert_eq!(extract_stat_value(&stdout, "preferences:"), "0");
    assert_eq!(extract_stat_value(&stdout, "users:"), "0");
}

#[test]
fn stats_without_catalog_still_succeeds() {
    let dir = TempDir::new().unwrap();
    swipe_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("unavailable"));
}

#[test]
fn interact_then_prefs() {
    let dir = with_catalog(&["zelda", "link"]);

    swipe_cmd(&dir)
        .args(["interact", "u1", "zelda", "favorite"])
        .assert()
        .success()
        .stdout(predicate::str::contains("affinity 2"));
    swipe_cmd(&dir)
        .args(["interact", "u1", "link", "pass", "--view-time", "900"])
        .assert()
        .success()
        .stdout(predicate::str::contains("affinity -1"));

    let output = swipe_cmd(&dir).args(["prefs", "u1"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("zelda"), "highest affinity first: {stdout}");
    assert!(lines[1].contains("link"));

    let output = swipe_cmd(&dir).arg("stats").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "preferences:"), "2");
    assert_eq!(extract_stat_value(&stdout, "users:"), "1");
}

#[test]
fn interact_rejects_unknown_type() {
    let dir = TempDir::new().unwrap();
    swipe_cmd(&dir)
        .args(["interact", "u1", "zelda", "superlike"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid interaction type"));
}

#[test]
fn prefs_for_unknown_user() {
    let dir = TempDir::new().unwrap();
    swipe_cmd(&dir)
        .args(["prefs", "nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no preferences"));
}

#[test]
fn pick_respects_excludes() {
    let dir = with_catalog(&["a", "b", "c", "d"]);
    let output = swipe_cmd(&dir)
        .args(["pick", "--count", "10", "--exclude", "a,b", "--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut tags: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.split('\t').next())
        .collect();
    tags.sort();
    assert_eq!(tags, vec!["c", "d"]);
}

#[test]
fn pick_is_reproducible_with_seed() {
    let dir = with_catalog(&["a", "b", "c", "d", "e", "f", "g"]);
    let run = || {
        swipe_cmd(&dir)
            .args(["pick", "--count", "3", "--seed", "42"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn pick_everything_excluded_fails() {
    let dir = with_catalog(&["a"]);
    swipe_cmd(&dir)
        .args(["pick", "--exclude", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no characters available"));
}

#[test]
fn pick_without_catalog_fails() {
    let dir = TempDir::new().unwrap();
    swipe_cmd(&dir)
        .arg("pick")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load catalog"));
}

#[test]
fn bad_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("swipe.toml"), "bnid = 3\n").unwrap();
    swipe_cmd(&dir)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}
