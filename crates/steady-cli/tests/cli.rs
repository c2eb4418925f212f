//! CLI command integration tests.
//! Each test points STEADY_DATA_DIR at its own temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn steady_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("steady").unwrap();
    cmd.env("STEADY_DATA_DIR", data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn save_rifle(dir: &TempDir) {
    steady_cmd(dir)
        .args(["profile", "save", "rifle", "--y", "-0.7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved profile 'rifle'"));
}

#[test]
fn profile_list_empty() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no profiles saved"));
}

#[test]
fn profile_save_list_show_delete() {
    let dir = TempDir::new().unwrap();
    save_rifle(&dir);
    steady_cmd(&dir)
        .args(["profile", "save", "smg", "--x", "0.2", "--y", "-1.1", "--z", "0.5"])
        .assert()
        .success();

    assert!(dir.path().join("profiles.json").exists());

    steady_cmd(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rifle: x=0 y=-0.7 z=0"))
        .stdout(predicate::str::contains("smg: x=0.2 y=-1.1 z=0.5"));

    let output = steady_cmd(&dir)
        .args(["profile", "show", "smg"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["name"], "smg");
    assert_eq!(shown["axis_z"], 0.5);

    steady_cmd(&dir)
        .args(["profile", "delete", "smg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted profile 'smg'"));
    steady_cmd(&dir)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("smg").not());
}

#[test]
fn profile_show_missing_fails() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["profile", "show", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no profile named 'ghost'"));
}

#[test]
fn profile_delete_missing_fails() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["profile", "delete", "ghost"])
        .assert()
        .failure();
}

#[test]
fn simulate_fractional_vector() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["simulate", "--y", "-0.7", "--ticks", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tick 1: idle"))
        .stdout(predicate::str::contains("tick 2: move 0 -1"))
        .stdout(predicate::str::contains("total: dx=0 dy=-7 scroll=0"));
}

#[test]
fn simulate_saved_profile_with_reduction() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["profile", "save", "heavy", "--y", "-2", "--z", "1"])
        .assert()
        .success();
    steady_cmd(&dir)
        .args(["simulate", "--profile", "heavy", "--ticks", "4", "--reduction", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tick 1: move 0 -1"))
        .stdout(predicate::str::contains("tick 2: scroll 1"))
        .stdout(predicate::str::contains("total: dx=0 dy=-4 scroll=2"));
}

#[test]
fn simulate_uses_settings_vector_by_default() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.toml"), "axis_x = 1.5\naxis_y = 0.0\n").unwrap();
    steady_cmd(&dir)
        .args(["simulate", "--ticks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total: dx=3 dy=0 scroll=0"));
}

#[test]
fn settings_show_defaults() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("axis_y = -0.7"))
        .stdout(predicate::str::contains("modifier_key = \"ctrl\""));
    assert!(!dir.path().join("settings.toml").exists());
}

#[test]
fn settings_set_persists_and_feeds_simulate() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["settings", "set", "--y", "-1.5", "--reduction", "30", "--interval-ms", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("axis_y = -1.5"))
        .stdout(predicate::str::contains("reduction_percent = 30"))
        .stdout(predicate::str::contains("interval_ms = 100.0"));

    let saved = std::fs::read_to_string(dir.path().join("settings.toml")).unwrap();
    assert!(saved.contains("axis_y = -1.5"), "{saved}");

    steady_cmd(&dir)
        .args(["simulate", "--ticks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("total: dx=0 dy=-3 scroll=0"));
}

#[test]
fn simulate_rejects_bad_reduction() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["simulate", "--y", "1", "--reduction", "150"])
        .assert()
        .failure();
}

#[test]
fn run_emits_while_trigger_held() {
    let dir = TempDir::new().unwrap();
    save_rifle(&dir);
    steady_cmd(&dir)
        .args(["run", "--profile", "rifle"])
        .write_stdin("mouse left down\nwait 100\nmouse left up\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("move 0 -1"))
        .stdout(predicate::str::contains("stats: ticks="));
}

#[test]
fn run_disabled_emits_nothing() {
    let dir = TempDir::new().unwrap();
    save_rifle(&dir);
    steady_cmd(&dir)
        .args(["run", "--profile", "rifle"])
        .write_stdin("disable\nmouse left down\nwait 50\nmouse left up\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("move").not())
        .stdout(predicate::str::contains("pointer=0 scroll=0"));
}

#[test]
fn run_reports_bad_script_lines() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .arg("run")
        .write_stdin("# warm-up\njump\nload ghost\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("line 2: unknown command 'jump'"))
        .stderr(predicate::str::contains("no profile named 'ghost'"));
}

#[test]
fn run_survives_invalid_utf8_line() {
    let dir = TempDir::new().unwrap();
    save_rifle(&dir);
    let script: &[u8] = b"key \xff\xfe down\nmouse left down\nwait 100\nmouse left up\n";
    steady_cmd(&dir)
        .args(["run", "--profile", "rifle"])
        .write_stdin(script)
        .assert()
        .success()
        .stdout(predicate::str::contains("move 0 -1"))
        .stdout(predicate::str::contains("stats: ticks="));
}

#[test]
fn run_unknown_profile_fails() {
    let dir = TempDir::new().unwrap();
    steady_cmd(&dir)
        .args(["run", "--profile", "ghost"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no profile named 'ghost'"));
}
