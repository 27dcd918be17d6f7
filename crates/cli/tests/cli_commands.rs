use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SOURCE: &str = "import os
import json

RETRIES = 3


class Engine:
    def start(self):
        return os.getpid()


def run():
    return Engine().start()
";

#[allow(deprecated)]
fn modforge(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modforge").expect("binary");
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

fn project() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("main.py"), SOURCE).unwrap();
    temp
}

fn json_stdout(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn rebuild_then_build_restores_the_source() {
    let temp = project();
    let root = temp.path();

    modforge(root)
        .args(["rebuild", "--project", ".", "--file", "main.py"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Decomposed 5 declarations"))
        .stdout(predicate::str::contains("config"));
    assert!(root.join("modules/config.py").is_file());
    assert!(root.join("modules/core.py").is_file());
    assert!(root.join("modules/.metadata/metadata.json").is_file());

    modforge(root)
        .args(["build", "--project", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("modules_built.py"));
    assert_eq!(
        fs::read_to_string(root.join("modules_built.py")).unwrap(),
        SOURCE
    );
}

#[test]
fn rebuild_json_report_lists_modules() {
    let temp = project();
    let output = modforge(temp.path())
        .args(["rebuild", "--file", "main.py", "--json"])
        .output()
        .unwrap();
    let report = json_stdout(&output);

    assert_eq!(report["declarations"], 5);
    let categories: Vec<&str> = report["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["category"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec!["config", "core"]);
    assert!(report["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn rebuild_honors_target_directory() {
    let temp = project();
    modforge(temp.path())
        .args(["rebuild", "--file", "main.py", "--target", "split"])
        .assert()
        .success();
    assert!(temp.path().join("split/core.py").is_file());
    assert!(!temp.path().join("modules").exists());
}

#[test]
fn build_with_cleanup_drops_unused_import() {
    let temp = project();
    let root = temp.path();
    modforge(root)
        .args(["rebuild", "--file", "main.py"])
        .assert()
        .success();

    let output = modforge(root)
        .args([
            "build",
            "--modules-dir",
            "modules",
            "--output",
            "out/app.py",
            "--cleanup",
            "--json",
        ])
        .output()
        .unwrap();
    let report = json_stdout(&output);

    assert_eq!(report["removed_imports"], serde_json::json!(["import json"]));
    assert_eq!(report["exact"], true);
    assert_eq!(
        fs::read_to_string(root.join("out/app.py")).unwrap(),
        SOURCE.replace("import json\n", "")
    );
}

#[test]
fn build_warns_but_succeeds_after_manual_edit() {
    let temp = project();
    let root = temp.path();
    modforge(root)
        .args(["rebuild", "--file", "main.py"])
        .assert()
        .success();
    let core = root.join("modules/core.py");
    let text = fs::read_to_string(&core).unwrap();
    fs::write(&core, text.replace("Engine().start()", "Engine().start() + 1")).unwrap();

    modforge(root)
        .args(["build", "--project", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 warning(s)"))
        .stderr(predicate::str::contains("was edited after decomposition"));
}

#[test]
fn build_requires_a_source_of_modules() {
    let temp = tempdir().unwrap();
    modforge(temp.path()).arg("build").assert().failure();
    modforge(temp.path())
        .args(["build", "--project", ".", "--modules-dir", "modules"])
        .assert()
        .failure();
}

#[test]
fn build_without_modules_reports_one_error_line() {
    let temp = tempdir().unwrap();
    modforge(temp.path())
        .args(["build", "--project", "."])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("modules directory not found"));
}

#[test]
fn rebuild_of_malformed_source_fails_cleanly() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("main.py"), "def broken(:\n    pass\n").unwrap();

    modforge(temp.path())
        .args(["rebuild", "--file", "main.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Parse error at line"));
    assert!(!temp.path().join("modules").exists());
}

#[test]
fn invalid_config_is_rejected() {
    let temp = project();
    fs::write(temp.path().join("bad.toml"), "categories = [\"Not Valid\"]\n").unwrap();

    modforge(temp.path())
        .args(["--config", "bad.toml", "rebuild", "--file", "main.py"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn project_config_file_is_discovered() {
    let temp = project();
    fs::write(
        temp.path().join("modforge.toml"),
        "[decompose]\ngenerate_init = false\n",
    )
    .unwrap();

    modforge(temp.path())
        .args(["rebuild", "--project", ".", "--file", "main.py"])
        .assert()
        .success();
    assert!(!temp.path().join("modules/__init__.py").exists());
}

#[test]
fn log_dir_receives_a_run_log() {
    let temp = project();
    modforge(temp.path())
        .args(["--log-dir", "logs", "rebuild", "--file", "main.py"])
        .assert()
        .success();

    let logs: Vec<_> = fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(logs.len(), 1);
    let name = logs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("modforge-") && name.ends_with(".log"));
    let contents = fs::read_to_string(&logs[0]).unwrap();
    assert!(contents.contains("Decomposed"), "log was: {contents}");
}

#[test]
fn dist_dry_run_prints_packager_command() {
    let temp = project();
    let root = temp.path();
    modforge(root)
        .args(["rebuild", "--file", "main.py"])
        .assert()
        .success();

    let output = modforge(root)
        .args([
            "dist",
            "--project",
            ".",
            "--tool",
            "pyinstaller",
            "--onefile",
            "--name",
            "engine",
            "--dry-run",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(line.starts_with("pyinstaller --onefile --name engine --distpath "));
    assert!(line.ends_with("main.py"));
    assert!(line.contains("dist"));

    let staged = fs::read_to_string(root.join("build/main.py")).unwrap();
    assert_eq!(staged, SOURCE.replace("import json\n", ""));
}

#[test]
fn dist_without_modules_packages_main_file() {
    let temp = project();
    let output = modforge(temp.path())
        .args(["dist", "--project", ".", "--tool", "cxfreeze", "--dry-run"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let line = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(line.starts_with("cxfreeze "));
    assert!(line.contains("--target-dir"));
    assert!(!temp.path().join("build").exists());
}

#[test]
fn dist_reports_missing_main_file() {
    let temp = tempdir().unwrap();
    modforge(temp.path())
        .args(["dist", "--project", ".", "--main", "app.py", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Main file not found"));
}
