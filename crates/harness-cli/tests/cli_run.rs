use assert_cmd::Command;

use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

fn write_corpus(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("corpus.csv");
    fs::write(&path, body).unwrap();
    path
}

fn harness() -> Command {
    let mut cmd = Command::cargo_bin("harness").unwrap();
    for var in [
        "HARNESS_CONFIG",
        "HARNESS_INPUT",
        "HARNESS_OUT_DIR",
        "HARNESS_TOOL",
        "HARNESS_TIMEOUT",
        "HARNESS_CONCURRENCY",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("HARNESS_LOG", "warn");
    cmd
}

#[test]
fn run_writes_report_and_exits_zero_despite_item_failures() {
    let dir = TempDir::new().unwrap();
    let input = write_corpus(
        &dir,
        "id,response\n1,\"```\necho hello\n```\"\n2,exit 4\n3,sleep 30\n",
    );
    let out = dir.path().join("results");

    harness()
        .arg("run")
        .arg("--input")
        .arg(&input)
        .args(["--column", "response", "--tool", "sh"])
        .args(["--script-ext", "sh", "--timeout", "1", "--kill-grace-ms", "100"])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(contains("Summary: 1 passed, 1 failed, 1 timed out, 0 error, 0 not started"));

    let report = fs::read_to_string(out.join("output_logs.csv")).unwrap();
    assert_eq!(
        report,
        "index,return_code,log_file\n1,0,log_1.txt\n2,4,log_2.txt\n3,-1,log_3.txt\n"
    );
    assert_eq!(fs::read_to_string(out.join("log_1.txt")).unwrap(), "hello");
    assert_eq!(fs::read_to_string(out.join("script_1.sh")).unwrap(), "echo hello");
}

#[test]
fn missing_column_is_config_error() {
    let dir = TempDir::new().unwrap();
    let input = write_corpus(&dir, "id,response\n1,exit 0\n");
    let out = dir.path().join("results");

    harness()
        .arg("run")
        .arg("--input")
        .arg(&input)
        .args(["--column", "final_script", "--tool", "sh"])
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .code(2)
        .stderr(contains("column 'final_script' not found"));

    assert!(!out.join("output_logs.csv").exists());
}

#[test]
fn missing_input_is_config_error() {
    let dir = TempDir::new().unwrap();
    harness()
        .arg("run")
        .arg("--input")
        .arg(dir.path().join("nope.csv"))
        .assert()
        .code(2)
        .stderr(contains("failed to read corpus"));
}

#[test]
fn missing_tool_still_exits_zero_with_sentinel_rows() {
    let dir = TempDir::new().unwrap();
    let input = write_corpus(&dir, "response\nprint(1)\nprint(2)\n");
    let out = dir.path().join("results");
    let json = dir.path().join("run.json");
    let junit = dir.path().join("junit.xml");

    harness()
        .arg("run")
        .arg("--input")
        .arg(&input)
        .args(["--tool", "/nonexistent/openroad", "--tool-arg", "-python"])
        .arg("--out-dir")
        .arg(&out)
        .arg("--json")
        .arg(&json)
        .arg("--junit")
        .arg(&junit)
        .assert()
        .success()
        .stderr(contains("2 error"));

    let report = fs::read_to_string(out.join("output_logs.csv")).unwrap();
    assert_eq!(
        report,
        "index,return_code,log_file\n1,-1,log_1.txt\n2,-1,log_2.txt\n"
    );

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(v["spawn_errored"], 2);
    assert_eq!(v["column"], "response");
    assert!(fs::read_to_string(&junit).unwrap().contains("<testsuite"));
}

#[test]
fn unwritable_extra_output_keeps_exit_zero() {
    let dir = TempDir::new().unwrap();
    let input = write_corpus(&dir, "response\nexit 0\n");
    let out = dir.path().join("results");

    harness()
        .arg("run")
        .arg("--input")
        .arg(&input)
        .args(["--tool", "sh", "--script-ext", "sh"])
        .arg("--out-dir")
        .arg(&out)
        .arg("--json")
        .arg(dir.path().join("missing_dir/run.json"))
        .arg("--junit")
        .arg(dir.path().join("missing_dir/junit.xml"))
        .assert()
        .code(0)
        .stderr(contains("failed to write json output"))
        .stderr(contains("failed to write junit output"));

    assert_eq!(
        fs::read_to_string(out.join("output_logs.csv")).unwrap(),
        "index,return_code,log_file\n1,0,log_1.txt\n"
    );
}

#[test]
fn prepare_materializes_without_executing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("corpus.tsv");
    fs::write(&input, "response\tnote\n\"```python\nprint('x')\n```\"\tfirst\ntouch ran\tsecond\n").unwrap();
    let out = dir.path().join("scripts");

    harness()
        .current_dir(dir.path())
        .arg("prepare")
        .arg("--input")
        .arg(&input)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(contains("prepared 2 scripts"));

    assert_eq!(fs::read_to_string(out.join("script_1.py")).unwrap(), "print('x')");
    assert_eq!(fs::read_to_string(out.join("script_2.py")).unwrap(), "touch ran");
    assert!(!out.join("output_logs.csv").exists());
    assert!(!dir.path().join("ran").exists());
}

#[test]
fn run_file_supplies_defaults() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, "response,other\nexit 0\nexit 0\nexit 0\n");
    let cfg = dir.path().join("harness.yaml");
    fs::write(
        &cfg,
        r#"
version: 1
input: corpus.csv
out_dir: out
limit: 2
script_ext: sh
tool:
  program: sh
"#,
    )
    .unwrap();

    harness()
        .arg("run")
        .arg("--config")
        .arg(&cfg)
        .assert()
        .success();

    let report = fs::read_to_string(dir.path().join("out/output_logs.csv")).unwrap();
    assert_eq!(report.lines().count(), 3);
}

#[test]
fn init_writes_sample_config_once() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("harness.yaml");

    harness()
        .arg("init")
        .arg("--config")
        .arg(&cfg)
        .assert()
        .success()
        .stderr(contains("created"));
    assert!(fs::read_to_string(&cfg).unwrap().contains("openroad"));

    harness()
        .arg("init")
        .arg("--config")
        .arg(&cfg)
        .assert()
        .success()
        .stderr(contains("already exists"));
}

#[test]
fn json_logs_carry_event_names() {
    let dir = TempDir::new().unwrap();
    let input = write_corpus(&dir, "response\nexit 0\n");

    harness()
        .env("HARNESS_LOG", "info")
        .args(["--log-format", "json", "run", "--tool", "sh"])
        .arg("--input")
        .arg(&input)
        .arg("--out-dir")
        .arg(dir.path().join("results"))
        .assert()
        .success()
        .stderr(contains("\"event\":\"run_finished\""))
        .stderr(contains("\"timestamp\""));
}
