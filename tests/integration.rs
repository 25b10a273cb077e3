use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const REPO: &str = "https://github.com/example/l7lb";

const GO_OUTPUT: &str = "goos: linux
goarch: amd64
pkg: github.com/example/l7lb
cpu: AMD EPYC 7763 64-Core Processor
BenchmarkRouteRequest-4   \t       1\t3147699311 ns/op\t  214536 B/op\t     609 allocs/op
PASS
ok  \tgithub.com/example/l7lb\t3.412s
";

fn benchkeep_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("benchkeep");
    path
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config_path: PathBuf,
    data_path: PathBuf,
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_path = root.join("dev/bench/data.js");
    let config_content = format!(
        r#"[store]
path = "{}"

[repository]
url = "{REPO}"

[ingest]
tool_group = "Go Benchmarks"
tool = "go"
"#,
        data_path.display()
    );
    let config_path = config_dir.join("benchkeep.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(root.join("bench.txt"), GO_OUTPUT).unwrap();
    write_commit(&root, "commit.json", "63fad0f98cb82527039d85243ab3464724634101", true);

    TestEnv {
        _tmp: tmp,
        root,
        config_path,
        data_path,
    }
}

fn write_commit(root: &Path, file: &str, id: &str, distinct: bool) -> PathBuf {
    let content = format!(
        r#"{{
  "author": {{"email": "dev@example.com", "name": "Dev", "username": "dev"}},
  "committer": {{"email": "noreply@github.com", "name": "GitHub", "username": "web-flow"}},
  "distinct": {distinct},
  "id": "{id}",
  "message": "Tune router",
  "timestamp": "2024-11-20T20:01:56-06:00",
  "tree_id": "de023154838bbcd38d374e20830986323c82da98",
  "url": "{REPO}/commit/{id}"
}}"#
    );
    let path = root.join(file);
    fs::write(&path, content).unwrap();
    path
}

fn run_benchkeep(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = benchkeep_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run benchkeep binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest_go(env: &TestEnv, commit_file: &str) -> (String, String, bool) {
    let commit = env.root.join(commit_file);
    let input = env.root.join("bench.txt");
    run_benchkeep(
        &env.config_path,
        &[
            "ingest",
            "--commit",
            commit.to_str().unwrap(),
            "--input",
            input.to_str().unwrap(),
            "--format",
            "go",
        ],
    )
}

#[test]
fn test_init_creates_document() {
    let env = setup_test_env();

    let (stdout, stderr, success) = run_benchkeep(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let content = fs::read_to_string(&env.data_path).unwrap();
    assert!(content.starts_with("window.BENCHMARK_DATA = "));
    assert!(content.contains(REPO));
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();

    let (_, _, success1) = run_benchkeep(&env.config_path, &["init"]);
    assert!(success1, "First init failed");
    let before = fs::read(&env.data_path).unwrap();

    let (stdout, _, success2) = run_benchkeep(&env.config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
    assert!(stdout.contains("already initialized"));
    assert_eq!(fs::read(&env.data_path).unwrap(), before);
}

#[test]
fn test_ingest_go_output() {
    let env = setup_test_env();

    let (stdout, stderr, success) = ingest_go(&env, "commit.json");
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("applied: true"));
    assert!(stdout.contains("points: 4"));
    assert!(stdout.contains("snapshots: 1"));

    let content = fs::read_to_string(&env.data_path).unwrap();
    assert!(content.contains("\"BenchmarkRouteRequest - allocs/op\""));
    assert!(content.contains("\"extra\": \"1 times\\n4 procs\""));
}

#[test]
fn test_duplicate_ingest_is_noop() {
    let env = setup_test_env();

    let (_, _, success) = ingest_go(&env, "commit.json");
    assert!(success);
    let before = fs::read(&env.data_path).unwrap();

    let (stdout, stderr, success) = ingest_go(&env, "commit.json");
    assert!(success, "second ingest failed: {}", stderr);
    assert!(stdout.contains("applied: false"));
    assert!(stdout.contains("points: 0"));
    assert!(stdout.contains("snapshots: 1"));
    assert_eq!(fs::read(&env.data_path).unwrap(), before);
}

#[test]
fn test_second_commit_appends() {
    let env = setup_test_env();
    write_commit(&env.root, "next.json", "bb1c4a7e0d", true);

    ingest_go(&env, "commit.json");
    let (stdout, _, success) = ingest_go(&env, "next.json");
    assert!(success);
    assert!(stdout.contains("snapshots: 2"));
}

#[test]
fn test_non_distinct_commit_skipped() {
    let env = setup_test_env();
    write_commit(&env.root, "merge.json", "c0ffee00", false);

    let (stdout, stderr, success) = ingest_go(&env, "merge.json");
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("applied: false"));
    assert!(!env.data_path.exists());
}

#[test]
fn test_export_round_trip() {
    let env = setup_test_env();
    ingest_go(&env, "commit.json");

    let (stdout, _, success) = run_benchkeep(&env.config_path, &["export"]);
    assert!(success);
    assert_eq!(stdout, fs::read_to_string(&env.data_path).unwrap());

    let json_path = env.root.join("out/data.json");
    let (_, stderr, success) = run_benchkeep(
        &env.config_path,
        &["export", "--output", json_path.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(doc["repoUrl"], REPO);
    let snapshots = doc["entries"]["Go Benchmarks"].as_array().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["tool"], "go");
    let names: Vec<&str> = snapshots[0]["benches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "BenchmarkRouteRequest",
            "BenchmarkRouteRequest - ns/op",
            "BenchmarkRouteRequest - B/op",
            "BenchmarkRouteRequest - allocs/op",
        ]
    );
    assert_eq!(snapshots[0]["benches"][2]["value"], 214536);
}

#[test]
fn test_query_by_bench() {
    let env = setup_test_env();
    ingest_go(&env, "commit.json");

    let (stdout, _, success) = run_benchkeep(
        &env.config_path,
        &["query", "--group", "Go Benchmarks", "--bench", "BenchmarkRouteRequest"],
    );
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("commit\t"));
    assert!(lines[4].contains("BenchmarkRouteRequest - allocs/op\t609\tallocs/op"));

    let (stdout, _, _) = run_benchkeep(
        &env.config_path,
        &[
            "query",
            "--group",
            "Go Benchmarks",
            "--label",
            "BenchmarkRouteRequest - B/op",
        ],
    );
    assert_eq!(stdout.lines().count(), 2);
}

#[test]
fn test_stats() {
    let env = setup_test_env();
    ingest_go(&env, "commit.json");

    let (stdout, _, success) = run_benchkeep(&env.config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Go Benchmarks"));
    assert!(stdout.contains(REPO));
}

#[test]
fn test_corrupt_document_is_not_overwritten() {
    let env = setup_test_env();
    fs::create_dir_all(env.data_path.parent().unwrap()).unwrap();
    fs::write(&env.data_path, "window.BENCHMARK_DATA = {\"lastUpdate\": ").unwrap();

    let (stdout, stderr, success) = ingest_go(&env, "commit.json");
    assert!(!success, "ingest should fail: stdout={}", stdout);
    assert!(stderr.contains("corrupt"), "stderr={}", stderr);
    assert_eq!(
        fs::read_to_string(&env.data_path).unwrap(),
        "window.BENCHMARK_DATA = {\"lastUpdate\": "
    );

    let (_, _, success) = run_benchkeep(&env.config_path, &["init"]);
    assert!(!success);
}

#[test]
fn test_held_lock_reports_conflict() {
    let env = setup_test_env();
    run_benchkeep(&env.config_path, &["init"]);
    fs::write(env.root.join("dev/bench/data.js.lock"), "other writer").unwrap();

    let (_, stderr, success) = ingest_go(&env, "commit.json");
    assert!(!success);
    assert!(stderr.contains("retry"), "stderr={}", stderr);
    assert!(stderr.contains("remove the lock file"), "stderr={}", stderr);
    assert!(stderr.contains("data.js.lock"), "stderr={}", stderr);
}
