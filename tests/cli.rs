use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rctx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rctx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("packages/router/src/yang")).unwrap();
    fs::create_dir_all(files_dir.join("scripts")).unwrap();
    fs::write(
        files_dir.join("README.md"),
        "# Examples\n\nService packages for routers and bgp peers.",
    )
    .unwrap();
    fs::write(
        files_dir.join("packages/router/src/yang/vrouter.yang"),
        "module vrouter {\n  namespace \"http://example.com/vrouter\";\n  prefix vr;\n}",
    )
    .unwrap();
    fs::write(
        files_dir.join("scripts/deploy.py"),
        "def deploy(device):\n    print('deploying', device)\n",
    )
    .unwrap();
    // Excluded by the default include globs.
    fs::write(files_dir.join("logo.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();

    let config_content = format!(
        r#"[server]
bind = "127.0.0.1:7341"

[retrieval]
top_k = 3

[corpus.filesystem]
root = "{}/files"
"#,
        root.display()
    );

    let config_path = config_dir.join("rctx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rctx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rctx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rctx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_load_counts_included_files() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rctx(&config_path, &["load"]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Loaded 3 documents."), "stdout={}", stdout);
}

#[test]
fn test_search_default_query_scenario() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rctx(&config_path, &["search", "vrouter"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. [1.00] packages/router/src/yang/vrouter.yang"));
    assert!(stdout.contains("url: file://"));
}

#[test]
fn test_search_partial_overlap_scores() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rctx(&config_path, &["search", "deploy kubernetes"]);
    assert!(success);
    assert!(stdout.contains("[0.50] scripts/deploy.py"), "stdout={}", stdout);
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rctx(&config_path, &["search", "zzzznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results."));

    let (stdout, _, success) = run_rctx(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_respects_k() {
    let (_tmp, config_path) = setup_test_env();

    // "module" only matches the yang file, "bgp" only the README.
    let (stdout, _, success) = run_rctx(&config_path, &["search", "module bgp", "--k", "1"]);
    assert!(success);
    assert!(stdout.contains("1. "));
    assert!(!stdout.contains("2. "), "stdout={}", stdout);
}

#[test]
fn test_get_prints_document() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rctx(&config_path, &["get", "scripts/deploy.py"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("--- scripts/deploy.py ---"));
    assert!(stdout.contains("### deploy.py\ndef deploy(device):"));
}

#[test]
fn test_get_missing_document() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_rctx(&config_path, &["get", "nope/missing.md"]);
    assert!(!success);
    assert!(stderr.contains("document not found"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rctx.toml");
    fs::write(&config_path, "[server]\nbind = \"127.0.0.1:7341\"\n\n[retrieval]\ntop_k = 0\n\n[corpus.filesystem]\nroot = \".\"\n").unwrap();

    let (_, stderr, success) = run_rctx(&config_path, &["load"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "stderr={}", stderr);
}
