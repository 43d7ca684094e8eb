use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn digest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("digest");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("contract.txt"),
        "Supply contract between Alpha and Beta.\n\nPayment is due within 30 days of delivery.\n\nPenalties apply to late deliveries.",
    )
    .unwrap();
    fs::write(
        files_dir.join("notes.md"),
        "# Notes\n\nKickoff meeting scheduled for Monday.",
    )
    .unwrap();
    fs::write(files_dir.join("tool.exe"), b"MZ\x90\x00").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/digest.sqlite"

[chunking]
max_chunk_size = 1500

[completion]
provider = "disabled"

[embedding]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("digest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_digest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = digest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run digest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

fn ingest_contract(tmp: &TempDir, config_path: &Path) -> String {
    let (stdout, stderr, success) = run_digest(
        config_path,
        &[
            "ingest",
            &file(tmp, "contract.txt"),
            "--user",
            "alice",
            "--file-id",
            "doc-contract",
        ],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_digest(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("digest.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_digest(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_digest(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_text_file() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);

    let stdout = ingest_contract(&tmp, &config_path);
    assert!(stdout.contains("file id: doc-contract"), "{}", stdout);
    assert!(stdout.contains("chunks: 3"), "{}", stdout);
    assert!(stdout.contains("knowledge entries: 3"), "{}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_duplicate_is_reported() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);

    let path = file(&tmp, "notes.md");
    let (first, _, success) = run_digest(&config_path, &["ingest", &path, "--user", "alice"]);
    assert!(success);
    assert!(first.contains("chunks: 2"), "{}", first);

    let (second, stderr, success) =
        run_digest(&config_path, &["ingest", &path, "--user", "alice"]);
    assert!(success, "duplicate upload should not fail: {}", stderr);
    assert!(second.contains("already exists"), "{}", second);

    // A different user may upload the same file.
    let (third, _, success) = run_digest(&config_path, &["ingest", &path, "--user", "bob"]);
    assert!(success);
    assert!(third.contains("chunks: 2"), "{}", third);
}

#[test]
fn test_ingest_unsupported_format_fails() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);

    let (_, stderr, success) = run_digest(
        &config_path,
        &["ingest", &file(&tmp, "tool.exe"), "--user", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("unsupported file format"), "{}", stderr);

    let (stdout, _, _) = run_digest(&config_path, &["documents", "--user", "alice"]);
    assert!(stdout.contains("No documents"), "{}", stdout);
}

#[test]
fn test_documents_and_status() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (stdout, _, success) = run_digest(&config_path, &["documents", "--user", "alice"]);
    assert!(success);
    assert!(stdout.contains("doc-contract"), "{}", stdout);
    assert!(stdout.contains("pending"), "{}", stdout);
    assert!(stdout.contains("contract.txt"), "{}", stdout);

    let (other, _, _) = run_digest(&config_path, &["documents", "--user", "bob"]);
    assert!(!other.contains("doc-contract"));

    let (status, _, success) = run_digest(
        &config_path,
        &["status", "doc-contract", "--user", "alice"],
    );
    assert!(success);
    assert!(status.contains("0 / 3 processed"), "{}", status);
}

#[test]
fn test_other_user_cannot_reach_document() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    for cmd in ["status", "report", "delete"] {
        let (_, stderr, success) =
            run_digest(&config_path, &[cmd, "doc-contract", "--user", "bob"]);
        assert!(!success, "{} should fail for bob", cmd);
        assert!(stderr.contains("document not found"), "{}: {}", cmd, stderr);
    }

    // Still there for its owner.
    let (status, _, success) = run_digest(
        &config_path,
        &["status", "doc-contract", "--user", "alice"],
    );
    assert!(success);
    assert!(status.contains("0 / 3 processed"), "{}", status);
}

#[test]
fn test_report_before_analysis_fails() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (_, stderr, success) = run_digest(
        &config_path,
        &["report", "doc-contract", "--user", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("no report"), "{}", stderr);

    let (stdout, _, success) = run_digest(&config_path, &["reports", "--user", "alice"]);
    assert!(success);
    assert!(stdout.contains("No reports"), "{}", stdout);
}

#[test]
fn test_analyze_requires_completion_provider() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (_, stderr, success) = run_digest(
        &config_path,
        &["analyze", "--user", "alice", "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "{}", stderr);
}

#[test]
fn test_ask_requires_embedding_provider() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (_, stderr, success) = run_digest(
        &config_path,
        &["ask", "--user", "alice", "When is payment due?"],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "{}", stderr);
}

#[test]
fn test_delete_removes_document() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (stdout, _, success) = run_digest(
        &config_path,
        &["delete", "doc-contract", "--user", "alice"],
    );
    assert!(success);
    assert!(stdout.contains("deleted doc-contract"));

    let (_, stderr, success) = run_digest(
        &config_path,
        &["status", "doc-contract", "--user", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("document not found"), "{}", stderr);

    let (_, _, success) = run_digest(
        &config_path,
        &["delete", "doc-contract", "--user", "alice"],
    );
    assert!(!success, "deleting twice should fail");

    // Re-ingesting after delete starts fresh.
    let stdout = ingest_contract(&tmp, &config_path);
    assert!(stdout.contains("chunks: 3"));
}

#[test]
fn test_stats_counts() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    let (stdout, stderr, success) = run_digest(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:   1"), "{}", stdout);
    assert!(stdout.contains("0 processed / 3"), "{}", stdout);
    assert!(stdout.contains("0 / 3 knowledge entries"), "{}", stdout);
    assert!(stdout.contains("alice"), "{}", stdout);
}

#[test]
fn test_embed_pending_dry_run() {
    let (tmp, config_path) = setup_test_env();
    run_digest(&config_path, &["init"]);
    ingest_contract(&tmp, &config_path);

    // Disabled provider refuses to run even in dry-run mode.
    let (_, stderr, success) = run_digest(&config_path, &["embed", "pending", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "{}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/data/digest.sqlite\"\n\n[analysis]\nmax_group_size = 1\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_digest(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("max_group_size"), "{}", stderr);
}
