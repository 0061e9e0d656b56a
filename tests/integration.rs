use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn chatmem_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("chatmem");
    path
}

const MESSAGES: &str = r#"{"session_id":"s1","ts":"2025-03-14T09:00:00Z","role":"user","content":"My deploy script keeps failing on the health check."}
{"session_id":"s1","ts":"2025-03-14T09:01:00Z","role":"assistant","content":"Does it fail before or after the container starts? ~~~action\nrestart deploy\n~~~"}
{"session_id":"s1","ts":"2025-03-14T09:02:00Z","role":"system","content":"internal note"}
{"session_id":"s1","ts":"2025-03-14T09:10:00Z","role":"user","content":"After. The probe times out."}
"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    setup_with_extra_config("")
}

fn setup_with_extra_config(extra: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let messages_path = root.join("messages.jsonl");
    fs::write(&messages_path, MESSAGES).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/chatmem.sqlite"

[chunking]
chunk_size = 200
overlap = 50
{}"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("chatmem.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, messages_path)
}

fn run_chatmem(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = chatmem_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run chatmem binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_chatmem(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/chatmem.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_chatmem(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_chatmem(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_skips_repeats() {
    let (_tmp, config_path, messages) = setup_test_env();
    let messages = messages.to_str().unwrap();

    run_chatmem(&config_path, &["init"]);
    let (stdout, stderr, success) = run_chatmem(&config_path, &["import", messages]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("read: 4 messages"));
    assert!(stdout.contains("inserted: 4"));

    let (stdout, _, success) = run_chatmem(&config_path, &["import", messages]);
    assert!(success);
    assert!(stdout.contains("inserted: 0"));
}

#[test]
fn test_import_rejects_malformed_line() {
    let (tmp, config_path, _) = setup_test_env();
    let bad = tmp.path().join("bad.jsonl");
    fs::write(&bad, "{\"session_id\":\"s1\"}\n").unwrap();

    run_chatmem(&config_path, &["init"]);
    let (_, stderr, success) = run_chatmem(&config_path, &["import", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("line 1"), "stderr: {}", stderr);
}

#[test]
fn test_chunk_preview() {
    let (_tmp, config_path, messages) = setup_test_env();

    let (stdout, stderr, success) =
        run_chatmem(&config_path, &["chunk", messages.to_str().unwrap()]);
    assert!(success, "chunk failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("[250314Fri 09:00] User: My deploy script"));
    assert!(stdout.contains("[250314Fri 09:10] User: After."));
    assert!(stdout.contains("[cmd]"));
    assert!(!stdout.contains("restart deploy"));
    assert!(stdout.contains("chunks: 1"));
}

#[test]
fn test_chunk_preview_json() {
    let (_tmp, config_path, messages) = setup_test_env();

    let (stdout, _, success) =
        run_chatmem(&config_path, &["chunk", messages.to_str().unwrap(), "--json"]);
    assert!(success);
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["_id"], "chat_20250314_090000_0000");
    assert_eq!(records[0]["start_ts"], "2025-03-14T09:00:00Z");
    assert_eq!(records[0]["simhash64"].as_str().unwrap().len(), 16);
}

#[test]
fn test_chunk_preview_small_chunks() {
    let (_tmp, config_path, messages) =
        setup_with_extra_config("ts_gap_minutes = 5\n\n[ingest]\nsource_tag = \"test\"\n");
    // Rewrite the chunking section with a small budget.
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("chunk_size = 200", "chunk_size = 60");
    fs::write(&config_path, content).unwrap();

    let (stdout, _, success) =
        run_chatmem(&config_path, &["chunk", messages.to_str().unwrap(), "--json"]);
    assert!(success);
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();
    assert!(records.len() > 1);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["chunk_ord"], i);
        assert_eq!(record["source"], "test");
    }
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path, messages) = setup_test_env();

    run_chatmem(&config_path, &["init"]);
    run_chatmem(&config_path, &["import", messages.to_str().unwrap()]);

    let (stdout, stderr, success) = run_chatmem(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry-run"));
    // The system message is not fetched.
    assert!(stdout.contains("messages: 3"));
    assert!(stdout.contains("chunks: 1"));
    assert!(stdout.contains("chat_20250314_090000_0000"));

    // No checkpoint was written, so a second dry run sees the same batch.
    let (stdout, _, success) = run_chatmem(&config_path, &["ingest", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("since: (beginning)"));
    assert!(stdout.contains("messages: 3"));
}

#[test]
fn test_ingest_dry_run_skips_configured_index() {
    // Unreachable host and an unset key: a dry run must touch neither.
    let (_tmp, config_path, messages) = setup_with_extra_config(
        "\n[vector_store]\nprovider = \"records\"\nhost = \"http://127.0.0.1:9\"\napi_key_env = \"CHATMEM_DRY_RUN_UNSET_KEY\"\n",
    );

    run_chatmem(&config_path, &["init"]);
    run_chatmem(&config_path, &["import", messages.to_str().unwrap()]);

    let (stdout, stderr, success) = run_chatmem(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("messages: 3"));
    assert!(stdout.contains("records: 1"));
}

#[test]
fn test_ingest_dry_run_since_and_limit() {
    let (_tmp, config_path, messages) = setup_test_env();

    run_chatmem(&config_path, &["init"]);
    run_chatmem(&config_path, &["import", messages.to_str().unwrap()]);

    let (stdout, _, success) = run_chatmem(
        &config_path,
        &["ingest", "--dry-run", "--since", "2025-03-14T09:01:00Z"],
    );
    assert!(success);
    assert!(stdout.contains("messages: 2"));

    let (stdout, _, success) = run_chatmem(&config_path, &["ingest", "--dry-run", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("messages: 1"));

    let (_, stderr, success) =
        run_chatmem(&config_path, &["ingest", "--dry-run", "--since", "last week"]);
    assert!(!success);
    assert!(stderr.contains("Invalid --since"));
}

#[test]
fn test_ingest_errors_when_vector_store_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    run_chatmem(&config_path, &["init"]);
    let (_, stderr, success) = run_chatmem(&config_path, &["ingest"]);
    assert!(!success, "ingest should fail without a vector store");
    assert!(stderr.contains("No vector store configured"));
}

#[test]
fn test_query_errors_when_vector_store_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) = run_chatmem(&config_path, &["query", "deploy"]);
    assert!(!success);
    assert!(stderr.contains("No vector store configured"));
}

#[test]
fn test_query_invalid_filter() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) =
        run_chatmem(&config_path, &["query", "deploy", "--filter", "{oops"]);
    assert!(!success);
    assert!(stderr.contains("Invalid --filter JSON"));
}

#[test]
fn test_missing_config_errors() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_chatmem(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_errors() {
    let (_tmp, config_path, _) = setup_with_extra_config("\n[retrieval]\nrmin = 5\nrmax = 2\n");

    let (_, stderr, success) = run_chatmem(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.rmin"));
}
