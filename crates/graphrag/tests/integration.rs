use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn graphrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("graphrag");
    path
}

fn setup_test_env(port: u16) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.txt"),
        "Alpha Corp builds graph databases in Rust. Ada Lovelace works for Alpha Corp.",
    )
    .unwrap();
    fs::write(
        files_dir.join("people.csv"),
        "name,team\nAda,storage\nGrace,compilers\n",
    )
    .unwrap();
    fs::write(files_dir.join("report.pdf"), minimal_pdf_with_phrase("graph test phrase")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/graphrag.sqlite"

[chunking]
chunk_size = 40
overlap = 10

[ingest]
root = "{}/files"

[server]
bind = "127.0.0.1:{}"
"#,
        root.display(),
        root.display(),
        port
    );

    let config_path = config_dir.join("graphrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

/// Single-page PDF whose content stream shows `phrase` in Helvetica.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn run_graphrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = graphrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run graphrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .join("files")
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env(find_free_port());

    let (stdout, stderr, success) = run_graphrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/graphrag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env(find_free_port());

    let (_, _, success1) = run_graphrag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_graphrag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_extract_txt_prints_document_json() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("alpha.txt");

    let (stdout, stderr, success) =
        run_graphrag(&config_path, &["extract", file.to_str().unwrap()]);
    assert!(success, "extract failed: {}", stderr);

    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(doc["id"].as_str().unwrap().starts_with("doc-"));
    assert_eq!(doc["title"], "alpha.txt");
    assert_eq!(doc["content_type"], "txt");
    assert!(doc["content"].as_str().unwrap().contains("Ada Lovelace"));
    assert!(doc["metadata"]["content_hash"].is_string());
}

#[test]
fn test_extract_csv_renders_rows() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("people.csv");

    let (stdout, _, success) = run_graphrag(&config_path, &["extract", file.to_str().unwrap()]);
    assert!(success);

    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let rows: serde_json::Value = serde_json::from_str(doc["content"].as_str().unwrap()).unwrap();
    assert_eq!(rows[1]["name"], "Grace");
    assert_eq!(rows[1]["team"], "compilers");
}

#[test]
fn test_extract_pdf() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("report.pdf");

    let (stdout, stderr, success) =
        run_graphrag(&config_path, &["extract", file.to_str().unwrap()]);
    assert!(success, "pdf extract failed: {}", stderr);
    assert!(
        stdout.contains("graph test phrase"),
        "Expected PDF text in output, got: {}",
        stdout
    );
}

#[test]
fn test_extract_unsupported_type_fails() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("notes.docx");
    fs::write(&file, "not really a docx").unwrap();

    let (_, stderr, success) = run_graphrag(&config_path, &["extract", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"), "stderr: {}", stderr);
}

#[test]
fn test_chunk_reports_windows() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("alpha.txt");

    let (stdout, stderr, success) =
        run_graphrag(&config_path, &["chunk", file.to_str().unwrap()]);
    assert!(success, "chunk failed: {}", stderr);
    assert!(stdout.contains("(size=40, overlap=10)"), "got: {}", stdout);
    assert!(stdout.contains("chunk-0 [0..40]"), "got: {}", stdout);
}

#[test]
fn test_chunk_flags_override_config() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("alpha.txt");

    let (stdout, _, success) = run_graphrag(
        &config_path,
        &[
            "chunk",
            file.to_str().unwrap(),
            "--chunk-size",
            "1000",
            "--overlap",
            "0",
        ],
    );
    assert!(success);
    assert!(stdout.contains(": 1 chunks"), "got: {}", stdout);
}

#[test]
fn test_ingest_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env(find_free_port());
    let file = files_dir(&config_path).join("alpha.txt");

    let (_, stderr, success) = run_graphrag(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("requires embeddings"), "stderr: {}", stderr);
}

#[test]
fn test_search_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env(find_free_port());

    let (_, stderr, success) = run_graphrag(&config_path, &["search", "graph databases"]);
    assert!(!success);
    assert!(stderr.contains("requires embeddings"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env(find_free_port());
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 0\n[server]\nbind = \"127.0.0.1:0\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_graphrag(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_size"), "stderr: {}", stderr);
}

// ============ Server tests ============

fn start_server(config_path: &Path) -> std::process::Child {
    Command::new(graphrag_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to start server: {}", e))
}

/// Wait for the server to be ready by polling the health endpoint.
fn wait_for_server(port: u16) {
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        std::thread::sleep(std::time::Duration::from_millis(100));
        if let Ok(resp) = reqwest::blocking::get(&url) {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

#[test]
fn test_server_health_and_offline_endpoints() {
    let port = find_free_port();
    let (_tmp, config_path) = setup_test_env(port);

    let mut server = start_server(&config_path);
    wait_for_server(port);

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::blocking::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert!(health["version"].is_string());

    let resp = client
        .post(format!("{}/ingest/break-text", base))
        .json(&serde_json::json!({"text": "abcdefghij", "chunk_size": 4, "overlap": 1}))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    let contents: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["abcd", "defg", "ghij"]);

    let file = files_dir(&config_path).join("alpha.txt");
    let resp = client
        .post(format!("{}/ingest/extract-text", base))
        .json(&serde_json::json!({"file_path": file, "type": "txt"}))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["data"]["title"], "alpha.txt");

    let resp = client
        .post(format!("{}/ingest/extract-text", base))
        .json(&serde_json::json!({"file_path": config_path, "type": "txt"}))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Embeddings are disabled in this config.
    let resp = client
        .post(format!("{}/query/semantic", base))
        .json(&serde_json::json!({"query": "graph"}))
        .send()
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");

    server.kill().ok();
    server.wait().ok();
}
