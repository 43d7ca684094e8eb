//! Integration tests for multi-format uploads.
//!
//! Each supported binary format (docx, xlsx, rtf) is ingested through the
//! CLI. Files that cannot be extracted are rejected without leaving a
//! document behind.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn digest_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("digest");
    path
}

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Minimal docx (ZIP) with one `<w:p>` per paragraph.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    zip_with(&[("word/document.xml", xml)])
}

/// Minimal xlsx with two sheets of shared-string cells.
fn minimal_xlsx() -> Vec<u8> {
    let shared = "<sst><si><t>Item</t></si><si><t>Qty</t></si><si><t>Bolts</t></si><si><t>Region</t></si><si><t>North</t></si></sst>".to_string();
    let sheet1 = "<worksheet><sheetData>\
        <row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>1</v></c></row>\
        <row r=\"2\"><c r=\"A2\" t=\"s\"><v>2</v></c><c r=\"B2\"><v>250</v></c></row>\
        </sheetData></worksheet>"
        .to_string();
    let sheet2 = "<worksheet><sheetData>\
        <row r=\"1\"><c r=\"A1\" t=\"s\"><v>3</v></c></row>\
        <row r=\"2\"><c r=\"A2\" t=\"s\"><v>4</v></c></row>\
        </sheetData></worksheet>"
        .to_string();
    zip_with(&[
        ("xl/sharedStrings.xml", shared),
        ("xl/worksheets/sheet1.xml", sheet1),
        ("xl/worksheets/sheet2.xml", sheet2),
    ])
}

fn setup_file_support_env() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/digest.sqlite"

[ingest]
allowed_extensions = ["txt", "md", "pdf", "docx", "xlsx", "rtf"]
"#,
        root.display()
    );
    let config_path = root.join("config").join("digest.toml");
    fs::write(&config_path, config_content).unwrap();

    let (stdout, stderr, success) = run_digest(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);

    (tmp, config_path)
}

fn run_digest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = digest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run digest: {}", e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn ingest(tmp: &TempDir, config_path: &Path, name: &str, bytes: &[u8]) -> (String, String, bool) {
    let path = tmp.path().join("files").join(name);
    fs::write(&path, bytes).unwrap();
    run_digest(
        config_path,
        &["ingest", path.to_str().unwrap(), "--user", "alice"],
    )
}

#[test]
fn file_support_docx_paragraphs_become_chunks() {
    let (tmp, config_path) = setup_file_support_env();
    let docx = minimal_docx(&["Office test phrase.", "Second paragraph."]);

    let (stdout, stderr, success) = ingest(&tmp, &config_path, "memo.docx", &docx);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks: 2"), "{}", stdout);
}

#[test]
fn file_support_xlsx_sheets_become_chunks() {
    let (tmp, config_path) = setup_file_support_env();

    let (stdout, stderr, success) = ingest(&tmp, &config_path, "stock.xlsx", &minimal_xlsx());
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks: 2"), "{}", stdout);
}

#[test]
fn file_support_rtf() {
    let (tmp, config_path) = setup_file_support_env();
    let rtf = br"{\rtf1\ansi{\fonttbl\f0 Arial;}\f0 Quarterly plan.\par Budget approved.\par}";

    let (stdout, stderr, success) = ingest(&tmp, &config_path, "plan.rtf", rtf);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("chunks: 2"), "{}", stdout);
}

#[test]
fn file_support_corrupt_pdf_is_rejected() {
    let (tmp, config_path) = setup_file_support_env();

    let (_, stderr, success) = ingest(&tmp, &config_path, "bad.pdf", b"not a valid pdf");
    assert!(!success);
    assert!(stderr.contains("PDF extraction failed"), "{}", stderr);

    let (stdout, _, _) = run_digest(&config_path, &["documents", "--user", "alice"]);
    assert!(stdout.contains("No documents"), "{}", stdout);
}

#[test]
fn file_support_corrupt_docx_is_rejected() {
    let (tmp, config_path) = setup_file_support_env();

    let (_, stderr, success) = ingest(&tmp, &config_path, "bad.docx", b"not a zip archive");
    assert!(!success);
    assert!(stderr.contains("OOXML extraction failed"), "{}", stderr);
}

#[test]
fn file_support_docx_without_text_is_rejected() {
    let (tmp, config_path) = setup_file_support_env();

    let (_, stderr, success) = ingest(&tmp, &config_path, "empty.docx", &minimal_docx(&[]));
    assert!(!success);
    assert!(stderr.contains("No text could be extracted"), "{}", stderr);
}

#[test]
fn file_support_disallowed_extension() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();
    let config_path = root.join("config").join("digest.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/data/digest.sqlite\"\n\n[ingest]\nallowed_extensions = [\"txt\"]\n",
            root.display()
        ),
    )
    .unwrap();
    run_digest(&config_path, &["init"]);

    let (_, stderr, success) = ingest(&tmp, &config_path, "notes.md", b"# Notes\n\nText.");
    assert!(!success);
    assert!(stderr.contains("unsupported file format: md"), "{}", stderr);
}
