//! CLI integration tests for Slipway.
//!
//! These tests drive the full binary against small catalogs whose build
//! commands are shell stubs, so they run without network or real toolchains.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the slipway binary command.
fn slipway() -> Command {
    Command::cargo_bin("slipway").unwrap()
}

/// Write a catalog into a fresh temp dir and return both.
fn catalog(contents: &str) -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("matrix.toml");
    fs::write(&path, contents).unwrap();
    (tmp, path)
}

// ============================================================================
// slipway run
// ============================================================================

#[test]
fn test_run_stages_assets_per_target() {
    let (tmp, matrix) = catalog(
        r#"
[build]
command = "sh"
args = ["-c", ": > libplugin.so"]

[[target]]
label = "linux-x86_64"
triple = "x86_64-unknown-linux-gnu"

[[target]]
label = "linux-i686"
triple = "i686-unknown-linux-gnu"
bits = 32
"#,
    );

    slipway()
        .args(["run", "--trigger", "push"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 done, 0 failed"));

    let dist = tmp.path().join("slipway-out").join("dist");
    assert!(dist
        .join("libplugin-x86_64-unknown-linux-gnu-64bit.so")
        .exists());
    assert!(dist
        .join("libplugin-i686-unknown-linux-gnu-32bit.so")
        .exists());
}

#[test]
fn test_run_one_failed_target_exits_one() {
    let (tmp, matrix) = catalog(
        r#"
[build]
command = "sh"
args = ["-c", "if [ \"$TARGET\" = \"i686-unknown-linux-gnu\" ]; then exit 1; fi; : > libplugin.so"]

[[target]]
label = "good"
triple = "x86_64-unknown-linux-gnu"

[[target]]
label = "bad"
triple = "i686-unknown-linux-gnu"
bits = 32
"#,
    );

    slipway()
        .args(["run", "--trigger", "push"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 done, 1 failed"));

    // The surviving target still staged its asset.
    assert!(tmp
        .path()
        .join("slipway-out/dist/libplugin-x86_64-unknown-linux-gnu-64bit.so")
        .exists());
}

#[test]
fn test_run_rename_shapes_asset_name() {
    let (tmp, matrix) = catalog(
        r#"
[build]
command = "sh"
args = ["-c", ": > libplugin.so"]

[[target]]
label = "linux-v3"
triple = "x86_64-unknown-linux-gnu"
rename = "x86_64_v3-unknown-linux-gnu"
rustflags = "-C target-cpu=x86-64-v3"
"#,
    );

    slipway()
        .args(["run", "--trigger", "push"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .success();

    assert!(tmp
        .path()
        .join("slipway-out/dist/libplugin-x86_64_v3-unknown-linux-gnu-64bit.so")
        .exists());
}

#[test]
fn test_run_bad_catalog_exits_two() {
    let (_tmp, matrix) = catalog(
        r#"
[[target]]
label = "dup"
triple = "x86_64-unknown-linux-gnu"

[[target]]
label = "dup"
triple = "aarch64-unknown-linux-gnu"
"#,
    );

    slipway()
        .args(["run", "--trigger", "push"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid build catalog"));
}

#[test]
fn test_run_missing_catalog_exits_two() {
    slipway()
        .args(["run", "--matrix", "/nonexistent/matrix.toml"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_run_unknown_trigger_exits_two() {
    let (_tmp, matrix) = catalog(
        r#"
[[target]]
label = "a"
triple = "x86_64-unknown-linux-gnu"
"#,
    );

    slipway()
        .args(["run", "--trigger", "release"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown trigger"));
}

#[test]
fn test_run_unknown_only_label_exits_two() {
    let (_tmp, matrix) = catalog(
        r#"
[[target]]
label = "a"
triple = "x86_64-unknown-linux-gnu"
"#,
    );

    slipway()
        .args(["run", "--only", "missing"])
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown target"));
}

#[test]
fn test_dry_run_tag_release_preview() {
    let (tmp, matrix) = catalog(
        r#"
[release]
upload_url = "https://uploads.example.com/{tag}/{name}"

[[target]]
label = "linux-32"
triple = "i686-unknown-linux-gnu"
bits = 32

[[target]]
label = "linux-64"
triple = "x86_64-unknown-linux-gnu"
"#,
    );

    let report = tmp.path().join("report.json");

    slipway()
        .args(["run", "--trigger", "tag", "--ref", "v0.3.0", "--dry-run"])
        .arg("--matrix")
        .arg(&matrix)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 done, 0 failed"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    let names: Vec<&str> = json["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["asset"]["file_name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "artifact-i686-unknown-linux-gnu-32bit.so",
            "artifact-x86_64-unknown-linux-gnu-64bit.so",
        ]
    );
}

// ============================================================================
// slipway run: release upload
// ============================================================================

/// Whether `buf` holds one complete HTTP request (headers plus body).
fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}

#[test]
fn test_tag_run_uploads_assets_to_endpoint() {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    // Minimal one-request-per-connection upload endpoint.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let captured = Arc::clone(&requests);
    let server = std::thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            stream
                .write_all(
                    b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .unwrap();
            captured
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf).into_owned());
        }
    });

    let (_tmp, matrix) = catalog(&format!(
        r#"
[build]
command = "sh"
args = ["-c", "printf elf > libplugin.so"]

[release]
upload_url = "http://127.0.0.1:{port}/releases/{{tag}}/assets?name={{name}}"
token_env = "SLIPWAY_TEST_UPLOAD_TOKEN"

[[target]]
label = "linux-32"
triple = "i686-unknown-linux-gnu"
bits = 32

[[target]]
label = "linux-64"
triple = "x86_64-unknown-linux-gnu"
"#
    ));

    slipway()
        .args(["run", "--trigger", "tag", "--ref", "v1.0.0"])
        .arg("--matrix")
        .arg(&matrix)
        .env("SLIPWAY_TEST_UPLOAD_TOKEN", "upload-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 done, 0 failed"));

    server.join().unwrap();
    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);

    // One upload per asset, to the tag's endpoint, with the bearer token.
    let all = requests.join("\n");
    assert!(all.contains("name=libplugin-i686-unknown-linux-gnu-32bit.so"));
    assert!(all.contains("name=libplugin-x86_64-unknown-linux-gnu-64bit.so"));
    assert!(all.contains("/releases/v1.0.0/assets"));
    assert!(all.contains("Bearer upload-secret"));
}

// ============================================================================
// slipway targets / check
// ============================================================================

#[test]
fn test_targets_lists_catalog() {
    let (_tmp, matrix) = catalog(
        r#"
[[target]]
label = "win32"
triple = "i686-pc-windows-msvc"
os = "windows"
bits = 32
release_exempt = true

[[target]]
label = "macos-arm"
triple = "aarch64-apple-darwin"
os = "macos"
cross = true
"#,
    );

    slipway()
        .arg("targets")
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .success()
        .stdout(predicate::str::contains("win32"))
        .stdout(predicate::str::contains("i686-pc-windows-msvc"))
        .stdout(predicate::str::contains("exempt"))
        .stdout(predicate::str::contains("cross"));
}

#[test]
fn test_check_valid_catalog() {
    let (_tmp, matrix) = catalog(
        r#"
[build]
command = "sh"

[[target]]
label = "a"
triple = "x86_64-unknown-linux-gnu"
"#,
    );

    slipway()
        .arg("check")
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .success()
        .stdout(predicate::str::contains("catalog ok: 1 target(s)"));
}

#[test]
fn test_check_warns_on_missing_cross_url() {
    let (_tmp, matrix) = catalog(
        r#"
[build]
command = "sh"

[[target]]
label = "arm"
triple = "aarch64-unknown-linux-gnu"
cross = true
"#,
    );

    slipway()
        .arg("check")
        .arg("--matrix")
        .arg(&matrix)
        .assert()
        .success()
        .stdout(predicate::str::contains("cross_url is not set"));
}

// ============================================================================
// slipway completions
// ============================================================================

#[test]
fn test_completions_bash() {
    slipway()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("slipway"));
}
