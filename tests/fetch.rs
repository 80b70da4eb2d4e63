use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use vidflow::error::PipelineError;
use vidflow::io::fetch::ensure_local;

fn unique_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "vidflow_fetch_{label}_{}_{}",
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[tokio::test]
async fn existing_asset_is_left_untouched() {
    let dir = unique_temp_dir("idempotent");
    let asset = dir.join("clip.mp4");
    fs::write(&asset, b"already here").unwrap();

    let downloaded = ensure_local("https://example.invalid/never-contacted.mp4", &asset)
        .await
        .unwrap();

    assert!(!downloaded);
    assert_eq!(fs::read(&asset).unwrap(), b"already here");
}

#[tokio::test]
async fn interrupted_download_leaves_no_partial_file() {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    // Advertise a megabyte, send a few bytes, hang up.
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = [0u8; 1024];
        let _ = stream.read(&mut request);
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\n\r\npartial");
    });

    let dir = unique_temp_dir("interrupted");
    let asset = dir.join("clip.mp4");

    let err = ensure_local(&format!("http://{addr}/clip.mp4"), &asset)
        .await
        .unwrap_err();
    server.join().expect("server thread");

    assert!(matches!(err, PipelineError::Fetch(_)));
    assert!(!asset.exists(), "truncated asset must not be installed");
    assert!(
        !asset.with_extension("part").exists(),
        "failed download must not strand a .part file"
    );
}

#[tokio::test]
async fn malformed_url_is_a_fetch_error() {
    let dir = unique_temp_dir("bad_url");
    let asset = dir.join("clip.mp4");

    let err = ensure_local("not a url", &asset).await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch(_)));
    assert_eq!(err.error_code(), 300);
    assert!(!asset.exists(), "no partial asset should be left behind");
}
