//! Snapshots rendered through headless Chrome
#![cfg(feature = "cdp")]

mod common;

use common::{serve_site, APP_JS, STYLE_CSS};
use sitesnap::{Backend, SnapshotConfig, SnapshotEvent, SnapshotPipeline, SnapshotRequest};

#[test]
#[ignore] // Requires Chrome to be installed
fn cdp_snapshot_captures_script_output() {
    let url = serve_site(
        r#"<!DOCTYPE html><html><head>
<link rel="stylesheet" href="/style.css">
<script src="/app.js"></script>
</head><body>
<img src="/logo.png">
<script>document.body.insertAdjacentHTML('beforeend', '<p id="late">added by script</p>');</script>
</body></html>"#,
    );
    let tmp = tempfile::TempDir::new().unwrap();
    let config = SnapshotConfig {
        backend: Backend::Cdp,
        output_root: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let mut pipeline = SnapshotPipeline::from_config(&config).expect("pipeline");
    let request = SnapshotRequest::new(&url).unwrap();
    let mut events: Vec<SnapshotEvent> = Vec::new();
    let completion = pipeline.run(&request, &mut events);

    assert!(completion.is_success(), "{}", completion.message);
    let html = std::fs::read_to_string(completion.artifact.unwrap().join("page.html")).unwrap();
    assert!(html.contains("added by script"));
    assert!(html.contains("data:image/png;base64,"));
    assert!(html.contains(STYLE_CSS));
    assert!(html.contains(APP_JS));
}

#[test]
#[ignore] // Requires Chrome to be installed
fn cdp_unreachable_page_fails() {
    if std::env::var("CI").is_ok() {
        return;
    }
    let tmp = tempfile::TempDir::new().unwrap();
    let config = SnapshotConfig {
        backend: Backend::Cdp,
        timeout_ms: 5_000,
        output_root: tmp.path().to_path_buf(),
        ..Default::default()
    };

    let request = SnapshotRequest::new("http://127.0.0.1:1/").unwrap();
    let completion = sitesnap::worker::spawn(request, config).wait();

    assert_eq!(completion.artifact, None);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}
