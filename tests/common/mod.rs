//! Shared fixtures for the integration tests
#![allow(dead_code)]

use sitesnap::{Backend, SnapshotConfig};
use std::path::Path;
use tiny_http::{Header, Response, Server};

/// First bytes of a PNG file
pub const LOGO_PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];
pub const STYLE_CSS: &str = "body { color: #123456; }";
pub const APP_JS: &str = "window.loaded = true;";

/// Address that refuses connections
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

fn header(raw: &str) -> Header {
    raw.parse::<Header>().unwrap()
}

/// Start a tiny_http server on an ephemeral port serving `index` at `/`
/// plus the static assets above. Every other path is a 404.
pub fn serve_site(index: &str) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    let index = index.to_string();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let response = match path.as_str() {
                "/" => Response::from_data(index.clone().into_bytes())
                    .with_header(header("Content-Type: text/html; charset=utf-8")),
                "/logo.png" => Response::from_data(LOGO_PNG.to_vec()).with_header(header("Content-Type: image/png")),
                "/untyped.png" => Response::from_data(LOGO_PNG.to_vec()),
                "/style.css" => {
                    Response::from_data(STYLE_CSS.as_bytes().to_vec()).with_header(header("Content-Type: text/css"))
                }
                "/app.js" => Response::from_data(APP_JS.as_bytes().to_vec())
                    .with_header(header("Content-Type: application/javascript")),
                _ => Response::from_data(b"Not Found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    format!("http://{}/", addr)
}

/// Browser-less configuration writing under `root`
pub fn simple_config(root: &Path) -> SnapshotConfig {
    SnapshotConfig {
        backend: Backend::Simple,
        timeout_ms: 5_000,
        fetch_timeout_ms: 2_000,
        output_root: root.to_path_buf(),
        ..Default::default()
    }
}

/// Occurrences of `needle` in `html`
pub fn count(html: &str, needle: &str) -> usize {
    html.matches(needle).count()
}
