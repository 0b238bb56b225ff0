//! sitesnap - archive a rendered web page as a single offline HTML file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sitesnap::{worker, Backend, SnapshotConfig, SnapshotEvent, SnapshotRequest};

/// Renders a page, inlines its images, stylesheets and scripts, and saves
/// the result under `site_<timestamp>/page.html`.
#[derive(Parser)]
#[command(name = "sitesnap")]
#[command(version)]
struct Cli {
    /// Page to archive; `https://` is assumed when no scheme is given
    url: String,

    /// Directory under which the snapshot folder is created
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// How the page is rendered
    #[arg(long, value_enum, default_value_t = BackendArg::default())]
    backend: BackendArg,

    /// Upper bound for loading the page, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Quiet network window before the page counts as loaded, in milliseconds
    #[arg(long)]
    idle_ms: Option<u64>,

    /// Timeout for each resource download, in milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    /// User agent for the page and its resources
    #[arg(long)]
    user_agent: Option<String>,

    /// Extra request header for the page, as NAME:VALUE (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Chrome/Chromium executable (auto-detected by default)
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox
    #[arg(long)]
    no_sandbox: bool,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Open the snapshot folder when done
    #[arg(long)]
    open: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// Headless Chrome; scripts run before capture
    Cdp,
    /// Plain HTTP fetch; no scripts
    Simple,
}

impl Default for BackendArg {
    fn default() -> Self {
        match Backend::default() {
            Backend::Cdp => BackendArg::Cdp,
            Backend::Simple => BackendArg::Simple,
        }
    }
}

impl Cli {
    fn config(&self) -> SnapshotConfig {
        let defaults = SnapshotConfig::default();
        SnapshotConfig {
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            network_idle_ms: self.idle_ms.unwrap_or(defaults.network_idle_ms),
            fetch_timeout_ms: self.fetch_timeout_ms.unwrap_or(defaults.fetch_timeout_ms),
            headers: self.headers.iter().cloned().collect::<HashMap<_, _>>(),
            backend: match self.backend {
                BackendArg::Cdp => Backend::Cdp,
                BackendArg::Simple => Backend::Simple,
            },
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            output_root: self.output_dir.clone(),
            ..defaults
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,sitesnap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let request = match SnapshotRequest::new(&cli.url) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let mut handle = worker::spawn(request, cli.config());
    let mut outcome = None;

    while let Some(event) = handle.blocking_next() {
        if cli.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("could not encode event: {}", e),
            }
        } else {
            match &event {
                SnapshotEvent::Progress { percent } => println!("[{:>3}%]", percent),
                SnapshotEvent::Status { message } => println!("{}", message),
                SnapshotEvent::Complete(done) => println!("{}", done.message),
            }
        }

        if let SnapshotEvent::Complete(done) = event {
            outcome = Some(done);
        }
    }

    match outcome.and_then(|done| done.artifact) {
        Some(directory) => {
            if cli.open {
                open_folder(&directory);
            }
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}

/// Show `path` in the platform file browser. Failures are only logged.
fn open_folder(path: &Path) {
    if !path.exists() {
        log::warn!("not opening {}: it does not exist", path.display());
        return;
    }

    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    if let Err(e) = Command::new(program).arg(path).spawn() {
        log::warn!("could not open {} with {}: {}", path.display(), program, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_flag_splits_on_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "sitesnap",
            "example.com",
            "--backend",
            "simple",
            "--idle-ms",
            "250",
            "--header",
            "X-Test: 1",
            "--no-sandbox",
            "-o",
            "out",
        ]);
        let config = cli.config();
        assert_eq!(config.backend, Backend::Simple);
        assert_eq!(config.network_idle_ms, 250);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.headers.get("X-Test").map(String::as_str), Some("1"));
        assert!(!config.sandbox);
        assert_eq!(config.output_root, PathBuf::from("out"));
    }
}
