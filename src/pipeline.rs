//! Render, inline, serialize and persist a single page

use crate::archive::{ArchiveWriter, SnapshotArtifact};
use crate::document::Document;
use crate::events::{Completion, Emitter, ProgressSink};
use crate::fetch::{FetchError, FetchedResource, ResourceFetcher};
use crate::resource::{self, ResourceKind, ResourceReference, DEFAULT_IMAGE_TYPE};
use crate::{Renderer, Result, SnapshotConfig, SnapshotRequest};
use std::fmt;
use url::Url;

pub const STATUS_LOADING: &str = "Loading page...";
pub const STATUS_INTEGRATING: &str = "Integrating resources...";

/// Where a run currently is. Phases only move forward; `Done` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rendering,
    Parsing,
    InliningImages,
    InliningStyles,
    InliningScripts,
    Serializing,
    Persisting,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Rendering => "rendering",
            Phase::Parsing => "parsing",
            Phase::InliningImages => "inlining images",
            Phase::InliningStyles => "inlining stylesheets",
            Phase::InliningScripts => "inlining scripts",
            Phase::Serializing => "serializing",
            Phase::Persisting => "persisting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress reported after the image at `index` (0-based) out of
/// `slots - 1` images. The extra slot keeps the image phase below 100.
pub fn image_progress(index: usize, slots: usize) -> u8 {
    let slots = slots.max(1);
    (index.min(slots - 1) * 100 / slots) as u8
}

/// One snapshot run
///
/// A pipeline is used once: after [`run`](SnapshotPipeline::run) it sits in
/// [`Phase::Done`] or [`Phase::Failed`], and further calls report a failure
/// without touching the network or the filesystem.
pub struct SnapshotPipeline {
    renderer: Box<dyn Renderer>,
    fetcher: ResourceFetcher,
    archive: ArchiveWriter,
    phase: Phase,
}

impl SnapshotPipeline {
    pub fn new(renderer: Box<dyn Renderer>, fetcher: ResourceFetcher, archive: ArchiveWriter) -> Self {
        Self {
            renderer,
            fetcher,
            archive,
            phase: Phase::Idle,
        }
    }

    /// Build the renderer, fetcher and archive writer described by `config`.
    pub fn from_config(config: &SnapshotConfig) -> Result<Self> {
        let renderer = crate::new_renderer(config)?;
        let fetcher = ResourceFetcher::new(config)?;
        let archive = ArchiveWriter::new(config.output_root.clone());
        Ok(Self::new(renderer, fetcher, archive))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Archive `request`, reporting to `sink`.
    ///
    /// Exactly one completion is sent to `sink` and it is the last event. The
    /// same completion is returned.
    pub fn run(&mut self, request: &SnapshotRequest, sink: &mut dyn ProgressSink) -> Completion {
        let mut events = Emitter::new(sink);

        if self.phase != Phase::Idle {
            let completion = Completion::failure(format!("pipeline already {}", self.phase));
            events.complete(&completion);
            return completion;
        }

        log::info!(
            "snapshot of {} using the {} renderer",
            request.url(),
            self.renderer.name()
        );

        let completion = match self.execute(request, &mut events) {
            Ok(artifact) => {
                self.enter(Phase::Done);
                log::info!("saved {}", artifact.file.display());
                Completion::success(&artifact)
            }
            Err(e) => {
                log::warn!("snapshot of {} failed while {}: {}", request.url(), self.phase, e);
                self.enter(Phase::Failed);
                Completion::failure(&e)
            }
        };

        events.complete(&completion);
        completion
    }

    fn execute(&mut self, request: &SnapshotRequest, events: &mut Emitter<'_>) -> Result<SnapshotArtifact> {
        self.enter(Phase::Rendering);
        events.progress(0);
        events.status(STATUS_LOADING);
        let page = self.renderer.render(request.url())?;

        self.enter(Phase::Parsing);
        events.status(STATUS_INTEGRATING);
        let mut doc = Document::parse(&page.html)?;
        let base = Url::parse(&page.base_url)
            .or_else(|_| Url::parse(request.url()))
            .ok();

        self.enter(Phase::InliningImages);
        self.inline_images(&mut doc, base.as_ref(), events);

        self.enter(Phase::InliningStyles);
        self.inline_stylesheets(&mut doc, base.as_ref());

        self.enter(Phase::InliningScripts);
        self.inline_scripts(&mut doc, base.as_ref());

        events.progress(100);

        self.enter(Phase::Serializing);
        let html = doc.serialize();

        self.enter(Phase::Persisting);
        self.archive.persist(&html)
    }

    fn inline_images(&self, doc: &mut Document, base: Option<&Url>, events: &mut Emitter<'_>) {
        let images = ResourceReference::scan(doc, ResourceKind::Image);
        let slots = images.len() + 1;

        for (index, image) in images.iter().enumerate() {
            if let Some(raw) = image.raw_url.as_deref() {
                match self.download(base, raw) {
                    Ok(res) => {
                        let uri = resource::data_uri(res.content_type_or(DEFAULT_IMAGE_TYPE), &res.bytes);
                        doc.set_attr(image.node, "src", &uri);
                    }
                    Err(e) => log::debug!("image {} left external: {}", raw, e),
                }
            }
            events.progress(image_progress(index, slots));
        }
    }

    fn inline_stylesheets(&self, doc: &mut Document, base: Option<&Url>) {
        for link in ResourceReference::scan(doc, ResourceKind::Stylesheet) {
            let Some(raw) = link.raw_url.as_deref() else {
                continue;
            };
            match self.download(base, raw) {
                Ok(res) => {
                    let attrs = carried(doc, &link, "media");
                    let style = doc.create_element("style", attrs);
                    doc.set_text(style, &res.text());
                    if !doc.replace(link.node, style) {
                        log::debug!("stylesheet {} could not be replaced", raw);
                    }
                }
                Err(e) => log::debug!("stylesheet {} left external: {}", raw, e),
            }
        }
    }

    fn inline_scripts(&self, doc: &mut Document, base: Option<&Url>) {
        for script in ResourceReference::scan(doc, ResourceKind::Script) {
            let Some(raw) = script.raw_url.as_deref() else {
                continue;
            };
            match self.download(base, raw) {
                Ok(res) => {
                    let attrs = carried(doc, &script, "type");
                    let inline = doc.create_element("script", attrs);
                    doc.set_text(inline, &res.text());
                    if !doc.replace(script.node, inline) {
                        log::debug!("script {} could not be replaced", raw);
                    }
                }
                Err(e) => log::debug!("script {} left external: {}", raw, e),
            }
        }
    }

    fn download(&self, base: Option<&Url>, raw: &str) -> std::result::Result<FetchedResource, FetchError> {
        let url = resource::resolve(base, raw)?;
        self.fetcher.fetch(&url)
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

/// The named attribute of the referencing element, if set, for the replacement
fn carried(doc: &Document, reference: &ResourceReference, name: &str) -> Vec<(String, String)> {
    doc.attr(reference.node, name)
        .map(|value| vec![(name.to_string(), value.to_string())])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SnapshotEvent;
    use crate::{Error, RenderedPage};

    struct FixedPage(Option<String>);

    impl Renderer for FixedPage {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn render(&mut self, url: &str) -> Result<RenderedPage> {
            match &self.0 {
                Some(html) => Ok(RenderedPage {
                    html: html.clone(),
                    base_url: url.to_string(),
                }),
                None => Err(Error::RenderError("navigation failed".into())),
            }
        }
    }

    fn pipeline(page: Option<&str>, root: &std::path::Path) -> SnapshotPipeline {
        let fetcher = ResourceFetcher::new(&SnapshotConfig::default()).unwrap();
        let renderer = FixedPage(page.map(str::to_string));
        SnapshotPipeline::new(Box::new(renderer), fetcher, ArchiveWriter::new(root))
    }

    #[test]
    fn image_progress_never_reaches_100() {
        assert_eq!(image_progress(0, 2), 0);
        assert_eq!(image_progress(0, 3), 0);
        assert_eq!(image_progress(1, 3), 33);
        assert_eq!(image_progress(2, 4), 50);
        for slots in 1..50 {
            for index in 0..slots {
                assert!(image_progress(index, slots) < 100);
            }
        }
    }

    #[test]
    fn every_image_reports_progress() {
        let images = 209;
        let page = format!("<body>{}</body>", "<img>".repeat(images));
        let tmp = tempfile::TempDir::new().unwrap();
        let mut pipeline = pipeline(Some(&page), tmp.path());
        let request = SnapshotRequest::new("http://example.invalid/").unwrap();

        let mut events: Vec<SnapshotEvent> = Vec::new();
        assert!(pipeline.run(&request, &mut events).is_success());

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                SnapshotEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect();

        // Rendering start, one per image, then the final 100.
        assert_eq!(percents.len(), images + 2);
        let image_phase = &percents[1..=images];
        assert_eq!(image_phase[0], 0);
        assert_eq!(image_phase[images - 1], image_progress(images - 1, images + 1));
        assert!(image_phase.iter().all(|&p| p < 100));
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn page_without_resources_is_archived() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut pipeline = pipeline(Some("<html><body><p>offline</p></body></html>"), tmp.path());
        let request = SnapshotRequest::new("http://example.invalid/").unwrap();

        let mut events: Vec<SnapshotEvent> = Vec::new();
        let completion = pipeline.run(&request, &mut events);

        assert_eq!(pipeline.phase(), Phase::Done);
        assert!(completion.is_success());
        assert!(completion.message.starts_with("Finished: "));
        assert_eq!(
            events,
            vec![
                SnapshotEvent::Progress { percent: 0 },
                SnapshotEvent::Status {
                    message: STATUS_LOADING.into()
                },
                SnapshotEvent::Status {
                    message: STATUS_INTEGRATING.into()
                },
                SnapshotEvent::Progress { percent: 100 },
                SnapshotEvent::Complete(completion.clone()),
            ]
        );

        let saved = std::fs::read_to_string(completion.artifact.unwrap().join("page.html")).unwrap();
        assert!(saved.contains("<p>offline</p>"));
    }

    #[test]
    fn render_failure_is_terminal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut pipeline = pipeline(None, tmp.path());
        let request = SnapshotRequest::new("http://example.invalid/").unwrap();

        let mut events: Vec<SnapshotEvent> = Vec::new();
        let completion = pipeline.run(&request, &mut events);

        assert_eq!(pipeline.phase(), Phase::Failed);
        assert_eq!(completion.artifact, None);
        assert!(completion.message.starts_with("Error: "));
        assert!(completion.message.contains("navigation failed"));
        assert_eq!(events.last(), Some(&SnapshotEvent::Complete(completion)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn second_run_does_not_leave_terminal_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut pipeline = pipeline(Some("<p>x</p>"), tmp.path());
        let request = SnapshotRequest::new("http://example.invalid/").unwrap();

        let mut first: Vec<SnapshotEvent> = Vec::new();
        assert!(pipeline.run(&request, &mut first).is_success());

        let mut second: Vec<SnapshotEvent> = Vec::new();
        let again = pipeline.run(&request, &mut second);
        assert!(!again.is_success());
        assert_eq!(second, vec![SnapshotEvent::Complete(again)]);
        assert_eq!(pipeline.phase(), Phase::Done);
    }

    #[test]
    fn non_http_locators_are_left_alone() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut pipeline = pipeline(
            Some(r#"<img src="data:image/gif;base64,R0lGODlh"><link rel="stylesheet" href="file:///etc/x.css">"#),
            tmp.path(),
        );
        let request = SnapshotRequest::new("http://example.invalid/").unwrap();

        let mut events: Vec<SnapshotEvent> = Vec::new();
        let completion = pipeline.run(&request, &mut events);

        let saved = std::fs::read_to_string(completion.artifact.unwrap().join("page.html")).unwrap();
        assert!(saved.contains(r#"src="data:image/gif;base64,R0lGODlh""#));
        assert!(saved.contains(r#"href="file:///etc/x.css""#));
    }
}
