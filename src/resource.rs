//! External resources referenced by a document
//!
//! A [`ResourceReference`] is a transient view of one element that points at
//! an image, stylesheet or script. References are recomputed by scanning the
//! tree and never stored beyond a single inlining phase.

use crate::document::{AttrFilter, Document, NodeId};
use crate::fetch::FetchError;
use base64::Engine as Base64Engine;
use url::Url;

/// Fallback content type for images served without one
pub const DEFAULT_IMAGE_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Stylesheet,
    Script,
}

impl ResourceKind {
    pub fn tag(self) -> &'static str {
        match self {
            ResourceKind::Image => "img",
            ResourceKind::Stylesheet => "link",
            ResourceKind::Script => "script",
        }
    }

    /// Attribute holding the resource location
    pub fn locator_attribute(self) -> &'static str {
        match self {
            ResourceKind::Image | ResourceKind::Script => "src",
            ResourceKind::Stylesheet => "href",
        }
    }

    fn filter(self) -> AttrFilter<'static> {
        match self {
            ResourceKind::Image => AttrFilter::Any,
            ResourceKind::Stylesheet => AttrFilter::Token("rel", "stylesheet"),
            ResourceKind::Script => AttrFilter::Has("src"),
        }
    }
}

/// One element that references an external resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub node: NodeId,
    pub kind: ResourceKind,
    /// Locator value as written in the markup, `None` when absent or blank
    pub raw_url: Option<String>,
}

impl ResourceReference {
    /// All elements of `kind` in document order.
    ///
    /// Images without a `src` are included (with `raw_url: None`) so callers
    /// can count them.
    pub fn scan(doc: &Document, kind: ResourceKind) -> Vec<Self> {
        doc.find_all(kind.tag(), kind.filter())
            .into_iter()
            .map(|node| ResourceReference {
                node,
                kind,
                raw_url: doc
                    .attr(node, kind.locator_attribute())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            })
            .collect()
    }
}

/// Resolve a locator against the page's base URL.
///
/// Without a usable base only absolute locators resolve.
pub fn resolve(base: Option<&Url>, raw: &str) -> Result<Url, FetchError> {
    let joined = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    joined.map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Encode bytes as a `data:` URI
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
