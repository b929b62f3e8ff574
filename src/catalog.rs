//! Catalog of rendering options the engine is known to understand.
//!
//! Workers use this to tell recognized options apart from engine-specific
//! ones. Unknown keys are never an error — they pass through to the engine
//! untouched — but they are worth logging, and a recognized key carrying
//! the wrong scalar kind usually means a client bug.

use crate::job::{JobSpec, OptionValue};

/// Scalar kind an option expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Bool,
    Int,
    Uint,
    Float,
}

/// A known option name and the kind it expects.
#[derive(Debug, Clone, Copy)]
pub struct KnownOption {
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn opt(name: &'static str, kind: ValueKind) -> KnownOption {
    KnownOption { name, kind }
}

/// Document-wide options.
pub const GLOBAL_OPTIONS: &[KnownOption] = &[
    opt("size.pageSize", ValueKind::Text),
    opt("size.width", ValueKind::Text),
    opt("size.height", ValueKind::Text),
    opt("orientation", ValueKind::Text),
    opt("colorMode", ValueKind::Text),
    opt("dpi", ValueKind::Uint),
    opt("pageOffset", ValueKind::Int),
    opt("copies", ValueKind::Uint),
    opt("collate", ValueKind::Bool),
    opt("outline", ValueKind::Bool),
    opt("outlineDepth", ValueKind::Uint),
    opt("dumpOutline", ValueKind::Text),
    opt("out", ValueKind::Text),
    opt("documentTitle", ValueKind::Text),
    opt("useCompression", ValueKind::Bool),
    opt("margin.top", ValueKind::Text),
    opt("margin.bottom", ValueKind::Text),
    opt("margin.left", ValueKind::Text),
    opt("margin.right", ValueKind::Text),
    opt("imageDPI", ValueKind::Uint),
    opt("imageQuality", ValueKind::Uint),
    opt("load.cookieJar", ValueKind::Text),
];

/// Per-page/per-object options.
pub const OBJECT_OPTIONS: &[KnownOption] = &[
    opt("page", ValueKind::Text),
    opt("useExternalLinks", ValueKind::Bool),
    opt("useLocalLinks", ValueKind::Bool),
    opt("produceForms", ValueKind::Bool),
    opt("includeInOutline", ValueKind::Bool),
    opt("pagesCount", ValueKind::Bool),
    opt("toc.useDottedLines", ValueKind::Bool),
    opt("toc.captionText", ValueKind::Text),
    opt("toc.forwardLinks", ValueKind::Bool),
    opt("toc.backLinks", ValueKind::Bool),
    opt("toc.indentation", ValueKind::Text),
    opt("toc.fontScale", ValueKind::Float),
    opt("header.fontName", ValueKind::Text),
    opt("header.fontSize", ValueKind::Text),
    opt("header.left", ValueKind::Text),
    opt("header.center", ValueKind::Text),
    opt("header.right", ValueKind::Text),
    opt("header.line", ValueKind::Bool),
    opt("header.spacing", ValueKind::Float),
    opt("header.htmlUrl", ValueKind::Text),
    opt("footer.fontName", ValueKind::Text),
    opt("footer.fontSize", ValueKind::Text),
    opt("footer.left", ValueKind::Text),
    opt("footer.center", ValueKind::Text),
    opt("footer.right", ValueKind::Text),
    opt("footer.line", ValueKind::Bool),
    opt("footer.spacing", ValueKind::Float),
    opt("footer.htmlUrl", ValueKind::Text),
    opt("load.username", ValueKind::Text),
    opt("load.password", ValueKind::Text),
    opt("load.jsdelay", ValueKind::Uint),
    opt("load.windowStatus", ValueKind::Text),
    opt("load.zoomFactor", ValueKind::Text),
    opt("load.blockLocalFileAccess", ValueKind::Text),
    opt("load.stopSlowScripts", ValueKind::Bool),
    opt("load.loadErrorHandling", ValueKind::Text),
    opt("load.proxy", ValueKind::Text),
    opt("web.background", ValueKind::Bool),
    opt("web.loadImages", ValueKind::Bool),
    opt("web.enableJavascript", ValueKind::Bool),
    opt("web.enableIntelligentShrinking", ValueKind::Bool),
    opt("web.minimumFontSize", ValueKind::Uint),
    opt("web.defaultEncoding", ValueKind::Text),
    opt("web.printMediaType", ValueKind::Bool),
    opt("web.userStyleSheet", ValueKind::Text),
    opt("web.enablePlugins", ValueKind::Bool),
];

/// Look up a document-wide option by name.
pub fn global_option(name: &str) -> Option<&'static KnownOption> {
    GLOBAL_OPTIONS.iter().find(|o| o.name == name)
}

/// Look up a per-object option by name.
pub fn object_option(name: &str) -> Option<&'static KnownOption> {
    OBJECT_OPTIONS.iter().find(|o| o.name == name)
}

/// Whether a scalar satisfies the expected kind.
///
/// Numeric kinds are lenient where the conversion is lossless: a `Uint`
/// satisfies `Int` and `Float`, an `Int` satisfies `Float`.
pub fn matches_kind(value: &OptionValue, kind: ValueKind) -> bool {
    match (value, kind) {
        (OptionValue::String(_), ValueKind::Text) => true,
        (OptionValue::Bool(_), ValueKind::Bool) => true,
        (OptionValue::Uint(_), ValueKind::Uint | ValueKind::Int | ValueKind::Float) => true,
        (OptionValue::Int(_), ValueKind::Int | ValueKind::Float) => true,
        (OptionValue::Float(_), ValueKind::Float) => true,
        _ => false,
    }
}

/// Screening result for one option map.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Screened {
    /// Keys the catalog does not know. Passed through to the engine.
    pub unrecognized: Vec<String>,
    /// Known keys whose value has the wrong scalar kind.
    pub mismatched: Vec<String>,
}

impl Screened {
    pub fn is_clean(&self) -> bool {
        self.unrecognized.is_empty() && self.mismatched.is_empty()
    }
}

/// Screen a job spec's option maps against the catalog.
pub fn screen(spec: &JobSpec) -> (Screened, Screened) {
    let screen_map = |options: &std::collections::BTreeMap<String, OptionValue>,
                      lookup: fn(&str) -> Option<&'static KnownOption>| {
        let mut result = Screened::default();
        for (key, value) in options {
            match lookup(key) {
                Some(known) if matches_kind(value, known.kind) => {}
                Some(_) => result.mismatched.push(key.clone()),
                None => result.unrecognized.push(key.clone()),
            }
        }
        result
    };
    (
        screen_map(&spec.global, global_option),
        screen_map(&spec.object, object_option),
    )
}
