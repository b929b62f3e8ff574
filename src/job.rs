//! The job specification model: what a client asks the cluster to render.
//!
//! A request is either a bare resource locator or a structured document
//! carrying rendering options and a warning policy. On the wire both are
//! UTF-8 text; a structured document is a JSON object with a `url` field.
//! Anything that does not parse as that envelope is treated as a bare URL
//! string — that fallback is part of the contract, not an error path.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::JobError;

/// A rendering request as it travels over the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// A bare resource locator (URL or local-file reference).
    Bare(String),
    /// A structured job document.
    Structured(JobSpec),
}

/// A structured job document: target, options, and warning policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Resource to render. Must parse as an absolute URI.
    pub url: String,

    /// Document-wide options, dotted namespace keys (`size.pageSize`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub global: BTreeMap<String, OptionValue>,

    /// Per-object options (`web.enableJavascript`, `load.windowStatus`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub object: BTreeMap<String, OptionValue>,

    /// What to do when the engine emits a warning.
    #[serde(
        default,
        rename = "onWarning",
        skip_serializing_if = "WarningPolicy::is_default"
    )]
    pub on_warning: WarningPolicy,
}

/// What the worker must do when an engine warning matches a trigger word.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarningPolicy {
    #[serde(default)]
    pub action: WarningAction,

    #[serde(
        default,
        rename = "triggerWords",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub trigger_words: BTreeSet<String>,
}

impl WarningPolicy {
    /// Abort the render when any of `words` appears in a warning.
    pub fn abort_on<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: WarningAction::Abort,
            trigger_words: words.into_iter().map(Into::into).collect(),
        }
    }

    fn is_default(&self) -> bool {
        self.action == WarningAction::Ignore && self.trigger_words.is_empty()
    }
}

/// Recognized `onWarning.action` values. Anything else fails decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningAction {
    #[default]
    Ignore,
    Abort,
}

/// Scalar option value, mirroring the engine's setting value kinds.
///
/// Decoding maps JSON numbers canonically: non-negative integers become
/// `Uint`, negative integers `Int`, everything else `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        // keep the canonical form so encode/decode round-trips
        if v >= 0 { Self::Uint(v as u64) } else { Self::Int(v) }
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl JobSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            global: BTreeMap::new(),
            object: BTreeMap::new(),
            on_warning: WarningPolicy::default(),
        }
    }

    /// Set a document-wide option.
    pub fn with_global(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.global.insert(key.into(), value.into());
        self
    }

    /// Set a per-object option.
    pub fn with_object(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.object.insert(key.into(), value.into());
        self
    }

    /// Replace the warning policy.
    pub fn with_warning_policy(mut self, policy: WarningPolicy) -> Self {
        self.on_warning = policy;
        self
    }
}

impl JobRequest {
    /// The target resource, regardless of request form.
    pub fn url(&self) -> &str {
        match self {
            JobRequest::Bare(url) => url,
            JobRequest::Structured(spec) => &spec.url,
        }
    }

    /// Serialize for the wire. Bare requests are the raw string; structured
    /// requests are the JSON document.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            JobRequest::Bare(url) => url.clone().into_bytes(),
            JobRequest::Structured(spec) => {
                serde_json::to_vec(spec).expect("job spec serializes to JSON")
            }
        }
    }

    /// Parse a wire payload back into a request.
    ///
    /// A payload that is not a JSON object with a string `url` field
    /// decodes as [`JobRequest::Bare`] holding the raw payload. Once the
    /// envelope is recognized, failures are real errors: an unrecognized
    /// `onWarning.action` is [`JobError::InvalidPolicy`], a URL that does
    /// not parse is [`JobError::InvalidUrl`].
    pub fn decode(payload: &[u8]) -> Result<JobRequest, JobError> {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                return Ok(JobRequest::Bare(
                    String::from_utf8_lossy(payload).into_owned(),
                ));
            }
        };

        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return Ok(JobRequest::Bare(text.to_string())),
        };

        let recognized = value
            .as_object()
            .is_some_and(|obj| obj.get("url").is_some_and(|u| u.is_string()));
        if !recognized {
            return Ok(JobRequest::Bare(text.to_string()));
        }

        Ok(JobRequest::Structured(spec_from_value(value)?))
    }
}

fn spec_from_value(value: serde_json::Value) -> Result<JobSpec, JobError> {
    // Check the action token first so the error names the offending value
    // instead of a generic deserialization message.
    if let Some(action) = value.get("onWarning").and_then(|w| w.get("action")) {
        let known = action
            .as_str()
            .is_some_and(|a| matches!(a, "ignore" | "abort"));
        if !known {
            let shown = action
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| action.to_string());
            return Err(JobError::InvalidPolicy(shown));
        }
    }

    let spec: JobSpec =
        serde_json::from_value(value).map_err(|e| JobError::Malformed(e.to_string()))?;

    Url::parse(&spec.url).map_err(|e| JobError::InvalidUrl {
        url: spec.url.clone(),
        reason: e.to_string(),
    })?;

    Ok(spec)
}
