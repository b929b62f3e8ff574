//! A scripted engine for tests and loopback probing.

use std::path::Path;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{RenderEngine, RenderOutcome};
use crate::job::JobSpec;
use crate::policy::{Flow, WarningGate};

/// Emits a fixed warning stream, then writes a fixed document.
pub struct MockEngine {
    warnings: Vec<String>,
    document: Vec<u8>,
    fail: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            document: b"%PDF-1.7\n%mock document\n".to_vec(),
            fail: false,
        }
    }

    /// Emit these warnings, in order, on every render.
    pub fn with_warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings = warnings.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_document(mut self, document: impl Into<Vec<u8>>) -> Self {
        self.document = document.into();
        self
    }

    /// Fail every render, as a broken engine would.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderEngine for MockEngine {
    async fn render(
        &self,
        _spec: &JobSpec,
        artifact: &Path,
        gate: &mut WarningGate,
    ) -> Result<RenderOutcome> {
        if self.fail {
            bail!("mock engine configured to fail");
        }
        for warning in &self.warnings {
            if gate.observe(warning) == Flow::Abort {
                return Ok(RenderOutcome::Aborted);
            }
        }
        tokio::fs::write(artifact, &self.document).await?;
        Ok(RenderOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::WarningPolicy;

    #[tokio::test]
    async fn writes_the_document_when_not_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let engine = MockEngine::new().with_warnings(["minor hiccup"]);
        let mut gate = WarningGate::new(&WarningPolicy::default());

        let outcome = engine
            .render(&JobSpec::new("https://example.com"), &path, &mut gate)
            .await
            .unwrap();

        assert_eq!(outcome, RenderOutcome::Completed);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn stops_at_the_gate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let engine = MockEngine::new().with_warnings(["fatal error in page 2", "never seen"]);
        let mut gate = WarningGate::new(&WarningPolicy::abort_on(["error", "fail"]));

        let outcome = engine
            .render(&JobSpec::new("https://example.com"), &path, &mut gate)
            .await
            .unwrap();

        assert_eq!(outcome, RenderOutcome::Aborted);
        assert_eq!(gate.observed(), 1, "processing stops at the first match");
        assert!(!path.exists(), "no partial output on abort");
    }
}
