//! Worker-side serving of the job protocol.
//!
//! The rendering engine itself is external; the worker owns everything
//! around it — framing, decoding, URL validation, the warning gate, and
//! the reply.

pub mod mock;
pub mod service;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::job::JobSpec;
use crate::policy::WarningGate;

/// How a render ended, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The artifact was written to the requested path.
    Completed,
    /// The warning gate said stop; nothing (or a partial file the worker
    /// discards) was produced.
    Aborted,
}

/// An opaque rendering capability.
///
/// Implementations must feed every warning they emit through the gate and
/// return [`RenderOutcome::Aborted`] as soon as it answers
/// [`Flow::Abort`](crate::policy::Flow::Abort). Engine-internal failures
/// are errors; an aborted render is not.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(
        &self,
        spec: &JobSpec,
        artifact: &Path,
        gate: &mut WarningGate,
    ) -> Result<RenderOutcome>;
}
