//! The REP side of the contract: accept framed requests, render, reply.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

use super::{RenderEngine, RenderOutcome};
use crate::catalog;
use crate::error::TransportError;
use crate::job::{JobRequest, JobSpec};
use crate::policy::WarningGate;
use crate::protocol;
use crate::wire;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerOpts {
    /// Stable id used in artifact names and logs.
    pub id: u32,
    /// Where rendered artifacts land.
    pub output_dir: PathBuf,
    /// Append the rendered document as a trailing reply frame, for
    /// multi-part clients that want the bytes inline.
    pub inline_document: bool,
}

impl WorkerOpts {
    pub fn new(id: u32, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            output_dir: output_dir.into(),
            inline_document: false,
        }
    }
}

/// Serves the job protocol in front of one rendering engine.
pub struct Worker {
    engine: Arc<dyn RenderEngine>,
    opts: WorkerOpts,
    seq: AtomicU64,
}

impl Worker {
    pub fn new(engine: Arc<dyn RenderEngine>, opts: WorkerOpts) -> Self {
        Self {
            engine,
            opts,
            seq: AtomicU64::new(0),
        }
    }

    /// Accept connections until a client sends the stop message.
    ///
    /// Strict request/reply per connection: one exchange at a time, in
    /// order. Connection-level failures drop that client and keep serving.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!(id = self.opts.id, addr = %listener.local_addr()?, "worker serving");
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "client connected");
            match self.serve_connection(stream).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(id = self.opts.id, "stop requested, shutting down");
                    return Ok(());
                }
                Err(e) => warn!(%peer, error = %e, "connection failed"),
            }
        }
    }

    /// Answer requests on one connection. Returns `false` when a stop
    /// message asks the whole worker to quit.
    async fn serve_connection(&self, mut stream: TcpStream) -> Result<bool> {
        loop {
            let frames = match wire::read_message(&mut stream).await {
                Ok(frames) => frames,
                Err(TransportError::Closed) => return Ok(true),
                Err(e) => return Err(e.into()),
            };

            // More than one frame means the client tags messages with an
            // identity; echo it so the client can correlate the reply.
            let (identity, payload) = match frames.split_first() {
                Some((first, rest)) if !rest.is_empty() => {
                    (Some(first.clone()), rest.concat())
                }
                _ => (None, frames.concat()),
            };

            let text = String::from_utf8_lossy(&payload);
            if text.trim().eq_ignore_ascii_case(protocol::MSG_STOP) {
                let line = protocol::status_line(
                    protocol::REP_200_SUCCESS,
                    &format!("worker {} shutting down", self.opts.id),
                );
                self.reply(&mut stream, identity.as_deref(), vec![line.into_bytes()])
                    .await?;
                return Ok(false);
            }

            let reply_frames = self.handle_job(&payload).await;
            self.reply(&mut stream, identity.as_deref(), reply_frames)
                .await?;
        }
    }

    async fn reply(
        &self,
        stream: &mut TcpStream,
        identity: Option<&[u8]>,
        frames: Vec<Vec<u8>>,
    ) -> Result<()> {
        let mut out: Vec<&[u8]> = Vec::with_capacity(frames.len() + 1);
        if let Some(identity) = identity {
            out.push(identity);
        }
        out.extend(frames.iter().map(Vec::as_slice));
        wire::write_message(stream, &out).await?;
        Ok(())
    }

    /// Decode one job payload and run it. Always produces a reply; every
    /// failure mode maps to a status line.
    pub(crate) async fn handle_job(&self, payload: &[u8]) -> Vec<Vec<u8>> {
        let spec = match JobRequest::decode(payload) {
            Ok(JobRequest::Structured(spec)) => spec,
            Ok(JobRequest::Bare(url)) => {
                if let Err(e) = Url::parse(&url) {
                    debug!(url = %url, error = %e, "rejecting unparseable url");
                    return status_only(
                        protocol::REP_400_BAD_REQUEST,
                        &format!("cannot parse url {url:?}"),
                    );
                }
                JobSpec::new(url)
            }
            Err(e) => {
                debug!(error = %e, "rejecting job document");
                return status_only(protocol::REP_400_BAD_REQUEST, &e.to_string());
            }
        };

        let (global, object) = catalog::screen(&spec);
        if !global.is_clean() || !object.is_clean() {
            debug!(
                unrecognized_global = ?global.unrecognized,
                mismatched_global = ?global.mismatched,
                unrecognized_object = ?object.unrecognized,
                mismatched_object = ?object.mismatched,
                "passing unscreened options through to the engine"
            );
        }

        // timestamp plus a sequence number: bursts inside one millisecond
        // must not share an artifact name
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let artifact = self
            .opts
            .output_dir
            .join(format!("req-{}-{}-{seq}.pdf", self.opts.id, job_uid()));
        let mut gate = WarningGate::new(&spec.on_warning);

        match self.engine.render(&spec, &artifact, &mut gate).await {
            Err(e) => {
                warn!(url = %spec.url, error = %e, "engine failed");
                status_only(protocol::REP_502_BAD_GATEWAY, &e.to_string())
            }
            Ok(RenderOutcome::Aborted) => {
                let diagnostic = match gate.triggered() {
                    Some(t) => format!("trigger word {:?} matched in {:?}", t.word, t.warning),
                    None => "aborted by warning policy".to_string(),
                };
                info!(url = %spec.url, diagnostic = %diagnostic, "render aborted");
                status_only(protocol::REP_409_RENDER_ABORTED, &diagnostic)
            }
            Ok(RenderOutcome::Completed) => {
                info!(url = %spec.url, artifact = %artifact.display(), "artifact ready");
                let line = protocol::status_line(
                    protocol::REP_200_SUCCESS,
                    &artifact.display().to_string(),
                );
                let mut frames = vec![line.into_bytes()];
                if self.opts.inline_document {
                    match tokio::fs::read(&artifact).await {
                        Ok(bytes) => frames.push(bytes),
                        Err(e) => warn!(error = %e, "cannot inline artifact"),
                    }
                }
                frames
            }
        }
    }
}

fn status_only(status: &str, detail: &str) -> Vec<Vec<u8>> {
    vec![protocol::status_line(status, detail).into_bytes()]
}

/// Millisecond-resolution uid for artifact names.
fn job_uid() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
