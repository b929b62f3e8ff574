//! Client library and wire contract for a distributed document-rendering
//! cluster.
//!
//! A [`Session`](session::Session) submits jobs — a bare URL or a
//! structured [`JobSpec`](job::JobSpec) — over a strict request/reply
//! [`Channel`](channel::Channel) and interprets the worker's replies.
//! The worker side of the same contract lives in [`worker`]; the
//! rendering engine itself stays behind the
//! [`RenderEngine`](worker::RenderEngine) trait.

pub mod catalog;
pub mod channel;
pub mod error;
pub mod job;
pub mod policy;
pub mod protocol;
pub mod session;
pub mod wire;
pub mod worker;

pub use error::{JobError, SessionError, TransportError, WorkerError};
pub use job::{JobRequest, JobSpec, WarningAction, WarningPolicy};
pub use session::{JobResponse, Session, SessionConfig};
