//! Request/reply messaging channels.
//!
//! A channel carries exactly one outstanding request at a time. The
//! discipline is an explicit two-state machine — `Idle` and
//! `AwaitingReply` — and illegal transitions fail with
//! [`TransportError::ProtocolViolation`] instead of being silently
//! absorbed by the socket layer.

pub mod mock;
pub mod tcp;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Opaque byte string naming a client connection for a session's lifetime.
///
/// Purely caller-supplied configuration; nothing about it is derived from
/// process state. A stateful peer uses it to correlate replies when it
/// multiplexes many clients' channels.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity(Vec<u8>);

impl ClientIdentity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A fresh 16-byte random identity.
    pub fn random() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "ClientIdentity({text:?})"),
            Err(_) => write!(f, "ClientIdentity({} bytes)", self.0.len()),
        }
    }
}

impl From<&str> for ClientIdentity {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

/// How `receive` presents a reply. Fixed at channel creation, never
/// negotiated per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    /// Legacy mode: one payload, multi-frame replies joined in order.
    #[default]
    Single,
    /// Every reply is the full frame sequence, at least one frame.
    Multi,
}

/// A received reply, shaped by the channel's [`ReplyMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Single(Vec<u8>),
    Multi(Vec<Vec<u8>>),
}

impl Reply {
    /// The reply as a frame sequence regardless of mode.
    pub fn into_frames(self) -> Vec<Vec<u8>> {
        match self {
            Reply::Single(payload) => vec![payload],
            Reply::Multi(frames) => frames,
        }
    }
}

/// Channel construction options.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Prefix every message with this identity frame when set.
    pub identity: Option<ClientIdentity>,
    pub reply_mode: ReplyMode,
}

/// Where a channel is in its request/reply exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    AwaitingReply,
}

/// The explicit REQ/REP state machine shared by channel implementations.
#[derive(Debug)]
pub(crate) struct Discipline {
    state: ChannelState,
}

impl Discipline {
    pub(crate) fn new() -> Self {
        Self {
            state: ChannelState::Idle,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    /// A send is only legal while idle.
    pub(crate) fn begin_send(&self) -> Result<(), TransportError> {
        match self.state {
            ChannelState::Idle => Ok(()),
            ChannelState::AwaitingReply => Err(TransportError::ProtocolViolation(
                "send while a reply is still outstanding",
            )),
        }
    }

    pub(crate) fn sent(&mut self) {
        self.state = ChannelState::AwaitingReply;
    }

    /// A receive is only legal with a request outstanding.
    pub(crate) fn begin_receive(&self) -> Result<(), TransportError> {
        match self.state {
            ChannelState::AwaitingReply => Ok(()),
            ChannelState::Idle => Err(TransportError::ProtocolViolation(
                "receive with no request outstanding",
            )),
        }
    }

    pub(crate) fn received(&mut self) {
        self.state = ChannelState::Idle;
    }

    pub(crate) fn reset(&mut self) {
        self.state = ChannelState::Idle;
    }
}

/// A reliable, ordered request/reply connection.
///
/// Timeouts are per-call and independent for send and receive. A receive
/// timeout leaves the channel in [`ChannelState::AwaitingReply`]: the
/// caller either retries the receive or calls [`reset`](Channel::reset)
/// to discard the exchange and start over.
#[async_trait]
pub trait Channel: Send {
    /// Send one request payload. Fails with
    /// [`TransportError::ProtocolViolation`] while a reply is outstanding.
    async fn send(&mut self, payload: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Receive the reply to the outstanding request.
    async fn receive(&mut self, timeout: Duration) -> Result<Reply, TransportError>;

    /// Abandon any outstanding exchange and return the channel to idle.
    /// Implementations may reconnect to do so.
    async fn reset(&mut self) -> Result<(), TransportError>;

    fn state(&self) -> ChannelState;

    fn reply_mode(&self) -> ReplyMode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discipline_walks_the_two_states() {
        let mut d = Discipline::new();
        assert_eq!(d.state(), ChannelState::Idle);

        d.begin_send().unwrap();
        d.sent();
        assert_eq!(d.state(), ChannelState::AwaitingReply);

        d.begin_receive().unwrap();
        d.received();
        assert_eq!(d.state(), ChannelState::Idle);
    }

    #[test]
    fn double_send_is_a_violation() {
        let mut d = Discipline::new();
        d.begin_send().unwrap();
        d.sent();
        assert!(matches!(
            d.begin_send(),
            Err(TransportError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn receive_before_send_is_a_violation() {
        let d = Discipline::new();
        assert!(matches!(
            d.begin_receive(),
            Err(TransportError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut d = Discipline::new();
        d.begin_send().unwrap();
        d.sent();
        d.reset();
        assert_eq!(d.state(), ChannelState::Idle);
        d.begin_send().unwrap();
    }

    #[test]
    fn random_identities_differ() {
        assert_ne!(
            ClientIdentity::random().as_bytes(),
            ClientIdentity::random().as_bytes()
        );
    }

    #[test]
    fn reply_into_frames() {
        assert_eq!(
            Reply::Single(b"200".to_vec()).into_frames(),
            vec![b"200".to_vec()]
        );
        assert_eq!(
            Reply::Multi(vec![b"200".to_vec(), b"doc".to_vec()]).into_frames(),
            vec![b"200".to_vec(), b"doc".to_vec()]
        );
    }
}
