//! TCP-backed channel.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::{Channel, ChannelConfig, ChannelState, Discipline, Reply, ReplyMode};
use crate::error::TransportError;
use crate::wire;

/// A request/reply channel over one TCP connection.
///
/// Per-call deadlines are enforced with [`tokio::time::timeout`], so a
/// timed-out call cancels the pending socket operation without leaking
/// state. A timed-out send may have written a partial message; callers
/// should [`reset`](Channel::reset) (which reconnects) rather than retry
/// the send on the same connection.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    endpoint: String,
    config: ChannelConfig,
    discipline: Discipline,
}

impl TcpChannel {
    /// Connect to a `tcp://host:port` endpoint.
    pub async fn connect(endpoint: &str, config: ChannelConfig) -> Result<Self, TransportError> {
        let authority = wire::parse_endpoint(endpoint)?;
        let stream = TcpStream::connect(&authority).await?;
        stream.set_nodelay(true)?;
        debug!(endpoint, identity = ?config.identity, "channel connected");
        Ok(Self {
            stream,
            endpoint: authority,
            config,
            discipline: Discipline::new(),
        })
    }

    /// Strip and verify the identity echo on a reply.
    fn strip_identity(&self, mut frames: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, TransportError> {
        let Some(identity) = &self.config.identity else {
            return Ok(frames);
        };
        if frames.first().map(Vec::as_slice) != Some(identity.as_bytes()) {
            return Err(TransportError::Frame(
                "reply does not echo the configured identity".to_string(),
            ));
        }
        frames.remove(0);
        if frames.is_empty() {
            return Err(TransportError::Frame(
                "reply carries an identity but no payload".to_string(),
            ));
        }
        Ok(frames)
    }
}

#[async_trait]
impl Channel for TcpChannel {
    async fn send(&mut self, payload: &[u8], timeout: Duration) -> Result<(), TransportError> {
        self.discipline.begin_send()?;

        let write = async {
            match &self.config.identity {
                Some(identity) => {
                    wire::write_message(&mut self.stream, &[identity.as_bytes(), payload]).await
                }
                None => wire::write_message(&mut self.stream, &[payload]).await,
            }
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => {
                trace!(bytes = payload.len(), "request sent");
                self.discipline.sent();
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::Connection(e)),
            Err(_) => Err(TransportError::timeout("send", timeout)),
        }
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Reply, TransportError> {
        self.discipline.begin_receive()?;

        let frames = match tokio::time::timeout(timeout, wire::read_message(&mut self.stream)).await
        {
            Ok(Ok(frames)) => frames,
            Ok(Err(e)) => return Err(e),
            // state stays AwaitingReply: the caller may retry or reset
            Err(_) => return Err(TransportError::timeout("receive", timeout)),
        };

        self.discipline.received();
        let frames = self.strip_identity(frames)?;
        trace!(frames = frames.len(), "reply received");

        Ok(match self.config.reply_mode {
            ReplyMode::Single => Reply::Single(frames.concat()),
            ReplyMode::Multi => Reply::Multi(frames),
        })
    }

    async fn reset(&mut self) -> Result<(), TransportError> {
        // Reconnect: any reply in flight for the abandoned exchange dies
        // with the old connection instead of corrupting the next one.
        let stream = TcpStream::connect(&self.endpoint).await?;
        stream.set_nodelay(true)?;
        self.stream = stream;
        self.discipline.reset();
        debug!(endpoint = %self.endpoint, "channel reset");
        Ok(())
    }

    fn state(&self) -> ChannelState {
        self.discipline.state()
    }

    fn reply_mode(&self) -> ReplyMode {
        self.config.reply_mode
    }
}
