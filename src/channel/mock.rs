//! A scripted channel for tests. Plays back pre-defined replies in order
//! while honoring the same request/reply discipline as the real thing.

use std::time::Duration;

use async_trait::async_trait;

use super::{Channel, ChannelConfig, ChannelState, Discipline, Reply, ReplyMode};
use crate::error::TransportError;

/// What the mock does for one `receive` call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Deliver these frames.
    Frames(Vec<Vec<u8>>),
    /// Simulate a deadline expiry; the channel stays awaiting the reply.
    Timeout,
    /// Simulate the peer hanging up.
    Disconnected,
}

impl ScriptedReply {
    /// One text frame — the common single-part worker reply.
    pub fn text(line: &str) -> Self {
        Self::Frames(vec![line.as_bytes().to_vec()])
    }
}

pub struct MockChannel {
    config: ChannelConfig,
    script: Vec<ScriptedReply>,
    next: usize,
    sent: Vec<Vec<u8>>,
    discipline: Discipline,
}

impl MockChannel {
    pub fn new(config: ChannelConfig, script: Vec<ScriptedReply>) -> Self {
        Self {
            config,
            script,
            next: 0,
            sent: Vec::new(),
            discipline: Discipline::new(),
        }
    }

    /// Payloads sent so far, for assertions.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn send(&mut self, payload: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        self.discipline.begin_send()?;
        self.sent.push(payload.to_vec());
        self.discipline.sent();
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Reply, TransportError> {
        self.discipline.begin_receive()?;

        let scripted = self.script.get(self.next).cloned().ok_or_else(|| {
            TransportError::Frame(format!("mock script exhausted after {} replies", self.next))
        })?;
        self.next += 1;

        match scripted {
            ScriptedReply::Timeout => Err(TransportError::timeout("receive", timeout)),
            ScriptedReply::Disconnected => Err(TransportError::Closed),
            ScriptedReply::Frames(frames) => {
                self.discipline.received();
                Ok(match self.config.reply_mode {
                    ReplyMode::Single => Reply::Single(frames.concat()),
                    ReplyMode::Multi => Reply::Multi(frames),
                })
            }
        }
    }

    async fn reset(&mut self) -> Result<(), TransportError> {
        self.discipline.reset();
        Ok(())
    }

    fn state(&self) -> ChannelState {
        self.discipline.state()
    }

    fn reply_mode(&self) -> ReplyMode {
        self.config.reply_mode
    }
}
