//! Client session: submits jobs over one channel and interprets replies.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::tcp::TcpChannel;
use crate::channel::{Channel, ChannelConfig, ClientIdentity, Reply, ReplyMode};
use crate::error::{SessionError, Stage, TransportError, WorkerError};
use crate::job::JobRequest;
use crate::protocol;

/// Everything a session needs to reach the cluster.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cluster entry point, `tcp://host:port`.
    pub endpoint: String,
    pub send_timeout: Duration,
    pub recv_timeout: Duration,
    /// Optional identity frame prefixed to every message.
    pub identity: Option<ClientIdentity>,
    pub reply_mode: ReplyMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: protocol::DEFAULT_ENDPOINT.to_string(),
            send_timeout: protocol::DEFAULT_TIMEOUT,
            recv_timeout: protocol::DEFAULT_TIMEOUT,
            identity: None,
            reply_mode: ReplyMode::default(),
        }
    }
}

/// A reply to one submission: a status line plus any further frames.
///
/// The first frame is `<status> <detail>`; a successful reply's detail is
/// the artifact reference. Extra frames (document bytes) ride behind it
/// in multi-part mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    frames: Vec<Vec<u8>>,
}

impl JobResponse {
    fn from_reply(reply: Reply) -> Self {
        Self {
            frames: reply.into_frames(),
        }
    }

    fn status_line(&self) -> String {
        self.frames
            .first()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .unwrap_or_default()
    }

    /// The status token of the reply (`"200"`, `"409"`, ...).
    pub fn status(&self) -> String {
        protocol::split_status_line(&self.status_line()).0.to_string()
    }

    /// Everything after the status token; the artifact reference on
    /// success, a diagnostic otherwise.
    pub fn detail(&self) -> String {
        protocol::split_status_line(&self.status_line()).1.to_string()
    }

    pub fn is_success(&self) -> bool {
        self.status() == protocol::REP_200_SUCCESS
    }

    /// All reply frames, in order.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Document bytes, when the worker inlined them as a trailing frame.
    pub fn document(&self) -> Option<&[u8]> {
        self.frames.get(1).map(Vec::as_slice)
    }

    /// Interpret the reply: the artifact reference on success, a typed
    /// worker failure otherwise.
    pub fn to_result(&self) -> Result<String, WorkerError> {
        let line = self.status_line();
        let (status, detail) = protocol::split_status_line(&line);
        match status {
            protocol::REP_200_SUCCESS => Ok(detail.to_string()),
            protocol::REP_400_BAD_REQUEST => Err(WorkerError::Rejected(detail.to_string())),
            protocol::REP_409_RENDER_ABORTED => {
                Err(WorkerError::RenderAborted(detail.to_string()))
            }
            protocol::REP_502_BAD_GATEWAY => Err(WorkerError::Engine(detail.to_string())),
            protocol::REP_503_SERVICE_UNAVAILABLE => {
                Err(WorkerError::Unavailable(detail.to_string()))
            }
            other => Err(WorkerError::Unexpected {
                status: other.to_string(),
                diagnostic: detail.to_string(),
            }),
        }
    }
}

/// One client's sequential stream of submissions over one channel.
pub struct Session<C: Channel> {
    channel: C,
    send_timeout: Duration,
    recv_timeout: Duration,
}

impl Session<TcpChannel> {
    /// Connect a session to the cluster entry point.
    pub async fn connect(config: &SessionConfig) -> Result<Self, TransportError> {
        let channel = TcpChannel::connect(
            &config.endpoint,
            ChannelConfig {
                identity: config.identity.clone(),
                reply_mode: config.reply_mode,
            },
        )
        .await?;
        Ok(Self::over(channel, config))
    }
}

impl<C: Channel> Session<C> {
    /// Run a session over an already-constructed channel.
    pub fn over(channel: C, config: &SessionConfig) -> Self {
        Self {
            channel,
            send_timeout: config.send_timeout,
            recv_timeout: config.recv_timeout,
        }
    }

    /// Submit one job and wait for its reply.
    ///
    /// No validation happens here — an empty or malformed request passes
    /// through to the worker's decoder — and no retry happens here either:
    /// every transport failure surfaces and the caller decides.
    pub async fn submit(&mut self, request: &JobRequest) -> Result<JobResponse, SessionError> {
        let payload = request.encode();
        debug!(url = request.url(), bytes = payload.len(), "submitting job");

        self.channel
            .send(&payload, self.send_timeout)
            .await
            .map_err(|source| SessionError::new(Stage::Send, source))?;

        let reply = self
            .channel
            .receive(self.recv_timeout)
            .await
            .map_err(|source| SessionError::new(Stage::Receive, source))?;

        let response = JobResponse::from_reply(reply);
        debug!(status = %response.status(), "reply received");
        Ok(response)
    }

    /// Submit a sequence of jobs one at a time over this session's channel.
    ///
    /// Each outcome is independent: a failure at iteration `k` is recorded
    /// and iteration `k + 1` still runs. After a failure the channel is
    /// reset so the abandoned exchange cannot poison the next one — that
    /// is cleanup, not a retry; the failed submission stays failed.
    pub async fn submit_batch<I>(
        &mut self,
        requests: I,
    ) -> Vec<Result<JobResponse, SessionError>>
    where
        I: IntoIterator<Item = JobRequest>,
    {
        let mut outcomes = Vec::new();
        for (i, request) in requests.into_iter().enumerate() {
            match self.submit(&request).await {
                Ok(response) => {
                    info!(
                        iteration = i + 1,
                        status = %response.status(),
                        "submission complete"
                    );
                    outcomes.push(Ok(response));
                }
                Err(err) => {
                    warn!(iteration = i + 1, error = %err, "submission failed");
                    if let Err(reset_err) = self.channel.reset().await {
                        warn!(error = %reset_err, "channel reset failed after submission error");
                    }
                    outcomes.push(Err(err));
                }
            }
        }
        outcomes
    }

    /// Abandon any outstanding exchange; see [`Channel::reset`].
    pub async fn reset(&mut self) -> Result<(), TransportError> {
        self.channel.reset().await
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{MockChannel, ScriptedReply};
    use crate::error::TransportError;
    use crate::job::JobSpec;

    fn session_over(script: Vec<ScriptedReply>) -> Session<MockChannel> {
        let config = SessionConfig::default();
        Session::over(MockChannel::new(ChannelConfig::default(), script), &config)
    }

    #[tokio::test]
    async fn submit_returns_the_artifact_reference() {
        let mut session = session_over(vec![ScriptedReply::text("200 /out/req-1-7.pdf")]);
        let request = JobRequest::Bare("https://example.com".to_string());

        let response = session.submit(&request).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.to_result().unwrap(), "/out/req-1-7.pdf");
    }

    #[tokio::test]
    async fn structured_requests_travel_as_json() {
        let mut session = session_over(vec![ScriptedReply::text("200 ok")]);
        let request = JobRequest::Structured(
            JobSpec::new("https://example.com").with_global("copies", 2u64),
        );
        session.submit(&request).await.unwrap();

        let sent = &session.channel().sent()[0];
        let text = std::str::from_utf8(sent).unwrap();
        assert!(text.contains("\"copies\":2"), "got: {text}");
    }

    #[tokio::test]
    async fn aborted_render_maps_to_worker_error() {
        let mut session = session_over(vec![ScriptedReply::text(
            "409 trigger word \"error\" matched in \"fatal error in page 2\"",
        )]);
        let request = JobRequest::Bare("https://example.com".to_string());

        let response = session.submit(&request).await.unwrap();
        let err = response.to_result().unwrap_err();
        assert!(matches!(err, WorkerError::RenderAborted(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn batch_outcomes_are_independent() {
        let mut session = session_over(vec![
            ScriptedReply::text("200 one"),
            ScriptedReply::Timeout,
            ScriptedReply::text("200 three"),
        ]);
        let request = JobRequest::Bare("https://example.com".to_string());

        let outcomes = session
            .submit_batch(std::iter::repeat_n(request, 3))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].as_ref().unwrap_err().is_timeout());
        assert!(outcomes[2].is_ok(), "failure must not block the next iteration");
    }

    #[tokio::test]
    async fn submission_error_names_the_stage() {
        let mut session = session_over(vec![ScriptedReply::Disconnected]);
        let request = JobRequest::Bare("https://example.com".to_string());

        let err = session.submit(&request).await.unwrap_err();
        assert_eq!(err.stage, Stage::Receive);
        assert!(matches!(err.source, TransportError::Closed));
    }

    #[tokio::test]
    async fn empty_request_passes_through() {
        let mut session = session_over(vec![ScriptedReply::text("400 cannot parse url")]);
        let request = JobRequest::Bare(String::new());

        let response = session.submit(&request).await.unwrap();
        assert!(!response.is_success());
        assert!(matches!(
            response.to_result().unwrap_err(),
            WorkerError::Rejected(_)
        ));
    }
}
