//! Frame codec and endpoint parsing.
//!
//! A message is one or more frames. Each frame is a one-byte flag field
//! (`0x01` = more frames follow), a `u32` big-endian payload length, and
//! the payload bytes. When identity tagging is configured, the identity
//! travels as the first frame of every message.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// More frames follow in this message.
pub const FLAG_MORE: u8 = 0x01;

/// Upper bound on a single frame payload. Rendered documents travel in a
/// frame, so this is generous; anything larger is a corrupt stream.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one message, flushing after the last frame.
pub async fn write_message<W>(writer: &mut W, frames: &[&[u8]]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug_assert!(!frames.is_empty(), "a message has at least one frame");
    let total: usize = frames.iter().map(|f| f.len() + 5).sum();
    let mut buf = Vec::with_capacity(total);
    for (i, frame) in frames.iter().enumerate() {
        let more = i + 1 < frames.len();
        buf.push(if more { FLAG_MORE } else { 0 });
        buf.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        buf.extend_from_slice(frame);
    }
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Read one complete message.
///
/// Returns [`TransportError::Closed`] when the peer hangs up cleanly
/// between messages, [`TransportError::Frame`] when the stream dies or
/// lies mid-message.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = Vec::new();
    loop {
        let mut head = [0u8; 5];
        if let Err(e) = reader.read_exact(&mut head).await {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof if frames.is_empty() => TransportError::Closed,
                io::ErrorKind::UnexpectedEof => {
                    TransportError::Frame("stream ended mid-message".to_string())
                }
                _ => TransportError::Connection(e),
            });
        }

        let flags = head[0];
        if flags & !FLAG_MORE != 0 {
            return Err(TransportError::Frame(format!(
                "unknown frame flags {flags:#04x}"
            )));
        }
        let len = u32::from_be_bytes([head[1], head[2], head[3], head[4]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(TransportError::Frame(format!(
                "frame length {len} exceeds the {MAX_FRAME_LEN} byte cap"
            )));
        }

        let mut payload = vec![0u8; len];
        if let Err(e) = reader.read_exact(&mut payload).await {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => {
                    TransportError::Frame("frame payload truncated".to_string())
                }
                _ => TransportError::Connection(e),
            });
        }
        frames.push(payload);

        if flags & FLAG_MORE == 0 {
            return Ok(frames);
        }
    }
}

/// Parse a `tcp://host:port` endpoint into the `host:port` form the socket
/// layer wants.
pub fn parse_endpoint(endpoint: &str) -> Result<String, TransportError> {
    let invalid = || TransportError::Endpoint(endpoint.to_string());

    let rest = endpoint.strip_prefix("tcp://").ok_or_else(invalid)?;
    let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_frame_message() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, &[b"https://example.com"])
            .await
            .unwrap();

        let frames = read_message(&mut server).await.unwrap();
        assert_eq!(frames, vec![b"https://example.com".to_vec()]);
    }

    #[tokio::test]
    async fn multi_frame_message_keeps_order() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, &[b"identity", b"200 ok", b"%PDF-1.7"])
            .await
            .unwrap();

        let frames = read_message(&mut server).await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], b"identity");
        assert_eq!(frames[2], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn empty_frame_is_legal() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_message(&mut client, &[b""]).await.unwrap();
        let frames = read_message(&mut server).await.unwrap();
        assert_eq!(frames, vec![Vec::<u8>::new()]);
    }

    #[tokio::test]
    async fn clean_hangup_is_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn hangup_mid_message_is_frame_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        // a MORE frame with no successor
        client.write_all(&[FLAG_MORE, 0, 0, 0, 2, b'h', b'i']).await.unwrap();
        drop(client);
        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::Frame(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn oversized_length_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&[0, 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();
        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::Frame(_)));
    }

    #[test]
    fn endpoint_parses() {
        assert_eq!(parse_endpoint("tcp://127.0.0.1:6660").unwrap(), "127.0.0.1:6660");
        assert_eq!(parse_endpoint("tcp://render.internal:9100").unwrap(), "render.internal:9100");
    }

    #[test]
    fn endpoint_rejects_other_forms() {
        for bad in [
            "127.0.0.1:6660",
            "ipc:///tmp/platen",
            "tcp://:6660",
            "tcp://host",
            "tcp://host:notaport",
            "tcp://host:99999",
        ] {
            assert!(
                matches!(parse_endpoint(bad), Err(TransportError::Endpoint(_))),
                "{bad} should be rejected"
            );
        }
    }
}
