//! A single WCS connection

use crate::command::{parse_command, AckPublisher};
use bytes::Bytes;
use lcu_shared::codec::FrameDecoder;
use lcu_shared::Reply;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, info, warn};

/// Size of the LCU's command receive buffer, NUL terminator included
pub const RECV_BUFFER_LEN: usize = 1024;

/// Counters for one finished session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Commands that parsed and were acknowledged
    pub accepted: u64,
    /// Frames whose payload failed to parse
    pub rejected: u64,
}

/// Frame reader for one WCS connection
pub struct WcsSession<R> {
    reader: R,
    peer: String,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> WcsSession<R> {
    /// Payloads of `RECV_BUFFER_LEN` bytes or more are invalid
    pub fn new(reader: R, peer: impl Into<String>) -> Self {
        Self {
            reader,
            peer: peer.into(),
            decoder: FrameDecoder::with_max_len(RECV_BUFFER_LEN as u32 - 1),
            read_buf: vec![0u8; 4096],
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Read the next frame payload
    ///
    /// Returns None once the WCS disconnects or sends an invalid length
    /// (zero, or too large for the receive buffer). Either way the session
    /// is over.
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            // First try to decode from existing buffer
            match self.decoder.decode_next() {
                Ok(Some(payload)) if payload.is_empty() => {
                    warn!("[LCU] Invalid payload length: 0");
                    return None;
                }
                Ok(Some(payload)) => return Some(payload),
                Ok(None) => {}
                Err(e) => {
                    warn!("[LCU] {} from {}", e, self.peer);
                    return None;
                }
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => {
                    if self.decoder.buffer_len() > 0 {
                        warn!(
                            "[LCU] {} dropped with {} bytes of a partial frame",
                            self.peer,
                            self.decoder.buffer_len()
                        );
                    }
                    return None;
                }
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    error!("[LCU] Read error from {}: {}", self.peer, e);
                    return None;
                }
            }
        }
    }
}

/// Serve one WCS connection until it ends
pub async fn serve<R>(reader: R, peer: impl Into<String>, acks: Option<&AckPublisher>) -> SessionSummary
where
    R: AsyncRead + Unpin,
{
    let mut session = WcsSession::new(reader, peer);
    let mut summary = SessionSummary::default();

    while let Some(payload) = session.recv().await {
        let parsed = match parse_command(&payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("[LCU] JSON parse FAILED: {}", e);
                summary.rejected += 1;
                continue;
            }
        };

        info!("{}", parsed);
        if parsed.is_jog_stop() {
            info!("[LCU] Jog stop for axis {}", parsed.fields.axis.as_deref().unwrap_or("-"));
        }
        summary.accepted += 1;

        if let Some(acks) = acks {
            if let Err(e) = acks.publish(&Reply::executed(&parsed.command)).await {
                error!("[LCU] Failed to publish reply for {}: {}", parsed.command.id, e);
            }
        }
    }

    info!("[LCU] WCS {} disconnected", session.peer());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use lcu_shared::{codec, Axis, Command, Direction, EnableDrive, Jog, JogStop};
    use tokio::io::AsyncWriteExt;

    fn frames(commands: &[Command]) -> Vec<u8> {
        let mut encoder = codec::FrameEncoder::new();
        for cmd in commands {
            encoder.encode(cmd).unwrap();
        }
        encoder.take().to_vec()
    }

    fn sequence() -> Vec<Command> {
        let jog = Jog::new(Axis::Pan, Direction::Fwd, 50.0, 40.0, 30.0);
        vec![
            Command::from_body("CMD_001", &EnableDrive::new(Axis::Pan)).unwrap(),
            Command::from_body("CMD_JOG", &jog).unwrap(),
            Command::from_body("CMD_JOG", &jog).unwrap(),
            Command::from_body("CMD_STOP", &JogStop::new(Axis::Pan)).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_serve_full_sequence() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(&frames(&sequence())).await.unwrap();
        drop(client);

        let summary = serve(server, "test", None).await;
        assert_eq!(
            summary,
            SessionSummary {
                accepted: 4,
                rejected: 0
            }
        );
    }

    #[tokio::test]
    async fn test_recv_across_split_writes() {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let bytes = frames(&sequence()[..1]);

        let writer = tokio::spawn(async move {
            for chunk in bytes.chunks(7) {
                client.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let mut session = WcsSession::new(server, "test");
        let payload = session.recv().await.expect("payload");
        assert_eq!(payload.len(), 104);
        writer.await.unwrap();
        assert!(session.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_skipped() {
        let mut bytes = codec::encode_payload(br#"{"v":1,"name":"Halt"}"#).unwrap().to_vec();
        bytes.extend(frames(&sequence()[..1]));

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(&bytes).await.unwrap();
        drop(client);

        let summary = serve(server, "test", None).await;
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn test_zero_length_ends_session() {
        let mut bytes = vec![0, 0, 0, 0];
        bytes.extend(frames(&sequence()));

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(&bytes).await.unwrap();
        drop(client);

        assert_eq!(serve(server, "test", None).await, SessionSummary::default());
    }

    #[tokio::test]
    async fn test_oversized_length_ends_session() {
        let mut bytes = Vec::new();
        bytes.put_u32(RECV_BUFFER_LEN as u32);
        bytes.put_bytes(b' ', RECV_BUFFER_LEN);

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(&bytes).await.unwrap();
        drop(client);

        let mut session = WcsSession::new(server, "test");
        assert!(session.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_largest_payload_accepted() {
        let payload = vec![b' '; RECV_BUFFER_LEN - 1];
        let bytes = codec::encode_payload(&payload).unwrap();

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(&bytes).await.unwrap();
        drop(client);

        let mut session = WcsSession::new(server, "test");
        assert_eq!(session.recv().await.map(|p| p.len()), Some(RECV_BUFFER_LEN - 1));
    }
}
