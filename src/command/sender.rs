//! Command sender - frames commands and writes them to the link

use anyhow::{Context, Result};
use lcu_shared::{codec, Command};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Writes length-prefixed command frames to a byte stream
///
/// Each frame goes out through a single `write_all` under `&mut self`, so two
/// frames can never interleave on the same stream.
pub struct CommandSender<W> {
    writer: W,
    frames_sent: u64,
    /// Set while a frame is being written; stays set if that write is abandoned
    mid_frame: bool,
}

impl<W: AsyncWrite + Unpin> CommandSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_sent: 0,
            mid_frame: false,
        }
    }

    /// Frame and write one command
    ///
    /// A closed or reset stream is returned as an error; nothing is retried.
    pub async fn send(&mut self, command: &Command) -> Result<()> {
        let frame = codec::encode(command)
            .with_context(|| format!("Failed to encode {}", command.name))?;

        self.mid_frame = true;
        self.writer
            .write_all(&frame)
            .await
            .with_context(|| format!("Failed to send {}", command.name))?;
        self.mid_frame = false;
        self.writer.flush().await?;

        self.frames_sent += 1;
        info!("[WCS] Sent: {}", command.name);
        Ok(())
    }

    /// Number of frames fully written so far
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Whether the last frame write was cut short
    ///
    /// Once true, the stream no longer sits on a frame boundary and nothing
    /// more can be framed on it.
    pub fn is_mid_frame(&self) -> bool {
        self.mid_frame
    }

    /// Shut down the write side of the stream
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
impl<W> CommandSender<W> {
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
