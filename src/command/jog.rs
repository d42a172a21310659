//! Enable / jog / stop command sequence
//!
//! 1. `EnableDrive` once, then a settle pause so the axis can enable.
//! 2. The same `Jog` every period until the shutdown future resolves.
//! 3. One `Jog` with `enable: false`, then the link is closed.
//!
//! A write failure in steps 1-2 ends the sequence without a stop frame. So
//! does an interrupt that lands while a frame is only partly written.

use super::CommandSender;
use anyhow::Result;
use lcu_shared::codec::CodecError;
use lcu_shared::{timing, Command, EnableDrive, Jog};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{info, warn};

pub const ENABLE_ID: &str = "CMD_001";
pub const JOG_ID: &str = "CMD_JOG";
pub const STOP_ID: &str = "CMD_STOP";

/// Prebuilt commands and timing for one jog session
#[derive(Debug, Clone)]
pub struct JogPlan {
    pub enable: Command,
    pub jog: Command,
    pub stop: Command,
    /// Pause between `EnableDrive` and the first `Jog`
    pub settle: Duration,
    /// Jog re-send period
    pub period: Duration,
    /// Bound on the final stop write
    pub stop_timeout: Duration,
}

impl JogPlan {
    /// Build the three commands for `jog` with the default timing
    pub fn new(jog: &Jog) -> Result<Self, CodecError> {
        Ok(Self {
            enable: Command::from_body(ENABLE_ID, &EnableDrive::new(jog.axis))?,
            jog: Command::from_body(JOG_ID, jog)?,
            stop: Command::from_body(STOP_ID, &jog.stop())?,
            settle: Duration::from_millis(timing::ENABLE_SETTLE_MS),
            period: Duration::from_millis(timing::JOG_PERIOD_MS),
            stop_timeout: Duration::from_millis(timing::STOP_TIMEOUT_MS),
        })
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }
}

/// Write `command` unless `shutdown` resolves while the write is pending
///
/// Returns false if the write was abandoned.
async fn send_or_interrupt<W, F>(
    sender: &mut CommandSender<W>,
    command: &Command,
    shutdown: &mut Pin<&mut F>,
) -> Result<bool>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        sent = sender.send(command) => sent.map(|()| true),
        _ = shutdown => Ok(false),
    }
}

/// Outcome of an interrupted jog session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JogReport {
    /// `Jog` frames with `enable: true` written
    pub jog_frames: u64,
    /// Whether the stop frame was fully written
    pub stop_sent: bool,
}

/// Run the command sequence until `shutdown` resolves
///
/// Returns an error only if the enable or a jog frame could not be written.
/// The stop frame is best effort: a failure or timeout is logged and reported
/// through [`JogReport::stop_sent`]. A frame write still pending when
/// `shutdown` resolves is abandoned, and no stop frame follows a partial one.
pub async fn run_jog<W, F>(
    sender: &mut CommandSender<W>,
    plan: &JogPlan,
    shutdown: F,
) -> Result<JogReport>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut interrupted = !send_or_interrupt(sender, &plan.enable, &mut shutdown).await?;

    if !interrupted {
        interrupted = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = sleep(plan.settle) => false,
        };
    }

    let mut jog_frames = 0;
    if !interrupted {
        info!("[WCS] Sending continuous Jog commands...");

        let mut ticker = interval(plan.period);
        // A stalled write delays the schedule instead of bursting afterwards
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if !send_or_interrupt(sender, &plan.jog, &mut shutdown).await? {
                        break;
                    }
                    jog_frames += 1;
                }
            }
        }
    }

    if sender.is_mid_frame() {
        warn!("[WCS] Interrupted mid-frame, stop command skipped");
        return Ok(JogReport {
            jog_frames,
            stop_sent: false,
        });
    }

    info!("[WCS] Stopping Jog");
    let stop_sent = match timeout(plan.stop_timeout, sender.send(&plan.stop)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("[WCS] Stop command not delivered: {:#}", e);
            false
        }
        Err(_) => {
            warn!(
                "[WCS] Stop command timed out after {:?}",
                plan.stop_timeout
            );
            false
        }
    };

    Ok(JogReport {
        jog_frames,
        stop_sent,
    })
}

/// Run the sequence, then close the link whatever the outcome
pub async fn run_session<W, F>(
    mut sender: CommandSender<W>,
    plan: &JogPlan,
    shutdown: F,
) -> Result<JogReport>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let result = run_jog(&mut sender, plan, shutdown).await;

    if let Err(e) = sender.close().await {
        warn!("[WCS] Error closing connection: {:#}", e);
    }
    info!("[WCS] Connection closed ({} frames sent)", sender.frames_sent());

    result
}
