use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::connection::FrameWriter;
use super::events::OutboundFrame;
use super::shutdown::ShutdownListener;
use crate::error::SessionError;
use crate::models::health::HealthSnapshot;
use crate::monitor::{MonitorClient, MonitorError};
use crate::state::SessionState;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Floor for the tick period; a zero interval cannot drive a timer.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub fn local_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// What one heartbeat attempt produced, as seen by the caller that
/// triggered it.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    /// The monitor answered and a heartbeat frame carrying this snapshot
    /// was written.
    Snapshot(HealthSnapshot),
    /// No monitor is configured; the local time of the attempt.
    Timestamp(String),
    /// The monitor did not answer in time.
    Overtime,
    /// The monitor failed for another reason.
    Unavailable(String),
}

impl fmt::Display for HeartbeatOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeartbeatOutcome::Snapshot(snapshot) => {
                write!(f, "snapshot of {} host(s)", snapshot.hosts().len())
            }
            HeartbeatOutcome::Timestamp(ts) => f.write_str(ts),
            HeartbeatOutcome::Overtime => f.write_str("overtime"),
            HeartbeatOutcome::Unavailable(reason) => f.write_str(reason),
        }
    }
}

type TriggerRequest = oneshot::Sender<HeartbeatOutcome>;

/// Fires one-off heartbeats and returns their outcome.
#[derive(Clone)]
pub struct HeartbeatTrigger {
    tx: mpsc::Sender<TriggerRequest>,
}

impl HeartbeatTrigger {
    pub async fn fire(&self) -> Result<HeartbeatOutcome, SessionError> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(reply)
            .await
            .map_err(|_| SessionError::Closed)?;
        outcome.await.map_err(|_| SessionError::Closed)
    }
}

/// Periodically, and on demand, reports local health upstream.
pub struct HeartbeatMonitor {
    reporter: Reporter,
    interval: Duration,
    triggers: mpsc::Receiver<TriggerRequest>,
    shutdown: ShutdownListener,
}

impl HeartbeatMonitor {
    pub fn new(
        state: SessionState,
        writer: FrameWriter,
        shutdown: ShutdownListener,
    ) -> (Self, HeartbeatTrigger) {
        let config = &state.config;
        let monitor = config
            .monitor_url
            .as_ref()
            .map(|url| MonitorClient::new(url.clone(), config.monitor_timeout));
        let interval = if config.heartbeat_interval < MIN_INTERVAL {
            warn!(
                interval = ?config.heartbeat_interval,
                "heartbeat interval too short, clamping to 1ms"
            );
            MIN_INTERVAL
        } else {
            config.heartbeat_interval
        };
        let send_without_monitor = config.heartbeat_without_monitor;
        let (tx, triggers) = mpsc::channel(1);

        let monitor = Self {
            reporter: Reporter {
                state,
                monitor,
                writer,
                send_without_monitor,
            },
            interval,
            triggers,
            shutdown,
        };
        (monitor, HeartbeatTrigger { tx })
    }

    pub async fn run(self) {
        let Self {
            reporter,
            interval,
            mut triggers,
            mut shutdown,
        } = self;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut triggers_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    let sent = tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        sent = reporter.on_tick() => sent,
                    };
                    if let Err(e) = sent {
                        warn!(error = %e, "failed to write heartbeat");
                        break;
                    }
                }
                request = triggers.recv(), if triggers_open => {
                    let Some(reply) = request else {
                        triggers_open = false;
                        continue;
                    };
                    let (outcome, sent) = tokio::select! {
                        biased;
                        _ = shutdown.wait() => break,
                        result = reporter.on_trigger() => result,
                    };
                    let _ = reply.send(outcome);
                    if let Err(e) = sent {
                        warn!(error = %e, "failed to write heartbeat");
                        break;
                    }
                }
            }
        }
        debug!("heartbeat monitor stopped");
    }
}

struct Reporter {
    state: SessionState,
    monitor: Option<MonitorClient>,
    writer: FrameWriter,
    send_without_monitor: bool,
}

impl Reporter {
    async fn collect(&self) -> HeartbeatOutcome {
        let Some(monitor) = &self.monitor else {
            return HeartbeatOutcome::Timestamp(local_timestamp());
        };
        match monitor.snapshot().await {
            Ok(snapshot) => HeartbeatOutcome::Snapshot(snapshot),
            Err(MonitorError::Timeout) => {
                warn!(url = monitor.url(), "monitor request timed out");
                HeartbeatOutcome::Overtime
            }
            Err(e) => {
                warn!(url = monitor.url(), error = %e, "monitor unavailable");
                HeartbeatOutcome::Unavailable(e.to_string())
            }
        }
    }

    /// Writes the heartbeat frame an outcome calls for, if any. Only ticks
    /// send an empty heartbeat when no monitor is configured.
    async fn report(
        &self,
        outcome: &HeartbeatOutcome,
        on_tick: bool,
    ) -> Result<(), SessionError> {
        match outcome {
            HeartbeatOutcome::Snapshot(snapshot) => self.send(snapshot.clone()).await,
            HeartbeatOutcome::Timestamp(ts) => {
                info!(timestamp = %ts, "no monitor configured");
                if on_tick && self.send_without_monitor {
                    self.send(HealthSnapshot::default()).await
                } else {
                    Ok(())
                }
            }
            HeartbeatOutcome::Overtime | HeartbeatOutcome::Unavailable(_) => {
                debug!("heartbeat skipped");
                Ok(())
            }
        }
    }

    async fn on_tick(&self) -> Result<(), SessionError> {
        let outcome = self.collect().await;
        self.report(&outcome, true).await
    }

    async fn on_trigger(&self) -> (HeartbeatOutcome, Result<(), SessionError>) {
        let outcome = self.collect().await;
        let sent = self.report(&outcome, false).await;
        (outcome, sent)
    }

    async fn send(&self, body: HealthSnapshot) -> Result<(), SessionError> {
        let frame = OutboundFrame::Heartbeat {
            uid: self.state.uid().to_string(),
            token: self.state.token().to_string(),
            body,
        };
        self.writer.send(&frame).await?;
        debug!("heartbeat sent");
        Ok(())
    }
}
