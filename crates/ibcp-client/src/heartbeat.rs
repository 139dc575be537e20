//! Background keep-alive for a gateway session.
//!
//! The heartbeat sleeps for the configured interval, posts to the tickle
//! endpoint and applies the reported session flags. It stops for good on
//! the first transport error, on the first reply showing a disconnected or
//! unauthenticated session, when asked to stop, or when its handle is
//! dropped. Progress and the final outcome are published on a `watch`
//! channel.

use crate::config::LogLevel;
use crate::endpoints::Endpoint;
use crate::error::{GatewayError, Result};
use crate::session::SharedSession;
use crate::transport::{invoke_typed, GatewayRequest, Transport};
use crate::types::TickleResponse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Lifecycle of a client's heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// No heartbeat has been started.
    NotStarted,
    /// Heartbeat is running; `ticks` calls have completed so far.
    Running {
        /// Completed heartbeat calls.
        ticks: u64,
    },
    /// Heartbeat has ended and will not resume.
    Stopped {
        /// Heartbeat calls issued in total.
        ticks: u64,
        /// Why it ended; `None` for an explicit stop.
        error: Option<GatewayError>,
    },
}

impl HeartbeatStatus {
    /// Returns true while the heartbeat is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns true once the heartbeat has ended.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// Number of heartbeat calls issued.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        match self {
            Self::NotStarted => 0,
            Self::Running { ticks } | Self::Stopped { ticks, .. } => *ticks,
        }
    }

    /// The error that ended the heartbeat, if any.
    #[must_use]
    pub fn error(&self) -> Option<&GatewayError> {
        match self {
            Self::Stopped { error, .. } => error.as_ref(),
            _ => None,
        }
    }
}

/// Handle to a running heartbeat task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    shutdown_tx: mpsc::Sender<()>,
    status_rx: watch::Receiver<HeartbeatStatus>,
    task: JoinHandle<Result<()>>,
}

impl HeartbeatHandle {
    /// Spawns the heartbeat loop on the current Tokio runtime.
    pub(crate) fn spawn(
        transport: Arc<dyn Transport>,
        session: SharedSession,
        interval: Duration,
        log_level: LogLevel,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(HeartbeatStatus::Running { ticks: 0 });

        let task = tokio::spawn(run_heartbeat(
            transport,
            session,
            interval,
            log_level,
            shutdown_rx,
            status_tx,
        ));

        Self {
            shutdown_tx,
            status_rx,
            task,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> HeartbeatStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that observes every status change, including the final one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<HeartbeatStatus> {
        self.status_rx.clone()
    }

    /// Returns true if the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the task to stop and waits for it to end.
    ///
    /// A call in flight is allowed to complete; no further call is issued.
    ///
    /// # Errors
    /// Returns the error that had already ended the task, if any.
    pub async fn stop(self) -> Result<()> {
        // A full channel or a finished task both mean no signal is needed.
        let _ = self.shutdown_tx.try_send(());
        self.join().await
    }

    /// Waits for the task to end on its own.
    ///
    /// # Errors
    /// Returns the error that ended the heartbeat.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(GatewayError::HeartbeatAborted(e.to_string())),
        }
    }
}

/// Issues one heartbeat call.
async fn tickle_once(transport: &dyn Transport) -> Result<TickleResponse> {
    invoke_typed(transport, GatewayRequest::new(Endpoint::Tickle)).await
}

async fn run_heartbeat(
    transport: Arc<dyn Transport>,
    session: SharedSession,
    interval: Duration,
    log_level: LogLevel,
    mut shutdown_rx: mpsc::Receiver<()>,
    status_tx: watch::Sender<HeartbeatStatus>,
) -> Result<()> {
    gateway_log!(log_level, Info, interval_ms = interval.as_millis() as u64, "Heartbeat started");

    let mut ticks: u64 = 0;

    let outcome = loop {
        tokio::select! {
            biased;
            // Explicit stop, or every handle dropped.
            _ = shutdown_rx.recv() => {
                gateway_log!(log_level, Info, ticks, "Heartbeat stop requested");
                break Ok(());
            }
            () = sleep(interval) => {}
        }

        ticks += 1;
        let reply = match tickle_once(transport.as_ref()).await {
            Ok(reply) => reply,
            Err(e) => {
                gateway_log!(log_level, Error, ticks, error = %e, "Heartbeat call failed");
                break Err(e);
            }
        };

        let auth = reply.auth_status();
        let state = session.apply_status(auth);
        gateway_log!(
            log_level,
            Debug,
            ticks,
            connected = state.connected,
            authenticated = state.authenticated,
            competing = state.competing,
            "Heartbeat"
        );

        if !auth.connected || !auth.authenticated {
            gateway_log!(
                log_level,
                Error,
                ticks,
                connected = auth.connected,
                authenticated = auth.authenticated,
                "Gateway session disconnected"
            );
            break Err(GatewayError::disconnected(auth.connected, auth.authenticated));
        }

        status_tx.send_replace(HeartbeatStatus::Running { ticks });
    };

    status_tx.send_replace(HeartbeatStatus::Stopped {
        ticks,
        error: outcome.clone().err(),
    });
    outcome
}
