//! Background keepalive for idle sessions.

use crate::session::Session;
use checkpoint_core::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period a scheduler will run at.
pub const MIN_KEEPALIVE_PERIOD: Duration = Duration::from_secs(1);

/// Spawns keepalive loops.
pub struct KeepaliveScheduler;

impl KeepaliveScheduler {
    /// Start re-issuing `keepalive` on `session` every `period`.
    ///
    /// The first call happens one period after start. The loop ends when the
    /// handle is cancelled or dropped, or when the session is logged out.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(session: Session, period: Duration) -> KeepaliveHandle {
        let period = period.max(MIN_KEEPALIVE_PERIOD);
        let cancel = session.shutdown_token().child_token();
        let trigger = Arc::new(Notify::new());

        let task = tokio::spawn(run(session, period, cancel.clone(), Arc::clone(&trigger)));

        KeepaliveHandle {
            cancel,
            trigger,
            task: Some(task),
        }
    }
}

async fn run(session: Session, period: Duration, cancel: CancellationToken, trigger: Arc<Notify>) {
    info!(period_secs = period.as_secs(), "Keepalive scheduler started");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            () = trigger.notified() => debug!("Keepalive fired on demand"),
        }

        match session.keepalive().await {
            Ok(()) => debug!("Keepalive sent"),
            Err(Error::SessionClosed(_)) => break,
            Err(err) => warn!(error = %err, code = err.error_code(), "Keepalive failed"),
        }
    }

    info!("Keepalive scheduler stopped");
}

/// Controls a running keepalive loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct KeepaliveHandle {
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl KeepaliveHandle {
    /// Send a keepalive now, without waiting for the next tick.
    pub fn fire(&self) {
        self.trigger.notify_one();
    }

    /// Ask the loop to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Keepalive task ended abnormally");
            }
        }
    }
}

impl Drop for KeepaliveHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
