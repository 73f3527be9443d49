use crate::services::form_service::FormService;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Shortest pause between sweeps
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically tears down forms the client abandoned without closing them
pub struct SessionSweeper {
    forms: Arc<FormService>,
    max_idle: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SessionSweeper {
    pub fn new(
        forms: Arc<FormService>,
        max_idle: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            forms,
            max_idle,
            interval: interval.max(MIN_INTERVAL),
            shutdown,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Session sweeper started (idle limit {:?}, every {:?})",
            self.max_idle,
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let closed = self.forms.shutdown().await;
                    tracing::info!("🛑 Session sweeper shutting down, closed {} open form(s)", closed);
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep();
                }
            }
        }
    }

    fn sweep(&self) {
        let closed = self.forms.sweep_idle(self.max_idle);
        if closed > 0 {
            tracing::info!("🧹 Closed {} idle form(s), {} still open", closed, self.forms.session_count());
        } else {
            tracing::debug!("No idle forms to close");
        }
    }
}
