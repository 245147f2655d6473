use super::payments::{PaymentOutcome, PaymentProcessor};
use crate::error::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Tally of one scheduler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Payments found due at the start of the pass.
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    /// Payments another caller settled first.
    pub skipped: usize,
    pub errors: usize,
}

/// Periodically settles due payments.
///
/// Holds no state of its own between ticks; a payment processed twice (by
/// an overlapping tick or an API call) is a no-op the second time.
#[derive(Clone)]
pub struct Scheduler {
    processor: PaymentProcessor,
    interval: Duration,
}

impl Scheduler {
    pub fn new(processor: PaymentProcessor, interval: Duration) -> Self {
        Self {
            processor,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Processes every payment due now, one at a time, earliest first.
    ///
    /// A failure on one payment is logged and counted; the rest of the batch
    /// still runs. Only the initial lookup can fail the whole pass.
    pub async fn tick(&self) -> Result<TickReport> {
        let due = self.processor.pending_payments(None).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for payment in due {
            match self.processor.process_payment(payment.id).await {
                Ok(PaymentOutcome::Completed(_)) => report.completed += 1,
                Ok(PaymentOutcome::Failed) => report.failed += 1,
                Ok(PaymentOutcome::AlreadySettled(_)) => report.skipped += 1,
                Err(err) => {
                    error!(payment = %payment.id, error = %err, "payment processing failed");
                    report.errors += 1;
                }
            }
        }

        if report.due > 0 {
            info!(?report, "scheduler tick finished");
        }
        Ok(report)
    }

    /// Runs [`tick`](Self::tick) on a fixed interval in a background task.
    ///
    /// The first tick fires immediately. Ticks that fall behind are delayed
    /// rather than bunched up.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self.interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?period, "scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.tick().await {
                            warn!(error = %err, "scheduler tick aborted");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }
}

/// Controls a running scheduler loop.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop after any in-flight tick finishes, then waits for it.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            error!(error = %err, "scheduler task panicked");
        }
    }
}
