/// Worker loop
///
/// Polls the communication queue, hands each claimed communication to the
/// configured [`Dispatcher`] and records the result.
///
/// ```text
/// Worker
///   ├─> CommunicationQueue: claim due rows (SENDING / past SCHEDULED)
///   ├─> CommunicationQueue: resolve recipients
///   ├─> Dispatcher: deliver (bounded by dispatch timeout)
///   └─> CommunicationQueue: SENT / release for retry / FAILED
/// ```
///
/// Up to `max_concurrent` communications of a batch are delivered at once.
/// Cancelling the shutdown token stops polling; the batch in flight is
/// finished first.
///
/// # Example
///
/// ```no_run
/// use churchflow_worker::config::WorkerConfig;
/// use churchflow_worker::dispatcher::LogDispatcher;
/// use churchflow_worker::orchestrator::Worker;
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool, config: WorkerConfig) -> anyhow::Result<()> {
/// let worker = Worker::new(pool, Arc::new(LogDispatcher::new()), config);
/// let shutdown = worker.shutdown_token();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
/// worker.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::config::WorkerConfig;
use crate::dispatcher::{DispatchError, Dispatcher, OutboundMessage};
use crate::queue::{CommunicationQueue, FailureOutcome, QueueError};
use churchflow_shared::models::communication::Communication;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

pub const NO_RECIPIENTS: &str = "No recipients";

/// Final state of one processed communication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { delivered: usize },
    Retrying,
    Failed,
}

impl From<FailureOutcome> for DeliveryOutcome {
    fn from(outcome: FailureOutcome) -> Self {
        match outcome {
            FailureOutcome::Retrying => DeliveryOutcome::Retrying,
            FailureOutcome::Failed => DeliveryOutcome::Failed,
        }
    }
}

/// Tally of one poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
    pub errors: usize,
}

impl BatchSummary {
    pub fn record(&mut self, result: &Result<DeliveryOutcome, QueueError>) {
        match result {
            Ok(DeliveryOutcome::Sent { .. }) => self.sent += 1,
            Ok(DeliveryOutcome::Retrying) => self.retrying += 1,
            Ok(DeliveryOutcome::Failed) => self.failed += 1,
            Err(_) => self.errors += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sent + self.retrying + self.failed + self.errors
    }
}

/// A full batch with at least one delivery means more may be waiting
///
/// A full batch of failures polls again only after the interval.
pub fn should_poll_again(summary: &BatchSummary, batch_size: u32) -> bool {
    summary.sent > 0 && summary.total() >= batch_size as usize
}

pub struct Worker {
    queue: CommunicationQueue,
    dispatcher: Arc<dyn Dispatcher>,
    config: WorkerConfig,
    shutdown_token: CancellationToken,
}

impl Worker {
    pub fn new(db: PgPool, dispatcher: Arc<dyn Dispatcher>, config: WorkerConfig) -> Self {
        let queue = CommunicationQueue::new(db, config.lock_timeout(), config.max_attempts)
            .with_retry_backoff(config.retry_backoff());
        Worker {
            queue,
            dispatcher,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancel to stop the loop after the current batch
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// Queue errors are logged and retried after the poll interval; they never
    /// end the loop.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            dispatcher = self.dispatcher.name(),
            batch_size = self.config.batch_size,
            max_concurrent = self.config.max_concurrent,
            "Worker starting"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            let summary = match self.poll_once().await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim communications");
                    BatchSummary::default()
                }
            };

            if should_poll_again(&summary, self.config.batch_size) {
                continue;
            }

            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => break,
                _ = sleep(self.config.poll_interval()) => {}
            }
        }

        tracing::info!("Worker stopped");
        Ok(())
    }

    /// Claims one batch and delivers it
    pub async fn poll_once(&self) -> Result<BatchSummary, QueueError> {
        let claimed = self.queue.claim_due(self.config.batch_size).await?;
        if claimed.is_empty() {
            return Ok(BatchSummary::default());
        }

        let results: Vec<Result<DeliveryOutcome, QueueError>> = stream::iter(claimed)
            .map(|communication| async move {
                let result = self.process_one(&communication).await;
                if let Err(e) = &result {
                    tracing::error!(
                        communication_id = %communication.id,
                        error = %e,
                        "Failed to record delivery result"
                    );
                }
                result
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for result in &results {
            summary.record(result);
        }

        tracing::info!(
            sent = summary.sent,
            retrying = summary.retrying,
            failed = summary.failed,
            errors = summary.errors,
            "Batch processed"
        );
        Ok(summary)
    }

    /// Delivers one claimed communication and records the outcome
    pub async fn process_one(
        &self,
        communication: &Communication,
    ) -> Result<DeliveryOutcome, QueueError> {
        let recipients = self.queue.recipients(communication).await?;
        if recipients.is_empty() {
            tracing::warn!(communication_id = %communication.id, "No recipients, marking failed");
            self.queue.mark_failed(communication, NO_RECIPIENTS).await?;
            return Ok(DeliveryOutcome::Failed);
        }

        let message = OutboundMessage::new(communication, recipients);
        let dispatched = match timeout(
            self.config.dispatch_timeout(),
            self.dispatcher.dispatch(&message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Transient(format!(
                "dispatch timed out after {}s",
                self.config.dispatch_timeout_secs
            ))),
        };

        match dispatched {
            Ok(report) => {
                self.queue.mark_sent(communication, report.delivered).await?;
                tracing::info!(
                    communication_id = %communication.id,
                    church_id = %communication.church_id,
                    delivered = report.delivered,
                    "Communication sent"
                );
                Ok(DeliveryOutcome::Sent {
                    delivered: report.delivered,
                })
            }
            Err(e) if e.is_retryable() => {
                let outcome = self.queue.fail_attempt(communication, &e.to_string()).await?;
                tracing::warn!(
                    communication_id = %communication.id,
                    attempts = communication.attempts,
                    outcome = ?outcome,
                    error = %e,
                    "Delivery attempt failed"
                );
                Ok(outcome.into())
            }
            Err(e) => {
                self.queue.mark_failed(communication, &e.to_string()).await?;
                tracing::error!(
                    communication_id = %communication.id,
                    error = %e,
                    "Delivery rejected"
                );
                Ok(DeliveryOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::LogDispatcher;
    use churchflow_shared::db::pool::{create_lazy_pool, DatabaseConfig};
    use std::time::Duration;

    #[test]
    fn test_batch_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.record(&Ok(DeliveryOutcome::Sent { delivered: 4 }));
        summary.record(&Ok(DeliveryOutcome::Retrying));
        summary.record(&Ok(DeliveryOutcome::Failed));
        summary.record(&Err(QueueError::LostClaim(uuid::Uuid::nil())));

        assert_eq!(
            summary,
            BatchSummary {
                sent: 1,
                retrying: 1,
                failed: 1,
                errors: 1
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_failure_outcome_conversion() {
        assert_eq!(DeliveryOutcome::from(FailureOutcome::Retrying), DeliveryOutcome::Retrying);
        assert_eq!(DeliveryOutcome::from(FailureOutcome::Failed), DeliveryOutcome::Failed);
    }

    #[test]
    fn test_failed_batch_waits_for_poll_interval() {
        let failing = BatchSummary {
            retrying: 7,
            errors: 3,
            ..Default::default()
        };
        assert!(!should_poll_again(&failing, 10));

        let busy = BatchSummary {
            sent: 1,
            retrying: 9,
            ..Default::default()
        };
        assert!(should_poll_again(&busy, 10));

        let partial = BatchSummary {
            sent: 4,
            ..Default::default()
        };
        assert!(!should_poll_again(&partial, 10));
    }

    #[tokio::test]
    async fn test_cancelled_worker_stops_without_polling() {
        let url = "postgres://localhost:1/unreachable";
        let pool = create_lazy_pool(&DatabaseConfig::from_url(url)).unwrap();
        let worker = Worker::new(pool, Arc::new(LogDispatcher::new()), WorkerConfig::for_tests(url));

        worker.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(1), worker.run())
            .await
            .unwrap()
            .unwrap();
    }
}
