/// Communication delivery queue
///
/// The `communications` table is the queue. A row is due when it is SENDING,
/// or SCHEDULED with `scheduled_for` in the past. Claiming a row moves it to
/// SENDING, bumps `attempts` and sets `locked_until`; concurrent workers skip
/// locked rows (`FOR UPDATE SKIP LOCKED`) and a claim whose worker died
/// becomes claimable again once `locked_until` passes.
///
/// A retryable failure keeps the row SENDING with `locked_until` pushed out
/// by an exponential backoff ([`retry_delay`]), so the next attempt waits
/// instead of following immediately.
///
/// # Example
///
/// ```no_run
/// use churchflow_worker::queue::CommunicationQueue;
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = CommunicationQueue::new(pool, Duration::from_secs(300), 3)
///     .with_retry_backoff(Duration::from_secs(30));
/// for communication in queue.claim_due(10).await? {
///     println!("Claimed communication: {}", communication.id);
/// }
/// # Ok(())
/// # }
/// ```

use churchflow_shared::models::communication::{Communication, Recipient};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The row left SENDING while we held it (deleted or finished elsewhere)
    #[error("Communication {0} is no longer claimed by this worker")]
    LostClaim(Uuid),
}

/// What happened to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Released for another attempt
    Retrying,
    /// Marked FAILED
    Failed,
}

#[derive(Debug, Clone)]
pub struct CommunicationQueue {
    db: PgPool,
    lock_timeout: Duration,
    max_attempts: i32,
    retry_backoff: Duration,
}

impl CommunicationQueue {
    pub fn new(db: PgPool, lock_timeout: Duration, max_attempts: i32) -> Self {
        CommunicationQueue {
            db,
            lock_timeout,
            max_attempts,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Delay before the first retry; doubles with every further attempt
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    /// Claims up to `limit` due communications, oldest first
    pub async fn claim_due(&self, limit: u32) -> Result<Vec<Communication>, QueueError> {
        let claimed = sqlx::query_as::<_, Communication>(
            r#"
            WITH due AS (
                SELECT id
                FROM communications
                WHERE (status = 'sending'
                       OR (status = 'scheduled' AND scheduled_for <= NOW()))
                  AND (locked_until IS NULL OR locked_until < NOW())
                ORDER BY COALESCE(scheduled_for, created_at) ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE communications c
            SET status = 'sending',
                attempts = c.attempts + 1,
                locked_until = NOW() + make_interval(secs => $2),
                updated_at = NOW()
            FROM due
            WHERE c.id = due.id
            RETURNING c.*
            "#,
        )
        .bind(i64::from(limit))
        .bind(self.lock_timeout.as_secs_f64())
        .fetch_all(&self.db)
        .await?;

        if !claimed.is_empty() {
            tracing::debug!(count = claimed.len(), "Claimed communications");
        }

        Ok(claimed)
    }

    pub async fn recipients(&self, communication: &Communication) -> Result<Vec<Recipient>, QueueError> {
        Ok(Communication::recipients(
            &self.db,
            communication.church_id,
            communication.group_id,
            communication.channel,
        )
        .await?)
    }

    pub async fn mark_sent(
        &self,
        communication: &Communication,
        recipient_count: usize,
    ) -> Result<(), QueueError> {
        let count = i32::try_from(recipient_count).unwrap_or(i32::MAX);
        let updated =
            Communication::mark_sent(&self.db, communication.church_id, communication.id, count).await?;
        if !updated {
            return Err(QueueError::LostClaim(communication.id));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, communication: &Communication, error: &str) -> Result<(), QueueError> {
        let updated =
            Communication::mark_failed(&self.db, communication.church_id, communication.id, error)
                .await?;
        if !updated {
            return Err(QueueError::LostClaim(communication.id));
        }
        Ok(())
    }

    /// Releases a retryable failure, or marks it FAILED once attempts run out
    pub async fn fail_attempt(
        &self,
        communication: &Communication,
        error: &str,
    ) -> Result<FailureOutcome, QueueError> {
        if !should_retry(communication.attempts, self.max_attempts) {
            self.mark_failed(communication, error).await?;
            return Ok(FailureOutcome::Failed);
        }

        let delay = retry_delay(communication.attempts, self.retry_backoff);
        let released = Communication::release(
            &self.db,
            communication.church_id,
            communication.id,
            error,
            delay,
        )
        .await?;
        if !released {
            return Err(QueueError::LostClaim(communication.id));
        }
        tracing::debug!(
            communication_id = %communication.id,
            retry_in_secs = delay.as_secs(),
            "Released for retry"
        );
        Ok(FailureOutcome::Retrying)
    }
}

/// `attempts` already counts the current claim
pub fn should_retry(attempts: i32, max_attempts: i32) -> bool {
    attempts < max_attempts
}

/// `base * 2^(attempts - 1)`, capped at [`MAX_RETRY_BACKOFF`]
pub fn retry_delay(attempts: i32, base: Duration) -> Duration {
    let doublings = attempts.saturating_sub(1).clamp(0, 16) as u32;
    base.saturating_mul(1 << doublings).min(MAX_RETRY_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        assert!(should_retry(1, 3));
        assert!(should_retry(2, 3));
        assert!(!should_retry(3, 3));
        assert!(!should_retry(1, 1));
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let base = Duration::from_secs(30);
        assert_eq!(retry_delay(1, base), Duration::from_secs(30));
        assert_eq!(retry_delay(2, base), Duration::from_secs(60));
        assert_eq!(retry_delay(3, base), Duration::from_secs(120));
        assert_eq!(retry_delay(50, base), MAX_RETRY_BACKOFF);
        assert_eq!(retry_delay(0, base), base);
    }

    #[test]
    fn test_zero_backoff_retries_immediately() {
        assert_eq!(retry_delay(3, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_lost_claim_message() {
        let id = Uuid::nil();
        assert_eq!(
            QueueError::LostClaim(id).to_string(),
            format!("Communication {} is no longer claimed by this worker", id)
        );
    }
}
