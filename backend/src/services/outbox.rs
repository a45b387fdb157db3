//! Transactional outbox for marketplace notifications
//!
//! Jobs are enqueued on the same transaction as the domain event they
//! report, so a committed stage transition always leaves exactly one queued
//! notification behind. A single background poller drains pending and
//! errored jobs with exponential backoff; delivery is at-least-once and a
//! failure on one job never blocks the rest of a batch.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::MarketplaceClient;
use shared::{IntakePayload, OutboxState};

/// Retry schedule in seconds; attempts beyond the table reuse the last entry.
pub const BACKOFF_SECS: [i64; 6] = [10, 30, 60, 120, 300, 600];

/// Delay before the next attempt after `attempts` failed deliveries.
pub fn backoff_delay(attempts: i32) -> Duration {
    let idx = (attempts.max(1) as usize - 1).min(BACKOFF_SECS.len() - 1);
    Duration::seconds(BACKOFF_SECS[idx])
}

/// Outbox dispatcher service
#[derive(Clone)]
pub struct OutboxService {
    db: PgPool,
    provider: String,
    client: MarketplaceClient,
}

/// One pending external notification.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OutboxJob {
    pub id: Uuid,
    pub provider: String,
    pub job_type: String,
    pub reference_id: String,
    pub payload: serde_json::Value,
    pub state: String,
    pub attempts: i32,
    pub next_run_at: DateTime<Utc>,
    pub last_status: Option<i32>,
    pub last_error: Option<String>,
    pub last_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for enqueueing a notification.
#[derive(Debug, Clone)]
pub struct NewOutboxJob {
    pub job_type: String,
    pub reference_id: String,
    pub payload: serde_json::Value,
}

/// Result of one poll run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSummary {
    pub picked: usize,
    pub sent: usize,
    pub failed: usize,
}

const JOB_COLUMNS: &str = "id, provider, job_type, reference_id, payload, state, attempts, \
                           next_run_at, last_status, last_error, last_response, created_at, updated_at";

impl OutboxService {
    /// Create a new OutboxService instance
    pub fn new(db: PgPool, provider: String, client: MarketplaceClient) -> Self {
        Self {
            db,
            provider,
            client,
        }
    }

    /// Upsert a job keyed by (provider, type, reference) on the caller's
    /// transaction.
    ///
    /// Re-enqueueing the same logical event replaces the payload and resets
    /// the job to pending immediately, but preserves the attempt counter so
    /// a history of failures stays visible.
    pub async fn enqueue(
        &self,
        conn: &mut PgConnection,
        job: NewOutboxJob,
    ) -> AppResult<OutboxJob> {
        let row = sqlx::query_as::<_, OutboxJob>(&format!(
            r#"
            INSERT INTO outbox_jobs (provider, job_type, reference_id, payload, state, attempts, next_run_at)
            VALUES ($1, $2, $3, $4, $5, 0, NOW())
            ON CONFLICT (provider, job_type, reference_id) DO UPDATE
            SET payload = EXCLUDED.payload,
                state = EXCLUDED.state,
                last_status = NULL,
                last_error = NULL,
                last_response = NULL,
                next_run_at = NOW(),
                updated_at = NOW()
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&self.provider)
        .bind(&job.job_type)
        .bind(&job.reference_id)
        .bind(&job.payload)
        .bind(OutboxState::Pending.as_str())
        .fetch_one(conn)
        .await?;

        tracing::debug!(
            job_type = %row.job_type,
            reference = %row.reference_id,
            attempts = row.attempts,
            "enqueued outbox job"
        );

        Ok(row)
    }

    /// Jobs not yet delivered (pending or errored), regardless of when they
    /// become eligible.
    pub async fn undelivered_count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM outbox_jobs WHERE state IN ($1, $2)",
        )
        .bind(OutboxState::Pending.as_str())
        .bind(OutboxState::Error.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    /// List jobs, newest first.
    pub async fn list_jobs(&self, limit: i64) -> AppResult<Vec<OutboxJob>> {
        let rows = sqlx::query_as::<_, OutboxJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM outbox_jobs ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Dispatch up to `limit` due jobs, sequentially.
    ///
    /// Delivery runs with no transaction held. Failures are recorded on the
    /// job and rescheduled with backoff; they never propagate.
    pub async fn run_once(&self, limit: i64) -> AppResult<DispatchSummary> {
        let jobs = sqlx::query_as::<_, OutboxJob>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM outbox_jobs
            WHERE state IN ($2, $3) AND next_run_at <= NOW()
            ORDER BY next_run_at ASC, id ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .bind(OutboxState::Pending.as_str())
        .bind(OutboxState::Error.as_str())
        .fetch_all(&self.db)
        .await?;

        let mut summary = DispatchSummary {
            picked: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            match self.dispatch(&job).await {
                Ok(()) => summary.sent += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(
                        job_id = %job.id,
                        reference = %job.reference_id,
                        attempts = job.attempts + 1,
                        "outbox delivery failed: {err}"
                    );
                }
            }
        }

        if summary.picked > 0 {
            tracing::info!(
                picked = summary.picked,
                sent = summary.sent,
                failed = summary.failed,
                "outbox poll finished"
            );
        }

        Ok(summary)
    }

    /// Deliver one job and persist the outcome.
    async fn dispatch(&self, job: &OutboxJob) -> AppResult<()> {
        let payload: IntakePayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad outbox payload: {e}")))?;

        match self.client.post_intake(&payload).await {
            Ok(receipt) => {
                sqlx::query(
                    r#"
                    UPDATE outbox_jobs
                    SET state = $1, last_status = $2, last_error = NULL,
                        last_response = $3, updated_at = NOW()
                    WHERE id = $4
                    "#,
                )
                .bind(OutboxState::Sent.as_str())
                .bind(receipt.status as i32)
                .bind(&receipt.body)
                .bind(job.id)
                .execute(&self.db)
                .await?;
                Ok(())
            }
            Err(failure) => {
                let attempts = job.attempts + 1;
                let next_run_at = Utc::now() + backoff_delay(attempts);
                sqlx::query(
                    r#"
                    UPDATE outbox_jobs
                    SET state = $7, attempts = $1, last_status = $2, last_error = $3,
                        last_response = $4, next_run_at = $5, updated_at = NOW()
                    WHERE id = $6
                    "#,
                )
                .bind(attempts)
                .bind(failure.status.map(|s| s as i32))
                .bind(failure.to_string())
                .bind(&failure.body)
                .bind(next_run_at)
                .bind(job.id)
                .bind(OutboxState::Error.as_str())
                .execute(&self.db)
                .await?;
                Err(AppError::ExternalService(failure.to_string()))
            }
        }
    }
}

/// Background poller owned by the process lifecycle.
///
/// A single task awaits each `run_once` to completion before the next tick,
/// so polls never overlap and a job can never be double-dispatched by two
/// concurrent runs.
pub struct OutboxPoller {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl OutboxPoller {
    /// Start polling on a fixed interval.
    pub fn start(service: OutboxService, interval: std::time::Duration, batch_limit: i64) -> Self {
        let (shutdown, mut watcher) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = service.run_once(batch_limit).await {
                            tracing::error!("outbox poll failed: {err}");
                        }
                    }
                    _ = watcher.changed() => break,
                }
            }
            tracing::info!("outbox poller stopped");
        });
        Self { shutdown, handle }
    }

    /// Signal the poller to stop and wait for the in-flight poll to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
