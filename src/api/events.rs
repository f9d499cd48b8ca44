//! Playback side-effect queue and worker.
//!
//! `POST /v1/tracks/{id}/play` answers 202 after inserting a row into
//! `playback_events`. A background task periodically polls that table, locks
//! a batch via `FOR UPDATE SKIP LOCKED`, and applies each event inside a
//! savepoint: the track play counter, the history append, and the per-user
//! stats upsert land together or not at all.
//!
//! ### Consistency & Scalability
//!
//! This is a lightweight DB-backed work queue used to keep the play endpoint
//! fast while guaranteeing the side effects eventually apply.
//!
//! - **Throughput:** For current scale, the DB queue keeps infrastructure
//!   minimal. Higher fan-out can replace the worker with a broker consumer
//!   without touching the enqueue path.
//! - **Retries:** Failed events are retried with exponential backoff and
//!   jitter until a max attempt threshold is reached, then marked `failed`
//!   with the error kept on the row.
//!
//! Poll interval and retry/backoff settings are configurable via
//! [`PlaybackWorkerConfig`].

use anyhow::{Context, Result, anyhow};
use rand::Rng;
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, error, info_span};
use uuid::Uuid;

#[derive(Clone, Copy, Debug)]
pub struct PlaybackWorkerConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl PlaybackWorkerConfig {
    /// Default worker config: 5s poll interval, 50 events per batch,
    /// 5 max attempts, and 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = if self.batch_size == 0 {
            1
        } else {
            self.batch_size
        };
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = if self.backoff_max < backoff_base {
            backoff_base
        } else {
            self.backoff_max
        };
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }
}

impl Default for PlaybackWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a play for later application. The caller has already checked that
/// the track exists.
pub async fn enqueue_play(pool: &PgPool, track_id: Uuid, user_id: Uuid) -> Result<()> {
    let query = "INSERT INTO playback_events (track_id, user_id) VALUES ($1, $2)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(track_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to enqueue playback event")?;
    Ok(())
}

/// Spawn a background task that polls and applies queued playback events.
pub fn spawn_playback_worker(
    pool: PgPool,
    config: PlaybackWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            let batch_result = process_playback_batch(&pool, &config).await;
            if let Err(err) = batch_result {
                error!("playback event batch failed: {err}");
            }

            sleep(poll_interval).await;
        }
    })
}

async fn process_playback_batch(pool: &PgPool, config: &PlaybackWorkerConfig) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start playback batch transaction")?;

    // Grab a locked batch so multiple workers can run without double-counting.
    let query = r"
        SELECT id, track_id, user_id, attempts
        FROM playback_events
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(0))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load playback event batch")?;

    if rows.is_empty() {
        // Commit even on empty to release locks and keep the poll loop consistent.
        tx.commit()
            .await
            .context("failed to commit empty playback batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let track_id: Uuid = row.get("track_id");
        let user_id: Uuid = row.get("user_id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);

        let apply_result = apply_play_event(&mut tx, track_id, user_id).await;
        update_event_status(&mut tx, id, attempts, apply_result, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit playback event batch")?;

    Ok(row_count)
}

/// Apply one play: counter, history, per-user stats. Runs inside a savepoint
/// so a failing event leaves the batch transaction usable.
async fn apply_play_event(
    tx: &mut Transaction<'_, Postgres>,
    track_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    let mut sp = tx
        .begin()
        .await
        .context("failed to start playback savepoint")?;

    let query = r"
        UPDATE tracks
        SET play_count = play_count + 1
        WHERE id = $1
          AND deleted_at IS NULL
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let updated = sqlx::query(query)
        .bind(track_id)
        .execute(&mut *sp)
        .instrument(span)
        .await
        .context("failed to bump play counter")?;
    if updated.rows_affected() == 0 {
        // The track was deleted after the event was enqueued.
        return Err(anyhow!("track {track_id} missing or deleted"));
    }

    let query = "INSERT INTO play_history (user_id, track_id) VALUES ($1, $2)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(track_id)
        .execute(&mut *sp)
        .instrument(span)
        .await
        .context("failed to append play history")?;

    let query = r"
        INSERT INTO user_track_stats (user_id, track_id, play_count, last_played_at)
        VALUES ($1, $2, 1, NOW())
        ON CONFLICT (user_id, track_id) DO UPDATE
        SET play_count = user_track_stats.play_count + 1,
            last_played_at = NOW()
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(track_id)
        .execute(&mut *sp)
        .instrument(span)
        .await
        .context("failed to upsert track stats")?;

    sp.commit()
        .await
        .context("failed to commit playback savepoint")?;
    Ok(())
}

async fn update_event_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    attempts: u32,
    apply_result: Result<()>,
    config: &PlaybackWorkerConfig,
) -> Result<()> {
    // Retry failures with exponential backoff and jitter until max_attempts.
    let next_attempt = attempts.saturating_add(1);
    let next_attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);
    match apply_result {
        Ok(()) => {
            let query = r"
                UPDATE playback_events
                SET status = 'applied',
                    attempts = $2,
                    last_error = NULL,
                    applied_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark playback event applied")?;
        }
        Err(err) => {
            let max_attempts = config.max_attempts();
            if next_attempt >= max_attempts {
                let query = r"
                    UPDATE playback_events
                    SET status = 'failed',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW()
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to mark playback event failed")?;
            } else {
                let delay =
                    backoff_delay(next_attempt, config.backoff_base(), config.backoff_max());
                let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
                let query = r"
                    UPDATE playback_events
                    SET status = 'pending',
                        attempts = $2,
                        last_error = $3,
                        next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                    WHERE id = $1
                ";
                let span = info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "UPDATE",
                    db.statement = query
                );
                sqlx::query(query)
                    .bind(id)
                    .bind(next_attempts_i32)
                    .bind(err.to_string())
                    .bind(delay_ms)
                    .execute(&mut **tx)
                    .instrument(span)
                    .await
                    .context("failed to update playback retry schedule")?;
            }
        }
    }

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
