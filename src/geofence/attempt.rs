//! Live check-in attempts and the task that walks them through their stages.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use actix_web::rt::time::sleep;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AttendanceError;
use super::evaluator::Evaluation;
use super::sequencer::{AttendanceStage, CancelToken, SequenceTiming, StageSequencer};

/// What a client sees of an attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptSnapshot {
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    #[schema(example = "employee:1")]
    pub actor: String,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub stage: AttendanceStage,
    #[schema(value_type = String, format = "date-time")]
    pub started_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

#[derive(Debug)]
struct AttemptState {
    sequencer: StageSequencer,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct AttemptInner {
    id: Uuid,
    actor: String,
    evaluation: Evaluation,
    started_at: DateTime<Utc>,
    /// Past this point no transition may land, even if the cache has not
    /// evicted the entry yet.
    expires_at: Option<Instant>,
    token: CancelToken,
    state: Mutex<AttemptState>,
}

/// One check-in attempt. Cheap to clone; clones share state and cancellation.
#[derive(Debug, Clone)]
pub struct AttemptHandle {
    inner: Arc<AttemptInner>,
}

impl AttemptHandle {
    pub fn new(actor: impl Into<String>, evaluation: Evaluation) -> Self {
        Self::with_deadline(actor, evaluation, None)
    }

    /// Like [`AttemptHandle::new`], but the attempt goes dead after `ttl`.
    pub fn expiring(actor: impl Into<String>, evaluation: Evaluation, ttl: Duration) -> Self {
        Self::with_deadline(actor, evaluation, Instant::now().checked_add(ttl))
    }

    fn with_deadline(
        actor: impl Into<String>,
        evaluation: Evaluation,
        expires_at: Option<Instant>,
    ) -> Self {
        Self {
            inner: Arc::new(AttemptInner {
                id: Uuid::new_v4(),
                actor: actor.into(),
                evaluation,
                started_at: Utc::now(),
                expires_at,
                token: CancelToken::new(),
                state: Mutex::new(AttemptState {
                    sequencer: StageSequencer::new(),
                    completed_at: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn actor(&self) -> &str {
        &self.inner.actor
    }

    pub fn stage(&self) -> AttendanceStage {
        self.state().sequencer.stage()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Invalidates every pending transition. The stage stays where it was.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        let state = self.state();
        AttemptSnapshot {
            id: self.inner.id,
            actor: self.inner.actor.clone(),
            evaluation: self.inner.evaluation,
            stage: state.sequencer.stage(),
            started_at: self.inner.started_at,
            completed_at: state.completed_at,
            cancelled: self.is_cancelled(),
        }
    }

    /// Presses the check-in button.
    ///
    /// With a closed gate this fails with `OutOfRange` and the attempt stays
    /// `Idle`. Pressing again after the sequence started changes nothing.
    pub fn trigger(&self, timing: SequenceTiming) -> Result<AttendanceStage, AttendanceError> {
        let evaluation = self.inner.evaluation;
        if !evaluation.within_threshold {
            return Err(AttendanceError::OutOfRange {
                distance_m: evaluation.distance_m,
            });
        }

        let started = {
            let mut state = self.state();
            if self.is_cancelled() {
                return Ok(state.sequencer.stage());
            }
            state.sequencer.trigger(true)
        };

        if started {
            info!(attempt = %self.id(), actor = %self.actor(), "Check-in started");
            actix_web::rt::spawn(run_sequence(self.clone(), timing));
        }
        Ok(self.stage())
    }

    fn is_expired(&self) -> bool {
        self.inner
            .expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Applies one timed step unless the attempt was cancelled or expired. Both
    /// are checked under the state lock, so nothing lands after a teardown.
    fn advance_if_live(&self) -> Option<AttendanceStage> {
        let mut state = self.state();
        if self.is_expired() {
            self.cancel();
        }
        if self.is_cancelled() {
            return None;
        }
        let next = state.sequencer.advance()?;
        if next == AttendanceStage::Done {
            state.completed_at = Some(Utc::now());
        }
        Some(next)
    }

    fn state(&self) -> MutexGuard<'_, AttemptState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_sequence(attempt: AttemptHandle, timing: SequenceTiming) {
    for delay in [timing.verify, timing.relocate] {
        sleep(delay).await;
        match attempt.advance_if_live() {
            Some(stage) => debug!(attempt = %attempt.id(), %stage, "Attempt advanced"),
            None => {
                debug!(attempt = %attempt.id(), "Attempt torn down, dropping pending transition");
                return;
            }
        }
    }
    info!(attempt = %attempt.id(), actor = %attempt.actor(), "Attendance marked");
}

/// Attempts currently owned by open views, keyed by attempt id.
///
/// Entries expire after `ttl`; anything leaving the registry, for whatever
/// reason, gets its token cancelled.
#[derive(Clone)]
pub struct AttemptRegistry {
    attempts: Cache<Uuid, AttemptHandle>,
    ttl: Duration,
    timing: SequenceTiming,
}

impl AttemptRegistry {
    pub fn new(ttl: Duration, timing: SequenceTiming) -> Self {
        let attempts = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .eviction_listener(|id, attempt: AttemptHandle, cause| {
                attempt.cancel();
                debug!(attempt = %id, ?cause, "Attempt discarded");
            })
            .build();

        Self {
            attempts,
            ttl,
            timing,
        }
    }

    pub fn timing(&self) -> SequenceTiming {
        self.timing
    }

    /// Registers a fresh attempt, tearing down whatever the same actor had open.
    pub async fn open(&self, actor: &str, evaluation: Evaluation) -> AttemptHandle {
        self.discard_actor(actor).await;
        let attempt = AttemptHandle::expiring(actor, evaluation, self.ttl);
        self.attempts.insert(attempt.id(), attempt.clone()).await;
        attempt
    }

    pub async fn get(&self, id: Uuid) -> Option<AttemptHandle> {
        self.attempts.get(&id).await
    }

    pub async fn discard(&self, id: Uuid) -> Option<AttemptHandle> {
        let attempt = self.attempts.remove(&id).await?;
        attempt.cancel();
        Some(attempt)
    }

    /// Tears down every attempt owned by `actor`. Returns how many there were.
    pub async fn discard_actor(&self, actor: &str) -> usize {
        let ids: Vec<Uuid> = self
            .attempts
            .iter()
            .filter(|(_, attempt)| attempt.actor() == actor)
            .map(|(id, _)| *id)
            .collect();

        let mut discarded = 0;
        for id in ids {
            if self.discard(id).await.is_some() {
                discarded += 1;
            }
        }
        discarded
    }
}
