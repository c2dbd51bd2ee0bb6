use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use utoipa::ToSchema;

/// Where a check-in stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStage {
    #[default]
    Idle,
    /// Simulated biometric step.
    Verifying,
    /// Simulated GPS re-check.
    Locating,
    Done,
}

/// `Idle -> Verifying -> Locating -> Done`, nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSequencer {
    stage: AttendanceStage,
}

impl StageSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> AttendanceStage {
        self.stage
    }

    /// Leaves `Idle` only when the gate is open. Returns whether it moved.
    pub fn trigger(&mut self, gate_open: bool) -> bool {
        if gate_open && self.stage == AttendanceStage::Idle {
            self.stage = AttendanceStage::Verifying;
            true
        } else {
            false
        }
    }

    /// The timed step. `None` when there is nothing left to advance.
    pub fn advance(&mut self) -> Option<AttendanceStage> {
        let next = match self.stage {
            AttendanceStage::Verifying => AttendanceStage::Locating,
            AttendanceStage::Locating => AttendanceStage::Done,
            AttendanceStage::Idle | AttendanceStage::Done => return None,
        };
        self.stage = next;
        Some(next)
    }
}

/// Delays between the timed stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTiming {
    /// `Verifying -> Locating`
    pub verify: Duration,
    /// `Locating -> Done`
    pub relocate: Duration,
}

impl Default for SequenceTiming {
    fn default() -> Self {
        Self {
            verify: Duration::from_millis(1_200),
            relocate: Duration::from_millis(1_200),
        }
    }
}

/// Shared flag that invalidates every pending transition of one attempt.
///
/// Clones share the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
