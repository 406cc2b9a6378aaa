use serde::{Deserialize, Serialize};

use crate::model::duration::SessionDuration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimerPhase {
    #[default]
    Stopped,
    Running,
    Expired,
}

/// Countdown bookkeeping; `remaining_seconds` never exceeds `total_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub phase: TimerPhase,
}

impl TimerState {
    /// A running countdown over the full session length.
    #[must_use]
    pub fn started(duration: SessionDuration) -> Self {
        let total = duration.total_seconds();
        Self {
            remaining_seconds: total,
            total_seconds: total,
            phase: TimerPhase::Running,
        }
    }

    /// Consume one second. Only a running countdown moves; it expires at zero.
    pub fn tick(&mut self) {
        if self.phase != TimerPhase::Running {
            return;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = TimerPhase::Expired;
        }
    }

    /// Stop a running countdown; an expired one stays expired.
    pub fn pause(&mut self) {
        if self.phase == TimerPhase::Running {
            self.phase = TimerPhase::Stopped;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }
}
