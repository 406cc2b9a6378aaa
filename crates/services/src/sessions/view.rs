//! Presentation-ready projections of the session state.

use study_core::model::{StudySession, TimerPhase, TimerState};

/// Shown when the generator left a section out.
pub const NOT_AVAILABLE: &str = "Not available for this session.";

const LAST_MINUTE_SECONDS: u32 = 60;

/// Colour tier of the countdown, by fraction of time left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Caution,
    Critical,
}

impl Urgency {
    /// `Normal` above 75 %, `Caution` above 25 %, `Critical` otherwise.
    #[must_use]
    pub fn from_progress(progress_percent: f64) -> Self {
        if progress_percent > 75.0 {
            Self::Normal
        } else if progress_percent > 25.0 {
            Self::Caution
        } else {
            Self::Critical
        }
    }
}

/// Derived countdown view, recomputed from [`TimerState`] on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerView {
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub phase: TimerPhase,
    pub progress_percent: f64,
    pub urgency: Urgency,
    pub last_minute_warning: bool,
}

impl TimerView {
    #[must_use]
    pub fn from_state(state: &TimerState) -> Self {
        let progress_percent = if state.total_seconds == 0 {
            100.0
        } else {
            f64::from(state.remaining_seconds) / f64::from(state.total_seconds) * 100.0
        };
        Self {
            remaining_seconds: state.remaining_seconds,
            total_seconds: state.total_seconds,
            phase: state.phase,
            progress_percent,
            urgency: Urgency::from_progress(progress_percent),
            last_minute_warning: state.remaining_seconds > 0
                && state.remaining_seconds <= LAST_MINUTE_SECONDS,
        }
    }

    /// Remaining time as `m:ss`.
    #[must_use]
    pub fn clock_label(&self) -> String {
        format_clock(self.remaining_seconds)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.phase == TimerPhase::Expired
    }
}

impl Default for TimerView {
    fn default() -> Self {
        Self::from_state(&TimerState::default())
    }
}

#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// How an option is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    Neutral,
    Selected,
    Correct,
    Incorrect,
}

/// Marks for every option of a question.
///
/// Before results: the chosen option is `Selected`. After results: the correct option is
/// `Correct` and a different chosen option is `Incorrect`.
#[must_use]
pub fn option_marks(
    option_count: usize,
    correct_answer: usize,
    selected: Option<usize>,
    results_shown: bool,
) -> Vec<OptionMark> {
    (0..option_count)
        .map(|option| {
            if results_shown {
                if option == correct_answer {
                    OptionMark::Correct
                } else if selected == Some(option) {
                    OptionMark::Incorrect
                } else {
                    OptionMark::Neutral
                }
            } else if selected == Some(option) {
                OptionMark::Selected
            } else {
                OptionMark::Neutral
            }
        })
        .collect()
}

/// `A`, `B`, ... for option indexes.
#[must_use]
pub fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .filter(u8::is_ascii_uppercase)
        .map_or('?', char::from)
}

/// Inverse of [`option_letter`], case-insensitive.
#[must_use]
pub fn option_index(letter: char) -> Option<usize> {
    let upper = letter.to_ascii_uppercase();
    upper
        .is_ascii_uppercase()
        .then(|| usize::from(upper as u8 - b'A'))
}

#[must_use]
pub fn objective_text(session: &StudySession) -> &str {
    session.learning_objective().unwrap_or(NOT_AVAILABLE)
}

#[must_use]
pub fn content_text(session: &StudySession) -> &str {
    session.content().unwrap_or(NOT_AVAILABLE)
}
