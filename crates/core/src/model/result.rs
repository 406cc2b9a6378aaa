use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::duration::SessionDuration;
use crate::model::ids::TopicId;

/// Score of a submitted quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: u32,
    pub total_questions: u32,
}

impl SessionResult {
    /// Percentage of correct answers, rounded to the nearest integer.
    ///
    /// Returns 0 for an empty quiz.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.total_questions == 0 {
            return 0;
        }
        let total = u64::from(self.total_questions);
        let percent = (u64::from(self.score) * 200 + total) / (total * 2);
        u32::try_from(percent).unwrap_or(u32::MAX)
    }
}

/// Best-effort report sent to the catalog store once a quiz is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub topic_id: TopicId,
    pub duration: SessionDuration,
    pub score: u32,
    pub total_questions: u32,
}

impl CompletionRecord {
    #[must_use]
    pub fn new(topic_id: TopicId, duration: SessionDuration, result: SessionResult) -> Self {
        Self {
            topic_id,
            duration,
            score: result.score,
            total_questions: result.total_questions,
        }
    }

    /// Fraction of correct answers in `[0, 1]`; 0 for an empty quiz.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.total_questions)
    }
}

/// A persisted completion joined with its topic and subject names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: i64,
    pub topic_id: TopicId,
    pub topic_name: String,
    pub subject_name: String,
    pub duration: SessionDuration,
    pub score: u32,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
}

/// Aggregate history of one topic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicStatistics {
    pub session_count: u32,
    pub last_studied: Option<DateTime<Utc>>,
    /// Mean of the per-session score ratios; `None` when never studied.
    pub avg_performance: Option<f64>,
}

impl TopicStatistics {
    /// Fold a set of completions (with their timestamps) into statistics.
    #[must_use]
    pub fn from_completions<'a>(
        completions: impl IntoIterator<Item = (&'a CompletionRecord, DateTime<Utc>)>,
    ) -> Self {
        let mut count = 0_u32;
        let mut ratio_sum = 0.0_f64;
        let mut last: Option<DateTime<Utc>> = None;
        for (record, completed_at) in completions {
            count = count.saturating_add(1);
            ratio_sum += record.ratio();
            last = Some(last.map_or(completed_at, |l| l.max(completed_at)));
        }
        Self {
            session_count: count,
            last_studied: last,
            avg_performance: (count > 0).then(|| ratio_sum / f64::from(count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn percent_rounds_half_up() {
        let r = SessionResult {
            score: 2,
            total_questions: 3,
        };
        assert_eq!(r.percent(), 67);
        let r = SessionResult {
            score: 1,
            total_questions: 8,
        };
        // 12.5 rounds to 13
        assert_eq!(r.percent(), 13);
        let empty = SessionResult {
            score: 0,
            total_questions: 0,
        };
        assert_eq!(empty.percent(), 0);
    }

    #[test]
    fn percent_handles_huge_counts() {
        let all = SessionResult {
            score: u32::MAX,
            total_questions: u32::MAX,
        };
        assert_eq!(all.percent(), 100);
        let half = SessionResult {
            score: u32::MAX / 2,
            total_questions: u32::MAX,
        };
        assert_eq!(half.percent(), 50);
    }

    #[test]
    fn statistics_average_ratios_not_totals() {
        let now = fixed_now();
        let a = CompletionRecord {
            topic_id: TopicId::new(1),
            duration: SessionDuration::Five,
            score: 1,
            total_questions: 1,
        };
        let b = CompletionRecord {
            topic_id: TopicId::new(1),
            duration: SessionDuration::Five,
            score: 0,
            total_questions: 4,
        };
        let stats = TopicStatistics::from_completions([
            (&a, now),
            (&b, now - chrono::Duration::days(2)),
        ]);
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.last_studied, Some(now));
        assert_eq!(stats.avg_performance, Some(0.5));
    }

    #[test]
    fn empty_statistics_have_no_average() {
        let stats = TopicStatistics::from_completions(std::iter::empty());
        assert_eq!(stats, TopicStatistics::default());
    }
}
