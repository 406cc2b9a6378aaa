//! Heuristic that decides which topic of a subject is most worth studying next.

use chrono::{DateTime, Utc};

use crate::model::{Topic, TopicId, TopicStatistics};
use crate::time::Clock;

/// Points granted to a topic that has never been studied.
pub const NEVER_STUDIED_POINTS: f64 = 100.0;
/// Points per day since the last session, capped by [`MAX_RECENCY_POINTS`].
pub const RECENCY_POINTS_PER_DAY: f64 = 5.0;
pub const MAX_RECENCY_POINTS: f64 = 50.0;
/// Weight of the missing performance share (`1 - avg_performance`).
pub const PERFORMANCE_WEIGHT: f64 = 30.0;
/// Bonus for topics with attached study material.
pub const MATERIAL_POINTS: f64 = 10.0;
/// Average performance below which the reason mentions it.
pub const WEAK_PERFORMANCE: f64 = 0.7;

/// Why a topic was recommended.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationReason {
    NeverStudied,
    Needs {
        days_since: Option<i64>,
        performance_percent: Option<u32>,
    },
    ReadyForReview,
}

impl std::fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverStudied => write!(f, "never studied"),
            Self::ReadyForReview => write!(f, "ready for review"),
            Self::Needs {
                days_since,
                performance_percent,
            } => {
                let mut parts = Vec::new();
                if let Some(days) = days_since {
                    parts.push(format!("studied {days} days ago"));
                }
                if let Some(pct) = performance_percent {
                    parts.push(format!("average performance {pct}%"));
                }
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// A scored topic, highest priority first when sorted by [`rank`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub priority: f64,
    pub times_studied: u32,
    pub last_studied: Option<DateTime<Utc>>,
    pub average_performance: Option<f64>,
    pub reason: RecommendationReason,
}

/// Priority score of a topic given its history.
#[must_use]
pub fn topic_priority(topic: &Topic, stats: &TopicStatistics, clock: &Clock) -> f64 {
    let mut priority = 0.0;

    if stats.session_count == 0 {
        priority += NEVER_STUDIED_POINTS;
    } else {
        if let Some(last) = stats.last_studied {
            #[allow(clippy::cast_precision_loss)]
            let days = clock.days_since(last) as f64;
            priority += (days * RECENCY_POINTS_PER_DAY).min(MAX_RECENCY_POINTS);
        }
        priority += (1.0 - stats.avg_performance.unwrap_or(0.0)) * PERFORMANCE_WEIGHT;
    }

    if topic.has_content() {
        priority += MATERIAL_POINTS;
    }

    priority
}

#[must_use]
pub fn recommendation_reason(stats: &TopicStatistics, clock: &Clock) -> RecommendationReason {
    if stats.session_count == 0 {
        return RecommendationReason::NeverStudied;
    }

    let days_since = stats
        .last_studied
        .map(|last| clock.days_since(last))
        .filter(|days| *days > 1);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let performance_percent = stats
        .avg_performance
        .filter(|avg| *avg > 0.0 && *avg < WEAK_PERFORMANCE)
        .map(|avg| (avg * 100.0).round() as u32);

    if days_since.is_none() && performance_percent.is_none() {
        RecommendationReason::ReadyForReview
    } else {
        RecommendationReason::Needs {
            days_since,
            performance_percent,
        }
    }
}

/// Score every topic and keep the `limit` most urgent ones.
///
/// Ties keep the input order.
#[must_use]
pub fn rank(
    topics: &[(Topic, TopicStatistics)],
    clock: &Clock,
    limit: usize,
) -> Vec<Recommendation> {
    let mut scored: Vec<Recommendation> = topics
        .iter()
        .map(|(topic, stats)| Recommendation {
            topic_id: topic.id(),
            topic_name: topic.name().to_owned(),
            priority: topic_priority(topic, stats, clock),
            times_studied: stats.session_count,
            last_studied: stats.last_studied,
            average_performance: stats.avg_performance,
            reason: recommendation_reason(stats, clock),
        })
        .collect();

    scored.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectId;
    use crate::time::{fixed_clock, fixed_now};
    use chrono::Duration;

    fn topic(id: u64, has_content: bool) -> Topic {
        Topic::new(
            TopicId::new(id),
            SubjectId::new(1),
            format!("Topic {id}"),
            None,
            fixed_now(),
        )
        .unwrap()
        .with_content(has_content)
    }

    fn studied(days_ago: i64, avg: f64) -> TopicStatistics {
        TopicStatistics {
            session_count: 2,
            last_studied: Some(fixed_now() - Duration::days(days_ago)),
            avg_performance: Some(avg),
        }
    }

    #[test]
    fn never_studied_with_material_scores_highest() {
        let clock = fixed_clock();
        let fresh = topic_priority(&topic(1, true), &TopicStatistics::default(), &clock);
        assert!((fresh - 110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recency_is_capped() {
        let clock = fixed_clock();
        let p = topic_priority(&topic(1, false), &studied(30, 1.0), &clock);
        assert!((p - 50.0).abs() < f64::EPSILON);
        let p = topic_priority(&topic(1, false), &studied(2, 0.5), &clock);
        assert!((p - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reasons_follow_history() {
        let clock = fixed_clock();
        assert_eq!(
            recommendation_reason(&TopicStatistics::default(), &clock),
            RecommendationReason::NeverStudied
        );
        let reason = recommendation_reason(&studied(9, 0.5), &clock);
        assert_eq!(reason.to_string(), "studied 9 days ago, average performance 50%");
        assert_eq!(
            recommendation_reason(&studied(0, 0.9), &clock),
            RecommendationReason::ReadyForReview
        );
    }

    #[test]
    fn rank_orders_by_priority_and_limits() {
        let clock = fixed_clock();
        let topics = vec![
            (topic(1, false), studied(0, 1.0)),
            (topic(2, false), TopicStatistics::default()),
            (topic(3, true), studied(3, 0.0)),
        ];
        let ranked = rank(&topics, &clock, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].topic_id, TopicId::new(2));
        assert_eq!(ranked[1].topic_id, TopicId::new(3));
    }
}
