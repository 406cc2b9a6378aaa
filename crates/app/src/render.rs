use std::fmt::Write as _;

use services::StudySessionController;
use services::sessions::view::{self, OptionMark, TimerView, Urgency};
use study_core::model::{SessionResult, StudyRecord, StudySession, Subject, Topic};
use study_core::recommend::Recommendation;

const BAR_WIDTH: usize = 20;

pub fn subject_line(subject: &Subject) -> String {
    match subject.description() {
        Some(description) => format!("[{}] {}  ({description})", subject.id(), subject.name()),
        None => format!("[{}] {}", subject.id(), subject.name()),
    }
}

pub fn topic_line(topic: &Topic) -> String {
    let material = if topic.has_content() { " [material]" } else { "" };
    match topic.description() {
        Some(description) => format!(
            "[{}] {}{material}  ({description})",
            topic.id(),
            topic.name()
        ),
        None => format!("[{}] {}{material}", topic.id(), topic.name()),
    }
}

pub fn history_line(record: &StudyRecord) -> String {
    format!(
        "{}  {} / {}  {}  {}/{}",
        record.completed_at.format("%Y-%m-%d %H:%M"),
        record.subject_name,
        record.topic_name,
        record.duration,
        record.score,
        record.total_questions
    )
}

pub fn recommendation_line(rank: usize, recommendation: &Recommendation) -> String {
    format!(
        "{rank}. {} (topic {}), priority {:.1}: {}",
        recommendation.topic_name,
        recommendation.topic_id,
        recommendation.priority,
        recommendation.reason
    )
}

pub fn session_text(session: &StudySession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ({}) ===", session.topic_name(), session.duration());
    let _ = writeln!(out, "\nObjective:\n  {}", view::objective_text(session));
    let _ = writeln!(out, "\n{}", view::content_text(session));
    if !session.key_concepts().is_empty() {
        let _ = writeln!(out, "\nKey concepts:");
        for concept in session.key_concepts() {
            let _ = writeln!(out, "  - {concept}");
        }
    }
    out
}

fn mark_symbol(mark: OptionMark) -> &'static str {
    match mark {
        OptionMark::Neutral => "( )",
        OptionMark::Selected => "(*)",
        OptionMark::Correct => "(+)",
        OptionMark::Incorrect => "(x)",
    }
}

pub fn quiz_text(controller: &StudySessionController) -> String {
    let mut out = String::new();
    let Some(session) = controller.session() else {
        return out;
    };
    for (index, question) in session.quiz().iter().enumerate() {
        let _ = writeln!(out, "Q{}. {}", index + 1, question.question);
        let marks = controller.option_marks(index).unwrap_or_default();
        for (option, text) in question.options.iter().enumerate() {
            let mark = marks.get(option).copied().unwrap_or(OptionMark::Neutral);
            let _ = writeln!(
                out,
                "   {} {}) {text}",
                mark_symbol(mark),
                view::option_letter(option)
            );
        }
    }
    out
}

pub fn timer_line(timer: &TimerView) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((timer.progress_percent / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    let label = match timer.urgency {
        Urgency::Normal => "",
        Urgency::Caution => " hurry up",
        Urgency::Critical => " almost done",
    };
    let mut line = format!(
        "[{}{}] {}{label}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        timer.clock_label()
    );
    if timer.last_minute_warning {
        line.push_str(" (last minute!)");
    }
    if timer.is_expired() {
        line.push_str(" time is up");
    }
    line
}

pub fn result_text(result: &SessionResult) -> String {
    format!(
        "Score: {}/{} ({}%)",
        result.score,
        result.total_questions,
        result.percent()
    )
}
