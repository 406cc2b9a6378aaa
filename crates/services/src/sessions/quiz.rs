use study_core::model::{AnswerMap, SessionResult, StudySession};

use super::view::{OptionMark, option_marks};
use crate::error::SessionError;

/// Answers given to the quiz of the current session, and its score once submitted.
#[derive(Debug, Clone, Default)]
pub struct QuizEvaluator {
    answers: AnswerMap,
    result: Option<SessionResult>,
}

impl QuizEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the chosen option for a question; the last choice wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ResultsShown` once the quiz was submitted.
    /// Returns `SessionError::InvalidAnswer` when either index is out of range.
    pub fn select_answer(
        &mut self,
        session: &StudySession,
        question: usize,
        option: usize,
    ) -> Result<(), SessionError> {
        if self.result.is_some() {
            return Err(SessionError::ResultsShown);
        }
        let in_range = session
            .question(question)
            .is_some_and(|q| option < q.options.len());
        if !in_range {
            return Err(SessionError::InvalidAnswer { question, option });
        }
        self.answers.insert(question, option);
        Ok(())
    }

    #[must_use]
    pub fn can_submit(&self, session: &StudySession) -> bool {
        (0..session.quiz().len()).all(|i| self.answers.contains_key(&i))
    }

    /// Score the answers and lock them.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ResultsShown` if already submitted.
    /// Returns `SessionError::QuizIncomplete` while a question is unanswered.
    pub fn submit(&mut self, session: &StudySession) -> Result<SessionResult, SessionError> {
        if self.result.is_some() {
            return Err(SessionError::ResultsShown);
        }
        if !self.can_submit(session) {
            return Err(SessionError::QuizIncomplete {
                answered: self.answers.len(),
                total: session.quiz().len(),
            });
        }

        let correct = session
            .quiz()
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answers.get(i) == Some(&q.correct_answer))
            .count();
        let result = SessionResult {
            score: u32::try_from(correct).unwrap_or(u32::MAX),
            total_questions: u32::try_from(session.quiz().len()).unwrap_or(u32::MAX),
        };
        self.result = Some(result);
        Ok(result)
    }

    /// Marks for the options of one question, or `None` for an unknown question.
    #[must_use]
    pub fn option_marks(&self, session: &StudySession, question: usize) -> Option<Vec<OptionMark>> {
        let q = session.question(question)?;
        Some(option_marks(
            q.options.len(),
            q.correct_answer,
            self.answers.get(&question).copied(),
            self.result.is_some(),
        ))
    }

    pub fn reset(&mut self) {
        self.answers.clear();
        self.result = None;
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        self.result
    }

    #[must_use]
    pub fn results_shown(&self) -> bool {
        self.result.is_some()
    }
}
