// SPDX-License-Identifier: MIT
//! Peer-driven clarification questions and the in-memory answer session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sync::QuestionAnswer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionKind {
    Text,
    MultipleChoice,
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Unique within one session.
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    /// Choices offered to the user. Non-empty exactly when `kind` is
    /// `multipleChoice`.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// One active answer flow.
///
/// Created when a question batch arrives, destroyed on submit or widget
/// teardown; never persisted across a restart. `current_index` is always
/// a valid question index or equal to `len()`, the review position.
#[derive(Debug, Clone)]
pub struct QuestionSession {
    pub session_id: String,
    questions: Vec<Question>,
    current_index: usize,
    answers: HashMap<String, String>,
}

impl QuestionSession {
    pub fn new(session_id: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            session_id: session_id.into(),
            questions,
            current_index: 0,
            answers: HashMap::new(),
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question under the cursor; `None` at the review position.
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn in_review(&self) -> bool {
        self.current_index == self.questions.len()
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn set_answer(&mut self, question_id: impl Into<String>, answer: impl Into<String>) {
        self.answers.insert(question_id.into(), answer.into());
    }

    /// Whether Next may leave the current question.
    ///
    /// A `required` question blocks until its answer is non-empty. For
    /// boolean questions selecting either option is itself an answer, so
    /// any stored value unblocks.
    pub fn can_advance(&self) -> bool {
        match self.current() {
            Some(q) if q.required => self
                .answer(&q.id)
                .is_some_and(|a| !a.trim().is_empty()),
            _ => true,
        }
    }

    /// Advance the cursor. Returns `false` when blocked by
    /// [`can_advance`](Self::can_advance) or already at the review
    /// position. Moving past the last question lands on review.
    pub fn next(&mut self) -> bool {
        if self.in_review() || !self.can_advance() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Step back one question. No-op at index 0.
    pub fn back(&mut self) {
        if self.current_index > 0 {
            self.current_index -= 1;
        }
    }

    /// Move the cursor to a specific question, clamped to a valid index.
    pub fn jump_to(&mut self, index: usize) {
        self.current_index = index.min(self.questions.len().saturating_sub(1));
    }

    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| self.answer(&q.id).is_some())
            .count()
    }

    /// Answers in question order, one entry per answered question.
    pub fn payload(&self) -> Vec<QuestionAnswer> {
        self.questions
            .iter()
            .filter_map(|q| {
                self.answers.get(&q.id).map(|answer| QuestionAnswer {
                    question_id: q.id.clone(),
                    answer: answer.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, kind: QuestionKind, required: bool) -> Question {
        Question {
            id: id.into(),
            text: format!("question {id}"),
            kind,
            options: match kind {
                QuestionKind::MultipleChoice => vec!["a".into(), "b".into()],
                _ => vec![],
            },
            required,
        }
    }

    fn session() -> QuestionSession {
        QuestionSession::new(
            "s1",
            vec![
                question("q1", QuestionKind::Text, true),
                question("q2", QuestionKind::MultipleChoice, true),
                question("q3", QuestionKind::Boolean, true),
            ],
        )
    }

    #[test]
    fn required_text_blocks_until_nonempty() {
        let mut s = session();
        assert!(!s.next());
        assert_eq!(s.current_index(), 0);

        s.set_answer("q1", "   ");
        assert!(!s.next(), "whitespace is not an answer");

        s.set_answer("q1", "because of the outage");
        assert!(s.next());
        assert_eq!(s.current_index(), 1);
    }

    #[test]
    fn boolean_unblocks_on_either_option() {
        let mut s = session();
        s.set_answer("q1", "x");
        s.set_answer("q2", "a");
        s.next();
        s.next();
        assert_eq!(s.current_index(), 2);

        assert!(!s.next(), "required boolean with no selection blocks");
        s.set_answer("q3", "false");
        assert!(s.next(), "selecting either option is an answer");
        assert!(s.in_review());
    }

    #[test]
    fn back_is_a_no_op_at_the_first_question() {
        let mut s = session();
        s.back();
        assert_eq!(s.current_index(), 0);

        s.set_answer("q1", "x");
        s.next();
        s.back();
        assert_eq!(s.current_index(), 0);
    }

    #[test]
    fn jump_is_clamped_to_valid_indices() {
        let mut s = session();
        s.jump_to(99);
        assert_eq!(s.current_index(), 2);
        s.jump_to(1);
        assert_eq!(s.current_index(), 1);
    }

    #[test]
    fn next_at_review_stays_put() {
        let mut s = QuestionSession::new(
            "s1",
            vec![question("q1", QuestionKind::Text, false)],
        );
        assert!(s.next());
        assert!(s.in_review());
        assert!(!s.next());
        assert!(s.current().is_none());
    }

    #[test]
    fn payload_preserves_question_order() {
        let mut s = session();
        s.set_answer("q3", "true");
        s.set_answer("q1", "first");

        let payload = s.payload();
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].question_id, "q1");
        assert_eq!(payload[1].question_id, "q3");
    }

    #[test]
    fn optional_fields_default_when_absent_from_the_wire() {
        let q: Question =
            serde_json::from_str(r#"{"id":"q1","text":"Why?","kind":"text"}"#).unwrap();
        assert!(q.options.is_empty());
        assert!(!q.required);
        let q: Question = serde_json::from_str(
            r#"{"id":"q2","text":"Pick","kind":"multipleChoice","options":["x"],"required":true}"#,
        )
        .unwrap();
        assert_eq!(q.kind, QuestionKind::MultipleChoice);
        assert!(q.required);
    }
}
