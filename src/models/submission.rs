// src/models/submission.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::question::PublicQuestion;

/// One entry of the frozen question ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSlot {
    pub question_id: i64,
    pub order_index: i32,
}

/// One entry of a frozen per-question option ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSlot {
    pub option_id: i64,
    pub order_index: i32,
}

/// Frozen option orderings keyed by question id.
pub type OptionOrders = BTreeMap<i64, Vec<OptionSlot>>;

/// Selected option per question id.
///
/// Integer keys in the domain; serde_json writes and reads them as string
/// keys, which is the wire and JSONB format.
pub type Answers = BTreeMap<i64, i64>;

/// One attempt of one user at one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    /// Percentage, 0-100. Zero until finalized.
    pub score: f64,
    pub is_completed: bool,
    pub question_order: Vec<QuestionSlot>,
    pub option_orders: OptionOrders,
    pub answers: Answers,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Submission {
    /// Question ids of the frozen view, in presentation order.
    pub fn presented_question_ids(&self) -> Vec<i64> {
        let mut slots = self.question_order.clone();
        slots.sort_by_key(|s| s.order_index);
        slots.into_iter().map(|s| s.question_id).collect()
    }
}

/// Insert payload: a fresh in-progress attempt with its frozen view.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: i64,
    pub quiz_id: i64,
    pub question_order: Vec<QuestionSlot>,
    pub option_orders: OptionOrders,
}

/// Summary form (no answers, no view).
#[derive(Debug, Serialize)]
pub struct SubmissionSummary {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub score: f64,
    pub is_completed: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Submission> for SubmissionSummary {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            quiz_id: s.quiz_id,
            score: s.score,
            is_completed: s.is_completed,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// A submission together with the questions of its frozen view.
#[derive(Debug, Serialize)]
pub struct SubmissionWithQuestions {
    #[serde(flatten)]
    pub submission: Submission,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for one answer in `PUT .../answers`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AnswerSubmit {
    pub question_id: i64,
    pub selected_option_id: i64,
}

/// Graded view of one presented question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionOutcome {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub correct_option_id: Option<i64>,
    pub is_answered: bool,
    pub is_correct: bool,
}

/// Option as shown in a graded result (correctness revealed).
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedOption {
    pub id: i64,
    pub content: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewedQuestion {
    pub id: i64,
    /// Empty when the question was deleted after the attempt started.
    pub content: String,
    pub options: Vec<ReviewedOption>,
    #[serde(flatten)]
    pub outcome: QuestionOutcome,
}

/// Response of finalize and `GET .../result`.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    #[serde(flatten)]
    pub submission: SubmissionSummary,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub questions: Vec<ReviewedQuestion>,
}
