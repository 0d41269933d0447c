// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Every question must offer at least this many options.
pub const MIN_OPTIONS: usize = 3;

const MAX_OPTION_LEN: usize = 500;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    /// Default (author) order inside the quiz.
    pub order_index: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub is_correct: bool,
    pub order_index: i32,
}

/// A question with its options, options sorted by the order they are shown in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

impl QuestionWithOptions {
    pub fn id(&self) -> i64 {
        self.question.id
    }

    /// The unique option flagged correct, or `None` when zero or several are flagged.
    pub fn correct_option_id(&self) -> Option<i64> {
        let mut correct = self.options.iter().filter(|o| o.is_correct);
        match (correct.next(), correct.next()) {
            (Some(only), None) => Some(only.id),
            _ => None,
        }
    }
}

/// DTO for sending an option to a quiz-taker (no correctness flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: i64,
    pub content: String,
    /// Position in the caller's view.
    pub order_index: i32,
}

/// DTO for sending question to client (excludes correctness flags).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    /// Position in the caller's view.
    pub order_index: i32,
    pub options: Vec<PublicOption>,
}

impl PublicQuestion {
    /// Builds the public form of an already ordered question; indices follow array positions.
    pub fn from_view(position: usize, question: &QuestionWithOptions) -> Self {
        Self {
            id: question.question.id,
            content: question.question.content.clone(),
            order_index: position as i32,
            options: question
                .options
                .iter()
                .enumerate()
                .map(|(i, o)| PublicOption {
                    id: o.id,
                    content: o.content.clone(),
                    order_index: i as i32,
                })
                .collect(),
        }
    }
}

/// A question as a given caller may see it: authors get correctness flags.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuestionView {
    Full(QuestionWithOptions),
    Public(PublicQuestion),
}

/// One page of the caller's question view.
#[derive(Debug, Serialize)]
pub struct QuestionPage {
    /// The attempt backing this view; `None` for authors.
    pub submission_id: Option<i64>,
    pub items: Vec<QuestionView>,
    pub total: usize,
    pub page: u32,
    pub items_per_page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

impl PageParams {
    /// 1-based.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn items_per_page(&self) -> u32 {
        self.items_per_page
            .unwrap_or(crate::config::DEFAULT_ITEMS_PER_PAGE)
            .clamp(1, crate::config::MAX_PAGE_SIZE)
    }

    /// Slices `items` to the requested page.
    pub fn paginate<T>(&self, items: Vec<T>, submission_id: Option<i64>) -> QuestionPage
    where
        T: Into<QuestionView>,
    {
        let total = items.len();
        let per_page = self.items_per_page();
        let page = self.page();
        let start = (page as usize - 1).saturating_mul(per_page as usize);
        QuestionPage {
            submission_id,
            items: items
                .into_iter()
                .skip(start)
                .take(per_page as usize)
                .map(Into::into)
                .collect(),
            total,
            page,
            items_per_page: per_page,
            total_pages: total.div_ceil(per_page as usize) as u32,
        }
    }
}

impl From<QuestionWithOptions> for QuestionView {
    fn from(q: QuestionWithOptions) -> Self {
        QuestionView::Full(q)
    }
}

impl From<PublicQuestion> for QuestionView {
    fn from(q: PublicQuestion) -> Self {
        QuestionView::Public(q)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateOptionRequest {
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<CreateOptionRequest>,
}

/// DTO for updating a question. A present `options` list replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<CreateOptionRequest>>,
}

/// Option sets need at least `MIN_OPTIONS` entries and exactly one correct answer.
fn validate_options(options: &[CreateOptionRequest]) -> Result<(), validator::ValidationError> {
    if options.len() < MIN_OPTIONS {
        return Err(validator::ValidationError::new("at_least_three_options")
            .with_message("a question needs at least 3 options".into()));
    }
    for opt in options {
        if opt.content.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.content.len() > MAX_OPTION_LEN {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option")
            .with_message(format!("exactly one option must be correct, got {correct}").into()));
    }
    Ok(())
}

/// Insert payload for the Entity Store (already validated and sanitized).
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub content: String,
    pub options: Vec<CreateOptionRequest>,
}
