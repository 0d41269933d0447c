// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::QuestionWithOptions;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,

    /// Target sample size per attempt. `None` means the whole pool.
    pub questions_per_quiz: Option<i32>,

    pub randomize_questions: bool,
    pub randomize_options: bool,

    /// Owner (an admin user id).
    pub created_by: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A quiz together with its whole question pool, options included.
/// This is the value cached under `quiz:{id}:full`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizBundle {
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithOptions>,
}

/// DTO for creating a quiz.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "questions_per_quiz must be at least 1"))]
    pub questions_per_quiz: Option<i32>,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// DTO for a partial quiz update. Absent fields are left untouched.
///
/// `questions_per_quiz` distinguishes "absent" from an explicit `null`
/// (which resets the sample size to the whole pool).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub questions_per_quiz: Option<Option<i32>>,
    pub randomize_questions: Option<bool>,
    pub randomize_options: Option<bool>,
    pub is_active: Option<bool>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

impl UpdateQuizRequest {
    /// Field checks plus the explicit-`null`-aware sample size check.
    pub fn check(&self) -> Result<(), crate::error::AppError> {
        self.validate()?;
        if let Some(Some(n)) = self.questions_per_quiz {
            if n < 1 {
                return Err(crate::error::AppError::Validation(
                    "questions_per_quiz must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A caller's progress on one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Listing entry for quiz-takers.
#[derive(Debug, Serialize)]
pub struct QuizWithStatus {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub status: AttemptStatus,
    pub submission_id: Option<i64>,
    pub score: Option<f64>,
}

/// Quiz metadata plus pool size.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl ListParams {
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(crate::config::MAX_PAGE_SIZE as i64)
            .clamp(1, crate::config::MAX_PAGE_SIZE as i64)
    }
}
