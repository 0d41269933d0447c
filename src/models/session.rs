// src/models/session.rs

use serde::{Deserialize, Serialize};

use crate::models::{question::PublicQuestion, submission::Answers};

/// UI resume snapshot for an in-progress attempt. Not authoritative:
/// `Submission.answers` is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSession {
    pub id: i64,
    pub user_id: i64,
    pub submission_id: i64,
    pub session_key: String,
    pub current_answers: Answers,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl AttemptSession {
    pub fn key_for(user_id: i64, submission_id: i64) -> String {
        format!("session_{user_id}_{submission_id}")
    }
}

/// DTO for `PUT .../session`.
#[derive(Debug, Deserialize)]
pub struct SaveSessionRequest {
    pub current_answers: Answers,
}

/// Response of `GET .../session`.
#[derive(Debug, Serialize)]
pub struct QuizSessionResponse {
    pub submission_id: i64,
    pub questions: Vec<PublicQuestion>,
    pub current_answers: Answers,
}
