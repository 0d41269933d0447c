//! Entity Store port.
//!
//! The core talks to persistence only through [`QuizStore`]. Any failure of
//! the backing store surfaces as [`AppError::Storage`](crate::error::AppError);
//! implementations never turn infrastructure errors into business errors.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    question::{AnswerOption, CreateOptionRequest, NewQuestion, QuestionWithOptions},
    quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
    session::AttemptSession,
    submission::{Answers, NewSubmission, Submission},
    user::{NewUser, User, UserChanges},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuizStore: Send + Sync {
    // Users

    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn list_users(&self, skip: i64, limit: i64) -> AppResult<Vec<User>>;
    /// Applies the given fields. Fails with `Conflict` when the new username is taken.
    async fn update_user(&self, id: i64, changes: &UserChanges) -> AppResult<Option<User>>;

    // Quizzes

    async fn create_quiz(&self, created_by: i64, quiz: &CreateQuizRequest) -> AppResult<Quiz>;
    async fn get_quiz(&self, id: i64) -> AppResult<Option<Quiz>>;
    async fn list_quizzes_by_owner(&self, owner_id: i64, skip: i64, limit: i64) -> AppResult<Vec<Quiz>>;
    async fn list_active_quizzes(&self, skip: i64, limit: i64) -> AppResult<Vec<Quiz>>;
    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> AppResult<Option<Quiz>>;
    /// Removes the quiz with its questions and options.
    async fn delete_quiz(&self, id: i64) -> AppResult<bool>;

    // Questions and options

    /// The pool, ordered by `order_index`, each with options ordered by `order_index`.
    async fn get_questions_by_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuestionWithOptions>>;
    /// Ordered by `order_index`.
    async fn get_options_by_question(&self, question_id: i64) -> AppResult<Vec<AnswerOption>>;
    /// Writes the question and all of its options atomically.
    async fn create_question(&self, quiz_id: i64, question: &NewQuestion) -> AppResult<QuestionWithOptions>;
    /// Updates the content and, when `options` is given, replaces the option set atomically.
    async fn update_question(
        &self,
        quiz_id: i64,
        question_id: i64,
        content: Option<&str>,
        options: Option<&[CreateOptionRequest]>,
    ) -> AppResult<Option<QuestionWithOptions>>;
    async fn delete_question(&self, quiz_id: i64, question_id: i64) -> AppResult<bool>;

    // Submissions

    async fn get_submission(&self, id: i64) -> AppResult<Option<Submission>>;
    async fn get_in_progress_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>>;
    /// Most recently updated completed submission, if any.
    async fn latest_completed_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>>;
    /// Creates an in-progress attempt. When another in-progress attempt for
    /// the same (user, quiz) already exists, that one is returned instead.
    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission>;
    /// `user_id = None` lists every submission of the quiz.
    async fn list_submissions(
        &self,
        quiz_id: i64,
        user_id: Option<i64>,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Submission>>;
    /// Merges `answers` into the stored map. `None` when the submission is
    /// missing or already completed; nothing is written in that case.
    async fn merge_answers(&self, id: i64, answers: &Answers) -> AppResult<Option<Submission>>;
    /// Sets `score` and `is_completed` together, but only while the stored
    /// answers still equal `graded`. `None` when the submission is missing,
    /// already completed, or its answers changed since they were graded;
    /// nothing is written in that case.
    async fn complete_submission(&self, id: i64, graded: &Answers, score: f64) -> AppResult<Option<Submission>>;

    // Sessions

    async fn save_session(&self, user_id: i64, submission_id: i64, current_answers: &Answers) -> AppResult<AttemptSession>;
    async fn get_session(&self, user_id: i64, submission_id: i64) -> AppResult<Option<AttemptSession>>;
}
