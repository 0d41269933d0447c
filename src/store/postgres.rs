//! Postgres-backed [`QuizStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use super::QuizStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    question::{AnswerOption, CreateOptionRequest, NewQuestion, Question, QuestionWithOptions},
    quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
    session::AttemptSession,
    submission::{Answers, NewSubmission, OptionOrders, QuestionSlot, Submission},
    user::{NewUser, User, UserChanges},
};

const USER_COLUMNS: &str = "id, username, password, role, is_active, created_at";

const QUIZ_COLUMNS: &str = "\
    id, title, description, is_active, questions_per_quiz, randomize_questions, \
    randomize_options, created_by, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, content, order_index, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, question_id, content, is_correct, order_index";

const SUBMISSION_COLUMNS: &str = "\
    id, user_id, quiz_id, score, is_completed, question_order, option_orders, answers, \
    created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, submission_id, session_key, current_answers, created_at, updated_at";

/// How often `create_submission` re-reads after losing the insert race.
const START_RACE_RETRIES: usize = 3;

#[derive(FromRow)]
struct SubmissionRow {
    id: i64,
    user_id: i64,
    quiz_id: i64,
    score: f64,
    is_completed: bool,
    question_order: Json<Vec<QuestionSlot>>,
    option_orders: Json<OptionOrders>,
    answers: Json<Answers>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            user_id: row.user_id,
            quiz_id: row.quiz_id,
            score: row.score,
            is_completed: row.is_completed,
            question_order: row.question_order.0,
            option_orders: row.option_orders.0,
            answers: row.answers.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    submission_id: i64,
    session_key: String,
    current_answers: Json<Answers>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<SessionRow> for AttemptSession {
    fn from(row: SessionRow) -> Self {
        AttemptSession {
            id: row.id,
            user_id: row.user_id,
            submission_id: row.submission_id,
            session_key: row.session_key,
            current_answers: row.current_answers.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    question_id: i64,
    options: &[CreateOptionRequest],
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    let mut inserted = Vec::with_capacity(options.len());
    for (i, option) in options.iter().enumerate() {
        let row = sqlx::query_as::<_, AnswerOption>(&format!(
            "INSERT INTO options (question_id, content, is_correct, order_index) \
             VALUES ($1, $2, $3, $4) RETURNING {OPTION_COLUMNS}"
        ))
        .bind(question_id)
        .bind(&option.content)
        .bind(option.is_correct)
        .bind(i as i32)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

#[async_trait]
impl QuizStore for PgStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            }
            _ => {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, skip: i64, limit: i64) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                username = COALESCE($2, username), \
                password = COALESCE($3, password), \
                role = COALESCE($4, role), \
                is_active = COALESCE($5, is_active) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.password)
        .bind(&changes.role)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Username '{}' already exists",
                changes.username.as_deref().unwrap_or_default()
            )),
            _ => AppError::from(e),
        })
    }

    async fn create_quiz(&self, created_by: i64, quiz: &CreateQuizRequest) -> AppResult<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "INSERT INTO quizzes \
             (title, description, is_active, questions_per_quiz, randomize_questions, randomize_options, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.is_active)
        .bind(quiz.questions_per_quiz)
        .bind(quiz.randomize_questions)
        .bind(quiz.randomize_options)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn get_quiz(&self, id: i64) -> AppResult<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(quiz)
    }

    async fn list_quizzes_by_owner(&self, owner_id: i64, skip: i64, limit: i64) -> AppResult<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE created_by = $1 ORDER BY id OFFSET $2 LIMIT $3"
        ))
        .bind(owner_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn list_active_quizzes(&self, skip: i64, limit: i64) -> AppResult<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE is_active = TRUE ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> AppResult<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "UPDATE quizzes SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                questions_per_quiz = CASE WHEN $4 THEN $5 ELSE questions_per_quiz END, \
                randomize_questions = COALESCE($6, randomize_questions), \
                randomize_options = COALESCE($7, randomize_options), \
                is_active = COALESCE($8, is_active), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.questions_per_quiz.is_some())
        .bind(changes.questions_per_quiz.flatten())
        .bind(changes.randomize_questions)
        .bind(changes.randomize_options)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn delete_quiz(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_questions_by_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuestionWithOptions>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY order_index, id"
        ))
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let options = sqlx::query_as::<_, AnswerOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM options WHERE question_id = ANY($1) \
             ORDER BY question_id, order_index, id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(option);
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let options = by_question.remove(&question.id).unwrap_or_default();
                QuestionWithOptions { question, options }
            })
            .collect())
    }

    async fn get_options_by_question(&self, question_id: i64) -> AppResult<Vec<AnswerOption>> {
        let options = sqlx::query_as::<_, AnswerOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM options WHERE question_id = $1 ORDER BY order_index, id"
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(options)
    }

    async fn create_question(&self, quiz_id: i64, question: &NewQuestion) -> AppResult<QuestionWithOptions> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent inserts into the same quiz so order_index stays unique.
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let next_index: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions WHERE quiz_id = $1",
        )
        .bind(quiz_id)
        .fetch_one(&mut *tx)
        .await?;

        let created = sqlx::query_as::<_, Question>(&format!(
            "INSERT INTO questions (quiz_id, content, order_index) VALUES ($1, $2, $3) \
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(quiz_id)
        .bind(&question.content)
        .bind(next_index)
        .fetch_one(&mut *tx)
        .await?;

        let options = insert_options(&mut tx, created.id, &question.options).await?;

        tx.commit().await?;

        Ok(QuestionWithOptions { question: created, options })
    }

    async fn update_question(
        &self,
        quiz_id: i64,
        question_id: i64,
        content: Option<&str>,
        options: Option<&[CreateOptionRequest]>,
    ) -> AppResult<Option<QuestionWithOptions>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Question>(&format!(
            "UPDATE questions SET content = COALESCE($3, content), updated_at = NOW() \
             WHERE id = $1 AND quiz_id = $2 RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(question_id)
        .bind(quiz_id)
        .bind(content)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(question) = updated else {
            return Ok(None);
        };

        if let Some(options) = options {
            sqlx::query("DELETE FROM options WHERE question_id = $1")
                .bind(question_id)
                .execute(&mut *tx)
                .await?;
            insert_options(&mut tx, question_id, options).await?;
        }

        let options = sqlx::query_as::<_, AnswerOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM options WHERE question_id = $1 ORDER BY order_index, id"
        ))
        .bind(question_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(QuestionWithOptions { question, options }))
    }

    async fn delete_question(&self, quiz_id: i64, question_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND quiz_id = $2")
            .bind(question_id)
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_submission(&self, id: i64) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn get_in_progress_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions \
             WHERE user_id = $1 AND quiz_id = $2 AND is_completed = FALSE"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn latest_completed_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions \
             WHERE user_id = $1 AND quiz_id = $2 AND is_completed = TRUE \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission> {
        // The partial unique index on (user_id, quiz_id) WHERE NOT is_completed
        // makes the loser of a concurrent start insert nothing.
        let inserted = sqlx::query_as::<_, SubmissionRow>(&format!(
            "INSERT INTO submissions (user_id, quiz_id, question_order, option_orders) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(submission.user_id)
        .bind(submission.quiz_id)
        .bind(Json(&submission.question_order))
        .bind(Json(&submission.option_orders))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        for _ in 0..START_RACE_RETRIES {
            if let Some(existing) = self
                .get_in_progress_submission(submission.user_id, submission.quiz_id)
                .await?
            {
                tracing::debug!(
                    submission_id = existing.id,
                    "Concurrent start resolved to existing submission"
                );
                return Ok(existing);
            }
        }

        Err(AppError::Storage(format!(
            "submission insert for user {} quiz {} conflicted but no in-progress row was found",
            submission.user_id, submission.quiz_id
        )))
    }

    async fn list_submissions(
        &self,
        quiz_id: i64,
        user_id: Option<i64>,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Submission>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE quiz_id = "
        ));
        builder.push_bind(quiz_id);

        if let Some(user_id) = user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }

        builder.push(" ORDER BY created_at DESC, id DESC OFFSET ");
        builder.push_bind(skip.max(0));
        builder.push(" LIMIT ");
        builder.push_bind(limit.clamp(1, 1000));

        let rows = builder.build_query_as::<SubmissionRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }

    async fn merge_answers(&self, id: i64, answers: &Answers) -> AppResult<Option<Submission>> {
        // Single statement: concurrent merges serialize on the row lock and never drop keys.
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "UPDATE submissions SET answers = answers || $2::jsonb, updated_at = NOW() \
             WHERE id = $1 AND is_completed = FALSE RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(answers))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn complete_submission(&self, id: i64, graded: &Answers, score: f64) -> AppResult<Option<Submission>> {
        // A merge that landed after grading changes `answers` and makes this a no-op.
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "UPDATE submissions SET score = $2, is_completed = TRUE, updated_at = NOW() \
             WHERE id = $1 AND is_completed = FALSE AND answers = $3::jsonb \
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(score)
        .bind(Json(graded))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn save_session(&self, user_id: i64, submission_id: i64, current_answers: &Answers) -> AppResult<AttemptSession> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO quiz_sessions (user_id, submission_id, session_key, current_answers) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, submission_id) DO UPDATE SET \
                current_answers = EXCLUDED.current_answers, updated_at = NOW() \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(submission_id)
        .bind(AttemptSession::key_for(user_id, submission_id))
        .bind(Json(current_answers))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_session(&self, user_id: i64, submission_id: i64) -> AppResult<Option<AttemptSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE user_id = $1 AND submission_id = $2"
        ))
        .bind(user_id)
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AttemptSession::from))
    }
}
