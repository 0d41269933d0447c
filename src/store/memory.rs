//! Process-local [`QuizStore`] used by the test-suite and for database-less runs.
//!
//! A single `RwLock` guards all tables, so every trait method is atomic with
//! respect to every other one, mirroring the row-level guarantees the
//! Postgres store relies on.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::QuizStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    question::{AnswerOption, CreateOptionRequest, NewQuestion, Question, QuestionWithOptions},
    quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
    session::AttemptSession,
    submission::{Answers, NewSubmission, Submission},
    user::{NewUser, User, UserChanges},
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, Question>,
    options: BTreeMap<i64, AnswerOption>,
    submissions: BTreeMap<i64, Submission>,
    sessions: BTreeMap<(i64, i64), AttemptSession>,
}

impl Tables {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn options_of(&self, question_id: i64) -> Vec<AnswerOption> {
        let mut options: Vec<AnswerOption> = self
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect();
        options.sort_by_key(|o| (o.order_index, o.id));
        options
    }

    fn replace_options(&mut self, question_id: i64, options: &[CreateOptionRequest]) {
        self.options.retain(|_, o| o.question_id != question_id);
        for (i, option) in options.iter().enumerate() {
            let id = self.id();
            self.options.insert(
                id,
                AnswerOption {
                    id,
                    question_id,
                    content: option.content.clone(),
                    is_correct: option.is_correct,
                    order_index: i as i32,
                },
            );
        }
    }

    fn remove_question(&mut self, question_id: i64) {
        self.questions.remove(&question_id);
        self.options.retain(|_, o| o.question_id != question_id);
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, skip: i64, limit: i64) -> Vec<T> {
    items.skip(skip.max(0) as usize).take(limit.max(0) as usize).collect()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", user.username)));
        }
        let id = t.id();
        let created = User {
            id,
            username: user.username,
            password: user.password,
            role: user.role,
            is_active: true,
            created_at: Utc::now(),
        };
        t.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, skip: i64, limit: i64) -> AppResult<Vec<User>> {
        let t = self.tables.read().await;
        Ok(page(t.users.values().cloned(), skip, limit))
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> AppResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(username) = &changes.username {
            if t.users.values().any(|u| u.id != id && &u.username == username) {
                return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
            }
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(password) = &changes.password {
            user.password = password.clone();
        }
        if let Some(role) = &changes.role {
            user.role = role.clone();
        }
        if let Some(flag) = changes.is_active {
            user.is_active = flag;
        }
        Ok(Some(user.clone()))
    }

    async fn create_quiz(&self, created_by: i64, quiz: &CreateQuizRequest) -> AppResult<Quiz> {
        let mut t = self.tables.write().await;
        let id = t.id();
        let now = Utc::now();
        let created = Quiz {
            id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            is_active: quiz.is_active,
            questions_per_quiz: quiz.questions_per_quiz,
            randomize_questions: quiz.randomize_questions,
            randomize_options: quiz.randomize_options,
            created_by,
            created_at: now,
            updated_at: now,
        };
        t.quizzes.insert(id, created.clone());
        Ok(created)
    }

    async fn get_quiz(&self, id: i64) -> AppResult<Option<Quiz>> {
        Ok(self.tables.read().await.quizzes.get(&id).cloned())
    }

    async fn list_quizzes_by_owner(&self, owner_id: i64, skip: i64, limit: i64) -> AppResult<Vec<Quiz>> {
        let t = self.tables.read().await;
        Ok(page(t.quizzes.values().filter(|q| q.created_by == owner_id).cloned(), skip, limit))
    }

    async fn list_active_quizzes(&self, skip: i64, limit: i64) -> AppResult<Vec<Quiz>> {
        let t = self.tables.read().await;
        Ok(page(t.quizzes.values().filter(|q| q.is_active).cloned(), skip, limit))
    }

    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> AppResult<Option<Quiz>> {
        let mut t = self.tables.write().await;
        let Some(quiz) = t.quizzes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            quiz.title = title.clone();
        }
        if let Some(description) = &changes.description {
            quiz.description = Some(description.clone());
        }
        if let Some(sample) = changes.questions_per_quiz {
            quiz.questions_per_quiz = sample;
        }
        if let Some(flag) = changes.randomize_questions {
            quiz.randomize_questions = flag;
        }
        if let Some(flag) = changes.randomize_options {
            quiz.randomize_options = flag;
        }
        if let Some(flag) = changes.is_active {
            quiz.is_active = flag;
        }
        quiz.updated_at = Utc::now();
        Ok(Some(quiz.clone()))
    }

    async fn delete_quiz(&self, id: i64) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        if t.quizzes.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: Vec<i64> = t.questions.values().filter(|q| q.quiz_id == id).map(|q| q.id).collect();
        for question_id in doomed {
            t.remove_question(question_id);
        }
        Ok(true)
    }

    async fn get_questions_by_quiz(&self, quiz_id: i64) -> AppResult<Vec<QuestionWithOptions>> {
        let t = self.tables.read().await;
        let mut questions: Vec<&Question> = t.questions.values().filter(|q| q.quiz_id == quiz_id).collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        Ok(questions
            .into_iter()
            .map(|q| QuestionWithOptions { question: q.clone(), options: t.options_of(q.id) })
            .collect())
    }

    async fn get_options_by_question(&self, question_id: i64) -> AppResult<Vec<AnswerOption>> {
        Ok(self.tables.read().await.options_of(question_id))
    }

    async fn create_question(&self, quiz_id: i64, question: &NewQuestion) -> AppResult<QuestionWithOptions> {
        let mut t = self.tables.write().await;
        if !t.quizzes.contains_key(&quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        let order_index = t
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.order_index + 1)
            .max()
            .unwrap_or(0);
        let id = t.id();
        let now = Utc::now();
        let created = Question {
            id,
            quiz_id,
            content: question.content.clone(),
            order_index,
            created_at: now,
            updated_at: now,
        };
        t.questions.insert(id, created.clone());
        t.replace_options(id, &question.options);
        Ok(QuestionWithOptions { question: created, options: t.options_of(id) })
    }

    async fn update_question(
        &self,
        quiz_id: i64,
        question_id: i64,
        content: Option<&str>,
        options: Option<&[CreateOptionRequest]>,
    ) -> AppResult<Option<QuestionWithOptions>> {
        let mut t = self.tables.write().await;
        let Some(question) = t.questions.get_mut(&question_id).filter(|q| q.quiz_id == quiz_id) else {
            return Ok(None);
        };
        if let Some(content) = content {
            question.content = content.to_string();
        }
        question.updated_at = Utc::now();
        let question = question.clone();
        if let Some(options) = options {
            t.replace_options(question_id, options);
        }
        Ok(Some(QuestionWithOptions { options: t.options_of(question_id), question }))
    }

    async fn delete_question(&self, quiz_id: i64, question_id: i64) -> AppResult<bool> {
        let mut t = self.tables.write().await;
        let owned = t.questions.get(&question_id).is_some_and(|q| q.quiz_id == quiz_id);
        if owned {
            t.remove_question(question_id);
        }
        Ok(owned)
    }

    async fn get_submission(&self, id: i64) -> AppResult<Option<Submission>> {
        Ok(self.tables.read().await.submissions.get(&id).cloned())
    }

    async fn get_in_progress_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>> {
        let t = self.tables.read().await;
        Ok(t.submissions
            .values()
            .find(|s| s.user_id == user_id && s.quiz_id == quiz_id && !s.is_completed)
            .cloned())
    }

    async fn latest_completed_submission(&self, user_id: i64, quiz_id: i64) -> AppResult<Option<Submission>> {
        let t = self.tables.read().await;
        Ok(t.submissions
            .values()
            .filter(|s| s.user_id == user_id && s.quiz_id == quiz_id && s.is_completed)
            .max_by_key(|s| (s.updated_at, s.id))
            .cloned())
    }

    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t
            .submissions
            .values()
            .find(|s| s.user_id == submission.user_id && s.quiz_id == submission.quiz_id && !s.is_completed)
        {
            return Ok(existing.clone());
        }
        let id = t.id();
        let now = Utc::now();
        let created = Submission {
            id,
            user_id: submission.user_id,
            quiz_id: submission.quiz_id,
            score: 0.0,
            is_completed: false,
            question_order: submission.question_order,
            option_orders: submission.option_orders,
            answers: Answers::new(),
            created_at: now,
            updated_at: now,
        };
        t.submissions.insert(id, created.clone());
        Ok(created)
    }

    async fn list_submissions(
        &self,
        quiz_id: i64,
        user_id: Option<i64>,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Submission>> {
        let t = self.tables.read().await;
        let mut matching: Vec<&Submission> = t
            .submissions
            .values()
            .filter(|s| s.quiz_id == quiz_id && user_id.is_none_or(|u| s.user_id == u))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page(matching.into_iter().cloned(), skip, limit))
    }

    async fn merge_answers(&self, id: i64, answers: &Answers) -> AppResult<Option<Submission>> {
        let mut t = self.tables.write().await;
        let Some(submission) = t.submissions.get_mut(&id).filter(|s| !s.is_completed) else {
            return Ok(None);
        };
        submission.answers.extend(answers.iter().map(|(q, o)| (*q, *o)));
        submission.updated_at = Utc::now();
        Ok(Some(submission.clone()))
    }

    async fn complete_submission(&self, id: i64, graded: &Answers, score: f64) -> AppResult<Option<Submission>> {
        let mut t = self.tables.write().await;
        let Some(submission) = t
            .submissions
            .get_mut(&id)
            .filter(|s| !s.is_completed && s.answers == *graded)
        else {
            return Ok(None);
        };
        submission.score = score;
        submission.is_completed = true;
        submission.updated_at = Utc::now();
        Ok(Some(submission.clone()))
    }

    async fn save_session(&self, user_id: i64, submission_id: i64, current_answers: &Answers) -> AppResult<AttemptSession> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        if let Some(session) = t.sessions.get_mut(&(user_id, submission_id)) {
            session.current_answers = current_answers.clone();
            session.updated_at = now;
            return Ok(session.clone());
        }
        let id = t.id();
        let session = AttemptSession {
            id,
            user_id,
            submission_id,
            session_key: AttemptSession::key_for(user_id, submission_id),
            current_answers: current_answers.clone(),
            created_at: now,
            updated_at: now,
        };
        t.sessions.insert((user_id, submission_id), session.clone());
        Ok(session)
    }

    async fn get_session(&self, user_id: i64, submission_id: i64) -> AppResult<Option<AttemptSession>> {
        Ok(self.tables.read().await.sessions.get(&(user_id, submission_id)).cloned())
    }
}
