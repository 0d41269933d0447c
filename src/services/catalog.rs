// src/services/catalog.rs
//
// Quiz authoring and the read-through quiz bundle.

use validator::Validate;

use crate::{
    cache::{self, keys},
    error::{AppError, AppResult},
    models::{
        question::{
            CreateOptionRequest, CreateQuestionRequest, NewQuestion, PublicQuestion, QuestionView,
            QuestionWithOptions, UpdateQuestionRequest,
        },
        quiz::{
            AttemptStatus, CreateQuizRequest, ListParams, Quiz, QuizBundle, QuizDetail, QuizWithStatus,
            UpdateQuizRequest,
        },
    },
    state::AppState,
    utils::{
        html::{clean_html, clean_opt},
        jwt::Caller,
    },
};

/// Quiz plus its whole pool, through the cache. `None` when the quiz is gone.
pub async fn load_quiz_bundle(state: &AppState, quiz_id: i64) -> AppResult<Option<QuizBundle>> {
    let key = keys::quiz_bundle(quiz_id);
    if let Some(bundle) = cache::get_json::<QuizBundle>(state.cache(), &key).await {
        return Ok(Some(bundle));
    }

    let Some(quiz) = state.store().get_quiz(quiz_id).await? else {
        return Ok(None);
    };
    let questions = state.store().get_questions_by_quiz(quiz_id).await?;
    let bundle = QuizBundle { quiz, questions };

    cache::set_json(state.cache(), &key, &bundle, state.config.cache_ttl_seconds).await;
    Ok(Some(bundle))
}

/// The bundle, provided `caller` may see the quiz. Inactive quizzes are
/// hidden from everyone but admins.
pub async fn visible_bundle(state: &AppState, caller: Caller, quiz_id: i64) -> AppResult<QuizBundle> {
    match load_quiz_bundle(state, quiz_id).await? {
        Some(bundle) if bundle.quiz.is_active || caller.is_admin => Ok(bundle),
        _ => Err(AppError::NotFound("Quiz not found".to_string())),
    }
}

async fn invalidate_quiz(state: &AppState, quiz_id: i64) {
    cache::invalidate(state.cache(), &keys::quiz_prefix(quiz_id)).await;
    cache::invalidate(state.cache(), keys::QUIZ_LISTS_PREFIX).await;
}

fn sanitize_quiz(mut req: CreateQuizRequest) -> CreateQuizRequest {
    req.title = clean_html(&req.title);
    req.description = clean_opt(req.description.as_deref());
    req
}

fn sanitize_options(options: &[CreateOptionRequest]) -> Vec<CreateOptionRequest> {
    options
        .iter()
        .map(|o| CreateOptionRequest { content: clean_html(&o.content), is_correct: o.is_correct })
        .collect()
}

pub async fn create_quiz(state: &AppState, caller: Caller, req: CreateQuizRequest) -> AppResult<Quiz> {
    req.validate()?;
    let quiz = state.store().create_quiz(caller.id, &sanitize_quiz(req)).await?;
    tracing::info!("Quiz {} created by user {}", quiz.id, caller.id);
    invalidate_quiz(state, quiz.id).await;
    Ok(quiz)
}

pub async fn quiz_detail(state: &AppState, caller: Caller, quiz_id: i64) -> AppResult<QuizDetail> {
    let bundle = visible_bundle(state, caller, quiz_id).await?;
    Ok(QuizDetail { total_questions: bundle.questions.len(), quiz: bundle.quiz })
}

pub async fn update_quiz(
    state: &AppState,
    quiz_id: i64,
    mut req: UpdateQuizRequest,
) -> AppResult<Quiz> {
    req.check()?;
    req.title = clean_opt(req.title.as_deref());
    req.description = clean_opt(req.description.as_deref());

    let quiz = state
        .store()
        .update_quiz(quiz_id, &req)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
    invalidate_quiz(state, quiz_id).await;
    Ok(quiz)
}

pub async fn delete_quiz(state: &AppState, quiz_id: i64) -> AppResult<()> {
    if !state.store().delete_quiz(quiz_id).await? {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    tracing::info!("Quiz {} deleted", quiz_id);
    invalidate_quiz(state, quiz_id).await;
    Ok(())
}

/// The caller's progress on one quiz.
pub async fn attempt_status(
    state: &AppState,
    user_id: i64,
    quiz_id: i64,
) -> AppResult<(AttemptStatus, Option<i64>, Option<f64>)> {
    if let Some(s) = state.store().get_in_progress_submission(user_id, quiz_id).await? {
        return Ok((AttemptStatus::InProgress, Some(s.id), None));
    }
    if let Some(s) = state.store().latest_completed_submission(user_id, quiz_id).await? {
        return Ok((AttemptStatus::Completed, Some(s.id), Some(s.score)));
    }
    Ok((AttemptStatus::NotStarted, None, None))
}

async fn active_quizzes(state: &AppState, skip: i64, limit: i64) -> AppResult<Vec<Quiz>> {
    let key = keys::active_quizzes(skip, limit);
    if let Some(quizzes) = cache::get_json::<Vec<Quiz>>(state.cache(), &key).await {
        return Ok(quizzes);
    }
    let quizzes = state.store().list_active_quizzes(skip, limit).await?;
    cache::set_json(state.cache(), &key, &quizzes, state.config.cache_ttl_seconds).await;
    Ok(quizzes)
}

/// Admins list the quizzes they own; everyone else lists active quizzes.
/// Each entry carries the caller's own attempt status.
pub async fn list_quizzes(
    state: &AppState,
    caller: Caller,
    params: ListParams,
) -> AppResult<Vec<QuizWithStatus>> {
    let quizzes = if caller.is_admin {
        state
            .store()
            .list_quizzes_by_owner(caller.id, params.skip(), params.limit())
            .await?
    } else {
        active_quizzes(state, params.skip(), params.limit()).await?
    };

    let mut listing = Vec::with_capacity(quizzes.len());
    for quiz in quizzes {
        let (status, submission_id, score) = attempt_status(state, caller.id, quiz.id).await?;
        listing.push(QuizWithStatus { quiz, status, submission_id, score });
    }
    Ok(listing)
}

pub async fn create_question(
    state: &AppState,
    quiz_id: i64,
    req: CreateQuestionRequest,
) -> AppResult<QuestionWithOptions> {
    req.validate()?;
    let new = NewQuestion {
        content: clean_html(&req.content),
        options: sanitize_options(&req.options),
    };
    let question = state.store().create_question(quiz_id, &new).await?;
    tracing::info!("Question {} added to quiz {}", question.id(), quiz_id);
    invalidate_quiz(state, quiz_id).await;
    Ok(question)
}

/// Single question. Authors see correctness flags; quiz-takers get the
/// public form with options in default order.
pub async fn get_question(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    question_id: i64,
) -> AppResult<QuestionView> {
    let bundle = visible_bundle(state, caller, quiz_id).await?;
    let question = bundle
        .questions
        .into_iter()
        .find(|q| q.id() == question_id)
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    if caller.is_admin {
        Ok(QuestionView::Full(question))
    } else {
        let position = question.question.order_index.max(0) as usize;
        Ok(QuestionView::Public(PublicQuestion::from_view(position, &question)))
    }
}

pub async fn update_question(
    state: &AppState,
    quiz_id: i64,
    question_id: i64,
    req: UpdateQuestionRequest,
) -> AppResult<QuestionWithOptions> {
    req.validate()?;
    let content = clean_opt(req.content.as_deref());
    let options = req.options.as_deref().map(sanitize_options);

    let question = state
        .store()
        .update_question(quiz_id, question_id, content.as_deref(), options.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    invalidate_quiz(state, quiz_id).await;
    Ok(question)
}

pub async fn delete_question(state: &AppState, quiz_id: i64, question_id: i64) -> AppResult<()> {
    if !state.store().delete_question(quiz_id, question_id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    invalidate_quiz(state, quiz_id).await;
    Ok(())
}
