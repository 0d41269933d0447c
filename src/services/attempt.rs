//! Submission State Machine.
//!
//! `NOT_STARTED` (no row) -> `IN_PROGRESS` (`is_completed = false`) ->
//! `COMPLETED` (terminal). Every operation checks ownership first, then the
//! lifecycle state, and only then writes.

use crate::{
    error::{AppError, AppResult},
    models::{
        question::{PageParams, PublicQuestion, QuestionPage, QuestionWithOptions},
        quiz::ListParams,
        session::{AttemptSession, QuizSessionResponse},
        submission::{
            AnswerSubmit, Answers, NewSubmission, QuestionOutcome, ReviewedOption, ReviewedQuestion, Submission,
            SubmissionResult, SubmissionSummary, SubmissionWithQuestions,
        },
    },
    services::{
        catalog::{load_quiz_bundle, visible_bundle},
        grading,
        selector::{SelectionConfig, replay, resolve_view},
    },
    state::AppState,
    utils::jwt::Caller,
};

/// Regrades allowed when answers keep arriving during finalize.
const FINALIZE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

fn public_questions(questions: &[QuestionWithOptions]) -> Vec<PublicQuestion> {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| PublicQuestion::from_view(i, q))
        .collect()
}

/// Replays the submission's frozen view against the current pool.
fn frozen_view(submission: &Submission, pool: &[QuestionWithOptions]) -> Vec<QuestionWithOptions> {
    replay(&submission.question_order, Some(&submission.option_orders), pool)
}

/// Loads a submission of `quiz_id` the caller may access.
///
/// Non-owners are refused: reads are `Forbidden` unless the caller is an
/// admin; writes are `NotFound` for regular users and `Forbidden` for admins.
async fn load_submission(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
    access: Access,
) -> AppResult<Submission> {
    let submission = state
        .store()
        .get_submission(submission_id)
        .await?
        .filter(|s| s.quiz_id == quiz_id)
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    if submission.user_id == caller.id {
        return Ok(submission);
    }
    match (access, caller.is_admin) {
        (Access::Read, true) => Ok(submission),
        (Access::Read, false) => Err(AppError::Forbidden(
            "Not authorized to view this submission".to_string(),
        )),
        (Access::Write, true) => Err(AppError::Forbidden(
            "Admins cannot modify another user's submission".to_string(),
        )),
        (Access::Write, false) => Err(AppError::NotFound("Submission not found".to_string())),
    }
}

fn ensure_in_progress(submission: &Submission) -> AppResult<()> {
    if submission.is_completed {
        return Err(AppError::InvalidState("Submission is already completed".to_string()));
    }
    Ok(())
}

/// Start-or-resume. An in-progress attempt is returned unchanged; otherwise
/// a new one is created with its view frozen right away.
///
/// An attempt already underway resumes even after the quiz was deactivated;
/// only new attempts need the quiz to be visible.
pub async fn start(state: &AppState, caller: Caller, quiz_id: i64) -> AppResult<SubmissionWithQuestions> {
    if let Some(existing) = state.store().get_in_progress_submission(caller.id, quiz_id).await? {
        let bundle = load_quiz_bundle(state, quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;
        let questions = public_questions(&frozen_view(&existing, &bundle.questions));
        return Ok(SubmissionWithQuestions { submission: existing, questions });
    }

    let bundle = visible_bundle(state, caller, quiz_id).await?;

    let view = resolve_view(
        &SelectionConfig::for_quiz(&bundle.quiz, caller.is_admin),
        None,
        None,
        &bundle.questions,
        &mut rand::thread_rng(),
    );

    // Under a concurrent start the store hands back the winner's row.
    let submission = state
        .store()
        .create_submission(NewSubmission {
            user_id: caller.id,
            quiz_id,
            question_order: view.question_order,
            option_orders: view.option_orders,
        })
        .await?;
    tracing::info!("User {} started submission {} on quiz {}", caller.id, submission.id, quiz_id);

    let questions = public_questions(&frozen_view(&submission, &bundle.questions));
    Ok(SubmissionWithQuestions { submission, questions })
}

/// The caller's question view, one page at a time. Authors get the whole
/// pool in default order with answer flags and no attempt is created.
pub async fn questions_for_caller(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    params: PageParams,
) -> AppResult<QuestionPage> {
    if caller.is_admin {
        let bundle = visible_bundle(state, caller, quiz_id).await?;
        let view = resolve_view(
            &SelectionConfig::for_quiz(&bundle.quiz, true),
            None,
            None,
            &bundle.questions,
            &mut rand::thread_rng(),
        );
        return Ok(params.paginate(view.questions, None));
    }

    let attempt = start(state, caller, quiz_id).await?;
    Ok(params.paginate(attempt.questions, Some(attempt.submission.id)))
}

pub async fn get_submission(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
) -> AppResult<SubmissionWithQuestions> {
    let submission = load_submission(state, caller, quiz_id, submission_id, Access::Read).await?;
    let pool = load_quiz_bundle(state, quiz_id)
        .await?
        .map(|b| b.questions)
        .unwrap_or_default();
    let questions = public_questions(&frozen_view(&submission, &pool));
    Ok(SubmissionWithQuestions { submission, questions })
}

/// The caller's own submissions for the quiz; admins see everyone's.
pub async fn list_submissions(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    params: ListParams,
) -> AppResult<Vec<SubmissionSummary>> {
    let owner = (!caller.is_admin).then_some(caller.id);
    let submissions = state
        .store()
        .list_submissions(quiz_id, owner, params.skip(), params.limit())
        .await?;
    Ok(submissions.iter().map(SubmissionSummary::from).collect())
}

/// Merges `answers` into the stored map. Later entries for the same
/// question win. Option membership is not checked here; grading treats a
/// foreign option as wrong.
pub async fn record_answers(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
    answers: Vec<AnswerSubmit>,
) -> AppResult<Submission> {
    let submission = load_submission(state, caller, quiz_id, submission_id, Access::Write).await?;
    ensure_in_progress(&submission)?;

    let patch: Answers = answers
        .iter()
        .map(|a| (a.question_id, a.selected_option_id))
        .collect();

    match state.store().merge_answers(submission.id, &patch).await? {
        Some(updated) => Ok(updated),
        // Lost a race with finalize, or the row vanished.
        None => match state.store().get_submission(submission.id).await? {
            Some(s) if s.is_completed => {
                Err(AppError::InvalidState("Submission is already completed".to_string()))
            }
            _ => Err(AppError::NotFound("Submission not found".to_string())),
        },
    }
}

fn build_result(
    submission: &Submission,
    view: &[QuestionWithOptions],
    outcomes: Vec<QuestionOutcome>,
) -> SubmissionResult {
    let correct_answers = outcomes.iter().filter(|o| o.is_correct).count();
    let total_questions = outcomes.len();
    let questions = outcomes
        .into_iter()
        .map(|outcome| {
            let shown = view.iter().find(|q| q.id() == outcome.question_id);
            ReviewedQuestion {
                id: outcome.question_id,
                content: shown.map(|q| q.question.content.clone()).unwrap_or_default(),
                options: shown
                    .map(|q| {
                        q.options
                            .iter()
                            .map(|o| ReviewedOption { id: o.id, content: o.content.clone(), is_correct: o.is_correct })
                            .collect()
                    })
                    .unwrap_or_default(),
                outcome,
            }
        })
        .collect();

    SubmissionResult {
        submission: SubmissionSummary::from(submission),
        total_questions,
        correct_answers,
        questions,
    }
}

/// Grades the frozen view against the live answer key and completes the
/// attempt. Score and completion flag are written together, once, and only
/// if the stored answers are still the ones that were graded. Answers merged
/// while grading was in flight trigger a regrade.
pub async fn finalize(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
) -> AppResult<SubmissionResult> {
    let mut submission = load_submission(state, caller, quiz_id, submission_id, Access::Write).await?;
    ensure_in_progress(&submission)?;

    let pool = load_quiz_bundle(state, quiz_id)
        .await?
        .map(|b| b.questions)
        .unwrap_or_default();
    let presented = submission.presented_question_ids();

    for _ in 0..FINALIZE_ATTEMPTS {
        let outcomes = grading::breakdown(&presented, &pool, &submission.answers);
        let score = grading::score(&outcomes);

        if let Some(completed) = state
            .store()
            .complete_submission(submission.id, &submission.answers, score)
            .await?
        {
            tracing::info!(
                "Submission {} completed by user {} with score {:.2}",
                completed.id,
                caller.id,
                score
            );
            return Ok(build_result(&completed, &frozen_view(&completed, &pool), outcomes));
        }

        // Finalized elsewhere, or answers changed since they were read.
        submission = state
            .store()
            .get_submission(submission.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;
        ensure_in_progress(&submission)?;
        tracing::debug!("Answers of submission {} changed during grading, regrading", submission.id);
    }

    Err(AppError::Conflict(
        "Answers kept changing while the submission was being graded".to_string(),
    ))
}

/// Graded breakdown of a completed attempt. The stored score is reported
/// as is; per-question outcomes use the current answer key.
pub async fn result(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
) -> AppResult<SubmissionResult> {
    let submission = load_submission(state, caller, quiz_id, submission_id, Access::Read).await?;
    if !submission.is_completed {
        return Err(AppError::InvalidState("Submission is not completed yet".to_string()));
    }

    let pool = load_quiz_bundle(state, quiz_id)
        .await?
        .map(|b| b.questions)
        .unwrap_or_default();
    let outcomes = grading::breakdown(&submission.presented_question_ids(), &pool, &submission.answers);
    Ok(build_result(&submission, &frozen_view(&submission, &pool), outcomes))
}

/// Stores a UI resume snapshot. Owner only, in-progress only.
pub async fn save_session(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
    current_answers: Answers,
) -> AppResult<AttemptSession> {
    let submission = load_submission(state, caller, quiz_id, submission_id, Access::Write).await?;
    ensure_in_progress(&submission)?;
    state
        .store()
        .save_session(caller.id, submission.id, &current_answers)
        .await
}

/// Frozen questions plus the last snapshot, falling back to the
/// authoritative stored answers when none was saved.
pub async fn load_session(
    state: &AppState,
    caller: Caller,
    quiz_id: i64,
    submission_id: i64,
) -> AppResult<QuizSessionResponse> {
    let submission = load_submission(state, caller, quiz_id, submission_id, Access::Read).await?;
    let pool = load_quiz_bundle(state, quiz_id)
        .await?
        .map(|b| b.questions)
        .unwrap_or_default();

    let current_answers = state
        .store()
        .get_session(submission.user_id, submission.id)
        .await?
        .map(|s| s.current_answers)
        .unwrap_or_else(|| submission.answers.clone());

    Ok(QuizSessionResponse {
        submission_id: submission.id,
        questions: public_questions(&frozen_view(&submission, &pool)),
        current_answers,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{Cache, CacheError, MemoryCache, testing::BrokenCache};
    use crate::models::{question::QuestionView, quiz::UpdateQuizRequest};
    use crate::services::catalog;
    use crate::services::testing::{create_question_req, quiz_req, test_state};
    use crate::store::MemoryStore;

    const ADMIN: Caller = Caller { id: 1, is_admin: true };
    const ALICE: Caller = Caller { id: 2, is_admin: false };
    const BOB: Caller = Caller { id: 3, is_admin: false };

    /// Memory cache whose reads take a while, to widen race windows.
    struct SlowCache(MemoryCache);

    #[async_trait]
    impl Cache for SlowCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
            self.0.set(key, value, ttl_seconds).await
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.0.delete(key).await
        }

        async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
            self.0.clear_prefix(prefix).await
        }

        async fn connect(&self) -> Result<(), CacheError> {
            Ok(())
        }

        async fn teardown(&self) {}
    }

    fn state() -> AppState {
        test_state(Arc::new(MemoryStore::new()), Arc::new(MemoryCache::new()))
    }

    /// Quiz with `n` questions; the first option of each is correct.
    async fn seeded_quiz(state: &AppState, n: usize, randomize: bool) -> (i64, Vec<QuestionWithOptions>) {
        let mut req = quiz_req("Ownership");
        req.randomize_questions = randomize;
        req.randomize_options = randomize;
        let quiz = catalog::create_quiz(state, ADMIN, req).await.unwrap();
        let mut questions = Vec::new();
        for i in 0..n {
            let q = catalog::create_question(state, quiz.id, create_question_req(&format!("Q{i}")))
                .await
                .unwrap();
            questions.push(q);
        }
        (quiz.id, questions)
    }

    fn ids(questions: &[PublicQuestion]) -> Vec<i64> {
        questions.iter().map(|q| q.id).collect()
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 5, true).await;

        let first = start(&state, ALICE, quiz_id).await.unwrap();
        let second = start(&state, ALICE, quiz_id).await.unwrap();
        assert_eq!(first.submission.id, second.submission.id);
        assert_eq!(ids(&first.questions), ids(&second.questions));
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_attempt() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 3, true).await;

        let (a, b) = tokio::join!(start(&state, ALICE, quiz_id), start(&state, ALICE, quiz_id));
        assert_eq!(a.unwrap().submission.id, b.unwrap().submission.id);
    }

    #[tokio::test]
    async fn frozen_view_survives_quiz_changes() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 8, true).await;
        catalog::update_quiz(
            &state,
            quiz_id,
            UpdateQuizRequest { questions_per_quiz: Some(Some(4)), ..Default::default() },
        )
        .await
        .unwrap();

        let first = start(&state, ALICE, quiz_id).await.unwrap();
        assert_eq!(first.questions.len(), 4);

        catalog::update_quiz(
            &state,
            quiz_id,
            UpdateQuizRequest {
                questions_per_quiz: Some(None),
                randomize_questions: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        for _ in 0..3 {
            let page = questions_for_caller(&state, ALICE, quiz_id, PageParams::default()).await.unwrap();
            assert_eq!(page.submission_id, Some(first.submission.id));
            let again = get_submission(&state, ALICE, quiz_id, first.submission.id).await.unwrap();
            assert_eq!(ids(&again.questions), ids(&first.questions));
            let opts: Vec<Vec<i64>> = again.questions.iter().map(|q| q.options.iter().map(|o| o.id).collect()).collect();
            let before: Vec<Vec<i64>> = first.questions.iter().map(|q| q.options.iter().map(|o| o.id).collect()).collect();
            assert_eq!(opts, before);
        }
    }

    #[tokio::test]
    async fn answers_merge_across_calls() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 2, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;

        let a = AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[0].id };
        let b = AnswerSubmit { question_id: qs[1].id(), selected_option_id: qs[1].options[1].id };
        record_answers(&state, ALICE, quiz_id, sub.id, vec![a]).await.unwrap();
        let merged = record_answers(&state, ALICE, quiz_id, sub.id, vec![b]).await.unwrap();

        assert_eq!(
            merged.answers,
            Answers::from([(a.question_id, a.selected_option_id), (b.question_id, b.selected_option_id)])
        );
    }

    #[tokio::test]
    async fn finalize_scores_fifty_and_refuses_twice() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 2, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;

        record_answers(
            &state,
            ALICE,
            quiz_id,
            sub.id,
            vec![
                AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[0].id },
                AnswerSubmit { question_id: qs[1].id(), selected_option_id: qs[1].options[2].id },
            ],
        )
        .await
        .unwrap();

        let graded = finalize(&state, ALICE, quiz_id, sub.id).await.unwrap();
        assert_eq!(graded.submission.score, 50.0);
        assert_eq!(graded.correct_answers, 1);
        assert_eq!(graded.total_questions, 2);

        assert!(matches!(
            finalize(&state, ALICE, quiz_id, sub.id).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            record_answers(&state, ALICE, quiz_id, sub.id, vec![]).await,
            Err(AppError::InvalidState(_))
        ));

        let stored = state.store().get_submission(sub.id).await.unwrap().unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.score, 50.0);

        let again = result(&state, ALICE, quiz_id, sub.id).await.unwrap();
        assert_eq!(again.submission.score, 50.0);
        assert!(again.questions[1].outcome.is_answered);
        assert!(!again.questions[1].outcome.is_correct);
    }

    #[tokio::test]
    async fn empty_quiz_scores_zero() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 0, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;
        let graded = finalize(&state, ALICE, quiz_id, sub.id).await.unwrap();
        assert_eq!(graded.submission.score, 0.0);
        assert_eq!(graded.total_questions, 0);
    }

    #[tokio::test]
    async fn result_requires_completion() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 1, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;
        assert!(matches!(
            result(&state, ALICE, quiz_id, sub.id).await,
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn strangers_and_admins_are_kept_out_of_writes() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 1, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;
        let answer = vec![AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[0].id }];

        assert!(matches!(
            record_answers(&state, BOB, quiz_id, sub.id, answer.clone()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            record_answers(&state, ADMIN, quiz_id, sub.id, answer).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            finalize(&state, ADMIN, quiz_id, sub.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            get_submission(&state, BOB, quiz_id, sub.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(get_submission(&state, ADMIN, quiz_id, sub.id).await.is_ok());
        assert!(matches!(
            get_submission(&state, ALICE, quiz_id + 1, sub.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admins_see_the_pool_in_order_without_an_attempt() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 6, true).await;
        let expected: Vec<i64> = qs.iter().map(|q| q.id()).collect();

        for _ in 0..3 {
            let page = questions_for_caller(
                &state,
                ADMIN,
                quiz_id,
                PageParams { page: Some(1), items_per_page: Some(100) },
            )
            .await
            .unwrap();
            assert_eq!(page.submission_id, None);
            let got: Vec<i64> = page
                .items
                .iter()
                .map(|item| match item {
                    QuestionView::Full(q) => q.id(),
                    QuestionView::Public(q) => q.id,
                })
                .collect();
            assert_eq!(got, expected);
        }
        assert!(state.store().get_in_progress_submission(ADMIN.id, quiz_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_falls_back_to_stored_answers() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 2, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;
        let pick = AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[1].id };
        record_answers(&state, ALICE, quiz_id, sub.id, vec![pick]).await.unwrap();

        let resumed = load_session(&state, ALICE, quiz_id, sub.id).await.unwrap();
        assert_eq!(resumed.current_answers, Answers::from([(pick.question_id, pick.selected_option_id)]));
        assert_eq!(resumed.questions.len(), 2);

        let snapshot = Answers::from([(qs[1].id(), qs[1].options[0].id)]);
        save_session(&state, ALICE, quiz_id, sub.id, snapshot.clone()).await.unwrap();
        let resumed = load_session(&state, ALICE, quiz_id, sub.id).await.unwrap();
        assert_eq!(resumed.current_answers, snapshot);

        assert!(matches!(
            save_session(&state, BOB, quiz_id, sub.id, Answers::new()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn attempt_flow_works_with_a_dead_cache() {
        let state = test_state(Arc::new(MemoryStore::new()), Arc::new(BrokenCache));
        let (quiz_id, qs) = seeded_quiz(&state, 3, true).await;

        let first = start(&state, ALICE, quiz_id).await.unwrap();
        let second = start(&state, ALICE, quiz_id).await.unwrap();
        assert_eq!(ids(&first.questions), ids(&second.questions));

        let answers = qs
            .iter()
            .map(|q| AnswerSubmit { question_id: q.id(), selected_option_id: q.options[0].id })
            .collect();
        record_answers(&state, ALICE, quiz_id, first.submission.id, answers).await.unwrap();
        let graded = finalize(&state, ALICE, quiz_id, first.submission.id).await.unwrap();
        assert_eq!(graded.submission.score, 100.0);
    }

    #[tokio::test]
    async fn a_new_attempt_may_start_after_completion() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 1, false).await;
        let first = start(&state, ALICE, quiz_id).await.unwrap().submission;
        finalize(&state, ALICE, quiz_id, first.id).await.unwrap();

        let second = start(&state, ALICE, quiz_id).await.unwrap().submission;
        assert_ne!(first.id, second.id);

        let mine = list_submissions(&state, ALICE, quiz_id, ListParams { skip: None, limit: None })
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        let theirs = list_submissions(&state, BOB, quiz_id, ListParams { skip: None, limit: None })
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn concurrent_answer_writes_keep_both_keys() {
        let state = state();
        let (quiz_id, qs) = seeded_quiz(&state, 2, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;

        let a = AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[0].id };
        let b = AnswerSubmit { question_id: qs[1].id(), selected_option_id: qs[1].options[2].id };
        let (first, second) = tokio::join!(
            record_answers(&state, ALICE, quiz_id, sub.id, vec![a]),
            record_answers(&state, ALICE, quiz_id, sub.id, vec![b]),
        );
        first.unwrap();
        second.unwrap();

        let stored = state.store().get_submission(sub.id).await.unwrap().unwrap();
        assert_eq!(
            stored.answers,
            Answers::from([(a.question_id, a.selected_option_id), (b.question_id, b.selected_option_id)])
        );
    }

    #[tokio::test]
    async fn answers_accepted_during_finalize_are_graded() {
        let state = test_state(Arc::new(MemoryStore::new()), Arc::new(SlowCache(MemoryCache::new())));
        let (quiz_id, qs) = seeded_quiz(&state, 1, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;
        let pick = AnswerSubmit { question_id: qs[0].id(), selected_option_id: qs[0].options[0].id };

        // Finalize reads the answers, then stalls on the bundle read while the write lands.
        let (graded, recorded) = tokio::join!(finalize(&state, ALICE, quiz_id, sub.id), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            record_answers(&state, ALICE, quiz_id, sub.id, vec![pick]).await
        });
        recorded.unwrap();
        let graded = graded.unwrap();

        let stored = state.store().get_submission(sub.id).await.unwrap().unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.answers, Answers::from([(pick.question_id, pick.selected_option_id)]));
        assert_eq!(
            stored.score,
            grading::grade(&stored.presented_question_ids(), &qs, &stored.answers)
        );
        assert_eq!(stored.score, 100.0);
        assert_eq!(graded.submission.score, 100.0);
    }

    #[tokio::test]
    async fn attempts_underway_survive_deactivation() {
        let state = state();
        let (quiz_id, _) = seeded_quiz(&state, 2, false).await;
        let sub = start(&state, ALICE, quiz_id).await.unwrap().submission;

        catalog::update_quiz(
            &state,
            quiz_id,
            UpdateQuizRequest { is_active: Some(false), ..Default::default() },
        )
        .await
        .unwrap();

        let resumed = start(&state, ALICE, quiz_id).await.unwrap();
        assert_eq!(resumed.submission.id, sub.id);
        assert_eq!(resumed.questions.len(), 2);
        let page = questions_for_caller(&state, ALICE, quiz_id, PageParams::default()).await.unwrap();
        assert_eq!(page.submission_id, Some(sub.id));

        assert!(matches!(start(&state, BOB, quiz_id).await, Err(AppError::NotFound(_))));
    }
}
