// tests/pg_store_tests.rs
//
// Run with a disposable database:
//   DATABASE_URL=postgres://... cargo test --test pg_store_tests -- --ignored

use std::collections::BTreeMap;

use quiz_backend::{
    error::AppError,
    models::{
        question::{CreateOptionRequest, NewQuestion},
        quiz::{CreateQuizRequest, UpdateQuizRequest},
        submission::{Answers, NewSubmission, QuestionSlot},
        user::{NewUser, ROLE_ADMIN, UserChanges},
    },
    store::{PgStore, QuizStore},
};
use sqlx::postgres::PgPoolOptions;

async fn store() -> PgStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    PgStore::new(pool)
}

async fn user(store: &PgStore, role: &str) -> i64 {
    store
        .create_user(NewUser {
            username: format!("pg_{}", &uuid::Uuid::new_v4().to_string()[..8]),
            password: "not-a-real-hash".to_string(),
            role: role.to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn quiz(store: &PgStore, owner: i64) -> i64 {
    store
        .create_quiz(
            owner,
            &CreateQuizRequest {
                title: "Pg quiz".to_string(),
                description: None,
                questions_per_quiz: Some(2),
                randomize_questions: true,
                randomize_options: false,
                is_active: true,
            },
        )
        .await
        .unwrap()
        .id
}

fn new_question(content: &str) -> NewQuestion {
    NewQuestion {
        content: content.to_string(),
        options: vec![
            CreateOptionRequest { content: "yes".into(), is_correct: true },
            CreateOptionRequest { content: "no".into(), is_correct: false },
            CreateOptionRequest { content: "maybe".into(), is_correct: false },
        ],
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn questions_are_ordered_and_cascade() {
    let store = store().await;
    let admin = user(&store, ROLE_ADMIN).await;
    let quiz_id = quiz(&store, admin).await;

    let a = store.create_question(quiz_id, &new_question("A")).await.unwrap();
    let b = store.create_question(quiz_id, &new_question("B")).await.unwrap();
    assert_eq!(a.question.order_index, 0);
    assert_eq!(b.question.order_index, 1);

    let pool = store.get_questions_by_quiz(quiz_id).await.unwrap();
    assert_eq!(pool.iter().map(|q| q.id()).collect::<Vec<_>>(), vec![a.id(), b.id()]);
    assert_eq!(pool[0].options.iter().map(|o| o.order_index).collect::<Vec<_>>(), vec![0, 1, 2]);

    assert!(store.delete_quiz(quiz_id).await.unwrap());
    assert!(store.get_options_by_question(a.id()).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn create_question_on_missing_quiz_writes_nothing() {
    let store = store().await;
    assert!(store.create_question(i64::MAX, &new_question("orphan")).await.is_err());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn sample_size_can_be_reset_to_null() {
    let store = store().await;
    let admin = user(&store, ROLE_ADMIN).await;
    let quiz_id = quiz(&store, admin).await;

    let untouched = store
        .update_quiz(quiz_id, &UpdateQuizRequest { title: Some("Renamed".into()), ..Default::default() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.questions_per_quiz, Some(2));

    let reset = store
        .update_quiz(quiz_id, &UpdateQuizRequest { questions_per_quiz: Some(None), ..Default::default() })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reset.questions_per_quiz, None);
    assert_eq!(reset.title, "Renamed");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn racing_starts_resolve_to_one_row() {
    let store = store().await;
    let admin = user(&store, ROLE_ADMIN).await;
    let taker = user(&store, "user").await;
    let quiz_id = quiz(&store, admin).await;

    let new = || NewSubmission {
        user_id: taker,
        quiz_id,
        question_order: vec![QuestionSlot { question_id: 1, order_index: 0 }],
        option_orders: BTreeMap::new(),
    };
    let (a, b) = tokio::join!(store.create_submission(new()), store.create_submission(new()));
    assert_eq!(a.unwrap().id, b.unwrap().id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn answers_merge_and_completion_is_final() {
    let store = store().await;
    let admin = user(&store, ROLE_ADMIN).await;
    let taker = user(&store, "user").await;
    let quiz_id = quiz(&store, admin).await;

    let sub = store
        .create_submission(NewSubmission {
            user_id: taker,
            quiz_id,
            question_order: Vec::new(),
            option_orders: BTreeMap::new(),
        })
        .await
        .unwrap();

    store.merge_answers(sub.id, &Answers::from([(1, 10)])).await.unwrap();
    let merged = store.merge_answers(sub.id, &Answers::from([(2, 20)])).await.unwrap().unwrap();
    assert_eq!(merged.answers, Answers::from([(1, 10), (2, 20)]));

    let done = store.complete_submission(sub.id, &merged.answers, 50.0).await.unwrap().unwrap();
    assert!(done.is_completed);
    assert!(store.complete_submission(sub.id, &merged.answers, 100.0).await.unwrap().is_none());
    assert!(store.merge_answers(sub.id, &Answers::from([(3, 30)])).await.unwrap().is_none());

    let stored = store.get_submission(sub.id).await.unwrap().unwrap();
    assert_eq!(stored.score, 50.0);
    assert_eq!(stored.answers.len(), 2);

    let session = store.save_session(taker, sub.id, &Answers::from([(1, 11)])).await.unwrap();
    let again = store.save_session(taker, sub.id, &Answers::from([(1, 12)])).await.unwrap();
    assert_eq!(session.id, again.id);
    assert_eq!(again.current_answers.get(&1), Some(&12));
}

async fn fresh_submission(store: &PgStore) -> i64 {
    let admin = user(store, ROLE_ADMIN).await;
    let taker = user(store, "user").await;
    let quiz_id = quiz(store, admin).await;
    store
        .create_submission(NewSubmission {
            user_id: taker,
            quiz_id,
            question_order: Vec::new(),
            option_orders: BTreeMap::new(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_merges_keep_every_key() {
    let store = store().await;
    let id = fresh_submission(&store).await;

    let first = Answers::from([(1, 10)]);
    let second = Answers::from([(2, 20)]);
    let (a, b) = tokio::join!(
        store.merge_answers(id, &first),
        store.merge_answers(id, &second),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let stored = store.get_submission(id).await.unwrap().unwrap();
    assert_eq!(stored.answers, Answers::from([(1, 10), (2, 20)]));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn completion_waits_for_the_graded_answers() {
    let store = store().await;
    let id = fresh_submission(&store).await;

    let graded = store.merge_answers(id, &Answers::from([(1, 10)])).await.unwrap().unwrap().answers;
    store.merge_answers(id, &Answers::from([(2, 20)])).await.unwrap().unwrap();

    assert!(store.complete_submission(id, &graded, 100.0).await.unwrap().is_none());
    let stored = store.get_submission(id).await.unwrap().unwrap();
    assert!(!stored.is_completed);
    assert_eq!(stored.score, 0.0);

    let done = store.complete_submission(id, &stored.answers, 50.0).await.unwrap().unwrap();
    assert!(done.is_completed);
    assert_eq!(done.score, 50.0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn users_can_be_listed_and_renamed() {
    let store = store().await;
    let id = user(&store, "user").await;

    let renamed = format!("pg_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let updated = store
        .update_user(
            id,
            &UserChanges { username: Some(renamed.clone()), is_active: Some(false), ..Default::default() },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.username, renamed);
    assert!(!updated.is_active);

    let other = user(&store, "user").await;
    let clash = UserChanges { username: Some(renamed), ..Default::default() };
    assert!(matches!(store.update_user(other, &clash).await, Err(AppError::Conflict(_))));

    assert!(!store.list_users(0, 1).await.unwrap().is_empty());
}
