// src/routes.rs

use axum::{
    Router,
    handler::Handler,
    http::{Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, health, questions, quizzes, submissions, users},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: health, register, login.
/// * Everything else requires a bearer token; authoring routes additionally
///   require the admin role.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route(
            "/api/quizzes",
            get(quizzes::list_quizzes).post(quizzes::create_quiz.layer(middleware::from_fn(admin_middleware))),
        )
        .route(
            "/api/quizzes/{id}",
            get(quizzes::get_quiz)
                .put(quizzes::update_quiz.layer(middleware::from_fn(admin_middleware)))
                .delete(quizzes::delete_quiz.layer(middleware::from_fn(admin_middleware))),
        )
        .route(
            "/api/quizzes/{id}/questions",
            get(questions::list_questions).post(questions::create_question.layer(middleware::from_fn(admin_middleware))),
        )
        .route(
            "/api/quizzes/{id}/questions/{question_id}",
            get(questions::get_question)
                .put(questions::update_question.layer(middleware::from_fn(admin_middleware)))
                .delete(questions::delete_question.layer(middleware::from_fn(admin_middleware))),
        );

    let submission_routes = Router::new()
        .route(
            "/api/quizzes/{id}/submissions",
            get(submissions::list_submissions).post(submissions::start_submission),
        )
        .route(
            "/api/quizzes/{id}/submissions/{submission_id}",
            get(submissions::get_submission),
        )
        .route(
            "/api/quizzes/{id}/submissions/{submission_id}/answers",
            put(submissions::submit_answers),
        )
        .route(
            "/api/quizzes/{id}/submissions/{submission_id}/submit",
            put(submissions::finalize_submission),
        )
        .route(
            "/api/quizzes/{id}/submissions/{submission_id}/result",
            get(submissions::get_result),
        )
        .route(
            "/api/quizzes/{id}/submissions/{submission_id}/session",
            get(submissions::get_session).put(submissions::save_session),
        );

    // Auth runs before any per-handler admin check.
    let protected = Router::new()
        .route("/api/users/me", get(auth::me).put(users::update_me))
        .route(
            "/api/users",
            get(users::list_users.layer(middleware::from_fn(admin_middleware)))
                .post(users::create_user.layer(middleware::from_fn(admin_middleware))),
        )
        .merge(quiz_routes)
        .merge(submission_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        cache::NoopCache,
        services::testing::{test_config, test_state},
        store::MemoryStore,
        utils::jwt::sign_jwt,
    };

    fn app() -> Router {
        create_router(test_state(Arc::new(MemoryStore::new()), Arc::new(NoopCache)))
    }

    fn bearer(id: i64, role: &str) -> String {
        let config = test_config();
        let token = sign_jwt(id, role, &config.jwt_secret, 60).unwrap();
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let response = app()
            .oneshot(Request::get("/api/quizzes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authoring_needs_the_admin_role() {
        let request = Request::post("/api/quizzes")
            .header(header::AUTHORIZATION, bearer(7, "user"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Nope"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found_for_admins_too() {
        let request = Request::get("/api/quizzes/999")
            .header(header::AUTHORIZATION, bearer(1, "admin"))
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_directory_is_admin_only() {
        let request = Request::get("/api/users")
            .header(header::AUTHORIZATION, bearer(7, "user"))
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let request = Request::get("/api/users")
            .header(header::AUTHORIZATION, bearer(1, "admin"))
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
