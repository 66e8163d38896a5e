// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, progress, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, progress, quiz).
/// * Applies global middleware (Trace, CORS, no-store caching).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins: [HeaderValue; 2] = [
        "http://127.0.0.1:3000".parse().unwrap(),
        "https://adaptlearn-frontend.netlify.app".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Progress responses change on every quiz submission; stale caches
    // were a real problem for the frontend.
    let no_store = SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );

    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        // Protected: deleting an account requires a valid token
        .merge(
            Router::new()
                .route("/delete", delete(auth::delete_account))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let progress_routes = Router::new()
        .route("/enroll", post(progress::enroll))
        .route("/courses", get(progress::list_courses))
        .route("/topics/{course_name}", get(progress::course_topics))
        .route("/update", post(progress::update_progress))
        .route("/summary", get(progress::summary))
        .route("/user", get(progress::user_progress))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let quiz_routes = Router::new()
        .route("/save", post(quiz::save_quiz))
        .route("/history", get(quiz::quiz_history))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(|| async { "AdaptLearn Backend is running" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/progress", progress_routes)
        .nest("/api/quiz", quiz_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(no_store)
        .with_state(state)
}
