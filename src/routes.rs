// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    handlers::{auth, participant, pools, questions, sessions, templates},
    state::AppState,
    utils::jwt::auth_middleware,
};

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Examiner routes (questions, pools, templates, sessions) require a bearer token.
/// * Participant routes under `/api/take` are public and optionally rate limited.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(require_auth.clone()),
        );

    let examiner_routes = Router::new()
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/pools", get(pools::list_pools).post(pools::create_pool))
        .route(
            "/pools/{id}",
            get(pools::get_pool)
                .put(pools::update_pool)
                .delete(pools::delete_pool),
        )
        .route(
            "/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::launch_session),
        )
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}/cancel", post(sessions::cancel_session))
        .route("/sessions/{id}/results", get(sessions::session_results))
        .route(
            "/sessions/{id}/participants/{code}",
            get(sessions::participant_detail),
        )
        .layer(require_auth);

    let mut take_routes = Router::new()
        .route("/redeem", post(participant::redeem))
        .route("/{code}", get(participant::resume))
        .route("/{code}/submit", post(participant::submit));

    // Keyed by peer IP, so the server must be served with connect info.
    if let Some(per_second) = state.config.rate_limit_per_second {
        match GovernorConfigBuilder::default()
            .per_second(per_second)
            .burst_size(state.config.rate_limit_burst)
            .finish()
        {
            Some(conf) => take_routes = take_routes.layer(GovernorLayer::new(Arc::new(conf))),
            None => tracing::warn!("Invalid rate limit settings, participant routes are not limited"),
        }
    }

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", examiner_routes)
        .nest("/api/take", take_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
