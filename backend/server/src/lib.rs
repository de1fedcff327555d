//! Server-rendered pet nutrition platform.
//!
//! Marketing pages, a blog with ratings and comments, pet profiles with a breed lookup, AI
//! meal/health reports counted against a monthly plan, all rendered on the server in English or
//! Korean. The client only carries one small script (`/assets/app.js`) for the breed lookup and the
//! loading overlay shown before an AI report request.
//!
//!
//!
//! # General Infrastructure
//! - One axum process, state shared behind an `Arc`
//! - Breeds and plans come from the protobuf catalog written by the `process` CLI
//! - Everything users create lives behind [`store::Store`], Redis when `REDIS_URL` is set, memory otherwise
//! - Report generation is a [`reports::ReportGenerator`], an HTTP service when `AI_ENDPOINT` is set
//!
//!
//!
//! # Request Flow
//! 1. [`session::session_layer`] loads the session named by the `sessionid` cookie
//! 2. Extractors resolve the user ([`session::CurrentUser`]), check the CSRF token ([`forms::CsrfForm`])
//!    and build the rendering context ([`render::Page`])
//! 3. The handler loads data, renders or redirects with a flash
//! 4. [`error::error_page_layer`] turns error responses into translated pages
//! 5. The session layer saves the session if it changed and sets the cookie
//!
//!
//!
//! # Setup
//!
//! Build the catalog once, then start the server.
//! ```sh
//! cargo run -p process -- --seed data/seed.json
//! SEED_POSTS_PATH=data/posts.json cargo run -p pawfeed
//! ```
//!
//! Verbose logs.
//! ```sh
//! RUST_LOG=server=debug,tower_http=debug cargo run -p pawfeed
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod flash;
pub mod forms;
pub mod i18n;
pub mod models;
pub mod render;
pub mod reports;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

use error::error_page_layer;
use routes::{accounts, blog, pages, pets, plans};
use session::session_layer;
use state::{AppState, StartupError};

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/about/", get(pages::about))
        .route("/dashboard/", get(pages::dashboard))
        .route("/blog/", get(blog::list))
        .route("/blog/{slug}/", get(blog::detail))
        .route("/blog/{slug}/rate/", post(blog::rate))
        .route("/blog/{slug}/comment/", post(blog::comment))
        .route("/pets/", get(pets::list))
        .route("/pets/new/", get(pets::new_form).post(pets::create))
        .route("/pets/breeds/", get(pets::breeds))
        .route("/pets/{id}/edit/", get(pets::edit_form).post(pets::update))
        .route(
            "/pets/{id}/delete/",
            get(pets::confirm_delete).post(pets::delete),
        )
        .route("/pets/{id}/ai-meal/", get(pets::ai_meal))
        .route("/pets/{id}/ai-health/", get(pets::ai_health))
        .route("/reports/{id}/", get(pages::report))
        .route("/plans/", get(plans::list))
        .route("/plans/update/", post(plans::update))
        .route("/i18n/setlang/", post(pages::set_language))
        .route(
            "/accounts/login/",
            get(accounts::login_form).post(accounts::login),
        )
        .route("/accounts/logout/", post(accounts::logout))
        .route(
            "/accounts/register/",
            get(accounts::register_form).post(accounts::register),
        )
        .route("/assets/app.js", get(pages::script))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), error_page_layer))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
