use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    render::{Page, pages},
    session::Session,
    state::AppState,
    store::StoreError,
    utils::login_url,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("CSRF verification failed")]
    CsrfRejected,

    #[error("Login required")]
    LoginRequired { next: String },

    #[error("Not found")]
    NotFound,

    #[error("Session layer missing")]
    MissingSession,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Marks an error response. [`error_page_layer`] swaps its bare body for a page in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPage(pub StatusCode);

impl ErrorPage {
    /// Title and text message ids.
    pub fn message_ids(self) -> (&'static str, &'static str) {
        match self.0 {
            StatusCode::BAD_REQUEST => ("errors.bad_request_title", "errors.bad_request_text"),
            StatusCode::FORBIDDEN => ("errors.forbidden_title", "errors.forbidden_text"),
            StatusCode::NOT_FOUND => ("errors.not_found_title", "errors.not_found_text"),
            _ => ("errors.server_title", "errors.server_text"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::LoginRequired { ref next } => {
                return Redirect::to(&login_url(next)).into_response();
            }
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::CsrfRejected => {
                warn!("Rejected request with a bad CSRF token");
                StatusCode::FORBIDDEN
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MissingSession | AppError::Store(_) | AppError::InternalError(_) => {
                error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = (status, Html(bare_page(status))).into_response();
        response.extensions_mut().insert(ErrorPage(status));
        response
    }
}

/// Renders marked error responses through the layout, in the visitor's language.
///
/// Keeps the bare page when the session is missing or the page context cannot be built,
/// which is what happens when the store itself is failing.
pub async fn error_page_layer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers().clone();
    let session = request.extensions().get::<Session>().cloned();
    // a POST-only path would answer 405 when the language form sends the visitor back
    let path = match *request.method() {
        Method::GET | Method::HEAD => request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string(),
        _ => "/".to_string(),
    };

    let response = next.run(request).await;

    let Some(marker) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };
    let Some(session) = session else {
        return response;
    };

    match Page::build(&state, session, &headers, path).await {
        Ok(page) => {
            let (title, text) = marker.message_ids();
            let body = pages::error(&page, title, text);
            let mut rendered = (marker.0, page.render(page.t(title), &body)).into_response();
            rendered.extensions_mut().insert(marker);
            rendered
        }
        Err(e) => {
            error!("Failed to render the {} page: {e}", marker.0.as_u16());
            response
        }
    }
}

fn bare_page(status: StatusCode) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{code}</title></head>\
         <body><h1>{code}</h1><p>{reason}</p><p><a href=\"/\">Home</a></p></body></html>",
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or_default(),
    )
}
