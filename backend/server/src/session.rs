//! # Sessions
//!
//! Server-side sessions keyed by the `sessionid` cookie.
//!
//! - Created lazily. A visitor only gets a stored session (and a `sessionid` cookie) once
//!   something needs to survive the request: a flash, a login, a language choice.
//! - Every session owns a random CSRF token. Forms echo it back as `csrf_token`.
//! - Visitors without a stored session keep their token in the `csrftoken` cookie instead,
//!   so printing a form never stores anything.
//! - Login and logout rotate both the session id and the CSRF token.
//!
//! [`session_layer`] loads the session before the handler runs and writes it back afterwards,
//! handlers only ever see the [`Session`] handle.
use std::{sync::Arc, time::Duration};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::AppError,
    flash::{Flash, Level},
    models::{User, UserId},
    state::AppState,
    utils::random_token,
};

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<UserId>,
    pub csrf_token: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            user_id: None,
            csrf_token: random_token(),
            language: None,
            flashes: Vec::new(),
        }
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    id: String,
    previous_id: Option<String>,
    data: SessionData,
    dirty: bool,
    stored: bool,
    csrf_printed: bool,
}

/// Handle to the current request's session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    fn new(id: String, data: SessionData, stored: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id,
                previous_id: None,
                data,
                dirty: false,
                stored,
                csrf_printed: false,
            })),
        }
    }

    /// Not stored yet. Reuses the token of the `csrftoken` cookie when there is one.
    fn fresh(csrf_cookie: Option<String>) -> Self {
        let mut data = SessionData::new();
        if let Some(token) = csrf_cookie {
            data.csrf_token = token;
        }

        Self::new(random_token(), data, false)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.inner.lock().data.user_id
    }

    pub fn language(&self) -> Option<String> {
        self.inner.lock().data.language.clone()
    }

    /// Token to print into a form.
    pub fn csrf_token(&self) -> String {
        let mut inner = self.inner.lock();
        inner.csrf_printed = true;
        inner.data.csrf_token.clone()
    }

    pub fn verify_csrf(&self, token: &str) -> Result<(), AppError> {
        let inner = self.inner.lock();
        let matches = constant_time_eq(token.as_bytes(), inner.data.csrf_token.as_bytes());
        if token.is_empty() || !matches {
            return Err(AppError::CsrfRejected);
        }

        Ok(())
    }

    pub fn login(&self, user: &User) {
        let mut inner = self.inner.lock();
        inner.rotate();
        inner.data.user_id = Some(user.id);
    }

    pub fn logout(&self) {
        let mut inner = self.inner.lock();
        inner.rotate();
        inner.data.user_id = None;
    }

    pub fn set_language(&self, code: &str) {
        let mut inner = self.inner.lock();
        inner.data.language = Some(code.to_string());
        inner.dirty = true;
    }

    pub fn flash(&self, level: Level, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.data.flashes.push(Flash::new(level, message));
        inner.dirty = true;
    }

    /// Drains pending flashes. Called once, when a page is rendered.
    pub fn take_flashes(&self) -> Vec<Flash> {
        let mut inner = self.inner.lock();
        if inner.data.flashes.is_empty() {
            return Vec::new();
        }

        inner.dirty = true;
        std::mem::take(&mut inner.data.flashes)
    }
}

impl Inner {
    fn rotate(&mut self) {
        let old = std::mem::replace(&mut self.id, random_token());
        self.previous_id.get_or_insert(old);
        self.data.csrf_token = random_token();
        self.dirty = true;
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::MissingSession)
    }
}

/// Logged-in user, or a redirect to the login page.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        match load_user(state, &session).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AppError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map_or("/", |pq| pq.as_str())
                    .to_string(),
            }),
        }
    }
}

/// User behind the session, if any. A session pointing at a deleted user counts as anonymous.
pub async fn load_user(state: &AppState, session: &Session) -> Result<Option<User>, AppError> {
    match session.user_id() {
        Some(id) => Ok(state.store.user(id).await?),
        None => Ok(None),
    }
}

pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_id = session_cookie(request.headers());

    let loaded = match &cookie_id {
        Some(id) => match state.store.load_session(id).await {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load session: {e}");
                None
            }
        },
        None => None,
    };

    let csrf_cookie =
        cookie_value(request.headers(), CSRF_COOKIE).filter(|token| valid_token(token));
    let session = match (cookie_id, loaded) {
        (Some(id), Some(data)) => Session::new(id, data, true),
        _ => Session::fresh(csrf_cookie.clone()),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    let (id, previous_id, data) = {
        let inner = session.inner.lock();
        if !inner.dirty {
            let unsent = !inner.stored
                && inner.csrf_printed
                && csrf_cookie.as_deref() != Some(inner.data.csrf_token.as_str());
            if unsent {
                let cookie = csrf_cookie_header(
                    &inner.data.csrf_token,
                    state.config.session_ttl_secs,
                    state.config.secure_cookies,
                );
                append_cookie(&mut response, &cookie);
            }

            return response;
        }

        (inner.id.clone(), inner.previous_id.clone(), inner.data.clone())
    };

    let ttl = Duration::from_secs(state.config.session_ttl_secs);
    if let Err(e) = state.store.save_session(&id, &data, ttl).await {
        error!("Failed to save session: {e}");
        return response;
    }

    if let Some(previous_id) = previous_id {
        if let Err(e) = state.store.delete_session(&previous_id).await {
            warn!("Failed to drop rotated session: {e}");
        }
    }

    let cookie = session_cookie_header(
        &id,
        state.config.session_ttl_secs,
        state.config.secure_cookies,
    );
    append_cookie(&mut response, &cookie);

    response
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Invalid cookie: {e}"),
    }
}

pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE)
}

fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Tokens are hex from [`random_token`], anything else in the cookie is ignored.
fn valid_token(token: &str) -> bool {
    (16..=64).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn session_cookie_header(id: &str, max_age: u64, secure: bool) -> String {
    cookie_header(SESSION_COOKIE, id, max_age, secure)
}

fn csrf_cookie_header(token: &str, max_age: u64, secure: bool) -> String {
    cookie_header(CSRF_COOKIE, token, max_age, secure)
}

fn cookie_header(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }

    cookie
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
