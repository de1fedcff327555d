use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    error::AppError,
    flash::Level,
    forms::{BoundForm, CsrfForm, FormData, FormErrors, NON_FIELD, validate_registration},
    render::{Page, pages},
    session::Session,
    state::AppState,
    store::StoreError,
    utils::{hash_password, safe_next, verify_password},
};

#[derive(Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

/// What goes back into the form after a failed attempt. Passwords are never echoed.
fn keep_username(data: &FormData) -> FormData {
    let mut kept = FormData::new();
    kept.push("username", data.text("username"));
    kept
}

pub async fn login_form(page: Page, Query(query): Query<NextQuery>) -> Response {
    let next = safe_next(query.next.as_deref());
    if page.user.is_some() {
        return Redirect::to(next).into_response();
    }

    page.render(
        page.t("accounts.login_title"),
        &pages::login(&page, &BoundForm::default(), next),
    )
    .into_response()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    page: Page,
    session: Session,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    let next = safe_next(data.get("next")).to_string();
    let username = data.text("username");

    let user = match state.store.user_by_username(username).await? {
        Some(user) => {
            let password = data.get("password").unwrap_or_default().to_string();
            verify_password(password, user.password_hash.clone())
                .await?
                .then_some(user)
        }
        None => None,
    };

    let Some(user) = user else {
        warn!("Failed login for {username:?}");
        let mut errors = FormErrors::new();
        errors.add(NON_FIELD, "errors.invalid_login");

        let form = BoundForm::new(keep_username(&data), errors);
        return Ok(page
            .render(page.t("accounts.login_title"), &pages::login(&page, &form, &next))
            .into_response());
    };

    session.login(&user);
    session.flash(Level::Success, "flash.logged_in");
    info!("User {} logged in", user.id);

    Ok(Redirect::to(&next).into_response())
}

pub async fn logout(session: Session, CsrfForm(_): CsrfForm) -> Redirect {
    if let Some(user_id) = session.user_id() {
        info!("User {user_id} logged out");
    }

    session.logout();
    session.flash(Level::Info, "flash.logged_out");

    Redirect::to("/")
}

pub async fn register_form(page: Page) -> Response {
    if page.user.is_some() {
        return Redirect::to("/dashboard/").into_response();
    }

    page.render(
        page.t("accounts.register_title"),
        &pages::register(&page, &BoundForm::default()),
    )
    .into_response()
}

fn render_register(page: &Page, form: BoundForm) -> Html<String> {
    page.render(page.t("accounts.register_title"), &pages::register(page, &form))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    page: Page,
    session: Session,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    let registration = match validate_registration(&data) {
        Ok(registration) => registration,
        Err(errors) => {
            let form = BoundForm::new(keep_username(&data), errors);
            return Ok(render_register(&page, form).into_response());
        }
    };

    let hash = hash_password(registration.password).await?;
    let user = match state.store.create_user(&registration.username, &hash).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => {
            let mut errors = FormErrors::new();
            errors.add("username", "errors.username_taken");

            let form = BoundForm::new(keep_username(&data), errors);
            return Ok(render_register(&page, form).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    info!("Registered user {}", user.id);
    session.login(&user);
    session.flash(Level::Success, "flash.registered");

    Ok(Redirect::to("/dashboard/").into_response())
}
