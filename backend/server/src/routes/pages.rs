use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse, Redirect},
};
use tracing::warn;

use crate::{
    error::AppError,
    forms::CsrfForm,
    i18n::Language,
    models::{ReportId, ReportKind},
    render::{
        Page,
        pages::{self, Usage},
    },
    reports::monthly_limit,
    routes::plans::active_plan_id,
    session::{CurrentUser, Session},
    state::AppState,
    utils::{current_period, safe_next},
};

const RECENT_REPORTS: usize = 5;

pub async fn home(page: Page) -> Html<String> {
    page.render(page.t("nav.home"), &pages::home(&page))
}

pub async fn about(page: Page) -> Html<String> {
    page.render(page.t("about.title"), &pages::about(&page))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
) -> Result<Html<String>, AppError> {
    let pets = state.store.pets(user.id).await?;
    let plan = active_plan_id(&state, user.id)
        .await?
        .and_then(|id| state.catalog.plan(id));

    let period = current_period();
    let usage = Usage {
        meal_used: state.store.usage(user.id, ReportKind::Meal, &period).await?,
        meal_limit: monthly_limit(&state, user.id, ReportKind::Meal).await?,
        health_used: state.store.usage(user.id, ReportKind::Health, &period).await?,
        health_limit: monthly_limit(&state, user.id, ReportKind::Health).await?,
    };

    let mut reports = state.store.reports(user.id).await?;
    reports.truncate(RECENT_REPORTS);

    Ok(page.render(
        page.t("nav.dashboard"),
        &pages::dashboard(&page, &pets, plan, &usage, &reports),
    ))
}

pub async fn report(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    Path(id): Path<ReportId>,
) -> Result<Html<String>, AppError> {
    let report = state
        .store
        .report(id)
        .await?
        .filter(|report| report.owner == user.id)
        .ok_or(AppError::NotFound)?;

    Ok(page.render(&report.title, &pages::report(&page, &report)))
}

/// Stores the chosen language and sends the visitor back where they were.
pub async fn set_language(session: Session, CsrfForm(data): CsrfForm) -> Redirect {
    match Language::from_code(data.text("language")) {
        Some(language) => session.set_language(language.code()),
        None => warn!("Unsupported language {:?}", data.get("language")),
    }

    Redirect::to(safe_next(data.get("next")))
}

pub async fn script() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/javascript; charset=utf-8")],
        include_str!("../../assets/app.js"),
    )
}

/// Unknown paths. The error page layer renders the page.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
