use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, Redirect},
};
use tracing::{info, warn};

use crate::{
    error::AppError,
    flash::Level,
    forms::CsrfForm,
    models::UserId,
    render::{Page, plans},
    session::{CurrentUser, Session},
    state::AppState,
};

/// Plan id of the free tier. Catalog ids start at 1.
pub const FREE_PLAN_ID: u32 = 0;

/// Active catalog plan of a user. A subscription to a plan since removed from the catalog is the free tier.
pub async fn active_plan_id(state: &AppState, user_id: UserId) -> Result<Option<u32>, AppError> {
    Ok(state
        .store
        .subscription(user_id)
        .await?
        .map(|subscription| subscription.plan_id)
        .filter(|id| state.catalog.plan(*id).is_some()))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    page: Page,
) -> Result<Html<String>, AppError> {
    let current = match &page.user {
        Some(user) => active_plan_id(&state, user.id).await?,
        None => None,
    };

    let body = plans::list(&page, &state.catalog.plans_by_price(), &state.config, current);
    Ok(page.render(page.t("plans.title"), &body))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    CsrfForm(data): CsrfForm,
) -> Result<Redirect, AppError> {
    let plan_id = data
        .text("plan_id")
        .parse::<u32>()
        .ok()
        .filter(|id| *id == FREE_PLAN_ID || state.catalog.plan(*id).is_some());

    match plan_id {
        Some(plan_id) => {
            state.store.set_subscription(user.id, plan_id).await?;
            info!("User {} switched to plan {plan_id}", user.id);
            session.flash(Level::Success, "flash.plan_updated");
        }
        None => {
            warn!("User {} picked unknown plan {:?}", user.id, data.get("plan_id"));
            session.flash(Level::Error, "flash.plan_invalid");
        }
    }

    Ok(Redirect::to("/plans/"))
}
