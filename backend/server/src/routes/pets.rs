use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::AppError,
    flash::Level,
    forms::{BoundForm, CsrfForm, FormData, validate_pet},
    i18n::Language,
    models::{Choice, Pet, PetId, PetType, ReportKind, User},
    render::{Page, pets},
    reports::{Outcome, create_report},
    session::{CurrentUser, Session},
    state::AppState,
};

/// The pet behind `id`, if `user` owns it. Someone else's pet is as good as missing.
async fn owned_pet(state: &AppState, user: &User, id: PetId) -> Result<Pet, AppError> {
    match state.store.pet(id).await? {
        Some(pet) if pet.owner == user.id => Ok(pet),
        Some(_) => {
            warn!("User {} asked for pet {id} owned by someone else", user.id);
            Err(AppError::NotFound)
        }
        None => Err(AppError::NotFound),
    }
}

fn render_form(
    state: &AppState,
    page: &Page,
    form: &BoundForm,
    action: &str,
    heading: &str,
) -> Html<String> {
    page.render(heading, &pets::form(page, form, &state.catalog, action, heading))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
) -> Result<Html<String>, AppError> {
    let pets = state.store.pets(user.id).await?;

    Ok(page.render(page.t("pets.title"), &pets::list(&page, &pets, &state.catalog)))
}

pub async fn new_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(_): CurrentUser,
    page: Page,
) -> Html<String> {
    render_form(&state, &page, &BoundForm::default(), "/pets/new/", page.t("pets.new_title"))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    session: Session,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    match validate_pet(&data, &state.catalog) {
        Ok(profile) => {
            let pet = state.store.insert_pet(user.id, profile).await?;
            info!("User {} added pet {}", user.id, pet.id);
            session.flash(Level::Success, "flash.pet_created");

            Ok(Redirect::to("/pets/").into_response())
        }
        Err(errors) => Ok(render_form(
            &state,
            &page,
            &BoundForm::new(data, errors),
            "/pets/new/",
            page.t("pets.new_title"),
        )
        .into_response()),
    }
}

pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    Path(id): Path<PetId>,
) -> Result<Html<String>, AppError> {
    let pet = owned_pet(&state, &user, id).await?;
    let form = BoundForm::new(FormData::from_pet(&pet), Default::default());

    Ok(render_form(
        &state,
        &page,
        &form,
        &format!("/pets/{id}/edit/"),
        page.t("pets.edit_title"),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    session: Session,
    Path(id): Path<PetId>,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    let mut pet = owned_pet(&state, &user, id).await?;

    match validate_pet(&data, &state.catalog) {
        Ok(profile) => {
            pet.profile = profile;
            pet.updated_at = chrono::Utc::now();
            state.store.update_pet(&pet).await?;
            session.flash(Level::Success, "flash.pet_updated");

            Ok(Redirect::to("/pets/").into_response())
        }
        Err(errors) => Ok(render_form(
            &state,
            &page,
            &BoundForm::new(data, errors),
            &format!("/pets/{id}/edit/"),
            page.t("pets.edit_title"),
        )
        .into_response()),
    }
}

pub async fn confirm_delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    Path(id): Path<PetId>,
) -> Result<Html<String>, AppError> {
    let pet = owned_pet(&state, &user, id).await?;

    Ok(page.render(page.t("pets.delete_title"), &pets::confirm_delete(&page, &pet)))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Path(id): Path<PetId>,
    CsrfForm(_): CsrfForm,
) -> Result<Redirect, AppError> {
    let pet = owned_pet(&state, &user, id).await?;

    if state.store.delete_pet(pet.id).await? {
        info!("User {} deleted pet {}", user.id, pet.id);
        session.flash(Level::Success, "flash.pet_deleted");
    }

    Ok(Redirect::to("/pets/"))
}

#[derive(Deserialize)]
pub struct BreedQuery {
    pet_type: Option<String>,
}

#[derive(Serialize)]
pub struct BreedOption {
    id: u32,
    name: String,
}

pub async fn breeds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BreedQuery>,
) -> Response {
    let Some(pet_type) = query.pet_type.as_deref().and_then(PetType::parse) else {
        warn!("Breed lookup with pet_type {:?}", query.pet_type);
        return (StatusCode::BAD_REQUEST, "Unknown or missing pet_type").into_response();
    };

    let breeds: Vec<BreedOption> = state
        .catalog
        .breeds_for(pet_type.value())
        .into_iter()
        .map(|breed| BreedOption {
            id: breed.id,
            name: breed.name.clone(),
        })
        .collect();

    Json(breeds).into_response()
}

async fn ai_action(
    state: &AppState,
    user: &User,
    session: &Session,
    headers: &HeaderMap,
    id: PetId,
    kind: ReportKind,
) -> Result<Redirect, AppError> {
    let pet = owned_pet(state, user, id).await?;
    // the report is written in the language the visitor reads the site in
    let language =
        Language::negotiate(session.language().as_deref(), headers, state.default_language);

    Ok(match create_report(state, &pet, kind, language).await? {
        Outcome::Created(report) => {
            session.flash(Level::Success, "flash.report_ready");
            Redirect::to(&format!("/reports/{}/", report.id))
        }
        Outcome::QuotaExceeded => {
            session.flash(Level::Warning, "flash.quota_exceeded");
            Redirect::to("/plans/")
        }
        Outcome::Failed => {
            session.flash(Level::Error, "flash.report_failed");
            Redirect::to("/pets/")
        }
    })
}

pub async fn ai_meal(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<PetId>,
) -> Result<Redirect, AppError> {
    ai_action(&state, &user, &session, &headers, id, ReportKind::Meal).await
}

pub async fn ai_health(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<PetId>,
) -> Result<Redirect, AppError> {
    ai_action(&state, &user, &session, &headers, id, ReportKind::Health).await
}
