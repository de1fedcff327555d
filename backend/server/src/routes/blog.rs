use std::{collections::BTreeSet, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    flash::Level,
    forms::{BoundForm, CsrfForm, FormData, FormErrors, validate_comment, validate_rating},
    models::{BlogPost, RatingSummary},
    render::{
        Page,
        blog::{self, PostCard, PostDetail},
    },
    session::{CurrentUser, Session},
    state::AppState,
    utils::encode_query_value,
};

#[derive(Deserialize)]
pub struct BlogQuery {
    category: Option<String>,
}

fn post_url(post: &BlogPost) -> String {
    format!("/blog/{}/", encode_query_value(&post.slug))
}

async fn find_post(state: &AppState, slug: &str) -> Result<BlogPost, AppError> {
    state
        .store
        .post_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    page: Page,
    Query(query): Query<BlogQuery>,
) -> Result<Html<String>, AppError> {
    let posts = state.store.posts().await?;
    let category = query.category.as_deref().filter(|c| !c.is_empty());

    let categories: Vec<String> = posts
        .iter()
        .map(|post| post.category.clone())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cards = Vec::new();
    for post in posts {
        if category.is_some_and(|c| c != post.category) {
            continue;
        }

        let rating = RatingSummary::from_ratings(&state.store.ratings(post.id).await?);
        let comments = state.store.comment_count(post.id).await?;
        cards.push(PostCard {
            post,
            rating,
            comments,
        });
    }

    Ok(page.render(
        page.t("blog.title"),
        &blog::list(&page, &cards, &categories, category),
    ))
}

async fn load_detail(
    state: &AppState,
    page: &Page,
    post: BlogPost,
) -> Result<PostDetail, AppError> {
    let ratings = state.store.ratings(post.id).await?;
    let own_rating = page.user.as_ref().and_then(|user| {
        ratings
            .iter()
            .find(|rating| rating.user_id == user.id)
            .map(|rating| rating.value)
    });

    Ok(PostDetail {
        rating: RatingSummary::from_ratings(&ratings),
        comments: state.store.comments(post.id).await?,
        own_rating,
        post,
    })
}

fn render_detail(page: &Page, detail: &PostDetail, form: &BoundForm) -> Html<String> {
    page.render(&detail.post.title, &blog::detail(page, detail, form))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    page: Page,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = find_post(&state, &slug).await?;
    let detail = load_detail(&state, &page, post).await?;

    Ok(render_detail(&page, &detail, &BoundForm::default()))
}

/// One rating per user and post, a second submission replaces the first.
pub async fn rate(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Path(slug): Path<String>,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    let post = find_post(&state, &slug).await?;

    match validate_rating(&data) {
        Ok(value) => {
            state.store.rate_post(post.id, user.id, value).await?;
            info!("User {} rated post {} with {value}", user.id, post.id);
            session.flash(Level::Success, "flash.rating_saved");
        }
        Err(_) => session.flash(Level::Error, "flash.rating_invalid"),
    }

    Ok(Redirect::to(&post_url(&post)).into_response())
}

pub async fn comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    page: Page,
    session: Session,
    Path(slug): Path<String>,
    CsrfForm(data): CsrfForm,
) -> Result<Response, AppError> {
    let post = find_post(&state, &slug).await?;

    let errors: FormErrors = match validate_comment(&data) {
        Ok(content) => {
            state.store.add_comment(post.id, &user, &content).await?;
            session.flash(Level::Success, "flash.comment_added");

            return Ok(Redirect::to(&format!("{}#comments", post_url(&post))).into_response());
        }
        Err(errors) => errors,
    };

    let mut submitted = FormData::new();
    submitted.push("content", data.get("content").unwrap_or_default());

    let page = page.at(post_url(&post));
    let detail = load_detail(&state, &page, post).await?;
    Ok(render_detail(&page, &detail, &BoundForm::new(submitted, errors)).into_response())
}
