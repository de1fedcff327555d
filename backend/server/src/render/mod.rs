//! # Rendering
//!
//! Pages are plain functions from prepared data to HTML strings. Handlers load everything first,
//! renderers never touch the store.
//!
//! Every interpolated value coming from users or the catalog goes through [`escape`]. Message
//! catalog text is trusted.
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
    response::Html,
};
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    forms::{BoundForm, FormErrors},
    i18n::{Language, Translator},
    models::{Choice, User},
    session::{Session, load_user},
    state::AppState,
};

pub mod blog;
pub mod layout;
pub mod pages;
pub mod pets;
pub mod plans;

/// Per-request rendering context: who is looking, in which language, from where.
pub struct Page {
    pub user: Option<User>,
    pub tr: Translator,
    session: Session,
    path: String,
    ai_delay_ms: u64,
}

impl FromRequestParts<Arc<AppState>> for Page {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let path = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();

        Self::build(state, session, &parts.headers, path).await
    }
}

impl Page {
    pub async fn build(
        state: &AppState,
        session: Session,
        headers: &HeaderMap,
        path: String,
    ) -> Result<Self, AppError> {
        let user = load_user(state, &session).await?;
        let language =
            Language::negotiate(session.language().as_deref(), headers, state.default_language);

        Ok(Self {
            user,
            tr: Translator::new(language, state.locales.clone()),
            session,
            path,
            ai_delay_ms: state.config.ai_delay_ms,
        })
    }

    /// Same page, seen from `path`. Used when a POST re-renders the page of a GET route.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn t<'a>(&'a self, id: &'a str) -> &'a str {
        self.tr.t(id)
    }

    pub fn tf(&self, id: &str, args: &[(&str, &str)]) -> String {
        self.tr.tf(id, args)
    }

    pub fn tf_count(&self, id: &str, count: usize) -> String {
        self.tr.tf(id, &[("count", count.to_string().as_str())])
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn csrf_input(&self) -> String {
        format!(
            r#"<input type="hidden" name="csrf_token" value="{}">"#,
            escape(&self.session.csrf_token())
        )
    }

    /// Wraps `body` in the layout. Pending flashes are shown here and dropped from the session.
    pub fn render(&self, title: &str, body: &str) -> Html<String> {
        let flashes = self.session.take_flashes();
        Html(layout::document(self, title, body, &flashes, self.ai_delay_ms))
    }
}

pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

pub fn format_date(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

pub fn field_errors(page: &Page, errors: &FormErrors, field: &str) -> String {
    let messages = errors.field(field);
    if messages.is_empty() {
        return String::new();
    }

    let items: String = messages
        .iter()
        .map(|id| format!("<li>{}</li>", page.t(id)))
        .collect();
    format!(r#"<ul class="errorlist" data-field="{field}">{items}</ul>"#)
}

pub fn non_field_errors(page: &Page, errors: &FormErrors) -> String {
    let messages = errors.non_field();
    if messages.is_empty() {
        return String::new();
    }

    let items: String = messages
        .iter()
        .map(|id| format!("<li>{}</li>", page.t(id)))
        .collect();
    format!(r#"<ul class="errorlist nonfield">{items}</ul>"#)
}

/// Label-wrapped radio or checkbox, highlighted when selected.
pub fn chip(kind: &str, name: &str, value: &str, label: &str, checked: bool) -> String {
    format!(
        r#"<label class="chip{selected}"><input type="{kind}" name="{name}" value="{value}"{checked}> {label}</label>"#,
        selected = if checked { " chip-selected" } else { "" },
        value = escape(value),
        checked = if checked { " checked" } else { "" },
        label = escape(label),
    )
}

/// Every option of `C` as chips, reflecting what was submitted.
pub fn choice_chips<C: Choice>(page: &Page, form: &BoundForm, multiple: bool) -> String {
    let kind = if multiple { "checkbox" } else { "radio" };
    let chips: String = C::ALL
        .iter()
        .map(|choice| {
            chip(
                kind,
                C::FIELD,
                choice.value(),
                page.t(&choice.label_id()),
                form.data.has_value(C::FIELD, choice.value()),
            )
        })
        .collect();

    fieldset(page, form, C::FIELD, &chips)
}

/// Labelled group, bordered red when the field has errors.
pub fn fieldset(page: &Page, form: &BoundForm, field: &str, controls: &str) -> String {
    let invalid = if form.errors.has(field) { " field-invalid" } else { "" };

    format!(
        r#"<fieldset class="field{invalid}"><legend>{legend}</legend><div class="chips">{controls}</div>{errors}</fieldset>"#,
        legend = page.t(&format!("field.{field}")),
        errors = field_errors(page, &form.errors, field),
    )
}

pub fn text_input(page: &Page, form: &BoundForm, field: &str, kind: &str) -> String {
    let invalid = if form.errors.has(field) { " field-invalid" } else { "" };

    format!(
        r#"<div class="field{invalid}"><label for="id_{field}">{label}</label><input type="{kind}" id="id_{field}" name="{field}" value="{value}">{errors}</div>"#,
        label = page.t(&format!("field.{field}")),
        value = escape(form.data.get(field).unwrap_or_default()),
        errors = field_errors(page, &form.errors, field),
    )
}
