use catalog::Plan;

use crate::{
    forms::{BoundForm, FormData},
    models::{Choice, Pet, Report},
};

use super::{Page, escape, format_date, non_field_errors, text_input};

pub fn home(page: &Page) -> String {
    let cta = if page.user.is_some() {
        format!(r#"<a href="/pets/" class="button">{}</a>"#, page.t("home.cta_pets"))
    } else {
        format!(r#"<a href="/accounts/register/" class="button">{}</a>"#, page.t("home.cta_register"))
    };

    format!(
        r#"<section class="hero">
<h1>{headline}</h1>
<p>{lead}</p>
{cta}
</section>
<section class="features">
<article><h2>{f1}</h2><p>{f1_text}</p></article>
<article><h2>{f2}</h2><p>{f2_text}</p></article>
<article><h2>{f3}</h2><p>{f3_text}</p></article>
</section>"#,
        headline = page.t("home.headline"),
        lead = page.t("home.lead"),
        f1 = page.t("home.feature_profiles"),
        f1_text = page.t("home.feature_profiles_text"),
        f2 = page.t("home.feature_ai"),
        f2_text = page.t("home.feature_ai_text"),
        f3 = page.t("home.feature_blog"),
        f3_text = page.t("home.feature_blog_text"),
    )
}

pub fn about(page: &Page) -> String {
    format!(
        r#"<h1>{heading}</h1>
<p>{mission}</p>
<p>{team}</p>"#,
        heading = page.t("about.title"),
        mission = page.t("about.mission"),
        team = page.t("about.team"),
    )
}

pub struct Usage {
    pub meal_used: u32,
    pub meal_limit: u32,
    pub health_used: u32,
    pub health_limit: u32,
}

fn report_list(page: &Page, reports: &[Report]) -> String {
    if reports.is_empty() {
        return format!(r#"<p class="empty">{}</p>"#, page.t("reports.empty"));
    }

    let items: String = reports
        .iter()
        .map(|report| {
            format!(
                r#"<li><a href="/reports/{id}/">{kind}: {pet}</a> <small>{date}</small></li>"#,
                id = report.id,
                kind = page.t(&report.kind.label_id()),
                pet = escape(&report.pet_name),
                date = format_date(&report.created_at),
            )
        })
        .collect();

    format!(r#"<ul class="report-list">{items}</ul>"#)
}

pub fn dashboard(
    page: &Page,
    pets: &[Pet],
    plan: Option<&Plan>,
    usage: &Usage,
    reports: &[Report],
) -> String {
    let username = page.user.as_ref().map(|u| u.username.as_str()).unwrap_or_default();

    let pet_items = if pets.is_empty() {
        format!(
            r#"<p class="empty">{} <a href="/pets/new/">{}</a></p>"#,
            page.t("pets.empty"),
            page.t("pets.add")
        )
    } else {
        let items: String = pets
            .iter()
            .map(|pet| {
                format!(
                    r#"<li>{name} <small>{pet_type}</small></li>"#,
                    name = escape(&pet.profile.name),
                    pet_type = page.t(&pet.profile.pet_type.label_id()),
                )
            })
            .collect();
        format!(r#"<ul>{items}</ul><p><a href="/pets/">{}</a></p>"#, page.t("dashboard.manage_pets"))
    };

    let plan_name = match plan {
        Some(plan) => escape(&plan.name),
        None => page.t("plans.free").to_string(),
    };

    format!(
        r#"<h1>{welcome}</h1>
<section class="dashboard-grid">
<article><h2>{pets_heading}</h2>{pet_items}</article>
<article><h2>{plan_heading}</h2><p class="plan-name">{plan_name}</p>
<ul class="usage">
<li>{meal_usage}</li>
<li>{health_usage}</li>
</ul>
<p><a href="/plans/">{change_plan}</a></p></article>
<article><h2>{reports_heading}</h2>{reports}</article>
</section>"#,
        welcome = page.tf("dashboard.welcome", &[("name", escape(username).as_str())]),
        pets_heading = page.t("dashboard.pets"),
        plan_heading = page.t("dashboard.plan"),
        meal_usage = page.tf(
            "dashboard.meal_usage",
            &[
                ("used", usage.meal_used.to_string().as_str()),
                ("limit", usage.meal_limit.to_string().as_str()),
            ],
        ),
        health_usage = page.tf(
            "dashboard.health_usage",
            &[
                ("used", usage.health_used.to_string().as_str()),
                ("limit", usage.health_limit.to_string().as_str()),
            ],
        ),
        change_plan = page.t("dashboard.change_plan"),
        reports_heading = page.t("dashboard.reports"),
        reports = report_list(page, reports),
    )
}

pub fn report(page: &Page, report: &Report) -> String {
    let lines: String = report
        .lines
        .iter()
        .map(|line| format!("<li>{}</li>", escape(line)))
        .collect();

    format!(
        r#"<article class="report">
<h1>{title}</h1>
<p class="meta">{kind} · {pet} · {date}</p>
<ul>{lines}</ul>
<p class="disclaimer">{disclaimer}</p>
</article>
<p><a href="/dashboard/">{back}</a></p>"#,
        title = escape(&report.title),
        kind = page.t(&report.kind.label_id()),
        pet = escape(&report.pet_name),
        date = format_date(&report.created_at),
        disclaimer = page.t("reports.disclaimer"),
        back = page.t("reports.back"),
    )
}

pub fn login(page: &Page, form: &BoundForm, next: &str) -> String {
    format!(
        r#"<h1>{heading}</h1>
<form method="post" action="/accounts/login/" class="auth-form">
{csrf}
<input type="hidden" name="next" value="{next}">
{non_field}
{username}
{password}
<button type="submit">{submit}</button>
</form>
<p><a href="/accounts/register/">{register}</a></p>"#,
        heading = page.t("accounts.login_title"),
        csrf = page.csrf_input(),
        next = escape(next),
        non_field = non_field_errors(page, &form.errors),
        username = text_input(page, form, "username", "text"),
        password = password_input(page, form, "password"),
        submit = page.t("nav.login"),
        register = page.t("accounts.no_account"),
    )
}

pub fn register(page: &Page, form: &BoundForm) -> String {
    format!(
        r#"<h1>{heading}</h1>
<form method="post" action="/accounts/register/" class="auth-form">
{csrf}
{non_field}
{username}
{password}
{confirm}
<button type="submit">{submit}</button>
</form>
<p><a href="/accounts/login/">{login}</a></p>"#,
        heading = page.t("accounts.register_title"),
        csrf = page.csrf_input(),
        non_field = non_field_errors(page, &form.errors),
        username = text_input(page, form, "username", "text"),
        password = password_input(page, form, "password"),
        confirm = password_input(page, form, "password_confirm"),
        submit = page.t("nav.register"),
        login = page.t("accounts.have_account"),
    )
}

/// Password fields never echo what was typed.
fn password_input(page: &Page, form: &BoundForm, field: &str) -> String {
    let blank = BoundForm::new(FormData::new(), form.errors.clone());

    text_input(page, &blank, field, "password")
}

pub fn error(page: &Page, title_id: &str, text_id: &str) -> String {
    format!(
        r#"<h1>{heading}</h1>
<p>{text}</p>
<p><a href="/">{home}</a></p>"#,
        heading = page.t(title_id),
        text = page.t(text_id),
        home = page.t("nav.home"),
    )
}
