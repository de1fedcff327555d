use crate::{flash::Flash, i18n::Language};

use super::{Page, escape};

pub fn document(
    page: &Page,
    title: &str,
    body: &str,
    flashes: &[Flash],
    ai_delay_ms: u64,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | PawFeed</title>
<link rel="stylesheet" href="/static/css/output.css">
</head>
<body data-ai-delay="{ai_delay_ms}">
{nav}
<main class="container">
{flashes}
{body}
</main>
{footer}
<div id="loading-overlay" class="loading-overlay" hidden>
<div class="spinner"></div>
<p>{loading}</p>
</div>
<script src="/assets/app.js" defer></script>
</body>
</html>"#,
        lang = page.tr.language().code(),
        title = escape(title),
        nav = nav(page),
        flashes = flash_list(page, flashes),
        footer = footer(page),
        loading = page.t("ai.loading"),
    )
}

fn nav(page: &Page) -> String {
    let links = match &page.user {
        Some(user) => format!(
            r#"<a href="/dashboard/">{dashboard}</a>
<a href="/pets/">{pets}</a>
<span class="nav-user">{username}</span>
<form method="post" action="/accounts/logout/" class="inline-form">{csrf}<button type="submit" class="link-button">{logout}</button></form>"#,
            dashboard = page.t("nav.dashboard"),
            pets = page.t("nav.pets"),
            username = escape(&user.username),
            csrf = page.csrf_input(),
            logout = page.t("nav.logout"),
        ),
        None => format!(
            r#"<a href="/accounts/login/">{login}</a>
<a href="/accounts/register/">{register}</a>"#,
            login = page.t("nav.login"),
            register = page.t("nav.register"),
        ),
    };

    format!(
        r#"<nav class="nav">
<a href="/" class="brand">PawFeed</a>
<a href="/">{home}</a>
<a href="/blog/">{blog}</a>
<a href="/plans/">{plans}</a>
<a href="/about/">{about}</a>
{links}
{language}
</nav>"#,
        home = page.t("nav.home"),
        blog = page.t("nav.blog"),
        plans = page.t("nav.plans"),
        about = page.t("nav.about"),
        language = language_form(page),
    )
}

/// Posts the chosen language with the current path as `next`, so the same page comes back translated.
fn language_form(page: &Page) -> String {
    let current = page.tr.language();
    let options: String = Language::ALL
        .iter()
        .map(|lang| {
            format!(
                r#"<option value="{code}"{selected}>{name}</option>"#,
                code = lang.code(),
                selected = if *lang == current { " selected" } else { "" },
                name = lang.native_name(),
            )
        })
        .collect();

    format!(
        r#"<form method="post" action="/i18n/setlang/" class="language-form">{csrf}<input type="hidden" name="next" value="{next}"><select name="language" aria-label="{label}" data-autosubmit>{options}</select><button type="submit">{go}</button></form>"#,
        csrf = page.csrf_input(),
        next = escape(page.path()),
        label = page.t("nav.language"),
        go = page.t("nav.language_submit"),
    )
}

fn flash_list(page: &Page, flashes: &[Flash]) -> String {
    if flashes.is_empty() {
        return String::new();
    }

    let items: String = flashes
        .iter()
        .map(|flash| {
            format!(
                r#"<li class="flash {class}" role="alert">{message}</li>"#,
                class = flash.level.css_class(),
                message = page.t(&flash.message),
            )
        })
        .collect();

    format!(r#"<ul class="flashes">{items}</ul>"#)
}

fn footer(page: &Page) -> String {
    format!(
        r#"<footer class="footer"><p>{tagline}</p><p>&copy; PawFeed</p></footer>"#,
        tagline = page.t("footer.tagline"),
    )
}
