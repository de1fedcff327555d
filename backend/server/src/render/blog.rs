use crate::{
    forms::BoundForm,
    models::{BlogPost, Comment, RatingSummary},
};

use super::{Page, escape, field_errors, format_date, non_field_errors};

pub struct PostCard {
    pub post: BlogPost,
    pub rating: RatingSummary,
    pub comments: usize,
}

pub struct PostDetail {
    pub post: BlogPost,
    pub rating: RatingSummary,
    pub comments: Vec<Comment>,
    /// The viewer's current rating, preselected in the form.
    pub own_rating: Option<u8>,
}

fn rating_badge(page: &Page, rating: &RatingSummary) -> String {
    match rating.average {
        Some(average) => format!(
            r#"<span class="rating">★ {average:.1} <small>{count}</small></span>"#,
            count = page.tf_count("blog.rating_count", rating.count),
        ),
        None => format!(r#"<span class="rating rating-none">{}</span>"#, page.t("blog.no_ratings")),
    }
}

fn image(post: &BlogPost) -> String {
    match post.image.as_deref().filter(|src| !src.is_empty()) {
        Some(src) => format!(
            r#"<img src="{src}" alt="{alt}" class="post-image">"#,
            src = escape(src),
            alt = escape(&post.title),
        ),
        None => r#"<div class="post-image post-image-placeholder" aria-hidden="true"></div>"#.to_string(),
    }
}

pub fn list(
    page: &Page,
    cards: &[PostCard],
    categories: &[String],
    category: Option<&str>,
) -> String {
    let filters: String = std::iter::once((None, page.t("blog.all_categories").to_string()))
        .chain(categories.iter().map(|c| (Some(c.as_str()), c.clone())))
        .map(|(value, label)| {
            let href = match value {
                Some(value) => {
                    format!("/blog/?category={}", crate::utils::encode_query_value(value))
                }
                None => "/blog/".to_string(),
            };
            format!(
                r#"<a href="{href}" class="chip{active}">{label}</a>"#,
                href = escape(&href),
                active = if value == category { " chip-selected" } else { "" },
                label = escape(&label),
            )
        })
        .collect();

    let posts = if cards.is_empty() {
        format!(r#"<p class="empty">{}</p>"#, page.t("blog.empty"))
    } else {
        cards
            .iter()
            .map(|card| {
                format!(
                    r#"<article class="post-card">
<a href="/blog/{slug}/">{image}</a>
<h2><a href="/blog/{slug}/">{title}</a></h2>
<p class="meta">{category} · {date}</p>
<p>{excerpt}</p>
<p class="stats">{rating} <span class="comment-count">{comments}</span></p>
</article>"#,
                    slug = escape(&card.post.slug),
                    image = image(&card.post),
                    title = escape(&card.post.title),
                    category = escape(&card.post.category),
                    date = format_date(&card.post.created_at),
                    excerpt = escape(&card.post.excerpt(160)),
                    rating = rating_badge(page, &card.rating),
                    comments = page.tf_count("blog.comment_count", card.comments),
                )
            })
            .collect()
    };

    format!(
        r#"<h1>{heading}</h1>
<div class="chips category-filter">{filters}</div>
<section class="post-list">{posts}</section>"#,
        heading = page.t("blog.title"),
    )
}

pub fn detail(page: &Page, detail: &PostDetail, comment_form: &BoundForm) -> String {
    let post = &detail.post;

    let paragraphs: String = post
        .content
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape(p.trim())))
        .collect();

    let comments = if detail.comments.is_empty() {
        format!(r#"<p class="empty">{}</p>"#, page.t("blog.no_comments"))
    } else {
        let items: String = detail
            .comments
            .iter()
            .map(|comment| {
                format!(
                    r#"<li class="comment"><p class="meta"><strong>{author}</strong> · {date}</p><p>{content}</p></li>"#,
                    author = escape(&comment.author),
                    date = format_date(&comment.created_at),
                    content = escape(&comment.content),
                )
            })
            .collect();
        format!(r#"<ul class="comments">{items}</ul>"#)
    };

    let interact = if page.user.is_some() {
        format!(
            "{rating_form}{comment_form}",
            rating_form = rating_form(page, post, detail.own_rating),
            comment_form = comment_form_html(page, post, comment_form),
        )
    } else {
        format!(
            r#"<p class="login-hint"><a href="{href}">{login}</a></p>"#,
            href = escape(&crate::utils::login_url(page.path())),
            login = page.t("blog.login_to_interact"),
        )
    };

    format!(
        r#"<article class="post">
<h1>{title}</h1>
<p class="meta">{author} · {category} · {date}</p>
{image}
<div class="post-body">{paragraphs}</div>
<p class="post-rating">{rating}</p>
</article>
<section class="interact">{interact}</section>
<section class="comment-section" id="comments"><h2>{comments_heading}</h2>{comments}</section>
<p><a href="/blog/">{back}</a></p>"#,
        title = escape(&post.title),
        author = escape(&post.author),
        category = escape(&post.category),
        date = format_date(&post.created_at),
        image = image(post),
        rating = rating_badge(page, &detail.rating),
        comments_heading = page.t("blog.comments"),
        back = page.t("blog.back"),
    )
}

fn rating_form(page: &Page, post: &BlogPost, own: Option<u8>) -> String {
    let stars: String = (1..=5u8)
        .map(|value| {
            super::chip(
                "radio",
                "value",
                &value.to_string(),
                &"★".repeat(usize::from(value)),
                own == Some(value),
            )
        })
        .collect();

    format!(
        r#"<form method="post" action="/blog/{slug}/rate/" class="rating-form">{csrf}<p>{label}</p><div class="chips">{stars}</div><button type="submit">{submit}</button></form>"#,
        slug = escape(&post.slug),
        csrf = page.csrf_input(),
        label = page.t("blog.your_rating"),
        submit = page.t("blog.rate"),
    )
}

fn comment_form_html(page: &Page, post: &BlogPost, form: &BoundForm) -> String {
    let invalid = if form.errors.has("content") { " field-invalid" } else { "" };

    format!(
        r#"<form method="post" action="/blog/{slug}/comment/" class="comment-form">{csrf}{non_field}<div class="field{invalid}"><label for="id_content">{label}</label><textarea id="id_content" name="content" rows="4">{content}</textarea>{errors}</div><button type="submit">{submit}</button></form>"#,
        slug = escape(&post.slug),
        csrf = page.csrf_input(),
        non_field = non_field_errors(page, &form.errors),
        label = page.t("field.content"),
        content = escape(form.data.get("content").unwrap_or_default()),
        errors = field_errors(page, &form.errors, "content"),
        submit = page.t("blog.comment"),
    )
}
