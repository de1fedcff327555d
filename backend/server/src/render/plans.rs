use catalog::Plan;

use crate::{config::Config, utils::group_thousands};

use super::{Page, escape};

pub fn price(page: &Page, amount: u32) -> String {
    if amount == 0 {
        return page.t("plans.free_price").to_string();
    }

    page.tf("plans.price", &[("amount", format!("₩{}", group_thousands(amount)).as_str())])
}

fn card(
    page: &Page,
    plan_id: u32,
    name: &str,
    amount: u32,
    meal: u32,
    health: u32,
    current: bool,
) -> String {
    let action = if current {
        format!(r#"<p class="current-plan">{}</p>"#, page.t("plans.current"))
    } else {
        format!(
            r#"<form method="post" action="/plans/update/">{csrf}<input type="hidden" name="plan_id" value="{plan_id}"><button type="submit">{select}</button></form>"#,
            csrf = page.csrf_input(),
            select = page.t("plans.select"),
        )
    };

    format!(
        r#"<article class="plan-card{highlight}">
<h2>{name}</h2>
<p class="price">{price}</p>
<ul>
<li>{meal}</li>
<li>{health}</li>
</ul>
{action}
</article>"#,
        highlight = if current { " plan-current" } else { "" },
        name = escape(name),
        price = price(page, amount),
        meal = page.tf("plans.meal_limit", &[("count", meal.to_string().as_str())]),
        health = page.tf("plans.health_limit", &[("count", health.to_string().as_str())]),
    )
}

/// Free tier first (plan id 0), then the catalog plans cheapest first.
pub fn list(page: &Page, plans: &[&Plan], config: &Config, current: Option<u32>) -> String {
    let signed_in = page.user.is_some();

    let free = card(
        page,
        0,
        page.t("plans.free"),
        0,
        config.free_meal_limit,
        config.free_health_limit,
        signed_in && current.is_none(),
    );

    let cards: String = plans
        .iter()
        .map(|plan| {
            card(
                page,
                plan.id,
                &plan.name,
                plan.price,
                plan.monthly_meal_limit,
                plan.monthly_health_limit,
                current == Some(plan.id),
            )
        })
        .collect();

    let hint = if signed_in {
        String::new()
    } else {
        format!(
            r#"<p class="login-hint"><a href="/accounts/login/?next=/plans/">{}</a></p>"#,
            page.t("plans.login_to_select")
        )
    };

    format!(
        r#"<h1>{heading}</h1>
<p>{intro}</p>
{hint}
<section class="plan-list">{free}{cards}</section>"#,
        heading = page.t("plans.title"),
        intro = page.t("plans.intro"),
    )
}
