use catalog::Catalog;

use crate::{
    forms::BoundForm,
    models::{
        Allergen, BodyType, Choice, FoodFeeling, FoodImportance, FoodType, Gender, HealthIssue,
        Pet, PetType, TreatFrequency,
    },
};

use super::{Page, chip, choice_chips, escape, field_errors, fieldset, non_field_errors, text_input};

pub const EMPTY_OPTION: &str = "---------";

fn age(page: &Page, pet: &Pet) -> String {
    let profile = &pet.profile;
    let mut parts = Vec::new();
    if profile.age_years > 0 {
        parts.push(page.tf("pets.age_years", &[("n", profile.age_years.to_string().as_str())]));
    }
    if profile.age_months > 0 {
        parts.push(page.tf("pets.age_months", &[("n", profile.age_months.to_string().as_str())]));
    }
    if profile.age_weeks > 0 {
        parts.push(page.tf("pets.age_weeks", &[("n", profile.age_weeks.to_string().as_str())]));
    }

    parts.join(" ")
}

pub fn list(page: &Page, pets: &[Pet], catalog: &Catalog) -> String {
    let body = if pets.is_empty() {
        format!(r#"<p class="empty">{}</p>"#, page.t("pets.empty"))
    } else {
        pets.iter()
            .map(|pet| {
                let profile = &pet.profile;
                let breed = profile
                    .breed
                    .and_then(|id| catalog.breed(id))
                    .map_or_else(|| page.t("pets.mixed").to_string(), |b| b.name.clone());

                format!(
                    r#"<article class="pet-card" data-pet-id="{id}">
<h2>{name}</h2>
<p class="meta">{pet_type} · {breed} · {age} · {weight} kg</p>
<div class="actions">
<a href="/pets/{id}/ai-meal/" class="button ai-action">{ai_meal}</a>
<a href="/pets/{id}/ai-health/" class="button ai-action">{ai_health}</a>
<a href="/pets/{id}/edit/">{edit}</a>
<a href="/pets/{id}/delete/" class="danger">{delete}</a>
</div>
</article>"#,
                    id = pet.id,
                    name = escape(&profile.name),
                    pet_type = page.t(&profile.pet_type.label_id()),
                    breed = escape(&breed),
                    age = age(page, pet),
                    weight = profile.weight,
                    ai_meal = page.t("pets.ai_meal"),
                    ai_health = page.t("pets.ai_health"),
                    edit = page.t("pets.edit"),
                    delete = page.t("pets.delete"),
                )
            })
            .collect()
    };

    format!(
        r#"<h1>{heading}</h1>
<p><a href="/pets/new/" class="button">{add}</a></p>
<section class="pet-list">{body}</section>"#,
        heading = page.t("pets.title"),
        add = page.t("pets.add"),
    )
}

/// Breed options for the submitted pet type, an empty placeholder first.
pub fn breed_options(catalog: &Catalog, pet_type: Option<&str>, selected: Option<&str>) -> String {
    let mut options = format!(r#"<option value="">{EMPTY_OPTION}</option>"#);

    if let Some(pet_type) = pet_type {
        for breed in catalog.breeds_for(pet_type) {
            let id = breed.id.to_string();
            options.push_str(&format!(
                r#"<option value="{id}"{selected}>{name}</option>"#,
                selected = if selected == Some(id.as_str()) { " selected" } else { "" },
                name = escape(&breed.name),
            ));
        }
    }

    options
}

pub fn form(
    page: &Page,
    form: &BoundForm,
    catalog: &Catalog,
    action: &str,
    heading: &str,
) -> String {
    let data = &form.data;

    let neutered = fieldset(
        page,
        form,
        "neutered",
        &chip(
            "checkbox",
            "neutered",
            "on",
            page.t("field.neutered_yes"),
            data.get("neutered").is_some(),
        ),
    );

    let age_inputs: String = [("age_years", 30), ("age_months", 11), ("age_weeks", 4)]
        .iter()
        .map(|(field, max)| {
            format!(
                r#"<label>{label} <input type="number" name="{field}" min="0" max="{max}" value="{value}"></label>"#,
                label = page.t(&format!("field.{field}")),
                value = escape(data.get(field).unwrap_or("0")),
            )
        })
        .collect();
    let age_invalid = ["age_years", "age_months", "age_weeks"]
        .iter()
        .any(|field| form.errors.has(field));
    let age = format!(
        r#"<fieldset class="field{invalid}"><legend>{legend}</legend><div class="age-inputs">{age_inputs}</div>{e_years}{e_months}{e_weeks}</fieldset>"#,
        invalid = if age_invalid { " field-invalid" } else { "" },
        legend = page.t("field.age"),
        e_years = field_errors(page, &form.errors, "age_years"),
        e_months = field_errors(page, &form.errors, "age_months"),
        e_weeks = field_errors(page, &form.errors, "age_weeks"),
    );

    let breed = format!(
        r#"<div class="field{invalid}"><label for="id_breed">{label}</label><select id="id_breed" name="breed" data-breeds-url="/pets/breeds/">{options}</select><p id="breed-error" class="field-error" hidden>{lookup_failed}</p>{errors}</div>"#,
        invalid = if form.errors.has("breed") { " field-invalid" } else { "" },
        label = page.t("field.breed"),
        options = breed_options(catalog, data.get("pet_type"), data.get("breed")),
        lookup_failed = page.t("pets.breed_lookup_failed"),
        errors = field_errors(page, &form.errors, "breed"),
    );

    let weight = format!(
        r#"<div class="field{invalid}"><label for="id_weight">{label}</label><input type="number" id="id_weight" name="weight" step="0.1" min="0" value="{value}"> kg{errors}</div>"#,
        invalid = if form.errors.has("weight") { " field-invalid" } else { "" },
        label = page.t("field.weight"),
        value = escape(data.get("weight").unwrap_or_default()),
        errors = field_errors(page, &form.errors, "weight"),
    );

    format!(
        r#"<h1>{heading}</h1>
<form method="post" action="{action}" class="pet-form">
{csrf}
{non_field}
{name}
{pet_type}
{gender}
{neutered}
{age}
{breed}
{body_type}
{weight}
{allergies}
{health}
{food_types}
{feeling}
{importance}
{treats}
<button type="submit">{submit}</button>
<a href="/pets/">{cancel}</a>
</form>"#,
        heading = escape(heading),
        action = escape(action),
        csrf = page.csrf_input(),
        non_field = non_field_errors(page, &form.errors),
        name = text_input(page, form, "name", "text"),
        pet_type = choice_chips::<PetType>(page, form, false),
        gender = choice_chips::<Gender>(page, form, false),
        body_type = choice_chips::<BodyType>(page, form, false),
        allergies = choice_chips::<Allergen>(page, form, true),
        health = choice_chips::<HealthIssue>(page, form, true),
        food_types = choice_chips::<FoodType>(page, form, true),
        feeling = choice_chips::<FoodFeeling>(page, form, false),
        importance = choice_chips::<FoodImportance>(page, form, false),
        treats = choice_chips::<TreatFrequency>(page, form, false),
        submit = page.t("pets.save"),
        cancel = page.t("common.cancel"),
    )
}

pub fn confirm_delete(page: &Page, pet: &Pet) -> String {
    format!(
        r#"<h1>{heading}</h1>
<p>{question}</p>
<form method="post" action="/pets/{id}/delete/">
{csrf}
<button type="submit" class="danger">{confirm}</button>
<a href="/pets/">{cancel}</a>
</form>"#,
        heading = page.t("pets.delete_title"),
        question = page.tf("pets.delete_confirm", &[("name", escape(&pet.profile.name).as_str())]),
        id = pet.id,
        csrf = page.csrf_input(),
        confirm = page.t("pets.delete_yes"),
        cancel = page.t("common.cancel"),
    )
}
