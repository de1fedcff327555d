//! Form decoding and validation.
//!
//! Bodies are decoded into ordered `(name, value)` pairs so multi-select checkboxes keep every
//! value. Validation turns the pairs into typed input or a [`FormErrors`] of message ids; on
//! failure the submitted pairs go back to the page untouched so every control shows what was sent.
use std::collections::BTreeMap;

use axum::extract::{Form, FromRequest, Request};
use catalog::Catalog;

use crate::{
    error::AppError,
    models::{
        Allergen, BodyType, Choice, FoodFeeling, FoodImportance, FoodType, Gender, HealthIssue,
        Pet, PetProfile, PetType, TreatFrequency,
    },
    session::Session,
};

pub const NON_FIELD: &str = "__all__";

pub const PET_NAME_MAX: usize = 50;
pub const COMMENT_MAX: usize = 1000;
pub const WEIGHT_MAX: f32 = 120.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData(Vec<(String, String)>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed value, `""` when absent.
    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default().trim()
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.0.iter().any(|(key, v)| key == name && v == value)
    }

    /// Values of an existing pet, for the edit form.
    pub fn from_pet(pet: &Pet) -> Self {
        let profile = &pet.profile;
        let mut data = Self::new();

        data.push("name", profile.name.clone());
        data.push("pet_type", profile.pet_type.value());
        data.push("gender", profile.gender.value());
        if profile.neutered {
            data.push("neutered", "on");
        }
        data.push("age_years", profile.age_years.to_string());
        data.push("age_months", profile.age_months.to_string());
        data.push("age_weeks", profile.age_weeks.to_string());
        if let Some(breed) = profile.breed {
            data.push("breed", breed.to_string());
        }
        data.push("body_type", profile.body_type.value());
        data.push("weight", profile.weight.to_string());
        for allergen in &profile.food_allergies {
            data.push("food_allergies", allergen.value());
        }
        for issue in &profile.health_issues {
            data.push("health_issues", issue.value());
        }
        for food_type in &profile.food_types {
            data.push("food_types", food_type.value());
        }
        data.push("food_feeling", profile.food_feeling.value());
        data.push("food_importance", profile.food_importance.value());
        data.push("treat_frequency", profile.treat_frequency.value());

        data
    }
}

impl From<Vec<(String, String)>> for FormData {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

/// Field name to message ids. [`NON_FIELD`] holds errors about the form as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(BTreeMap<String, Vec<&'static str>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message_id: &'static str) {
        self.0.entry(field.to_string()).or_default().push(message_id);
    }

    pub fn field(&self, field: &str) -> &[&'static str] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn non_field(&self) -> &[&'static str] {
        self.field(NON_FIELD)
    }

    pub fn has(&self, field: &str) -> bool {
        !self.field(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Submitted values plus errors, what a form page needs to redraw itself.
#[derive(Debug, Clone, Default)]
pub struct BoundForm {
    pub data: FormData,
    pub errors: FormErrors,
}

impl BoundForm {
    pub fn new(data: FormData, errors: FormErrors) -> Self {
        Self { data, errors }
    }
}

/// URL-encoded body whose `csrf_token` matched the session's.
pub struct CsrfForm(pub FormData);

impl<S> FromRequest<S> for CsrfForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let session = request
            .extensions()
            .get::<Session>()
            .cloned()
            .ok_or(AppError::MissingSession)?;

        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, state)
            .await
            .map_err(|_| AppError::MalformedPayload)?;
        let data = FormData::from(pairs);

        session.verify_csrf(data.get("csrf_token").unwrap_or_default())?;

        Ok(CsrfForm(data))
    }
}

fn required_choice<C: Choice>(data: &FormData, errors: &mut FormErrors) -> Option<C> {
    match data.text(C::FIELD) {
        "" => {
            errors.add(C::FIELD, "errors.required");
            None
        }
        value => {
            let parsed = C::parse(value);
            if parsed.is_none() {
                errors.add(C::FIELD, "errors.invalid_choice");
            }
            parsed
        }
    }
}

fn multi_choice<C: Choice>(data: &FormData, errors: &mut FormErrors) -> Vec<C> {
    let mut choices = Vec::new();

    for value in data.get_all(C::FIELD) {
        match C::parse(value) {
            Some(choice) if !choices.contains(&choice) => choices.push(choice),
            Some(_) => {}
            None => {
                errors.add(C::FIELD, "errors.invalid_choice");
                break;
            }
        }
    }

    choices
}

fn number_in_range(
    data: &FormData,
    field: &str,
    max: u8,
    errors: &mut FormErrors,
) -> Option<u8> {
    let raw = data.text(field);
    if raw.is_empty() {
        return Some(0);
    }

    match raw.parse::<u8>() {
        Ok(value) if value <= max => Some(value),
        _ => {
            errors.add(field, "errors.out_of_range");
            None
        }
    }
}

pub fn validate_pet(data: &FormData, catalog: &Catalog) -> Result<PetProfile, FormErrors> {
    let mut errors = FormErrors::new();

    let name = data.text("name");
    if name.is_empty() {
        errors.add("name", "errors.required");
    } else if name.chars().count() > PET_NAME_MAX {
        errors.add("name", "errors.too_long");
    }

    let pet_type = required_choice::<PetType>(data, &mut errors);
    let gender = required_choice::<Gender>(data, &mut errors);
    let body_type = required_choice::<BodyType>(data, &mut errors);
    let food_feeling = required_choice::<FoodFeeling>(data, &mut errors);
    let food_importance = required_choice::<FoodImportance>(data, &mut errors);
    let treat_frequency = required_choice::<TreatFrequency>(data, &mut errors);

    let age_years = number_in_range(data, "age_years", 30, &mut errors);
    let age_months = number_in_range(data, "age_months", 11, &mut errors);
    let age_weeks = number_in_range(data, "age_weeks", 4, &mut errors);
    if let (Some(0), Some(0), Some(0)) = (age_years, age_months, age_weeks) {
        errors.add("age_years", "errors.age_required");
    }

    let weight = match data.text("weight") {
        "" => {
            errors.add("weight", "errors.required");
            None
        }
        raw => match raw.parse::<f32>() {
            Ok(weight) if weight.is_finite() && weight > 0.0 && weight <= WEIGHT_MAX => {
                Some(weight)
            }
            Ok(_) => {
                errors.add("weight", "errors.out_of_range");
                None
            }
            Err(_) => {
                errors.add("weight", "errors.not_a_number");
                None
            }
        },
    };

    let breed = match data.text("breed") {
        "" => None,
        raw => match raw.parse::<u32>().ok().and_then(|id| catalog.breed(id)) {
            Some(breed) => {
                if pet_type.is_some_and(|pet_type| pet_type.value() != breed.pet_type) {
                    errors.add("breed", "errors.breed_mismatch");
                }
                Some(breed.id)
            }
            None => {
                errors.add("breed", "errors.invalid_choice");
                None
            }
        },
    };

    let food_allergies = multi_choice::<Allergen>(data, &mut errors);
    let health_issues = multi_choice::<HealthIssue>(data, &mut errors);
    let food_types = multi_choice::<FoodType>(data, &mut errors);

    match (
        pet_type,
        gender,
        body_type,
        food_feeling,
        food_importance,
        treat_frequency,
        age_years,
        age_months,
        age_weeks,
        weight,
    ) {
        (
            Some(pet_type),
            Some(gender),
            Some(body_type),
            Some(food_feeling),
            Some(food_importance),
            Some(treat_frequency),
            Some(age_years),
            Some(age_months),
            Some(age_weeks),
            Some(weight),
        ) if errors.is_empty() => Ok(PetProfile {
            name: name.to_string(),
            pet_type,
            gender,
            neutered: data.get("neutered").is_some(),
            age_years,
            age_months,
            age_weeks,
            breed,
            body_type,
            weight,
            food_allergies,
            health_issues,
            food_types,
            food_feeling,
            food_importance,
            treat_frequency,
        }),
        _ => Err(errors),
    }
}

pub fn validate_rating(data: &FormData) -> Result<u8, FormErrors> {
    let mut errors = FormErrors::new();

    let value = match data.text("value").parse::<u8>() {
        Ok(value @ 1..=5) => value,
        _ => {
            errors.add("value", "errors.rating_range");
            0
        }
    };

    errors.into_result(value)
}

pub fn validate_comment(data: &FormData) -> Result<String, FormErrors> {
    let mut errors = FormErrors::new();

    let content = data.text("content");
    if content.is_empty() {
        errors.add("content", "errors.required");
    } else if content.chars().count() > COMMENT_MAX {
        errors.add("content", "errors.too_long");
    }

    errors.into_result(content.to_string())
}

#[cfg_attr(test, derive(Debug))]
pub struct Registration {
    pub username: String,
    pub password: String,
}

pub fn validate_registration(data: &FormData) -> Result<Registration, FormErrors> {
    let mut errors = FormErrors::new();

    let username = data.text("username");
    if username.is_empty() {
        errors.add("username", "errors.required");
    } else if !(3..=30).contains(&username.chars().count())
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.add("username", "errors.username_format");
    }

    let password = data.get("password").unwrap_or_default();
    if password.is_empty() {
        errors.add("password", "errors.required");
    } else if password.chars().count() < 8 {
        errors.add("password", "errors.password_short");
    }

    if data.get("password_confirm").unwrap_or_default() != password {
        errors.add("password_confirm", "errors.password_mismatch");
    }

    errors.into_result(Registration {
        username: username.to_string(),
        password: password.to_string(),
    })
}
