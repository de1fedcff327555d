//! # Reports
//!
//! Entry point for the AI meal/health buttons. The generation itself belongs to an external
//! service; this module only decides who may ask, counts it against the monthly plan limit and
//! stores what comes back.
//!
//! ## Generators
//! - [`HttpGenerator`]: POSTs the pet profile and the reader's language to `AI_ENDPOINT` and
//!   expects `{title, lines}` back.
//! - [`NutritionEstimator`]: local fallback when no endpoint is configured. Daily energy follows
//!   the usual resting energy requirement, `70 * kg^0.75`, scaled by life stage, neutering and
//!   body shape.
//!
//! Reports are stored as generated, in the language they were requested in.
//!
//! ## Quota
//! One unit per generation, per kind, per calendar month (UTC). The unit is taken before calling
//! the generator and given back if generation or storing fails.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    i18n::{Language, Locales, Translator},
    models::{
        BodyType, Choice, FoodFeeling, FoodType, NewReport, Pet, PetProfile, PetType, Report,
        ReportKind, TreatFrequency, UserId,
    },
    state::AppState,
    store::StoreError,
    utils::current_period,
};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generator returned an empty report")]
    Empty,
}

#[derive(Serialize)]
pub struct ReportRequest<'a> {
    pub kind: ReportKind,
    pub language: Language,
    pub pet: &'a PetProfile,
    pub breed: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedReport {
    pub title: String,
    pub lines: Vec<String>,
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &ReportRequest<'_>,
    ) -> Result<GeneratedReport, GenerationError>;
}

pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerator {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ReportGenerator for HttpGenerator {
    async fn generate(
        &self,
        request: &ReportRequest<'_>,
    ) -> Result<GeneratedReport, GenerationError> {
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let report: GeneratedReport = call.send().await?.error_for_status()?.json().await?;
        if report.lines.is_empty() {
            return Err(GenerationError::Empty);
        }

        Ok(report)
    }
}

/// Writes its reports from the message catalogs, in the language of the request.
pub struct NutritionEstimator {
    locales: Arc<Locales>,
}

impl NutritionEstimator {
    pub fn new(locales: Arc<Locales>) -> Self {
        Self { locales }
    }

    pub fn resting_energy(weight_kg: f32) -> f32 {
        70.0 * weight_kg.powf(0.75)
    }

    pub fn energy_factor(profile: &PetProfile) -> f32 {
        let months = profile.age_in_months();
        let senior = match profile.pet_type {
            PetType::Dog => months >= 7.0 * 12.0,
            PetType::Cat => months >= 11.0 * 12.0,
        };

        let life_stage = match (profile.pet_type, months) {
            (_, m) if m < 4.0 => 3.0,
            (PetType::Dog, m) if m < 12.0 => 2.0,
            (PetType::Cat, m) if m < 12.0 => 2.5,
            (PetType::Dog, _) if senior => 1.4,
            (PetType::Cat, _) if senior => 1.1,
            (PetType::Dog, _) if profile.neutered => 1.6,
            (PetType::Dog, _) => 1.8,
            (PetType::Cat, _) if profile.neutered => 1.2,
            (PetType::Cat, _) => 1.4,
        };

        let body = match profile.body_type {
            BodyType::VeryThin => 1.2,
            BodyType::Thin => 1.1,
            BodyType::Ideal => 1.0,
            BodyType::Overweight => 0.9,
            BodyType::Obese => 0.8,
        };

        life_stage * body
    }

    pub fn daily_calories(profile: &PetProfile) -> f32 {
        Self::resting_energy(profile.weight) * Self::energy_factor(profile)
    }

    fn meal_plan(tr: &Translator, request: &ReportRequest<'_>) -> GeneratedReport {
        let pet = request.pet;
        let calories = Self::daily_calories(pet).round();
        let meals = match pet.age_in_months() {
            m if m < 6.0 => 4,
            m if m < 12.0 => 3,
            _ => 2,
        };
        let per_meal = (calories / meals as f32).round();
        let treats = (calories * 0.1).round();

        let mut lines = vec![
            tr.tf("report.meal.energy", &[("calories", calories.to_string().as_str())]),
            tr.tf(
                "report.meal.split",
                &[
                    ("meals", meals.to_string().as_str()),
                    ("per_meal", per_meal.to_string().as_str()),
                ],
            ),
            tr.tf("report.meal.treats", &[("treats", treats.to_string().as_str())]),
        ];

        if let Some(breed) = request.breed {
            lines.push(tr.tf("report.meal.breed", &[("breed", breed)]));
        }

        if !pet.food_allergies.is_empty() {
            let avoid: Vec<String> = pet
                .food_allergies
                .iter()
                .map(|allergen| tr.t(&allergen.label_id()).to_string())
                .collect();
            lines.push(tr.tf("report.meal.avoid", &[("items", avoid.join(", ").as_str())]));
        }

        match pet.food_feeling {
            FoodFeeling::Picky => lines.push(tr.t("report.meal.picky").to_string()),
            FoodFeeling::Glutton => lines.push(tr.t("report.meal.glutton").to_string()),
            FoodFeeling::Normal => {}
        }

        if pet.pet_type == PetType::Cat && !pet.food_types.contains(&FoodType::Wet) {
            lines.push(tr.t("report.meal.wet_food").to_string());
        }

        GeneratedReport {
            title: tr.t(&ReportKind::Meal.label_id()).to_string(),
            lines,
        }
    }

    fn health_check(tr: &Translator, request: &ReportRequest<'_>) -> GeneratedReport {
        let pet = request.pet;
        let mut lines = Vec::new();

        let condition = match pet.body_type {
            BodyType::VeryThin | BodyType::Thin => "report.health.underweight",
            BodyType::Overweight | BodyType::Obese => "report.health.overweight",
            BodyType::Ideal => "report.health.ideal",
        };
        lines.push(tr.t(condition).to_string());

        for issue in &pet.health_issues {
            let label = tr.t(&issue.label_id()).to_string();
            lines.push(tr.tf("report.health.issue", &[("issue", label.as_str())]));
        }

        if !pet.food_allergies.is_empty() {
            lines.push(tr.t("report.health.allergies").to_string());
        }

        if pet.treat_frequency == TreatFrequency::SeveralDaily {
            lines.push(tr.t("report.health.treats").to_string());
        }

        if !pet.neutered && pet.age_in_months() >= 6.0 {
            lines.push(tr.t("report.health.intact").to_string());
        }

        let senior = match pet.pet_type {
            PetType::Dog => pet.age_years >= 7,
            PetType::Cat => pet.age_years >= 11,
        };
        if senior {
            lines.push(tr.t("report.health.senior").to_string());
        }

        GeneratedReport {
            title: tr.t(&ReportKind::Health.label_id()).to_string(),
            lines,
        }
    }
}

#[async_trait]
impl ReportGenerator for NutritionEstimator {
    async fn generate(
        &self,
        request: &ReportRequest<'_>,
    ) -> Result<GeneratedReport, GenerationError> {
        let tr = Translator::new(request.language, self.locales.clone());

        Ok(match request.kind {
            ReportKind::Meal => Self::meal_plan(&tr, request),
            ReportKind::Health => Self::health_check(&tr, request),
        })
    }
}

#[derive(Debug)]
pub enum Outcome {
    Created(Report),
    QuotaExceeded,
    Failed,
}

/// Monthly limit for a user's active plan, free tier otherwise.
pub async fn monthly_limit(
    state: &AppState,
    user_id: UserId,
    kind: ReportKind,
) -> Result<u32, StoreError> {
    let plan = state
        .store
        .subscription(user_id)
        .await?
        .and_then(|subscription| state.catalog.plan(subscription.plan_id));

    Ok(match (plan, kind) {
        (Some(plan), ReportKind::Meal) => plan.monthly_meal_limit,
        (Some(plan), ReportKind::Health) => plan.monthly_health_limit,
        (None, ReportKind::Meal) => state.config.free_meal_limit,
        (None, ReportKind::Health) => state.config.free_health_limit,
    })
}

pub async fn create_report(
    state: &AppState,
    pet: &Pet,
    kind: ReportKind,
    language: Language,
) -> Result<Outcome, StoreError> {
    let period = current_period();
    let limit = monthly_limit(state, pet.owner, kind).await?;

    if !state
        .store
        .consume_quota(pet.owner, kind, &period, limit)
        .await?
    {
        info!("User {} hit the {} limit of {limit}", pet.owner, kind.value());
        return Ok(Outcome::QuotaExceeded);
    }

    let breed = pet
        .profile
        .breed
        .and_then(|id| state.catalog.breed(id))
        .map(|breed| breed.name.as_str());
    let request = ReportRequest {
        kind,
        language,
        pet: &pet.profile,
        breed,
    };

    let generated = match state.generator.generate(&request).await {
        Ok(generated) => generated,
        Err(e) => {
            error!("Report generation for pet {} failed: {e}", pet.id);
            state.store.refund_quota(pet.owner, kind, &period).await?;
            return Ok(Outcome::Failed);
        }
    };

    let stored = state
        .store
        .insert_report(NewReport {
            owner: pet.owner,
            pet_id: pet.id,
            pet_name: pet.profile.name.clone(),
            kind,
            title: generated.title,
            lines: generated.lines,
        })
        .await;

    match stored {
        Ok(report) => Ok(Outcome::Created(report)),
        Err(e) => {
            state.store.refund_quota(pet.owner, kind, &period).await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Allergen, FoodImportance, Gender, HealthIssue};

    fn estimator() -> NutritionEstimator {
        NutritionEstimator::new(Arc::new(Locales::load().unwrap()))
    }

    fn profile(pet_type: PetType, weight: f32, years: u8) -> PetProfile {
        PetProfile {
            name: "Coco".to_string(),
            pet_type,
            gender: Gender::Male,
            neutered: true,
            age_years: years,
            age_months: 0,
            age_weeks: 0,
            breed: None,
            body_type: BodyType::Ideal,
            weight,
            food_allergies: vec![],
            health_issues: vec![],
            food_types: vec![],
            food_feeling: FoodFeeling::Normal,
            food_importance: FoodImportance::Price,
            treat_frequency: TreatFrequency::Weekly,
        }
    }

    #[test]
    fn test_resting_energy() {
        // 70 * 16^0.75 = 70 * 8
        assert!((NutritionEstimator::resting_energy(16.0) - 560.0).abs() < 0.01);
    }

    #[test]
    fn test_neutered_adult_dog_factor() {
        let dog = profile(PetType::Dog, 10.0, 3);

        assert!((NutritionEstimator::energy_factor(&dog) - 1.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_puppy_needs_more_than_adult() {
        let mut puppy = profile(PetType::Dog, 10.0, 0);
        puppy.age_months = 6;
        let adult = profile(PetType::Dog, 10.0, 3);

        assert!(
            NutritionEstimator::daily_calories(&puppy) > NutritionEstimator::daily_calories(&adult)
        );
    }

    #[test]
    fn test_overweight_gets_less() {
        let ideal = profile(PetType::Cat, 5.0, 4);
        let mut heavy = ideal.clone();
        heavy.body_type = BodyType::Obese;

        assert!(
            NutritionEstimator::daily_calories(&heavy) < NutritionEstimator::daily_calories(&ideal)
        );
    }

    #[tokio::test]
    async fn test_meal_plan_mentions_allergies() {
        let mut dog = profile(PetType::Dog, 10.0, 3);
        dog.food_allergies = vec![Allergen::Chicken];
        let request = ReportRequest {
            kind: ReportKind::Meal,
            language: Language::En,
            pet: &dog,
            breed: Some("Beagle"),
        };

        let report = estimator().generate(&request).await.unwrap();

        assert_eq!(report.title, "Meal plan");
        assert!(report.lines.iter().any(|line| line == "Avoid: Chicken."));
        assert!(report.lines.iter().any(|line| line.contains("Beagle")));
    }

    #[tokio::test]
    async fn test_health_check_flags_senior_cat() {
        let cat = profile(PetType::Cat, 4.0, 12);
        let request = ReportRequest {
            kind: ReportKind::Health,
            language: Language::En,
            pet: &cat,
            breed: None,
        };

        let report = estimator().generate(&request).await.unwrap();

        assert!(report.lines.iter().any(|line| line.starts_with("Senior")));
    }

    #[tokio::test]
    async fn test_reports_follow_requested_language() {
        let mut dog = profile(PetType::Dog, 16.0, 3);
        dog.health_issues = vec![HealthIssue::Skin];
        let meal = ReportRequest {
            kind: ReportKind::Meal,
            language: Language::Ko,
            pet: &dog,
            breed: None,
        };
        let health = ReportRequest {
            kind: ReportKind::Health,
            ..meal
        };

        let meal = estimator().generate(&meal).await.unwrap();
        let health = estimator().generate(&health).await.unwrap();

        // 560 kcal resting energy * 1.6
        assert_eq!(meal.title, "식단");
        assert_eq!(meal.lines[0], "하루 에너지 목표: 896 kcal");
        assert!(health.lines.iter().any(|line| line.starts_with("피부")));
        assert!(
            meal.lines
                .iter()
                .chain(&health.lines)
                .all(|line| !line.is_ascii())
        );
    }
}
