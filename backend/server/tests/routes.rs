use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use catalog::{Breed, Catalog, Plan};
use http_body_util::BodyExt;
use server::{
    app,
    config::Config,
    i18n::Locales,
    models::{
        BodyType, FoodFeeling, FoodImportance, Gender, NewPost, Pet, PetProfile, PetType,
        ReportKind, TreatFrequency, User,
    },
    reports::{
        GeneratedReport, GenerationError, NutritionEstimator, ReportGenerator, ReportRequest,
    },
    session::SessionData,
    state::AppState,
    store::{MemoryStore, Store},
    utils::current_period,
};
use tower::ServiceExt;

const TOKEN: &str = "test-csrf-token";

struct FailingGenerator;

#[async_trait]
impl ReportGenerator for FailingGenerator {
    async fn generate(&self, _: &ReportRequest<'_>) -> Result<GeneratedReport, GenerationError> {
        Err(GenerationError::Empty)
    }
}

fn catalog() -> Catalog {
    let breed = |id: u32, pet_type: &str, name: &str| Breed {
        id,
        pet_type: pet_type.to_string(),
        name: name.to_string(),
    };

    Catalog {
        breeds: vec![
            breed(1, "dog", "Poodle"),
            breed(2, "dog", "Beagle"),
            breed(3, "cat", "Persian"),
        ],
        plans: vec![Plan {
            id: 1,
            name: "Basic".to_string(),
            price: 4900,
            monthly_meal_limit: 5,
            monthly_health_limit: 2,
        }],
        next_breed_id: 4,
        next_plan_id: 2,
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        let locales = Arc::new(Locales::load().unwrap());
        Self::with_generator(Arc::new(NutritionEstimator::new(locales)))
    }

    fn with_generator(generator: Arc<dyn ReportGenerator>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_parts(
            Config::default(),
            catalog(),
            store.clone(),
            generator,
            Arc::new(Locales::load().unwrap()),
        );

        Self {
            router: app(Arc::new(state)),
            store,
        }
    }

    /// Creates a user and a stored session for it, returns both.
    async fn login(&self, username: &str) -> (User, String) {
        self.login_in(username, None).await
    }

    async fn login_in(&self, username: &str, language: Option<&str>) -> (User, String) {
        let user = self.store.create_user(username, "unused").await.unwrap();
        let session_id = format!("session-{username}");
        let data = SessionData {
            user_id: Some(user.id),
            csrf_token: TOKEN.to_string(),
            language: language.map(str::to_string),
            flashes: Vec::new(),
        };
        self.store
            .save_session(&session_id, &data, Duration::from_secs(3600))
            .await
            .unwrap();

        (user, format!("sessionid={session_id}"))
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, cookie: Option<&str>, form: &str) -> Response {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    async fn add_pet(&self, owner: &User) -> Pet {
        self.store.insert_pet(owner.id, profile()).await.unwrap()
    }

    async fn add_post(&self) {
        self.store
            .insert_post(NewPost {
                title: "Raw food basics".to_string(),
                slug: "raw-food".to_string(),
                content: "Raw diets need care.\n\nStart slowly.".to_string(),
                image: None,
                category: "food".to_string(),
                author: "PawFeed".to_string(),
            })
            .await
            .unwrap();
    }
}

fn profile() -> PetProfile {
    PetProfile {
        name: "Coco".to_string(),
        pet_type: PetType::Dog,
        gender: Gender::Female,
        neutered: true,
        age_years: 3,
        age_months: 0,
        age_weeks: 0,
        breed: Some(2),
        body_type: BodyType::Ideal,
        weight: 9.5,
        food_allergies: vec![],
        health_issues: vec![],
        food_types: vec![],
        food_feeling: FoodFeeling::Normal,
        food_importance: FoodImportance::Ingredients,
        treat_frequency: TreatFrequency::Daily,
    }
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of every cookie the response sets.
fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::to_string)
        .collect()
}

fn hidden_value(html: &str, name: &str) -> String {
    html.split(&format!(r#"name="{name}" value=""#))
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_breed_lookup_returns_breeds_of_type() {
    let app = TestApp::new();

    let response = app.get("/pets/breeds/?pet_type=dog", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let breeds: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
    assert_eq!(
        breeds,
        serde_json::json!([{"id": 2, "name": "Beagle"}, {"id": 1, "name": "Poodle"}])
    );
}

#[tokio::test]
async fn test_breed_lookup_rejects_unknown_type() {
    let app = TestApp::new();

    assert_eq!(
        app.get("/pets/breeds/?pet_type=hamster", None).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        app.get("/pets/breeds/", None).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_anonymous_redirected_to_login() {
    let app = TestApp::new();

    let response = app.get("/pets/", None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/accounts/login/?next=/pets/");
}

#[tokio::test]
async fn test_bad_csrf_token_rejected() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;

    let response = app
        .post(
            "/pets/new/",
            Some(&cookie),
            "csrf_token=wrong&name=Bori&pet_type=dog",
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.store.pets(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_pet() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;

    let form = format!(
        "csrf_token={TOKEN}&name=Bori&pet_type=dog&gender=male&neutered=on&age_years=2&age_months=0&age_weeks=0\
         &breed=1&body_type=thin&weight=7.2&food_allergies=beef&food_allergies=egg&food_types=dry\
         &food_feeling=picky&food_importance=price&treat_frequency=weekly"
    );
    let response = app.post("/pets/new/", Some(&cookie), &form).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/pets/");

    let pets = app.store.pets(user.id).await.unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].profile.name, "Bori");
    assert_eq!(pets[0].profile.food_allergies.len(), 2);

    let page = body(app.get("/pets/", Some(&cookie)).await).await;
    assert!(page.contains("Pet added."));
    assert!(page.contains(&format!(r#"href="/pets/{}/ai-meal/" class="button ai-action""#, pets[0].id)));
}

#[tokio::test]
async fn test_invalid_pet_form_keeps_values() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;

    let form = format!("csrf_token={TOKEN}&name=Bori&pet_type=cat&breed=1&food_types=wet");
    let response = app.post("/pets/new/", Some(&cookie), &form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = body(response).await;
    assert!(page.contains(r#"value="Bori""#));
    assert!(page.contains(r#"<input type="radio" name="pet_type" value="cat" checked>"#));
    assert!(page.contains(r#"<input type="checkbox" name="food_types" value="wet" checked>"#));
    assert!(page.contains("This breed does not match the pet type."));
    assert!(page.contains("field-invalid"));
    assert!(app.store.pets(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_without_ratings_or_comments() {
    let app = TestApp::new();
    app.add_post().await;

    let page = body(app.get("/blog/raw-food/", None).await).await;

    assert!(page.contains("No ratings"));
    assert!(page.contains("No comments yet"));
}

#[tokio::test]
async fn test_rating_twice_updates_single_record() {
    let app = TestApp::new();
    app.add_post().await;
    let (user, cookie) = app.login("coco").await;

    for value in ["3", "5"] {
        let response = app
            .post(
                "/blog/raw-food/rate/",
                Some(&cookie),
                &format!("csrf_token={TOKEN}&value={value}"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/blog/raw-food/");
    }

    let post = app.store.post_by_slug("raw-food").await.unwrap().unwrap();
    let ratings = app.store.ratings(post.id).await.unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].user_id, user.id);
    assert_eq!(ratings[0].value, 5);

    let page = body(app.get("/blog/raw-food/", Some(&cookie)).await).await;
    assert!(page.contains(r#"<input type="radio" name="value" value="5" checked>"#));
    assert!(!page.contains(r#"value="3" checked"#));
    assert!(page.contains("5.0"));
}

#[tokio::test]
async fn test_comments_listed_oldest_first() {
    let app = TestApp::new();
    app.add_post().await;
    let (_, cookie) = app.login("coco").await;

    for content in ["first+comment", "second+comment"] {
        app.post(
            "/blog/raw-food/comment/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&content={content}"),
        )
        .await;
    }

    let page = body(app.get("/blog/raw-food/", None).await).await;
    let first = page.find("first comment").unwrap();
    let second = page.find("second comment").unwrap();
    assert!(first < second);
    assert!(!page.contains("No comments yet"));
}

#[tokio::test]
async fn test_blank_comment_shows_error() {
    let app = TestApp::new();
    app.add_post().await;
    let (_, cookie) = app.login("coco").await;

    let response = app
        .post(
            "/blog/raw-food/comment/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&content=+++"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("This field is required."));
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;
    let pet = app.add_pet(&user).await;

    let page = body(app.get(&format!("/pets/{}/delete/", pet.id), Some(&cookie)).await).await;
    assert!(page.contains("Delete Coco?"));
    assert!(app.store.pet(pet.id).await.unwrap().is_some());

    let response = app
        .post(
            &format!("/pets/{}/delete/", pet.id),
            Some(&cookie),
            &format!("csrf_token={TOKEN}"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.store.pet(pet.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_other_users_pet_is_not_found() {
    let app = TestApp::new();
    let (owner, _) = app.login("coco").await;
    let (_, intruder) = app.login("bori").await;
    let pet = app.add_pet(&owner).await;

    let edit = app.get(&format!("/pets/{}/edit/", pet.id), Some(&intruder)).await;
    assert_eq!(edit.status(), StatusCode::NOT_FOUND);

    let delete = app
        .post(
            &format!("/pets/{}/delete/", pet.id),
            Some(&intruder),
            &format!("csrf_token={TOKEN}"),
        )
        .await;
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);

    let meal = app.get(&format!("/pets/{}/ai-meal/", pet.id), Some(&intruder)).await;
    assert_eq!(meal.status(), StatusCode::NOT_FOUND);

    assert!(app.store.pet(pet.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_ai_quota_refuses_after_free_limit() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;
    let pet = app.add_pet(&user).await;
    let url = format!("/pets/{}/ai-meal/", pet.id);

    let first = app.get(&url, Some(&cookie)).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert!(location(&first).starts_with("/reports/"));

    let report = body(app.get(location(&first), Some(&cookie)).await).await;
    assert!(report.contains("Your report is ready."));
    assert!(report.contains("Daily energy target"));

    let second = app.get(&url, Some(&cookie)).await;
    assert_eq!(location(&second), "/plans/");
    assert_eq!(
        app.store
            .usage(user.id, ReportKind::Meal, &current_period())
            .await
            .unwrap(),
        1
    );

    // health has its own counter
    let health = app.get(&format!("/pets/{}/ai-health/", pet.id), Some(&cookie)).await;
    assert!(location(&health).starts_with("/reports/"));
}

#[tokio::test]
async fn test_failed_generation_gives_quota_back() {
    let app = TestApp::with_generator(Arc::new(FailingGenerator));
    let (user, cookie) = app.login("coco").await;
    let pet = app.add_pet(&user).await;

    let response = app.get(&format!("/pets/{}/ai-meal/", pet.id), Some(&cookie)).await;

    assert_eq!(location(&response), "/pets/");
    assert_eq!(
        app.store
            .usage(user.id, ReportKind::Meal, &current_period())
            .await
            .unwrap(),
        0
    );
    assert!(app.store.reports(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_selection() {
    let app = TestApp::new();
    let (user, cookie) = app.login("coco").await;

    let response = app
        .post("/plans/update/", Some(&cookie), &format!("csrf_token={TOKEN}&plan_id=1"))
        .await;
    assert_eq!(location(&response), "/plans/");
    assert_eq!(
        app.store.subscription(user.id).await.unwrap().map(|s| s.plan_id),
        Some(1)
    );

    let page = body(app.get("/plans/", Some(&cookie)).await).await;
    assert!(page.contains("plan-current"));
    assert!(page.contains("₩4,900"));

    app.post("/plans/update/", Some(&cookie), &format!("csrf_token={TOKEN}&plan_id=99"))
        .await;
    assert_eq!(
        app.store.subscription(user.id).await.unwrap().map(|s| s.plan_id),
        Some(1)
    );
}

#[tokio::test]
async fn test_language_switch_keeps_page() {
    let app = TestApp::new();
    let (_, cookie) = app.login("coco").await;

    let response = app
        .post(
            "/i18n/setlang/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&language=ko&next=%2Fblog%2F"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/blog/");

    let page = body(app.get("/blog/", Some(&cookie)).await).await;
    assert!(page.contains(r#"<html lang="ko">"#));
    assert!(page.contains("블로그"));
}

#[tokio::test]
async fn test_language_switch_ignores_foreign_next() {
    let app = TestApp::new();
    let (_, cookie) = app.login("coco").await;

    let response = app
        .post(
            "/i18n/setlang/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&language=ko&next=%2F%2Fevil.example"),
        )
        .await;

    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_accept_language_negotiation() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/about/")
                .header(ACCEPT_LANGUAGE, "ko-KR,ko;q=0.9,en;q=0.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(body(response).await.contains("PawFeed 소개"));
}

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new();

    // first visit only hands out the token cookie
    let form_page = app.get("/accounts/register/", None).await;
    let cookie = set_cookies(&form_page).remove(0);
    assert!(cookie.starts_with("csrftoken="));
    let token = hidden_value(&body(form_page).await, "csrf_token");

    let response = app
        .post(
            "/accounts/register/",
            Some(&cookie),
            &format!(
                "csrf_token={token}&username=coco_owner&password=longenough\
                 &password_confirm=longenough"
            ),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/");

    let rotated = set_cookies(&response).remove(0);
    assert!(rotated.starts_with("sessionid="));

    let dashboard = body(app.get("/dashboard/", Some(&rotated)).await).await;
    assert!(dashboard.contains("Welcome, coco_owner"));
    assert!(dashboard.contains("Meal plans: 0/1 this month"));

    assert_eq!(
        app.get("/dashboard/", Some(&cookie)).await.status(),
        StatusCode::SEE_OTHER
    );
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = TestApp::new();
    let hash = server::utils::hash_password("correct-password".to_string())
        .await
        .unwrap();
    app.store.create_user("coco", &hash).await.unwrap();

    let (_, cookie) = app.login("bori").await;
    let response = app
        .post(
            "/accounts/login/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&username=coco&password=nope&next=%2Fpets%2F"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await.contains("Wrong username or password."));
}

#[tokio::test]
async fn test_unknown_page_is_404() {
    let app = TestApp::new();

    let response = app.get("/nowhere/", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body(response).await.contains("Page not found"));
}

#[tokio::test]
async fn test_client_script_served() {
    let app = TestApp::new();

    let response = app.get("/assets/app.js", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/javascript")
    );
    let script = body(response).await;
    assert!(script.contains("---------"));
    assert!(script.contains("loading-overlay"));
}

#[tokio::test]
async fn test_missing_post_renders_translated_page() {
    let app = TestApp::new();
    let (_, cookie) = app.login_in("coco", Some("ko")).await;

    let response = app.get("/blog/missing/", Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let page = body(response).await;
    assert!(page.contains(r#"<html lang="ko">"#));
    assert!(page.contains("페이지를 찾을 수 없어요"));
    assert!(page.contains(r#"action="/i18n/setlang/""#));
}

#[tokio::test]
async fn test_rejected_form_renders_in_layout() {
    let app = TestApp::new();
    let (_, cookie) = app.login("coco").await;

    let response = app
        .post("/plans/update/", Some(&cookie), "csrf_token=wrong&plan_id=1")
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let page = body(response).await;
    assert!(page.contains("Access denied"));
    assert!(page.contains(r#"<nav class="nav">"#));
    // a POST-only path is never offered as the language switch target
    assert_eq!(hidden_value(&page, "next"), "/");
}

#[tokio::test]
async fn test_anonymous_page_view_stores_no_session() {
    let app = TestApp::new();

    let response = app.get("/about/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().all(|cookie| !cookie.starts_with("sessionid=")));
    let csrf_cookie = cookies
        .into_iter()
        .find(|cookie| cookie.starts_with("csrftoken="))
        .unwrap();
    let token = hidden_value(&body(response).await, "csrf_token");
    assert_eq!(csrf_cookie, format!("csrftoken={token}"));
    assert_eq!(app.store.live_sessions().await, 0);

    // the cookie token is accepted, and a language choice is worth storing
    let switched = app
        .post(
            "/i18n/setlang/",
            Some(&csrf_cookie),
            &format!("csrf_token={token}&language=ko&next=%2Fabout%2F"),
        )
        .await;
    assert_eq!(switched.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.live_sessions().await, 1);
}

#[tokio::test]
async fn test_language_switch_after_comment_error() {
    let app = TestApp::new();
    app.add_post().await;
    let (_, cookie) = app.login("coco").await;

    let response = app
        .post(
            "/blog/raw-food/comment/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&content=+++"),
        )
        .await;
    let next = hidden_value(&body(response).await, "next");
    assert_eq!(next, "/blog/raw-food/");

    let switched = app
        .post(
            "/i18n/setlang/",
            Some(&cookie),
            &format!("csrf_token={TOKEN}&language=ko&next={}", next.replace('/', "%2F")),
        )
        .await;
    let target = location(&switched).to_string();

    let page = app.get(&target, Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body(page).await.contains(r#"<html lang="ko">"#));
}

#[tokio::test]
async fn test_meal_plan_written_in_korean() {
    let app = TestApp::new();
    let (user, cookie) = app.login_in("coco", Some("ko")).await;
    let pet = app.add_pet(&user).await;

    let response = app.get(&format!("/pets/{}/ai-meal/", pet.id), Some(&cookie)).await;
    let report = body(app.get(location(&response), Some(&cookie)).await).await;

    assert!(report.contains("하루 에너지 목표"));
    assert!(!report.contains("Daily energy target"));
}
