use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type PostId = u64;
pub type CommentId = u64;
pub type PetId = u64;
pub type ReportId = u64;

/// Closed set of form options stored by value.
///
/// `value` is what goes on the wire and into storage, `label_id` is the
/// message id of the option's display text.
pub trait Choice: Copy + PartialEq + 'static {
    const FIELD: &'static str;
    const ALL: &'static [Self];

    fn value(self) -> &'static str;

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|choice| choice.value() == value)
    }

    fn label_id(self) -> String {
        format!("{}.{}", Self::FIELD, self.value())
    }
}

macro_rules! choice {
    ($name:ident($field:literal) { $($variant:ident => $value:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl Choice for $name {
            const FIELD: &'static str = $field;
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn value(self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }
    };
}

choice!(PetType("pet_type") {
    Dog => "dog",
    Cat => "cat",
});

choice!(Gender("gender") {
    Male => "male",
    Female => "female",
});

choice!(BodyType("body_type") {
    VeryThin => "very_thin",
    Thin => "thin",
    Ideal => "ideal",
    Overweight => "overweight",
    Obese => "obese",
});

choice!(Allergen("food_allergies") {
    Chicken => "chicken",
    Beef => "beef",
    Pork => "pork",
    Lamb => "lamb",
    Fish => "fish",
    Dairy => "dairy",
    Egg => "egg",
    Wheat => "wheat",
    Soy => "soy",
    Corn => "corn",
});

choice!(HealthIssue("health_issues") {
    Skin => "skin",
    Joint => "joint",
    Digestion => "digestion",
    Dental => "dental",
    Kidney => "kidney",
    Heart => "heart",
    Obesity => "obesity",
    Eye => "eye",
});

choice!(FoodType("food_types") {
    Dry => "dry",
    Wet => "wet",
    Raw => "raw",
    Homemade => "homemade",
    FreezeDried => "freeze_dried",
});

choice!(FoodFeeling("food_feeling") {
    Picky => "picky",
    Normal => "normal",
    Glutton => "glutton",
});

choice!(FoodImportance("food_importance") {
    Price => "price",
    Ingredients => "ingredients",
    Brand => "brand",
    Palatability => "palatability",
});

choice!(TreatFrequency("treat_frequency") {
    Never => "never",
    Weekly => "weekly",
    Daily => "daily",
    SeveralDaily => "several_daily",
});

choice!(ReportKind("report_kind") {
    Meal => "meal",
    Health => "health",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub image: Option<String>,
    pub category: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn excerpt(&self, max_chars: usize) -> String {
        let first = self.content.split("\n\n").next().unwrap_or_default().trim();
        if first.chars().count() <= max_chars {
            return first.to_string();
        }

        let mut excerpt: String = first.chars().take(max_chars).collect();
        excerpt.push('…');
        excerpt
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub post_id: PostId,
    pub user_id: UserId,
    pub value: u8,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub average: Option<f32>,
    pub count: usize,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }

        let total: u32 = ratings.iter().map(|r| u32::from(r.value)).sum();
        Self {
            average: Some(total as f32 / ratings.len() as f32),
            count: ratings.len(),
        }
    }
}

/// Everything a user fills in on the pet form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetProfile {
    pub name: String,
    pub pet_type: PetType,
    pub gender: Gender,
    pub neutered: bool,
    pub age_years: u8,
    pub age_months: u8,
    pub age_weeks: u8,
    pub breed: Option<u32>,
    pub body_type: BodyType,
    pub weight: f32,
    pub food_allergies: Vec<Allergen>,
    pub health_issues: Vec<HealthIssue>,
    pub food_types: Vec<FoodType>,
    pub food_feeling: FoodFeeling,
    pub food_importance: FoodImportance,
    pub treat_frequency: TreatFrequency,
}

impl PetProfile {
    pub fn age_in_months(&self) -> f32 {
        f32::from(self.age_years) * 12.0
            + f32::from(self.age_months)
            + f32::from(self.age_weeks) / 4.345
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub owner: UserId,
    #[serde(flatten)]
    pub profile: PetProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,
    pub plan_id: u32,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub owner: UserId,
    pub pet_id: PetId,
    pub pet_name: String,
    pub kind: ReportKind,
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub owner: UserId,
    pub pet_id: PetId,
    pub pet_name: String,
    pub kind: ReportKind,
    pub title: String,
    pub lines: Vec<String>,
    pub created_at: DateTime<Utc>,
}
