use std::collections::BTreeMap;

use serde::Deserialize;

pub const PET_TYPES: [&str; 2] = ["dog", "cat"];

/// Seed file layout.
///
/// ```json
/// {
///     "breeds": { "dog": ["Beagle", "Poodle"], "cat": ["Siamese"] },
///     "plans": [
///         { "name": "Basic", "price": 4900, "monthly_meal_limit": 5, "monthly_health_limit": 2 }
///     ]
/// }
/// ```
#[derive(Deserialize, Default)]
pub struct Seed {
    #[serde(default)]
    pub breeds: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub plans: Vec<SeedPlan>,
}

#[derive(Deserialize)]
pub struct SeedPlan {
    pub name: String,
    pub price: u32,
    pub monthly_meal_limit: u32,
    pub monthly_health_limit: u32,
}
