//! # Catalog
//!
//! Read-mostly reference data shared by the server and the `process` tool.
//!
//! ## Contents
//! - Breeds: (id, pet type, name). Ids are stable across rebuilds so pets keep pointing at the same breed.
//! - Plans: subscription plans with their monthly meal/health report limits.
//!
//! ## Format
//! A single protobuf message written to `catalog.bin`. The server loads it once at startup,
//! either from disk or from a remote URL, and never mutates it.
//!
//! Only repeated fields keep their ordering, so lookups never rely on the stored order and sort explicitly.
use std::{fs, path::Path};

use anyhow::{Context, Error};
use prost::Message;

pub mod remote;

pub use remote::get_catalog_remote;

pub const DEFAULT_CATALOG_PATH: &str = "catalog.bin";

#[derive(Clone, PartialEq, Message)]
pub struct Catalog {
    #[prost(message, repeated, tag = "1")]
    pub breeds: Vec<Breed>,
    #[prost(message, repeated, tag = "2")]
    pub plans: Vec<Plan>,
    #[prost(uint32, tag = "3")]
    pub next_breed_id: u32,
    #[prost(uint32, tag = "4")]
    pub next_plan_id: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Breed {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub pet_type: String,
    #[prost(string, tag = "3")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Plan {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub name: String,
    /// Monthly price in won.
    #[prost(uint32, tag = "3")]
    pub price: u32,
    #[prost(uint32, tag = "4")]
    pub monthly_meal_limit: u32,
    #[prost(uint32, tag = "5")]
    pub monthly_health_limit: u32,
}

impl Catalog {
    /// Breeds of one pet type, ordered by name.
    pub fn breeds_for(&self, pet_type: &str) -> Vec<&Breed> {
        let mut breeds: Vec<&Breed> = self
            .breeds
            .iter()
            .filter(|breed| breed.pet_type == pet_type)
            .collect();

        breeds.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        breeds
    }

    pub fn breed(&self, id: u32) -> Option<&Breed> {
        self.breeds.iter().find(|breed| breed.id == id)
    }

    /// Plans ordered by price, cheapest first.
    pub fn plans_by_price(&self) -> Vec<&Plan> {
        let mut plans: Vec<&Plan> = self.plans.iter().collect();
        plans.sort_by_key(|plan| (plan.price, plan.id));
        plans
    }

    pub fn plan(&self, id: u32) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }
}

pub fn get_catalog(path: impl AsRef<Path>) -> Result<Catalog, Error> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading catalog {}", path.display()))?;

    Ok(Catalog::decode(&*data)?)
}

/// Missing file means an empty catalog, anything else is an error.
pub fn get_catalog_or_default(path: impl AsRef<Path>) -> Result<Catalog, Error> {
    if path.as_ref().exists() {
        get_catalog(path)
    } else {
        Ok(Catalog::default())
    }
}

pub fn write_catalog(path: impl AsRef<Path>, catalog: &Catalog) -> Result<(), Error> {
    let path = path.as_ref();
    fs::write(path, catalog.encode_to_vec())
        .with_context(|| format!("writing catalog {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breed(id: u32, pet_type: &str, name: &str) -> Breed {
        Breed {
            id,
            pet_type: pet_type.to_string(),
            name: name.to_string(),
        }
    }

    fn sample() -> Catalog {
        Catalog {
            breeds: vec![
                breed(1, "dog", "Poodle"),
                breed(2, "cat", "Siamese"),
                breed(3, "dog", "Beagle"),
                breed(4, "cat", "Bengal"),
            ],
            plans: vec![
                Plan {
                    id: 1,
                    name: "Premium".to_string(),
                    price: 9900,
                    monthly_meal_limit: 30,
                    monthly_health_limit: 10,
                },
                Plan {
                    id: 2,
                    name: "Basic".to_string(),
                    price: 4900,
                    monthly_meal_limit: 5,
                    monthly_health_limit: 2,
                },
            ],
            next_breed_id: 5,
            next_plan_id: 3,
        }
    }

    #[test]
    fn test_breeds_filtered_and_sorted() {
        let catalog = sample();
        let names: Vec<&str> = catalog
            .breeds_for("dog")
            .iter()
            .map(|b| b.name.as_str())
            .collect();

        assert_eq!(names, vec!["Beagle", "Poodle"]);
    }

    #[test]
    fn test_unknown_pet_type_has_no_breeds() {
        assert!(sample().breeds_for("hamster").is_empty());
    }

    #[test]
    fn test_plans_cheapest_first() {
        let catalog = sample();
        let ids: Vec<u32> = catalog.plans_by_price().iter().map(|p| p.id).collect();

        assert_eq!(ids, vec![2, 1]);
        assert_eq!(catalog.plan(1).map(|p| p.name.as_str()), Some("Premium"));
        assert!(catalog.plan(42).is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.bin");

        write_catalog(&path, &sample()).unwrap();
        assert_eq!(get_catalog(&path).unwrap(), sample());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = get_catalog_or_default(dir.path().join("missing.bin")).unwrap();

        assert!(catalog.breeds.is_empty());
        assert!(catalog.plans.is_empty());
    }
}
