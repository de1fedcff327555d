//! # Catalog Processing
//!
//! Merges a JSON seed into the protobuf catalog served by the backend.
//!
//! ## Ids
//! - Breeds are keyed by (pet type, lowercased sanitized name). A breed already in the catalog keeps its id,
//!   pets stored with that id stay valid.
//! - New breeds get `next_breed_id`, which only ever grows. Removed breeds are never reused.
//! - Ids start at 1. Plan id 0 stands for the free tier.
//! - Plans are keyed by lowercased name the same way. Price and limits of a known plan are overwritten by the seed.
//!
//! ## Flow
//! 1. Load the existing catalog (missing file is an empty catalog) and sanitize it.
//! 2. Read the seed. Unknown pet types are skipped with a message.
//! 3. Merge breeds, then plans.
//! 4. Sanitize again and write the catalog back.
use std::{collections::hash_map::Entry, fs, path::Path};

use anyhow::Error;
use catalog::{Breed, Catalog, Plan, get_catalog_or_default, write_catalog};

pub mod models;
pub mod utils;

use models::{PET_TYPES, Seed};
use utils::{breed_index, name_key, plan_index, sanitize, sanitize_catalog};

#[derive(Debug, Default, PartialEq)]
pub struct MergeStats {
    pub new_breeds: usize,
    pub new_plans: usize,
    pub updated_plans: usize,
}

pub fn load_catalog(seed_path: &Path, catalog_path: &Path) -> Result<MergeStats, Error> {
    let mut catalog = get_catalog_or_default(catalog_path)?;
    sanitize_catalog(&mut catalog);

    println!("Loaded Breeds: {}", catalog.breeds.len());
    println!("Loaded Plans: {}\n", catalog.plans.len());

    let seed: Seed = serde_json::from_str(&fs::read_to_string(seed_path)?)?;
    let stats = merge_seed(&mut catalog, seed);

    if stats == MergeStats::default() {
        println!("No new breeds or plans found.");
    } else {
        println!("Total New Breeds: {}", stats.new_breeds);
        println!("Total New Plans: {}", stats.new_plans);
        println!("Total Updated Plans: {}\n", stats.updated_plans);

        println!("Breed Verification: {}", catalog.breeds.len());
        println!("Plan Verification: {}", catalog.plans.len());
    }

    sanitize_catalog(&mut catalog);
    write_catalog(catalog_path, &catalog)?;

    Ok(stats)
}

pub fn merge_seed(catalog: &mut Catalog, seed: Seed) -> MergeStats {
    let mut stats = MergeStats::default();
    catalog.next_breed_id = catalog.next_breed_id.max(1);
    catalog.next_plan_id = catalog.next_plan_id.max(1);

    let mut breeds = breed_index(catalog);
    for (pet_type, names) in seed.breeds {
        if !PET_TYPES.contains(&pet_type.as_str()) {
            println!("Skipping unknown pet type {pet_type}");
            continue;
        }

        for name in names {
            let name = sanitize(&name);
            if name.is_empty() {
                continue;
            }

            match breeds.entry((pet_type.clone(), name_key(&name))) {
                Entry::Vacant(entry) => {
                    entry.insert(catalog.breeds.len());
                    catalog.breeds.push(Breed {
                        id: catalog.next_breed_id,
                        pet_type: pet_type.clone(),
                        name,
                    });

                    catalog.next_breed_id += 1;
                    stats.new_breeds += 1;
                }
                Entry::Occupied(_) => {}
            }
        }
    }

    let mut plans = plan_index(catalog);
    for seed_plan in seed.plans {
        let name = sanitize(&seed_plan.name);
        if name.is_empty() {
            continue;
        }

        match plans.entry(name_key(&name)) {
            Entry::Vacant(entry) => {
                entry.insert(catalog.plans.len());
                catalog.plans.push(Plan {
                    id: catalog.next_plan_id,
                    name,
                    price: seed_plan.price,
                    monthly_meal_limit: seed_plan.monthly_meal_limit,
                    monthly_health_limit: seed_plan.monthly_health_limit,
                });

                catalog.next_plan_id += 1;
                stats.new_plans += 1;
            }
            Entry::Occupied(entry) => {
                let plan = &mut catalog.plans[*entry.get()];
                plan.price = seed_plan.price;
                plan.monthly_meal_limit = seed_plan.monthly_meal_limit;
                plan.monthly_health_limit = seed_plan.monthly_health_limit;

                stats.updated_plans += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::SeedPlan;

    fn seed(breeds: &[(&str, &[&str])], plans: &[(&str, u32)]) -> Seed {
        Seed {
            breeds: breeds
                .iter()
                .map(|(pet_type, names)| {
                    (
                        pet_type.to_string(),
                        names.iter().map(|n| n.to_string()).collect(),
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            plans: plans
                .iter()
                .map(|(name, price)| SeedPlan {
                    name: name.to_string(),
                    price: *price,
                    monthly_meal_limit: 5,
                    monthly_health_limit: 2,
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_breeds_get_sequential_ids() {
        let mut catalog = Catalog::default();
        let stats = merge_seed(
            &mut catalog,
            seed(&[("dog", &["Beagle", "Poodle"]), ("cat", &["Siamese"])], &[]),
        );

        assert_eq!(stats.new_breeds, 3);
        assert_eq!(catalog.next_breed_id, 4);

        let mut ids: Vec<u32> = catalog.breeds.iter().map(|b| b.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_known_breeds_keep_ids() {
        let mut catalog = Catalog::default();
        merge_seed(&mut catalog, seed(&[("dog", &["Beagle"])], &[]));
        let beagle = catalog.breeds[0].id;

        let stats = merge_seed(&mut catalog, seed(&[("dog", &["  beagle ", "Pug"])], &[]));

        assert_eq!(stats.new_breeds, 1);
        assert_eq!(catalog.breeds.len(), 2);
        assert_eq!(catalog.breeds[0].id, beagle);
        assert_eq!(catalog.breeds[0].name, "Beagle");
    }

    #[test]
    fn test_same_name_different_pet_type_is_distinct() {
        let mut catalog = Catalog::default();
        let breeds = seed(&[("dog", &["Mixed"]), ("cat", &["Mixed"])], &[]);
        let stats = merge_seed(&mut catalog, breeds);

        assert_eq!(stats.new_breeds, 2);
    }

    #[test]
    fn test_unknown_pet_type_and_blank_names_skipped() {
        let mut catalog = Catalog::default();
        let breeds = seed(&[("hamster", &["Syrian"]), ("dog", &["   "])], &[]);
        let stats = merge_seed(&mut catalog, breeds);

        assert_eq!(stats, MergeStats::default());
        assert!(catalog.breeds.is_empty());
    }

    #[test]
    fn test_plans_updated_in_place() {
        let mut catalog = Catalog::default();
        merge_seed(&mut catalog, seed(&[], &[("Basic", 4900)]));
        let stats = merge_seed(&mut catalog, seed(&[], &[("basic", 5900), ("Premium", 9900)]));

        assert_eq!(stats.new_plans, 1);
        assert_eq!(stats.updated_plans, 1);
        assert_eq!(catalog.plans[0].price, 5900);
        assert_eq!(catalog.plans[0].name, "Basic");
        assert_eq!(catalog.plans[1].id, 2);
    }

    #[test]
    fn test_load_catalog_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.json");
        let catalog_path = dir.path().join("catalog.bin");

        fs::write(
            &seed_path,
            r#"{"breeds": {"dog": ["Beagle"]}, "plans": [{"name": "Basic", "price": 4900, "monthly_meal_limit": 5, "monthly_health_limit": 2}]}"#,
        )
        .unwrap();

        load_catalog(&seed_path, &catalog_path).unwrap();
        let stats = load_catalog(&seed_path, &catalog_path).unwrap();

        assert_eq!(stats.new_breeds, 0);
        let catalog = catalog::get_catalog(&catalog_path).unwrap();
        assert_eq!(catalog.breeds.len(), 1);
        assert_eq!(catalog.plans.len(), 1);
    }
}
