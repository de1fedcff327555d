use std::{collections::HashMap, sync::LazyLock};

use catalog::Catalog;
use regex::Regex;

static CONTROL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{Cc}\p{Cf}]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Drops control characters, trims and collapses inner whitespace. Case is kept,
/// breed names are displayed as written.
pub fn sanitize(input: &str) -> String {
    let s = CONTROL.replace_all(input, " ");

    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Lowercased key used to match names across runs.
pub fn name_key(name: &str) -> String {
    sanitize(name).to_lowercase()
}

pub fn sanitize_catalog(catalog: &mut Catalog) {
    for breed in &mut catalog.breeds {
        breed.name = sanitize(&breed.name);
    }

    for plan in &mut catalog.plans {
        plan.name = sanitize(&plan.name);
    }

    catalog.breeds.retain(|breed| !breed.name.is_empty());
    catalog.plans.retain(|plan| !plan.name.is_empty());
}

/// `(pet type, name key)` to index in `catalog.breeds`.
pub fn breed_index(catalog: &Catalog) -> HashMap<(String, String), usize> {
    catalog
        .breeds
        .iter()
        .enumerate()
        .map(|(i, breed)| ((breed.pet_type.clone(), name_key(&breed.name)), i))
        .collect()
}

pub fn plan_index(catalog: &Catalog) -> HashMap<String, usize> {
    catalog
        .plans
        .iter()
        .enumerate()
        .map(|(i, plan)| (name_key(&plan.name), i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{name_key, sanitize};

    #[test]
    fn test_basic() {
        assert_eq!(sanitize("Golden Retriever"), "Golden Retriever");
        assert_eq!(sanitize("Shih\tTzu"), "Shih Tzu");
        assert_eq!(sanitize("진돗개"), "진돗개");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(sanitize("   Beagle   "), "Beagle");
        assert_eq!(sanitize("  Maine   Coon  "), "Maine Coon");
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(sanitize("Pug\u{0}\u{200b}"), "Pug");
        assert_eq!(sanitize("Corgi\r\nPembroke"), "Corgi Pembroke");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("     "), "");
    }

    #[test]
    fn test_name_key_ignores_case_and_spacing() {
        assert_eq!(name_key(" Maine  COON"), name_key("maine coon"));
    }
}
