// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Category -> keyword table used to turn raw model labels into categories

use std::collections::HashSet;
use std::path::Path;

use crate::{GalleryzeError, Result};

pub const DOCS: &str = "Docs";
pub const PEOPLE: &str = "People";
pub const ANIMAL: &str = "Animal";
pub const NATURE: &str = "Nature";
pub const FOOD: &str = "Food";
pub const OTHERS: &str = "Others";

/// Categories every fresh index starts with, in persisted order
pub const DEFAULT_CATEGORIES: [&str; 6] = [DOCS, PEOPLE, ANIMAL, NATURE, FOOD, OTHERS];

/// Categories a detection alone may decide, tested in this order
pub const PRIVILEGED: [&str; 2] = [DOCS, PEOPLE];

/// Ordered category -> lower-cased keyword sets.
///
/// Declaration order of the source file is kept: when a keyword appears under
/// several categories, the first-declared category wins.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    entries: Vec<(String, HashSet<String>)>,
}

impl CategoryMap {
    /// Load the table from a JSON object of `category -> [keyword, ...]`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GalleryzeError::Config(format!("Cannot read category map {:?}: {}", path, e))
        })?;
        let map = Self::from_json_str(&content)
            .map_err(|e| GalleryzeError::Config(format!("Invalid category map {:?}: {}", path, e)))?;
        tracing::debug!("Loaded {} categories from {:?}", map.len(), path);
        Ok(map)
    }

    /// Parse the table from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let object = value.as_object().ok_or_else(|| {
            GalleryzeError::Config("category map must be a JSON object".to_string())
        })?;

        let mut entries = Vec::with_capacity(object.len());
        for (category, keywords) in object {
            let keywords = keywords.as_array().ok_or_else(|| {
                GalleryzeError::Config(format!("keywords of '{}' must be an array", category))
            })?;
            let mut set = HashSet::with_capacity(keywords.len());
            for keyword in keywords {
                let keyword = keyword.as_str().ok_or_else(|| {
                    GalleryzeError::Config(format!("keywords of '{}' must be strings", category))
                })?;
                set.insert(keyword.to_lowercase());
            }
            entries.push((category.clone(), set));
        }

        Ok(Self { entries })
    }

    /// Build a map in code, keywords are lower-cased like on load
    pub fn from_pairs<C, K, I>(pairs: I) -> Self
    where
        C: Into<String>,
        K: AsRef<str>,
        I: IntoIterator<Item = (C, Vec<K>)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(category, keywords)| {
                let set = keywords.iter().map(|k| k.as_ref().to_lowercase()).collect();
                (category.into(), set)
            })
            .collect();
        Self { entries }
    }

    /// Keywords of a category; empty for unknown categories
    pub fn keywords_for(&self, category: &str) -> HashSet<String> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, set)| set.clone())
            .unwrap_or_default()
    }

    /// Whether `label` is a keyword of `category` (case-insensitive)
    pub fn contains(&self, category: &str, label: &str) -> bool {
        let label = label.to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .is_some_and(|(_, set)| set.contains(&label))
    }

    /// First category, in declaration order, whose keywords contain `label`
    pub fn resolve(&self, label: &str) -> Option<&str> {
        let label = label.to_lowercase();
        self.entries
            .iter()
            .find(|(_, set)| set.contains(&label))
            .map(|(name, _)| name.as_str())
    }

    /// Category names in declaration order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Starter table written by `galleryze init`
pub fn starter_map() -> serde_json::Value {
    serde_json::json!({
        DOCS: ["book", "laptop", "keyboard", "cell phone", "notebook", "menu", "envelope", "binder"],
        PEOPLE: ["person"],
        ANIMAL: ["dog", "cat", "bird", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "golden_retriever", "tabby"],
        NATURE: ["alp", "cliff", "lakeside", "seashore", "valley", "volcano", "daisy", "coral_reef"],
        FOOD: ["pizza", "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hotdog", "cheeseburger", "ice_cream"],
        OTHERS: [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_lowercased() {
        let map = CategoryMap::from_json_str(r#"{"Docs": ["Book", "MENU"]}"#).unwrap();
        let keywords = map.keywords_for("Docs");
        assert!(keywords.contains("book"));
        assert!(keywords.contains("menu"));
        assert!(!keywords.contains("Book"));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let map = CategoryMap::from_json_str(r#"{"Animal": ["Golden_Retriever"]}"#).unwrap();
        assert_eq!(map.resolve("GOLDEN_RETRIEVER"), Some("Animal"));
        assert_eq!(map.resolve("tabby"), None);
    }

    #[test]
    fn test_first_declared_category_wins() {
        let map = CategoryMap::from_json_str(
            r#"{"Nature": ["daisy"], "Food": ["daisy", "pizza"]}"#,
        )
        .unwrap();
        assert_eq!(map.resolve("daisy"), Some("Nature"));

        let swapped = CategoryMap::from_json_str(
            r#"{"Food": ["daisy", "pizza"], "Nature": ["daisy"]}"#,
        )
        .unwrap();
        assert_eq!(swapped.resolve("daisy"), Some("Food"));
    }

    #[test]
    fn test_unknown_category_has_no_keywords() {
        let map = CategoryMap::from_pairs([(DOCS, vec!["book"])]);
        assert!(map.keywords_for("Vehicles").is_empty());
        assert!(!map.contains("Vehicles", "book"));
    }

    #[test]
    fn test_malformed_maps_rejected() {
        assert!(CategoryMap::from_json_str("[1, 2]").is_err());
        assert!(CategoryMap::from_json_str(r#"{"Docs": "book"}"#).is_err());
        assert!(CategoryMap::from_json_str(r#"{"Docs": [1]}"#).is_err());
        assert!(CategoryMap::from_json_str("not json").is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CategoryMap::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, GalleryzeError::Config(_)));
    }

    #[test]
    fn test_starter_map_parses() {
        let map = CategoryMap::from_json_str(&starter_map().to_string()).unwrap();
        let names: Vec<&str> = map.categories().collect();
        assert_eq!(names, DEFAULT_CATEGORIES.to_vec());
    }
}
