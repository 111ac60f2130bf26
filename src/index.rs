// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Persisted category -> image path lists
//!
//! This file is the hand-off to the gallery front end, which only reads it.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::path::Path;

use crate::categories::{CategoryMap, DEFAULT_CATEGORIES};
use crate::storage::write_atomic;
use crate::{GalleryzeError, Result};

/// Ordered buckets of absolute image paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizedIndex {
    buckets: Vec<(String, Vec<String>)>,
}

impl CategorizedIndex {
    /// Fresh index with the default categories plus any extra map categories, all empty
    pub fn seeded(map: Option<&CategoryMap>) -> Self {
        let mut index = Self {
            buckets: DEFAULT_CATEGORIES
                .iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
        };
        if let Some(map) = map {
            for category in map.categories() {
                index.bucket_mut(category);
            }
        }
        index
    }

    /// Load the persisted index verbatim, or seed a new one when there is none
    pub fn load_or_seed(path: &Path, map: Option<&CategoryMap>) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let index = Self::from_json_str(&content)?;
            tracing::debug!("Loaded index {:?} with {} entries", path, index.total());
            Ok(index)
        } else {
            Ok(Self::seeded(map))
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let object = value.as_object().ok_or_else(|| {
            GalleryzeError::Index("categorized index must be a JSON object".to_string())
        })?;

        let mut buckets = Vec::with_capacity(object.len());
        for (category, paths) in object {
            let paths = paths.as_array().ok_or_else(|| {
                GalleryzeError::Index(format!("bucket '{}' must be an array", category))
            })?;
            let paths = paths
                .iter()
                .map(|p| {
                    p.as_str().map(String::from).ok_or_else(|| {
                        GalleryzeError::Index(format!("bucket '{}' must hold strings", category))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            buckets.push((category.clone(), paths));
        }

        Ok(Self { buckets })
    }

    /// Append `path` to `category`, creating the bucket if needed.
    ///
    /// Returns false when the path is already in that bucket.
    pub fn record(&mut self, category: &str, path: &str) -> bool {
        let bucket = self.bucket_mut(category);
        if bucket.iter().any(|p| p == path) {
            return false;
        }
        bucket.push(path.to_string());
        true
    }

    pub fn get(&self, category: &str) -> Option<&[String]> {
        self.buckets
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, paths)| paths.as_slice())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    /// `(category, path count)` in persisted order
    pub fn counts(&self) -> Vec<(&str, usize)> {
        self.buckets
            .iter()
            .map(|(name, paths)| (name.as_str(), paths.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|(_, paths)| paths.len()).sum()
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.buckets.len());
        for (category, paths) in &self.buckets {
            object.insert(
                category.clone(),
                Value::Array(paths.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(object)
    }

    /// Overwrite `path` with the whole index, pretty-printed with 4-space indents
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.to_json().serialize(&mut serializer)?;
        write_atomic(path, &buffer)
    }

    fn bucket_mut(&mut self, category: &str) -> &mut Vec<String> {
        let idx = match self.buckets.iter().position(|(name, _)| name == category) {
            Some(idx) => idx,
            None => {
                self.buckets.push((category.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[idx].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_has_default_categories() {
        let index = CategorizedIndex::seeded(None);
        let names: Vec<&str> = index.categories().collect();
        assert_eq!(names, vec!["Docs", "People", "Animal", "Nature", "Food", "Others"]);
        assert_eq!(index.total(), 0);
    }

    #[test]
    fn test_seeded_adds_map_categories() {
        let map = CategoryMap::from_pairs([("Vehicles", vec!["car"]), ("Docs", vec!["book"])]);
        let index = CategorizedIndex::seeded(Some(&map));
        let names: Vec<&str> = index.categories().collect();
        assert_eq!(names.len(), 7);
        assert_eq!(names[6], "Vehicles");
    }

    #[test]
    fn test_record_appends_in_order_and_skips_repeats() {
        let mut index = CategorizedIndex::seeded(None);
        assert!(index.record("Food", "/photos/b.jpg"));
        assert!(index.record("Food", "/photos/a.jpg"));
        assert!(!index.record("Food", "/photos/b.jpg"));
        assert_eq!(
            index.get("Food").unwrap(),
            &["/photos/b.jpg".to_string(), "/photos/a.jpg".to_string()]
        );
    }

    #[test]
    fn test_record_creates_missing_bucket() {
        let mut index = CategorizedIndex::from_json_str(r#"{"Docs": []}"#).unwrap();
        index.record("Others", "/x.png");
        assert_eq!(index.get("Others").unwrap().len(), 1);
    }

    #[test]
    fn test_save_keeps_order_and_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categorized.json");
        let mut index = CategorizedIndex::seeded(None);
        index.record("People", "/photos/p.jpg");
        index.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"Docs\": []"));
        assert!(text.find("\"People\"").unwrap() < text.find("\"Others\"").unwrap());

        let loaded = CategorizedIndex::load_or_seed(&path, None).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categorized.json");
        std::fs::write(&path, r#"{"Food": ["/a.jpg", "/a.jpg"], "Custom": []}"#).unwrap();

        let index = CategorizedIndex::load_or_seed(&path, None).unwrap();
        let names: Vec<&str> = index.categories().collect();
        assert_eq!(names, vec!["Food", "Custom"]);
        assert_eq!(index.get("Food").unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_index_rejected() {
        assert!(CategorizedIndex::from_json_str(r#"{"Food": "x"}"#).is_err());
        assert!(CategorizedIndex::from_json_str(r#"{"Food": [1]}"#).is_err());
        assert!(CategorizedIndex::from_json_str("[]").is_err());
    }
}
