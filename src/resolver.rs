// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Raw model label -> category resolution

use crate::categories::{CategoryMap, OTHERS, PRIVILEGED};

/// Resolves detector and classifier labels against one category map
#[derive(Debug, Clone, Copy)]
pub struct CategoryResolver<'a> {
    map: &'a CategoryMap,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(map: &'a CategoryMap) -> Self {
        Self { map }
    }

    /// A detection only ever resolves to a privileged category.
    ///
    /// Docs is checked before People for the same label.
    pub fn resolve_detection_label(&self, label: &str) -> Option<&'static str> {
        PRIVILEGED
            .into_iter()
            .find(|category| self.map.contains(category, label))
    }

    /// A classifier label always resolves, falling back to Others
    pub fn resolve_classifier_label(&self, label: &str) -> String {
        self.map.resolve(label).unwrap_or(OTHERS).to_string()
    }
}
