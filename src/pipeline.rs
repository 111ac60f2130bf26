// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Detection -> short-circuit -> classification cascade for a single image

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, trace};

use crate::categories::CategoryMap;
use crate::config::AppConfig;
use crate::inference::InferenceEngine;
use crate::resolver::CategoryResolver;
use crate::{GalleryzeError, Result};

/// Which stage decided the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// A privileged detection ended the cascade early
    Detection,
    /// The classifier label was resolved against the keyword table
    Classification,
}

/// Outcome of running one image through the cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorization {
    pub category: String,
    pub stage: Stage,
    /// The raw label that produced the category
    pub label: String,
}

/// Two-stage categorizer; owns the models and the keyword table for the process lifetime
pub struct HybridPipeline {
    engine: InferenceEngine,
    map: CategoryMap,
    threshold: f32,
}

impl HybridPipeline {
    pub fn new(engine: InferenceEngine, map: CategoryMap, threshold: f32) -> Self {
        Self {
            engine,
            map,
            threshold,
        }
    }

    /// Load the category map and both models
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let map = CategoryMap::load(Path::new(&config.category_map))?;
        let engine = InferenceEngine::from_config(config)?;
        Ok(Self::new(engine, map, config.pipeline.confidence_threshold))
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn category_map(&self) -> &CategoryMap {
        &self.map
    }

    /// Decode an image file and categorize it.
    ///
    /// Any failure is reported as an inference error for `path`.
    pub fn categorize_path(&mut self, path: &Path) -> Result<Categorization> {
        self.categorize_path_with(path, self.threshold)
    }

    /// [`Self::categorize_path`] with a one-off confidence threshold
    pub fn categorize_path_with(&mut self, path: &Path, threshold: f32) -> Result<Categorization> {
        let image = decode_rgb(path).map_err(|e| GalleryzeError::inference(path, e))?;

        self.categorize_with(&image, threshold).map_err(|e| match e {
            GalleryzeError::Inference { .. } => e,
            other => GalleryzeError::inference(path, other),
        })
    }

    /// Run the cascade on an already decoded image
    pub fn categorize(&mut self, image: &DynamicImage) -> Result<Categorization> {
        self.categorize_with(image, self.threshold)
    }

    /// [`Self::categorize`] with a one-off confidence threshold
    pub fn categorize_with(&mut self, image: &DynamicImage, threshold: f32) -> Result<Categorization> {
        let resolver = CategoryResolver::new(&self.map);

        trace!("Detecting");
        let observations = self.engine.detector.detect(image)?;

        for observation in &observations {
            // NaN never qualifies
            if !(observation.confidence >= threshold) {
                continue;
            }
            if let Some(category) = resolver.resolve_detection_label(&observation.label) {
                debug!(
                    "Short-circuit on '{}' ({:.2}) -> {}",
                    observation.label, observation.confidence, category
                );
                return Ok(Categorization {
                    category: category.to_string(),
                    stage: Stage::Detection,
                    label: observation.label.clone(),
                });
            }
        }

        trace!("No privileged detection among {}, classifying", observations.len());
        let result = self.engine.classifier.classify(image)?;
        let category = resolver.resolve_classifier_label(&result.label);
        debug!("Classifier label '{}' -> {}", result.label, category);

        Ok(Categorization {
            category,
            stage: Stage::Classification,
            label: result.label,
        })
    }
}

/// Decode by content, not extension; photo folders are full of misnamed files
fn decode_rgb(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}
