// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Model stages of the cascade and the engine that owns them
//!
//! Both stages hold stateful model handles, so every call takes `&mut self`:
//! sharing one engine between workers needs a lock or one engine per worker.

pub mod classifier;
pub mod detector;
pub mod preprocess;

use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::AppConfig;
use crate::{GalleryzeError, Result};

pub use classifier::OnnxClassifier;
pub use detector::OnnxDetector;

/// One object found by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionObservation {
    pub label: String,
    pub confidence: f32,
    /// `[ymin, xmin, ymax, xmax]`, normalized; not used for categorization
    pub bbox: [f32; 4],
}

impl DetectionObservation {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: [0.0; 4],
        }
    }
}

/// Top-1 label of the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
}

/// Object detection stage
pub trait Detector: Send {
    /// Observations in the model's native output order
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<DetectionObservation>>;
}

/// Single-label classification stage
pub trait Classifier: Send {
    fn classify(&mut self, image: &DynamicImage) -> Result<ClassificationResult>;
}

/// Model handles loaded once and reused for every image
pub struct InferenceEngine {
    pub detector: Box<dyn Detector>,
    pub classifier: Box<dyn Classifier>,
}

impl InferenceEngine {
    pub fn new(detector: Box<dyn Detector>, classifier: Box<dyn Classifier>) -> Self {
        Self { detector, classifier }
    }

    /// Open both ONNX models described by the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let detector = OnnxDetector::load(&config.detector)?;
        let classifier = OnnxClassifier::load(&config.classifier)?;
        Ok(Self::new(Box::new(detector), Box::new(classifier)))
    }
}

/// Class-id -> name table read from a one-label-per-line file
#[derive(Debug, Clone, Default)]
pub struct Labels {
    names: Vec<String>,
    offset: i64,
}

impl Labels {
    pub fn load(path: &Path, offset: i64, lowercase: bool) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GalleryzeError::Model(format!("Failed to read labels {}: {}", path.display(), e))
        })?;
        let labels = Self::parse(&content, offset, lowercase);
        if labels.is_empty() {
            return Err(GalleryzeError::Model(format!(
                "Labels file {} is empty",
                path.display()
            )));
        }
        Ok(labels)
    }

    pub fn parse(content: &str, offset: i64, lowercase: bool) -> Self {
        let names = content
            .lines()
            .map(|line| {
                let line = line.trim();
                if lowercase {
                    line.to_lowercase()
                } else {
                    line.to_string()
                }
            })
            .collect();
        Self { names, offset }
    }

    /// Name for a raw class id, `class_<id>` when out of range
    pub fn name(&self, class_id: i64) -> String {
        usize::try_from(class_id - self.offset)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Open an ONNX Runtime session for one model file
pub(crate) fn load_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let _ = ort::init().with_name("galleryze").commit();

    let session = Session::builder()
        .map_err(|e| GalleryzeError::Model(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| GalleryzeError::Model(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(intra_threads.max(1))
        .map_err(|e| GalleryzeError::Model(format!("Failed to set intra threads: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| {
            GalleryzeError::Model(format!(
                "Failed to load ONNX model {}: {}",
                model_path.display(),
                e
            ))
        })?;

    info!("Loaded model: {}", model_path.display());
    Ok(session)
}

/// Name of the first model input
pub(crate) fn first_input_name(session: &Session) -> Result<String> {
    session
        .inputs()
        .first()
        .map(|input| input.name().to_string())
        .ok_or_else(|| GalleryzeError::Model("Model declares no inputs".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_offset_and_fallback() {
        let labels = Labels::parse("background\nPerson\nBicycle\n", 0, true);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(1), "person");
        assert_eq!(labels.name(7), "class_7");

        let shifted = Labels::parse("person\nbicycle\n", 1, false);
        assert_eq!(shifted.name(1), "person");
        assert_eq!(shifted.name(0), "class_0");
    }

    #[test]
    fn test_labels_keep_case_when_asked() {
        let labels = Labels::parse("Golden_Retriever\n", 0, false);
        assert_eq!(labels.name(0), "Golden_Retriever");
    }

    #[test]
    fn test_empty_labels_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "").unwrap();
        assert!(Labels::load(&path, 0, true).is_err());
    }
}
