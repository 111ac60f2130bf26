// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Top-1 image classifier backed by ONNX Runtime

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use tracing::debug;

use super::{first_input_name, load_session, preprocess, ClassificationResult, Classifier, Labels};
use crate::config::ClassifierConfig;
use crate::{GalleryzeError, Result};

pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    labels: Labels,
    config: ClassifierConfig,
}

impl OnnxClassifier {
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        let labels = Labels::load(Path::new(&config.labels_path), config.label_offset, false)?;
        let session = load_session(Path::new(&config.model_path), config.intra_threads)?;
        let input_name = first_input_name(&session)?;
        debug!(
            "Classifier ready: input '{}', {} labels",
            input_name,
            labels.len()
        );

        Ok(Self {
            session,
            input_name,
            labels,
            config: config.clone(),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, image: &DynamicImage) -> Result<ClassificationResult> {
        let input = preprocess::classifier_input(
            image,
            self.config.input_size,
            self.config.layout,
            self.config.mean,
            self.config.std,
        )?;
        let input_tensor = Value::from_array(input)
            .map_err(|e| GalleryzeError::Model(format!("Failed to create tensor value: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| GalleryzeError::Model(format!("Classifier inference failed: {}", e)))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| GalleryzeError::Model("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| GalleryzeError::Model(format!("Failed to extract output tensor: {}", e)))?;

        let (class_id, score) = top1(data)
            .ok_or_else(|| GalleryzeError::Model("Classifier output is empty".to_string()))?;
        let label = self.labels.name(class_id as i64);
        debug!("Classifier top-1: {} ({:.3})", label, score);

        Ok(ClassificationResult { label })
    }
}

/// Index and value of the highest score; the first one wins on ties
pub fn top1(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (idx, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((idx, score)),
        })
}
