// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SSD-style object detector backed by ONNX Runtime

use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use tracing::{debug, trace};

use super::{first_input_name, load_session, preprocess, DetectionObservation, Detector, Labels};
use crate::config::DetectorConfig;
use crate::{GalleryzeError, Result};

/// Detector with boxes / classes / scores (/ count) outputs
pub struct OnnxDetector {
    session: Session,
    input_name: String,
    labels: Labels,
    config: DetectorConfig,
}

impl OnnxDetector {
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        let labels = Labels::load(Path::new(&config.labels_path), config.label_offset, true)?;
        let session = load_session(Path::new(&config.model_path), config.intra_threads)?;
        let input_name = first_input_name(&session)?;
        debug!(
            "Detector ready: input '{}', {} labels",
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

impl Detector for OnnxDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<DetectionObservation>> {
        let input = preprocess::detector_input(
            image,
            self.config.input_width,
            self.config.input_height,
        )?;
        let input_tensor = Value::from_array(input)
            .map_err(|e| GalleryzeError::Model(format!("Failed to create tensor value: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| GalleryzeError::Model(format!("Detector inference failed: {}", e)))?;

        let read = |name: &str| -> Result<Vec<f32>> {
            let value = outputs.get(name).ok_or_else(|| {
                GalleryzeError::Model(format!("Detector has no output named '{}'", name))
            })?;
            let (_, data) = value.try_extract_tensor::<f32>().map_err(|e| {
                GalleryzeError::Model(format!("Failed to extract output '{}': {}", name, e))
            })?;
            Ok(data.to_vec())
        };

        let boxes = read(&self.config.outputs.boxes)?;
        let classes = read(&self.config.outputs.classes)?;
        let scores = read(&self.config.outputs.scores)?;
        let count = match &self.config.outputs.count {
            Some(name) => read(name)?
                .first()
                .map(|n| n.max(0.0) as usize)
                .unwrap_or(scores.len()),
            None => scores.len(),
        };

        let observations = decode_detections(&boxes, &classes, &scores, count, &self.labels);
        trace!("Detector produced {} observations", observations.len());
        Ok(observations)
    }
}

/// Zip the flat output tensors into observations, keeping model order
pub fn decode_detections(
    boxes: &[f32],
    classes: &[f32],
    scores: &[f32],
    count: usize,
    labels: &Labels,
) -> Vec<DetectionObservation> {
    let count = count.min(scores.len()).min(classes.len());

    (0..count)
        .map(|i| {
            let mut bbox = [0.0; 4];
            if let Some(raw) = boxes.get(i * 4..i * 4 + 4) {
                bbox.copy_from_slice(raw);
            }
            DetectionObservation {
                label: labels.name(classes[i] as i64),
                confidence: scores[i],
                bbox,
            }
        })
        .collect()
}
