// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Galleryze

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Category -> keyword list table (JSON)
    #[serde(default = "default_category_map")]
    pub category_map: String,

    /// Where results and the checkpoint are persisted
    #[serde(default)]
    pub output: OutputConfig,

    /// Object detector used as the pre-filter
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Single-label classifier used as the fallback stage
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Cascade settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Folder scan settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_index_path")]
    pub index_path: String,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_model")]
    pub model_path: String,
    #[serde(default = "default_detector_labels")]
    pub labels_path: String,
    #[serde(default = "default_detector_size")]
    pub input_width: u32,
    #[serde(default = "default_detector_size")]
    pub input_height: u32,
    /// Subtracted from a raw class id before the label lookup
    #[serde(default)]
    pub label_offset: i64,
    #[serde(default)]
    pub outputs: DetectorOutputs,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// Output tensor names of an SSD-style detector
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorOutputs {
    #[serde(default = "default_boxes_output")]
    pub boxes: String,
    #[serde(default = "default_classes_output")]
    pub classes: String,
    #[serde(default = "default_scores_output")]
    pub scores: String,
    #[serde(default = "default_count_output")]
    pub count: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_model")]
    pub model_path: String,
    #[serde(default = "default_classifier_labels")]
    pub labels_path: String,
    #[serde(default = "default_classifier_size")]
    pub input_size: u32,
    #[serde(default)]
    pub layout: TensorLayout,
    #[serde(default = "default_norm")]
    pub mean: [f32; 3],
    #[serde(default = "default_norm")]
    pub std: [f32; 3],
    #[serde(default)]
    pub label_offset: i64,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

/// Memory layout of the classifier input tensor
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    Nchw,
    #[default]
    Nhwc,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

/// What a folder scan does when one image fails
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure, keep scanning, hold the checkpoint below it
    #[default]
    Skip,
    /// Stop the run and persist nothing
    Abort,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

// Default value functions
fn default_category_map() -> String { "CategorizedClasses.json".to_string() }
fn default_index_path() -> String { "categorized.json".to_string() }
fn default_checkpoint_path() -> String { "last_processed.txt".to_string() }
fn default_detector_model() -> String { "models/ssd_mobilenet_v2_coco.onnx".to_string() }
fn default_detector_labels() -> String { "models/coco-labels.txt".to_string() }
fn default_detector_size() -> u32 { 300 }
fn default_boxes_output() -> String { "detection_boxes".to_string() }
fn default_classes_output() -> String { "detection_classes".to_string() }
fn default_scores_output() -> String { "detection_scores".to_string() }
fn default_count_output() -> Option<String> { Some("num_detections".to_string()) }
fn default_classifier_model() -> String { "models/mobilenet_v2_imagenet.onnx".to_string() }
fn default_classifier_labels() -> String { "models/imagenet-labels.txt".to_string() }
fn default_classifier_size() -> u32 { 224 }
fn default_norm() -> [f32; 3] { [0.5, 0.5, 0.5] }
fn default_intra_threads() -> usize { 4 }
fn default_threshold() -> f32 { 0.35 }
fn default_settle_ms() -> u64 { 2000 }
fn default_poll_interval_ms() -> u64 { 100 }

fn default_formats() -> Vec<String> {
    vec!["jpg", "jpeg", "png", "bmp", "gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            category_map: default_category_map(),
            output: OutputConfig::default(),
            detector: DetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            pipeline: PipelineConfig::default(),
            batch: BatchConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_detector_model(),
            labels_path: default_detector_labels(),
            input_width: default_detector_size(),
            input_height: default_detector_size(),
            label_offset: 0,
            outputs: DetectorOutputs::default(),
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for DetectorOutputs {
    fn default() -> Self {
        Self {
            boxes: default_boxes_output(),
            classes: default_classes_output(),
            scores: default_scores_output(),
            count: default_count_output(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: default_classifier_model(),
            labels_path: default_classifier_labels(),
            input_size: default_classifier_size(),
            layout: TensorLayout::default(),
            mean: default_norm(),
            std: default_norm(),
            label_offset: 0,
            intra_threads: default_intra_threads(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_threshold(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            on_error: ErrorPolicy::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::GalleryzeError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no run could work with
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.pipeline.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(crate::GalleryzeError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(crate::GalleryzeError::Config(
                "detector input size must be non-zero".to_string(),
            ));
        }
        if self.classifier.input_size == 0 {
            return Err(crate::GalleryzeError::Config(
                "classifier input_size must be non-zero".to_string(),
            ));
        }
        if self.classifier.std.iter().any(|s| *s == 0.0) {
            return Err(crate::GalleryzeError::Config(
                "classifier std must not contain zeros".to_string(),
            ));
        }
        if self.batch.formats.is_empty() {
            return Err(crate::GalleryzeError::Config(
                "batch.formats must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_models() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.confidence_threshold, 0.35);
        assert_eq!(config.classifier.input_size, 224);
        assert_eq!(config.batch.on_error, ErrorPolicy::Skip);
        assert_eq!(config.batch.formats.len(), 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"pipeline": {"confidence_threshold": 0.5}, "batch": {"on_error": "abort"}}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.confidence_threshold, 0.5);
        assert_eq!(config.batch.on_error, ErrorPolicy::Abort);
        assert_eq!(config.output.index_path, "categorized.json");
        assert_eq!(config.classifier.layout, TensorLayout::Nhwc);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pipeline": {"confidence_threshold": 1.5}}"#).unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.classifier.layout = TensorLayout::Nchw;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.classifier.layout, TensorLayout::Nchw);
    }
}
