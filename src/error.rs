// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Galleryze

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Galleryze operations
pub type Result<T> = std::result::Result<T, GalleryzeError>;

/// Galleryze error types
#[derive(Error, Debug)]
pub enum GalleryzeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Categorized index error: {0}")]
    Index(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Inference failed for {path:?}: {message}")]
    Inference { path: PathBuf, message: String },
}

impl GalleryzeError {
    /// Wrap any error raised while running a single image through the pipeline
    pub fn inference(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        GalleryzeError::Inference {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error is confined to a single image
    pub fn is_per_file(&self) -> bool {
        matches!(self, GalleryzeError::Inference { .. })
    }
}
