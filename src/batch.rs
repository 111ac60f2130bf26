// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Checkpointed, incremental categorization of one folder

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::checkpoint::{format_timestamp, mtime_secs, CheckpointStore};
use crate::config::{AppConfig, ErrorPolicy};
use crate::index::CategorizedIndex;
use crate::pipeline::{HybridPipeline, Stage};
use crate::{GalleryzeError, Result};

/// An image file found in the scanned folder
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub path: PathBuf,
    pub mtime: f64,
}

/// One image categorized during a run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedImage {
    pub path: String,
    pub category: String,
    pub stage: Stage,
    pub label: String,
    pub mtime: f64,
    /// False when the path already sat in that bucket
    pub recorded: bool,
}

/// One image that could not be categorized
#[derive(Debug, Clone, Serialize)]
pub struct FailedImage {
    pub path: String,
    pub error: String,
    pub mtime: f64,
}

/// What a run did
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub folder: PathBuf,
    pub index_path: PathBuf,
    pub processed: Vec<ProcessedImage>,
    pub failures: Vec<FailedImage>,
    /// Files at or below the checkpoint
    pub skipped: usize,
    pub previous_checkpoint: f64,
    pub checkpoint: f64,
}

impl BatchReport {
    pub fn checkpoint_advanced(&self) -> bool {
        self.checkpoint > self.previous_checkpoint
    }
}

/// Owns the index and checkpoint locations and the scan rules
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    index_path: PathBuf,
    checkpoint: CheckpointStore,
    formats: Vec<String>,
    on_error: ErrorPolicy,
}

impl BatchProcessor {
    pub fn new(index_path: impl Into<PathBuf>, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            checkpoint: CheckpointStore::new(checkpoint_path),
            formats: crate::config::BatchConfig::default().formats,
            on_error: ErrorPolicy::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.output.index_path, &config.output.checkpoint_path)
            .with_formats(config.batch.formats.clone())
            .with_error_policy(config.batch.on_error)
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats
            .into_iter()
            .map(|f| f.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Categorize every image newer than the checkpoint.
    ///
    /// The index is rewritten on every completed run; the checkpoint only
    /// when it moves forward. Under [`ErrorPolicy::Abort`] the first failing
    /// image ends the run with nothing persisted.
    pub fn process_folder(
        &self,
        pipeline: &mut HybridPipeline,
        folder: &Path,
        confidence_threshold: f32,
    ) -> Result<BatchReport> {
        let mut index = CategorizedIndex::load_or_seed(&self.index_path, Some(pipeline.category_map()))?;
        let previous = self.checkpoint.load();
        debug!("Checkpoint before run: {}", previous);

        let files = list_images(folder, &self.formats)?;
        let mut report = BatchReport {
            folder: folder.to_path_buf(),
            index_path: self.index_path.clone(),
            processed: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
            previous_checkpoint: previous,
            checkpoint: previous,
        };

        for file in files {
            if file.mtime <= previous {
                report.skipped += 1;
                continue;
            }

            let path_str = file.path.to_string_lossy().into_owned();
            match pipeline.categorize_path_with(&file.path, confidence_threshold) {
                Ok(result) => {
                    let recorded = index.record(&result.category, &path_str);
                    info!("Processed: {} -> Category: {}", file.name, result.category);
                    report.processed.push(ProcessedImage {
                        path: path_str,
                        category: result.category,
                        stage: result.stage,
                        label: result.label,
                        mtime: file.mtime,
                        recorded,
                    });
                }
                Err(e) if e.is_per_file() && self.on_error == ErrorPolicy::Skip => {
                    error!("Failed: {} ({})", file.name, e);
                    report.failures.push(FailedImage {
                        path: path_str,
                        error: e.to_string(),
                        mtime: file.mtime,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        report.checkpoint = next_checkpoint(previous, &report.processed, &report.failures);

        index.save(&self.index_path)?;
        info!("Categorized data saved to: {}", self.index_path.display());

        if self.checkpoint.advance(previous, report.checkpoint)? {
            info!(
                "Checkpoint updated to timestamp: {} ({})",
                report.checkpoint,
                format_timestamp(report.checkpoint)
            );
        }

        Ok(report)
    }
}

/// Largest successful mtime that is still below every failed one
fn next_checkpoint(previous: f64, processed: &[ProcessedImage], failures: &[FailedImage]) -> f64 {
    let ceiling = failures
        .iter()
        .map(|f| f.mtime)
        .fold(f64::INFINITY, f64::min);

    processed
        .iter()
        .map(|p| p.mtime)
        .filter(|mtime| *mtime < ceiling)
        .fold(previous, f64::max)
}

/// Supported images directly inside `folder`, sorted by file name
pub fn list_images(folder: &Path, formats: &[String]) -> Result<Vec<ImageFile>> {
    let folder = std::fs::canonicalize(folder).map_err(|e| {
        GalleryzeError::Config(format!("Cannot open folder {}: {}", folder.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_supported(&name, formats) {
            continue;
        }
        let path = entry.path();
        // Dangling links and files removed mid-listing are skipped, not fatal
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        files.push(ImageFile {
            path,
            mtime: mtime_secs(&metadata)?,
            name,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Case-insensitive extension check on the file name
pub fn is_supported(name: &str, formats: &[String]) -> bool {
    let lower = name.to_lowercase();
    formats
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext.to_lowercase())))
}
