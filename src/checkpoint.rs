// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Modification-time watermark of the last processed image

use chrono::{Local, TimeZone};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

use crate::storage::write_atomic;
use crate::Result;

/// Plain-text file holding a single timestamp (seconds since the Unix epoch)
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current watermark; a missing or unreadable file counts as 0
    pub fn load(&self) -> f64 {
        if !self.path.exists() {
            return 0.0;
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_checkpoint(&content).unwrap_or_else(|| {
                warn!(
                    "Checkpoint {:?} holds {:?}, starting from 0",
                    self.path,
                    content.trim()
                );
                0.0
            }),
            Err(e) => {
                warn!("Cannot read checkpoint {:?}: {}, starting from 0", self.path, e);
                0.0
            }
        }
    }

    pub fn save(&self, timestamp: f64) -> Result<()> {
        write_atomic(&self.path, timestamp.to_string().as_bytes())
    }

    /// Persist `candidate` only when it moves the watermark forward
    pub fn advance(&self, previous: f64, candidate: f64) -> Result<bool> {
        if candidate > previous {
            self.save(candidate)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Forget the watermark so the next run rescans everything
    pub fn reset(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A checkpoint must be a finite, non-negative number
pub fn parse_checkpoint(content: &str) -> Option<f64> {
    content
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

/// File modification time as fractional epoch seconds
pub fn mtime_secs(metadata: &Metadata) -> Result<f64> {
    let modified = metadata.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    })
}

/// Local time in `ctime` layout, e.g. `Tue Mar  5 14:02:11 2024`
pub fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    match Local.timestamp_opt(secs, nanos).single() {
        Some(time) => time.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => timestamp.to_string(),
    }
}
