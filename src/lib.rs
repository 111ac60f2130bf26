// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Galleryze: incremental photo-folder categorizer
//!
//! Every image in a folder lands in exactly one category. An object detector
//! settles obvious documents and people; everything else goes through an
//! image classifier whose label is mapped to a category by keyword. A
//! modification-time checkpoint keeps repeated runs from redoing work.

pub mod batch;
pub mod categories;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod index;
pub mod inference;
pub mod pipeline;
pub mod resolver;
pub mod storage;
pub mod watcher;

pub use batch::{BatchProcessor, BatchReport};
pub use categories::CategoryMap;
pub use config::AppConfig;
pub use error::{GalleryzeError, Result};
pub use index::CategorizedIndex;
pub use pipeline::{Categorization, HybridPipeline, Stage};
