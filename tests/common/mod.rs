// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scripted model stages and image fixtures shared by the integration tests

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use galleryze::inference::{
    ClassificationResult, Classifier, DetectionObservation, Detector, InferenceEngine,
};
use galleryze::{CategoryMap, HybridPipeline, Result};

/// Detector whose output is computed from the image
pub struct ScriptedDetector<F> {
    script: F,
    calls: Arc<AtomicUsize>,
}

impl<F> Detector for ScriptedDetector<F>
where
    F: FnMut(&DynamicImage) -> Vec<DetectionObservation> + Send,
{
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<DetectionObservation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.script)(image))
    }
}

/// Classifier whose label is computed from the image
pub struct ScriptedClassifier<F> {
    script: F,
    calls: Arc<AtomicUsize>,
}

impl<F> Classifier for ScriptedClassifier<F>
where
    F: FnMut(&DynamicImage) -> String + Send,
{
    fn classify(&mut self, image: &DynamicImage) -> Result<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClassificationResult {
            label: (self.script)(image),
        })
    }
}

/// Call counters of the two stages
#[derive(Clone, Default)]
pub struct Calls {
    pub detector: Arc<AtomicUsize>,
    pub classifier: Arc<AtomicUsize>,
}

impl Calls {
    pub fn detector(&self) -> usize {
        self.detector.load(Ordering::SeqCst)
    }

    pub fn classifier(&self) -> usize {
        self.classifier.load(Ordering::SeqCst)
    }
}

pub fn pipeline<D, C>(map: CategoryMap, detect: D, classify: C) -> (HybridPipeline, Calls)
where
    D: FnMut(&DynamicImage) -> Vec<DetectionObservation> + Send + 'static,
    C: FnMut(&DynamicImage) -> String + Send + 'static,
{
    let calls = Calls::default();
    let detector = ScriptedDetector {
        script: detect,
        calls: calls.detector.clone(),
    };
    let classifier = ScriptedClassifier {
        script: classify,
        calls: calls.classifier.clone(),
    };
    let engine = InferenceEngine::new(Box::new(detector), Box::new(classifier));
    (HybridPipeline::new(engine, map, 0.35), calls)
}

/// `{"Docs": ["book"], "People": ["person"]}`
pub fn docs_people_map() -> CategoryMap {
    CategoryMap::from_json_str(r#"{"Docs": ["book"], "People": ["person"]}"#).unwrap()
}

/// Solid 4x4 image whose red channel carries `tag`
pub fn tagged_image(tag: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([tag, 0, 0])))
}

/// Red channel of the top-left pixel
pub fn tag_of(image: &DynamicImage) -> u8 {
    image.to_rgb8().get_pixel(0, 0)[0]
}

/// Write a tagged PNG (or JPEG, by extension) with a pinned modification time
pub fn write_image(dir: &Path, name: &str, tag: u8, mtime_secs: u64) -> PathBuf {
    let path = dir.join(name);
    tagged_image(tag).save(&path).unwrap();
    set_mtime(&path, mtime_secs);
    path
}

/// Write a tagged PNG under whatever name is given, `.jpg` included
pub fn write_png_named(dir: &Path, name: &str, tag: u8, mtime_secs: u64) -> PathBuf {
    let path = dir.join(name);
    tagged_image(tag)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    set_mtime(&path, mtime_secs);
    path
}

/// Write bytes no decoder accepts, with a pinned modification time
pub fn write_corrupt(dir: &Path, name: &str, mtime_secs: u64) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not an image").unwrap();
    set_mtime(&path, mtime_secs);
    path
}

pub fn set_mtime(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}
