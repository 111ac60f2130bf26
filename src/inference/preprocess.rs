// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image -> input tensor conversion for both stages

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::config::TensorLayout;
use crate::{GalleryzeError, Result};

/// Detector input: Lanczos resize, unsigned-byte RGB, NHWC `[1, h, w, 3]`
pub fn detector_input(image: &DynamicImage, width: u32, height: u32) -> Result<Array4<u8>> {
    let rgb = image
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgb8();

    Array4::from_shape_vec((1, height as usize, width as usize, 3), rgb.into_raw())
        .map_err(|e| GalleryzeError::Model(format!("Failed to create detector tensor: {}", e)))
}

/// Classifier input: Lanczos resize to a square, `(x / 255 - mean) / std` per channel
pub fn classifier_input(
    image: &DynamicImage,
    size: u32,
    layout: TensorLayout,
    mean: [f32; 3],
    std: [f32; 3],
) -> Result<Array4<f32>> {
    let rgb = image.resize_exact(size, size, FilterType::Lanczos3).to_rgb8();
    let side = size as usize;
    let hw = side * side;

    let raw = rgb.into_raw();
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        for c in 0..3 {
            let value = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
            match layout {
                TensorLayout::Nhwc => data[i * 3 + c] = value,
                TensorLayout::Nchw => data[c * hw + i] = value,
            }
        }
    }

    let shape = match layout {
        TensorLayout::Nhwc => (1, side, side, 3),
        TensorLayout::Nchw => (1, 3, side, side),
    };
    Array4::from_shape_vec(shape, data)
        .map_err(|e| GalleryzeError::Model(format!("Failed to create classifier tensor: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_detector_input_shape_and_bytes() {
        let tensor = detector_input(&solid(40, 20, [10, 20, 30]), 8, 6).unwrap();
        assert_eq!(tensor.shape(), &[1, 6, 8, 3]);
        assert_eq!(tensor[[0, 3, 4, 0]], 10);
        assert_eq!(tensor[[0, 3, 4, 1]], 20);
        assert_eq!(tensor[[0, 3, 4, 2]], 30);
    }

    #[test]
    fn test_classifier_input_scales_to_unit_range() {
        let white = classifier_input(
            &solid(5, 5, [255, 255, 255]),
            4,
            TensorLayout::Nhwc,
            [0.5; 3],
            [0.5; 3],
        )
        .unwrap();
        assert_eq!(white.shape(), &[1, 4, 4, 3]);
        assert!(white.iter().all(|v| (v - 1.0).abs() < 1e-5));

        let black = classifier_input(
            &solid(5, 5, [0, 0, 0]),
            4,
            TensorLayout::Nhwc,
            [0.5; 3],
            [0.5; 3],
        )
        .unwrap();
        assert!(black.iter().all(|v| (v + 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_classifier_input_channel_first() {
        let tensor = classifier_input(
            &solid(3, 3, [255, 0, 0]),
            2,
            TensorLayout::Nchw,
            [0.0; 3],
            [1.0; 3],
        )
        .unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert!((tensor[[0, 0, 1, 1]] - 1.0).abs() < 1e-5);
        assert!(tensor[[0, 1, 1, 1]].abs() < 1e-5);
        assert!(tensor[[0, 2, 0, 0]].abs() < 1e-5);
    }
}
