//! Resampling helpers for radiance images (crop, rotate, resize).
//!
//! `image::imageops::resize` clamps float pixels to `[0, 1]`, so radiance is
//! mapped to the unit range around every resize and mapped back afterwards.

use crate::types::RADIANCE_MAX;
use image::imageops::{self, FilterType};
use image::{Rgb, Rgb32FImage};
use imageproc::geometric_transformations::{rotate, Interpolation};

/// Copy the `side x side` window whose top-left pixel is (`row0`, `col0`).
pub fn crop_square(img: &Rgb32FImage, row0: u32, col0: u32, side: u32) -> Rgb32FImage {
    imageops::crop_imm(img, col0, row0, side, side).to_image()
}

/// Side of the largest axis-aligned square that fits inside a `side x side`
/// square rotated by `theta` radians.
pub fn largest_rotated_square(side: u32, theta: f32) -> u32 {
    let (sin, cos) = theta.sin_cos();
    let inner = side as f32 / (cos.abs() + sin.abs());
    // absorb f32 noise at multiples of 90 degrees
    ((inner + 1e-4).floor() as u32).clamp(1, side.max(1))
}

/// Rotate a square window by `angle_deg` about its center and keep the
/// largest centered axis-aligned square that contains no fill pixels.
///
/// Positive angles rotate clockwise as displayed.
pub fn rotate_and_crop(img: &Rgb32FImage, angle_deg: f32) -> Rgb32FImage {
    if angle_deg == 0.0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let theta = angle_deg.to_radians();
    let center = ((w as f32 - 1.0) * 0.5, (h as f32 - 1.0) * 0.5);
    let rotated = rotate(img, center, theta, Interpolation::Bilinear, Rgb([0.0; 3]));
    // bilinear sampling needs both neighbours in bounds, so keep a one pixel margin
    let short = w.min(h);
    let side = largest_rotated_square(short.saturating_sub(2).max(1), theta);
    imageops::crop_imm(&rotated, (w - side) / 2, (h - side) / 2, side, side).to_image()
}

/// Bilinear resize of a radiance image to `width x height`.
pub fn resize_radiance(img: &Rgb32FImage, width: u32, height: u32) -> Rgb32FImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let mut unit = img.clone();
    for v in unit.iter_mut() {
        *v = v.clamp(0.0, RADIANCE_MAX) / RADIANCE_MAX;
    }
    let mut resized = imageops::resize(&unit, width, height, FilterType::Triangle);
    for v in resized.iter_mut() {
        *v *= RADIANCE_MAX;
    }
    resized
}

/// Scale both axes by `factor`, rounding the target size.
pub fn downscale(img: &Rgb32FImage, factor: f32) -> Rgb32FImage {
    let (w, h) = img.dimensions();
    let nw = ((w as f32 * factor).round() as u32).max(1);
    let nh = ((h as f32 * factor).round() as u32).max(1);
    resize_radiance(img, nw, nh)
}
