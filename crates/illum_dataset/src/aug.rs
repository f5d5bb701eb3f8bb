//! Geometric and colorimetric augmentation of raw samples.

use crate::geometry::{crop_square, downscale, resize_radiance, rotate_and_crop};
use crate::types::{
    DatasetError, DatasetResult, RawSample, ILLUMINANT_MAX, ILLUMINANT_MIN, MIN_CROP_SIDE,
    RADIANCE_MAX,
};
use image::Rgb32FImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Full rotation range in degrees; angles are drawn from [-angle/2, angle/2].
    pub angle: f32,
    /// Crop scale range (min, max), sampled log-uniformly.
    pub scale: (f32, f32),
    /// Per-channel gain jitter magnitude.
    pub color: f32,
    /// Side of the square network input.
    pub input_size: u32,
    /// Downscale factor applied to evaluation images.
    pub eval_scale: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            angle: 60.0,
            scale: (0.1, 1.0),
            color: 0.8,
            input_size: 512,
            eval_scale: 0.5,
        }
    }
}

impl AugmentConfig {
    pub fn validate(&self) -> DatasetResult<()> {
        let (lo, hi) = self.scale;
        if !(lo > 0.0 && hi > 0.0 && lo.is_finite() && hi.is_finite()) {
            return Err(DatasetError::Config(format!(
                "scale bounds must be positive, got ({lo}, {hi})"
            )));
        }
        if lo > hi {
            return Err(DatasetError::Config(format!(
                "scale min {lo} exceeds max {hi}"
            )));
        }
        if !(self.angle >= 0.0 && self.angle.is_finite()) {
            return Err(DatasetError::Config(format!(
                "angle must be non-negative, got {}",
                self.angle
            )));
        }
        if !(self.color >= 0.0 && self.color.is_finite()) {
            return Err(DatasetError::Config(format!(
                "color jitter must be non-negative, got {}",
                self.color
            )));
        }
        if self.input_size == 0 {
            return Err(DatasetError::Config("input_size must be > 0".into()));
        }
        if !(self.eval_scale > 0.0 && self.eval_scale.is_finite()) {
            return Err(DatasetError::Config(format!(
                "eval_scale must be positive, got {}",
                self.eval_scale
            )));
        }
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "angle={:.1} scale=[{:.3},{:.3}] color={:.2} input_size={} eval_scale={:.2}",
            self.angle, self.scale.0, self.scale.1, self.color, self.input_size, self.eval_scale
        )
    }
}

#[derive(Debug, Clone)]
pub struct AugmentConfigBuilder {
    inner: AugmentConfig,
}

impl Default for AugmentConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AugmentConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: AugmentConfig::default(),
        }
    }
    pub fn angle(mut self, degrees: f32) -> Self {
        self.inner.angle = degrees;
        self
    }
    pub fn scale(mut self, min: f32, max: f32) -> Self {
        self.inner.scale = (min, max);
        self
    }
    pub fn color(mut self, magnitude: f32) -> Self {
        self.inner.color = magnitude;
        self
    }
    pub fn input_size(mut self, side: u32) -> Self {
        self.inner.input_size = side;
        self
    }
    pub fn eval_scale(mut self, factor: f32) -> Self {
        self.inner.eval_scale = factor;
        self
    }
    pub fn build(self) -> DatasetResult<AugmentConfig> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

/// One draw of augmentation parameters. Never reused across samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentParams {
    pub angle: f32,
    pub scale: f32,
    pub side: u32,
    pub row0: u32,
    pub col0: u32,
    pub flip: bool,
    pub gains: [f32; 3],
}

impl AugmentParams {
    /// Draw parameters for an image of `height x width`.
    pub fn draw<R: Rng + ?Sized>(
        cfg: &AugmentConfig,
        height: u32,
        width: u32,
        rng: &mut R,
    ) -> DatasetResult<Self> {
        let short = height.min(width);
        if short == 0 || height.max(width) < MIN_CROP_SIDE {
            return Err(DatasetError::ImageTooSmall {
                width,
                height,
                min: MIN_CROP_SIDE,
            });
        }
        let angle = (rng.random::<f32>() - 0.5) * cfg.angle;
        let (lo, hi) = cfg.scale;
        let scale = (rng.random::<f32>() * (hi / lo).ln()).exp() * lo;
        let side = (short as f32 * scale).round() as u32;
        let side = side.max(MIN_CROP_SIDE).min(short);
        let row0 = rng.random_range(0..=height - side);
        let col0 = rng.random_range(0..=width - side);
        let flip = rng.random_bool(0.5);
        let mut gains = [0.0f32; 3];
        for g in gains.iter_mut() {
            *g = 1.0 + rng.random::<f32>() * cfg.color - 0.5 * cfg.color;
        }
        Ok(Self {
            angle,
            scale,
            side,
            row0,
            col0,
            flip,
            gains,
        })
    }

    /// Parameters that leave the full (square) image untouched apart from resizing.
    pub fn identity(side: u32) -> Self {
        Self {
            angle: 0.0,
            scale: 1.0,
            side,
            row0: 0,
            col0: 0,
            flip: false,
            gains: [1.0; 3],
        }
    }

    /// Apply the geometric and color transforms to one image/illuminant pair.
    pub fn apply(
        &self,
        img: &Rgb32FImage,
        illuminant: [f32; 3],
        input_size: u32,
    ) -> (Rgb32FImage, [f32; 3]) {
        let crop = crop_square(img, self.row0, self.col0, self.side);
        let rotated = rotate_and_crop(&crop, self.angle);
        let mut out = resize_radiance(&rotated, input_size, input_size);
        if self.flip {
            image::imageops::flip_horizontal_in_place(&mut out);
        }
        // Gains follow the storage channel order; see transform_illuminant.
        for pixel in out.pixels_mut() {
            for (c, g) in self.gains.iter().enumerate() {
                pixel.0[c] = (pixel.0[c] * g).clamp(0.0, RADIANCE_MAX);
            }
        }
        let illum = transform_illuminant(illuminant, &diagonal(self.gains));
        (out, illum)
    }
}

pub fn diagonal(gains: [f32; 3]) -> [[f32; 3]; 3] {
    let mut m = [[0.0f32; 3]; 3];
    for i in 0..3 {
        m[i][i] = gains[i];
    }
    m
}

/// Reverse the illuminant, multiply by `gain`, reverse back, then clip.
///
/// The image side multiplies storage channel `i` by `gain[i][i]`; with BGR
/// storage and an RGB illuminant the two agree channel for channel.
pub fn transform_illuminant(illuminant: [f32; 3], gain: &[[f32; 3]; 3]) -> [f32; 3] {
    let mut reversed = illuminant;
    reversed.reverse();
    let mut out = [0.0f32; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i] += reversed[j] * gain[i][j];
        }
    }
    for v in out.iter_mut() {
        *v = v.clamp(ILLUMINANT_MIN, ILLUMINANT_MAX);
    }
    out.reverse();
    out
}

/// Random training augmentation. An absent sample stays absent.
pub fn augment<R: Rng + ?Sized>(
    cfg: &AugmentConfig,
    sample: Option<&RawSample>,
    rng: &mut R,
) -> DatasetResult<Option<RawSample>> {
    let Some(sample) = sample else {
        return Ok(None);
    };
    let (w, h) = sample.image.dimensions();
    let params = AugmentParams::draw(cfg, h, w, rng)?;
    let (image, illuminant) = params.apply(&sample.image, sample.illuminant, cfg.input_size);
    Ok(Some(RawSample {
        id: sample.id.clone(),
        image,
        illuminant,
    }))
}

/// Deterministic evaluation crop: downscale only.
pub fn crop_test(sample: &RawSample, factor: f32) -> RawSample {
    RawSample {
        id: sample.id.clone(),
        image: downscale(&sample.image, factor),
        illuminant: sample.illuminant,
    }
}

#[cfg(test)]
mod aug_tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(w: u32, h: u32, illuminant: [f32; 3]) -> RawSample {
        RawSample {
            id: "s".into(),
            image: ImageBuffer::from_fn(w, h, |x, y| {
                Rgb([x as f32 * 10.0, y as f32 * 20.0, 1000.0])
            }),
            illuminant,
        }
    }

    #[test]
    fn identity_params_only_resize() {
        let s = sample(32, 32, [0.3, 0.5, 0.2]);
        let (img, illum) = AugmentParams::identity(32).apply(&s.image, s.illuminant, 16);
        let expected = resize_radiance(&s.image, 16, 16);
        assert_eq!(img.dimensions(), (16, 16));
        for (a, b) in img.pixels().zip(expected.pixels()) {
            for c in 0..3 {
                assert!((a.0[c] - b.0[c]).abs() < 1e-3);
            }
        }
        assert_eq!(illum, [0.3, 0.5, 0.2]);
    }

    #[test]
    fn unit_gain_leaves_illuminant_unchanged() {
        let illum = [0.25, 0.6, 0.15];
        assert_eq!(transform_illuminant(illum, &diagonal([1.0; 3])), illum);
    }

    #[test]
    fn gains_follow_storage_channel_order() {
        let s = RawSample {
            id: "c".into(),
            image: ImageBuffer::from_pixel(12, 12, Rgb([100.0f32, 100.0, 100.0])),
            illuminant: [1.0, 1.0, 1.0],
        };
        let mut params = AugmentParams::identity(12);
        params.gains = [2.0, 1.0, 0.5];
        let (img, illum) = params.apply(&s.image, s.illuminant, 12);
        let p = img.get_pixel(5, 5).0;
        assert!((p[0] - 200.0).abs() < 1e-3);
        assert!((p[1] - 100.0).abs() < 1e-3);
        assert!((p[2] - 50.0).abs() < 1e-3);
        assert_eq!(illum, [0.5, 1.0, 2.0]);
    }

    #[test]
    fn illuminant_is_clipped_both_ways() {
        let cfg = AugmentConfigBuilder::new()
            .color(0.0)
            .input_size(8)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let high = sample(20, 20, [150.0, 1.0, 1.0]);
        let out = augment(&cfg, Some(&high), &mut rng).unwrap().unwrap();
        assert!(out.illuminant[0] <= 100.0);
        let low = sample(20, 20, [1e-6, 1.0, 1.0]);
        let out = augment(&cfg, Some(&low), &mut rng).unwrap().unwrap();
        assert!(out.illuminant[0] >= 0.01);
    }

    #[test]
    fn image_is_clipped_to_radiance_range() {
        let s = RawSample {
            id: "b".into(),
            image: ImageBuffer::from_pixel(12, 12, Rgb([60000.0f32, 60000.0, 60000.0])),
            illuminant: [1.0; 3],
        };
        let mut params = AugmentParams::identity(12);
        params.gains = [1.4, 1.4, 1.4];
        let (img, _) = params.apply(&s.image, s.illuminant, 12);
        assert!(img.pixels().all(|p| p.0.iter().all(|v| *v <= RADIANCE_MAX)));
    }

    #[test]
    fn absent_sample_propagates() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = augment(&AugmentConfig::default(), None, &mut rng).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn draws_stay_in_bounds_and_repeat_with_seed() {
        let cfg = AugmentConfig::default();
        for seed in 0..64 {
            let mut a = StdRng::seed_from_u64(seed);
            let mut b = StdRng::seed_from_u64(seed);
            let p = AugmentParams::draw(&cfg, 40, 60, &mut a).unwrap();
            assert_eq!(p, AugmentParams::draw(&cfg, 40, 60, &mut b).unwrap());
            assert!(p.angle.abs() <= cfg.angle / 2.0);
            assert!(p.scale >= cfg.scale.0 && p.scale <= cfg.scale.1 + 1e-5);
            assert!(p.side >= MIN_CROP_SIDE && p.side <= 40);
            assert!(p.row0 + p.side <= 40);
            assert!(p.col0 + p.side <= 60);
            for g in p.gains {
                assert!((1.0 - cfg.color / 2.0..=1.0 + cfg.color / 2.0).contains(&g));
            }
        }
    }

    #[test]
    fn tiny_images_are_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = AugmentParams::draw(&AugmentConfig::default(), 6, 8, &mut rng).unwrap_err();
        assert!(matches!(err, DatasetError::ImageTooSmall { .. }));
    }

    #[test]
    fn crop_test_halves_the_image() {
        let s = sample(40, 20, [0.2, 0.3, 0.5]);
        let out = crop_test(&s, 0.5);
        assert_eq!(out.image.dimensions(), (20, 10));
        assert_eq!(out.illuminant, s.illuminant);
    }

    #[test]
    fn builder_rejects_inverted_scale() {
        assert!(AugmentConfigBuilder::new().scale(1.0, 0.5).build().is_err());
    }
}
