//! Angular error between predicted and ground-truth illuminants.

use burn::tensor::{backend::Backend, Tensor};
use std::f32::consts::PI;

/// Cosines are clamped just inside [-1, 1] to keep the arccos gradient finite.
pub const COS_CLAMP: f32 = 0.999_999;
const NORM_EPS: f32 = 1e-12;

// Abramowitz & Stegun 4.4.46, |error| <= 2e-8 on [0, 1].
const ACOS_COEFFS: [f32; 8] = [
    1.570_796_305_0,
    -0.214_598_801_6,
    0.088_978_987_4,
    -0.050_174_304_6,
    0.030_891_881_0,
    -0.017_088_125_6,
    0.006_670_090_1,
    -0.001_262_491_1,
];

/// Row-wise L2 normalization of `[N, C]`.
pub fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = (x.clone() * x.clone())
        .sum_dim(1)
        .sqrt()
        .clamp_min(NORM_EPS);
    x / norm
}

/// Sum a per-pixel map over both spatial axes and normalize: `[N, 3, h, w] -> [N, 3]`.
pub fn pool_prediction<B: Backend>(pred: Tensor<B, 4>) -> Tensor<B, 2> {
    let [n, c, _, _] = pred.dims();
    l2_normalize(pred.sum_dim(3).sum_dim(2).reshape([n, c]))
}

/// Differentiable arccos (radians) for inputs in [-1, 1].
pub fn acos<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let ax = x.clone().abs();
    let mut poly = ax.clone().mul_scalar(ACOS_COEFFS[7]).add_scalar(ACOS_COEFFS[6]);
    for &a in ACOS_COEFFS[..6].iter().rev() {
        poly = (poly * ax.clone()).add_scalar(a);
    }
    let positive = ax.neg().add_scalar(1.0).sqrt() * poly;
    let negative = positive.clone().neg().add_scalar(PI);
    positive.mask_where(x.lower_elem(0.0), negative)
}

/// Per-sample angle in degrees between `[N, 3]` predictions and targets.
pub fn angular_errors<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    let [n, _] = pred.dims();
    let cos = (l2_normalize(pred) * l2_normalize(target))
        .sum_dim(1)
        .reshape([n])
        .clamp(-COS_CLAMP, COS_CLAMP);
    acos(cos).mul_scalar(180.0 / PI)
}

/// Mean angular error in degrees; the training objective.
pub fn angular_loss<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    angular_errors(pred, target).mean()
}

/// Host-side angle in degrees between two illuminant vectors.
pub fn angular_error_deg(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dot: f64 = a.iter().zip(&b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let denom = (na * nb).max(NORM_EPS as f64);
    (dot / denom).clamp(-1.0, 1.0).acos().to_degrees() as f32
}
