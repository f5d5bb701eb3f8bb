//! Conversion of radiance samples into network input tensors.

use crate::types::{RawSample, SampleTensor, RADIANCE_MAX};

/// Display gamma applied to linear radiance before it reaches the network.
pub const GAMMA: f32 = 2.2;

/// Clip, scale to [0, 1], swap BGR storage to RGB, gamma-encode and lay out as CHW.
pub fn to_network_input(sample: &RawSample) -> SampleTensor {
    let (width, height) = sample.image.dimensions();
    let plane = (width * height) as usize;
    let inv_gamma = 1.0 / GAMMA;
    let mut image_chw = vec![0.0f32; plane * 3];
    for (x, y, pixel) in sample.image.enumerate_pixels() {
        let base = (y * width + x) as usize;
        for c in 0..3 {
            let v = pixel.0[2 - c].clamp(0.0, RADIANCE_MAX) / RADIANCE_MAX;
            image_chw[c * plane + base] = v.powf(inv_gamma);
        }
    }
    SampleTensor {
        id: sample.id.clone(),
        image_chw,
        width,
        height,
        illuminant: sample.illuminant,
    }
}
