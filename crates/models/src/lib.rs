//! Burn models for illuminant estimation.
//!
//! - `IllumNet`: small fully-convolutional network producing a per-pixel
//!   illuminant estimate `[B, 3, h, w]`.
//! - `IlluminantPredictor`: the seam the training loop drives; any Burn module
//!   producing a non-negative `[B, 3, h, w]` map can stand in for `IllumNet`.
//! - `sizing`: encoder/decoder input-size arithmetic.

pub mod sizing;

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::{backend::Backend, Tensor};

pub use sizing::{
    compatible_side, compatible_size, crop_to_compatible, decoder_output_side, SizeError,
    MIN_COMPATIBLE_SIDE,
};

/// A model mapping an RGB batch `[B, 3, H, W]` to an illuminant map `[B, 3, h, w]`.
pub trait IlluminantPredictor<B: Backend> {
    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Smallest spatial side `predict` accepts.
    fn min_input_side(&self) -> usize;
}

/// Two unpadded k=3 stride-2 convolutions need 7 pixels to leave one.
pub const ILLUMNET_MIN_INPUT_SIDE: usize = 7;

#[derive(Debug, Clone, Copy)]
pub struct IllumNetConfig {
    pub width: usize,
}

impl Default for IllumNetConfig {
    fn default() -> Self {
        Self { width: 32 }
    }
}

#[derive(Module, Debug)]
pub struct IllumNet<B: Backend> {
    stem: Conv2d<B>,
    down: Conv2d<B>,
    body: Conv2d<B>,
    head: Conv2d<B>,
    pub config: Ignored<IllumNetConfig>,
}

impl<B: Backend> IllumNet<B> {
    pub fn new(config: IllumNetConfig, device: &B::Device) -> Self {
        let w = config.width.max(1);
        let stem = Conv2dConfig::new([3, w], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let down = Conv2dConfig::new([w, 2 * w], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let body = Conv2dConfig::new([2 * w, 2 * w], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let head = Conv2dConfig::new([2 * w, 3], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        Self {
            stem,
            down,
            body,
            head,
            config: Ignored(config),
        }
    }

    /// Per-pixel non-negative illuminant estimate.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.stem.forward(input));
        let x = relu(self.down.forward(x));
        let x = relu(self.body.forward(x));
        relu(self.head.forward(x))
    }
}

impl<B: Backend> IlluminantPredictor<B> for IllumNet<B> {
    fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(images)
    }

    fn min_input_side(&self) -> usize {
        ILLUMNET_MIN_INPUT_SIDE
    }
}
