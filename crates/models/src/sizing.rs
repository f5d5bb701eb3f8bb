//! Input-size arithmetic for a 4-stage stride-2 encoder/decoder.
//!
//! Encoder: a k=3 stride-2 convolution (floor rounding) followed by three
//! k=3 stride-2 max-pools (ceil rounding). Decoder: three k=3 and one k=4
//! stride-2 transposed convolutions. Only sides for which the decoder
//! reproduces the input side exactly are usable.

use burn::tensor::{backend::Backend, Tensor};
use thiserror::Error;

/// Smallest positive side the encoder/decoder maps onto itself.
pub const MIN_COMPATIBLE_SIDE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("side {side} is below the smallest decoder-compatible side {min}")]
    TooSmall { side: usize, min: usize },
}

fn floor_half(n: i64) -> i64 {
    n.div_euclid(2)
}

fn ceil_half(n: i64) -> i64 {
    -(-n).div_euclid(2)
}

/// Spatial side produced by running `side` through the encoder and decoder.
pub fn decoder_output_side(side: i64) -> i64 {
    let mut k = floor_half(side - 3) + 1;
    for _ in 0..3 {
        k = ceil_half(k - 3) + 1;
    }
    for _ in 0..3 {
        k = (k - 1) * 2 + 3;
    }
    (k - 1) * 2 + 4
}

/// Largest side `<= side` that the decoder maps back onto itself.
pub fn compatible_side(side: usize) -> Result<usize, SizeError> {
    let mut k = side as i64;
    loop {
        if k < MIN_COMPATIBLE_SIDE as i64 {
            return Err(SizeError::TooSmall {
                side,
                min: MIN_COMPATIBLE_SIDE,
            });
        }
        if decoder_output_side(k) == k {
            return Ok(k as usize);
        }
        k -= 1;
    }
}

/// Per-axis [`compatible_side`] for `(height, width)`.
pub fn compatible_size(height: usize, width: usize) -> Result<(usize, usize), SizeError> {
    Ok((compatible_side(height)?, compatible_side(width)?))
}

/// Crop an NCHW batch to its top-left decoder-compatible window.
pub fn crop_to_compatible<B: Backend>(images: Tensor<B, 4>) -> Result<Tensor<B, 4>, SizeError> {
    let [n, c, h, w] = images.dims();
    let (nh, nw) = compatible_size(h, w)?;
    if (nh, nw) == (h, w) {
        return Ok(images);
    }
    Ok(images.slice([0..n, 0..c, 0..nh, 0..nw]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_boundaries() {
        assert_eq!(compatible_side(730), Ok(720));
        assert_eq!(compatible_side(512), Ok(512));
        assert_eq!(compatible_side(527), Ok(512));
        assert_eq!(compatible_side(16), Ok(16));
        assert_eq!(
            compatible_side(15),
            Err(SizeError::TooSmall { side: 15, min: 16 })
        );
    }

    #[test]
    fn idempotent_and_bounded() {
        for side in 16..600 {
            let once = compatible_side(side).unwrap();
            assert!(once <= side);
            assert_eq!(compatible_side(once), Ok(once));
            assert_eq!(decoder_output_side(once as i64), once as i64);
        }
    }

    #[test]
    fn per_axis() {
        assert_eq!(compatible_size(365, 547), Ok((352, 544)));
    }
}
