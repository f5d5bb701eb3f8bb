//! Dataset loading, fold splitting, augmentation, and Burn-compatible batching
//! for illuminant estimation.
//!
//! This crate provides:
//! - Reading pre-decoded raw images and illuminants stored as `.npy` arrays
//! - Manifest and cross-validation fold table parsing
//! - Random rotate/crop/resize/flip and per-channel gain augmentation
//! - Deterministic evaluation downscaling
//! - Burn batch iteration (feature `burn-runtime`)

pub mod aug;
pub mod dataset;
pub mod folds;
pub mod geometry;
pub mod manifest;
pub mod npy;
pub mod preprocess;
pub mod types;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use aug::{
    augment, crop_test, diagonal, transform_illuminant, AugmentConfig, AugmentConfigBuilder,
    AugmentParams,
};
pub use dataset::{load_raw_sample, ColorCheckerDataset, DatasetPaths};
pub use folds::{Fold, FoldTable};
pub use manifest::load_manifest;
pub use npy::{read_npy, write_npy, NpyArray};
pub use preprocess::to_network_input;
pub use types::*;

#[cfg(feature = "burn-runtime")]
pub use batch::{collate, BatchConfig, BatchIter, IllumBatch};
