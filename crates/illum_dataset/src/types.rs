//! Core types, error definitions, and data structures for illum_dataset.

use image::Rgb32FImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Upper bound of stored radiance values (16-bit raw range).
pub const RADIANCE_MAX: f32 = 65535.0;
/// Illuminant components are clipped to this range after augmentation.
pub const ILLUMINANT_MIN: f32 = 0.01;
pub const ILLUMINANT_MAX: f32 = 100.0;
/// Smallest crop side the augmentation will produce.
pub const MIN_CROP_SIDE: u32 = 10;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("sample {id}: cannot read {path}: {source}")]
    SampleFile {
        id: String,
        path: PathBuf,
        #[source]
        source: Box<DatasetError>,
    },
    #[error("npy decode error at {path}: {msg}")]
    Npy { path: PathBuf, msg: String },
    #[error("manifest {path} line {line}: {msg}")]
    Manifest {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("fold table {path}: {msg}")]
    Folds { path: PathBuf, msg: String },
    #[error("fold {fold} out of range (table has {available} folds)")]
    FoldOutOfRange { fold: usize, available: usize },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("image {width}x{height} is smaller than the minimum crop side {min}")]
    ImageTooSmall { width: u32, height: u32, min: u32 },
    #[error("sample {id}: {msg}")]
    Shape { id: String, msg: String },
    #[error("invalid augmentation config: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

/// Which side of a fold a dataset serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    /// Augmented random crops.
    Train,
    /// Deterministic downscale, no jitter.
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// Raw sample as stored on disk.
///
/// `image` keeps the on-disk channel order (BGR) and radiance scale
/// (`0..=65535`). `illuminant` is an RGB triple.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub id: String,
    pub image: Rgb32FImage,
    pub illuminant: [f32; 3],
}

/// Network-ready sample.
#[derive(Debug, Clone)]
pub struct SampleTensor {
    pub id: String,
    /// Image in CHW layout, RGB, gamma-encoded, normalized to [0, 1].
    pub image_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub illuminant: [f32; 3],
}
