//! Fold-indexed color-checker dataset with lazy per-access augmentation.

use crate::aug::{augment, crop_test, AugmentConfig};
use crate::folds::FoldTable;
use crate::manifest::load_manifest;
use crate::npy::read_npy;
use crate::preprocess::to_network_input;
use crate::types::{DatasetError, DatasetResult, RawSample, SampleTensor, Split};
use image::Rgb32FImage;
use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub root: PathBuf,
    /// Manifest file, relative to `root`.
    pub manifest: PathBuf,
    /// Fold table, relative to `root`.
    pub folds: PathBuf,
    /// Directory of `<id>.npy` image arrays, relative to `root`.
    pub images_subdir: String,
    /// Directory of `<id>.npy` illuminant arrays, relative to `root`.
    pub labels_subdir: String,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset/color_checker"),
            manifest: PathBuf::from("color_checker_meta.txt"),
            folds: PathBuf::from("folds.json"),
            images_subdir: "npy/ndata".to_string(),
            labels_subdir: "npy/nlabel".to_string(),
        }
    }
}

impl DatasetPaths {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest)
    }

    pub fn folds_path(&self) -> PathBuf {
        self.root.join(&self.folds)
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.root
            .join(&self.images_subdir)
            .join(format!("{id}.npy"))
    }

    pub fn label_path(&self, id: &str) -> PathBuf {
        self.root
            .join(&self.labels_subdir)
            .join(format!("{id}.npy"))
    }
}

/// Read the image and illuminant arrays for `id`.
pub fn load_raw_sample(paths: &DatasetPaths, id: &str) -> DatasetResult<RawSample> {
    let wrap = |path: &Path, err: DatasetError| DatasetError::SampleFile {
        id: id.to_string(),
        path: path.to_path_buf(),
        source: Box::new(err),
    };

    let image_path = paths.image_path(id);
    let arr = read_npy(&image_path).map_err(|e| wrap(&image_path, e))?;
    let (h, w) = match arr.shape.as_slice() {
        [h, w, 3] => match (u32::try_from(*h), u32::try_from(*w)) {
            (Ok(h), Ok(w)) => (h, w),
            _ => {
                return Err(DatasetError::Shape {
                    id: id.to_string(),
                    msg: format!("image dimensions {h}x{w} exceed u32"),
                })
            }
        },
        other => {
            return Err(DatasetError::Shape {
                id: id.to_string(),
                msg: format!("image array must be HxWx3, got {other:?}"),
            })
        }
    };
    let image = Rgb32FImage::from_raw(w, h, arr.data).ok_or_else(|| DatasetError::Shape {
        id: id.to_string(),
        msg: format!("image buffer does not match {w}x{h}x3"),
    })?;

    let label_path = paths.label_path(id);
    let label = read_npy(&label_path).map_err(|e| wrap(&label_path, e))?;
    let illuminant: [f32; 3] = label
        .data
        .as_slice()
        .try_into()
        .map_err(|_| DatasetError::Shape {
            id: id.to_string(),
            msg: format!("illuminant must have 3 values, got {:?}", label.shape),
        })?;
    if illuminant.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(DatasetError::Shape {
            id: id.to_string(),
            msg: format!("illuminant components must be positive, got {illuminant:?}"),
        });
    }

    Ok(RawSample {
        id: id.to_string(),
        image,
        illuminant,
    })
}

/// One side (train or test) of a cross-validation fold.
///
/// Access is `&self` only; every call supplies its own RNG, so the dataset can
/// be shared across loader threads.
#[derive(Debug, Clone)]
pub struct ColorCheckerDataset {
    paths: DatasetPaths,
    split: Split,
    ids: Vec<String>,
    cfg: AugmentConfig,
    cache: Option<Vec<RawSample>>,
}

impl ColorCheckerDataset {
    /// Read the manifest and fold table and select one side of `fold`.
    pub fn open(
        paths: DatasetPaths,
        fold: usize,
        split: Split,
        cfg: AugmentConfig,
    ) -> DatasetResult<Self> {
        cfg.validate()?;
        let manifest = load_manifest(&paths.manifest_path())?;
        let table = FoldTable::load(&paths.folds_path(), manifest.len())?;
        let ids = table
            .split(fold, split)?
            .iter()
            .map(|&i| manifest[i].clone())
            .collect::<Vec<_>>();
        info!(
            "opened {} split of fold {} ({} of {} samples) from {}",
            split.as_str(),
            fold,
            ids.len(),
            manifest.len(),
            paths.root.display()
        );
        Ok(Self::from_ids(paths, ids, split, cfg))
    }

    pub fn from_ids(paths: DatasetPaths, ids: Vec<String>, split: Split, cfg: AugmentConfig) -> Self {
        Self {
            paths,
            split,
            ids,
            cfg,
            cache: None,
        }
    }

    /// Load every sample into memory up front.
    pub fn preload(mut self) -> DatasetResult<Self> {
        let samples = self
            .ids
            .par_iter()
            .map(|id| load_raw_sample(&self.paths, id))
            .collect::<DatasetResult<Vec<_>>>()?;
        debug!("preloaded {} samples", samples.len());
        self.cache = Some(samples);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.cfg
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn raw(&self, index: usize) -> DatasetResult<Cow<'_, RawSample>> {
        let id = self.ids.get(index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.ids.len(),
        })?;
        match &self.cache {
            Some(samples) => Ok(Cow::Borrowed(&samples[index])),
            None => load_raw_sample(&self.paths, id).map(Cow::Owned),
        }
    }

    /// Network-ready sample at `index`: augmented in train mode, downscaled in test mode.
    pub fn get<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> DatasetResult<SampleTensor> {
        let raw = self.raw(index)?;
        let sample = match self.split {
            Split::Train => augment(&self.cfg, Some(raw.as_ref()), rng)?.ok_or_else(|| {
                DatasetError::Other(format!("augmentation dropped sample {}", raw.id))
            })?,
            Split::Test => crop_test(raw.as_ref(), self.cfg.eval_scale),
        };
        Ok(to_network_input(&sample))
    }
}
