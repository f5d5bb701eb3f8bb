//! Pipeline configuration: an optional TOML file overridden by environment variables.
//!
//! ```toml
//! [augmentation]
//! angle = 60.0
//! scale = [0.1, 1.0]
//! color = 0.8
//! input_size = 512
//! eval_scale = 0.5
//!
//! [dataset]
//! root = "dataset/color_checker"
//! manifest = "color_checker_meta.txt"
//! folds = "folds.json"
//! images_subdir = "npy/ndata"
//! labels_subdir = "npy/nlabel"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use illum_dataset::{AugmentConfig, DatasetPaths};
use log::{debug, info};
use serde::Deserialize;

pub const DEFAULT_CONFIG_NAME: &str = "illum.toml";
pub const CONFIG_PATH_ENV: &str = "ILLUM_CONFIG";
pub const ENV_ANGLE: &str = "AUGMENTATION_ANGLE";
pub const ENV_SCALE: &str = "AUGMENTATION_SCALE";
pub const ENV_COLOR: &str = "AUGMENTATION_COLOR";
pub const ENV_INPUT_SIZE: &str = "FCN_INPUT_SIZE";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub augment: AugmentConfig,
    pub paths: DatasetPaths,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PipelineConfigFile {
    augmentation: Option<AugmentationSection>,
    dataset: Option<DatasetSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AugmentationSection {
    angle: Option<f32>,
    scale: Option<[f32; 2]>,
    color: Option<f32>,
    input_size: Option<u32>,
    eval_scale: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DatasetSection {
    root: Option<String>,
    manifest: Option<String>,
    folds: Option<String>,
    images_subdir: Option<String>,
    labels_subdir: Option<String>,
}

impl PipelineConfig {
    /// Resolve the configuration: `explicit` path, else `$ILLUM_CONFIG`, else
    /// `illum.toml` if present, else defaults; then apply env overrides.
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        let mut cfg = match named {
            Some(path) => Self::from_path(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_NAME);
                if fallback.exists() {
                    Self::from_path(fallback)?
                } else {
                    debug!("no {DEFAULT_CONFIG_NAME} found; using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.augment
            .validate()
            .context("invalid augmentation configuration")?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_toml_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        info!("loaded configuration from {}", path.display());
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let file: PipelineConfigFile = toml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let mut augment = AugmentConfig::default();
        if let Some(aug) = file.augmentation {
            if let Some(v) = aug.angle {
                augment.angle = v;
            }
            if let Some([lo, hi]) = aug.scale {
                augment.scale = (lo, hi);
            }
            if let Some(v) = aug.color {
                augment.color = v;
            }
            if let Some(v) = aug.input_size {
                augment.input_size = v;
            }
            if let Some(v) = aug.eval_scale {
                augment.eval_scale = v;
            }
        }

        let mut paths = DatasetPaths::default();
        if let Some(ds) = file.dataset {
            if let Some(v) = ds.root {
                paths.root = PathBuf::from(v);
            }
            if let Some(v) = ds.manifest {
                paths.manifest = PathBuf::from(v);
            }
            if let Some(v) = ds.folds {
                paths.folds = PathBuf::from(v);
            }
            if let Some(v) = ds.images_subdir {
                paths.images_subdir = v;
            }
            if let Some(v) = ds.labels_subdir {
                paths.labels_subdir = v;
            }
        }
        Self { augment, paths }
    }

    /// Apply `AUGMENTATION_*` / `FCN_INPUT_SIZE` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ANGLE) {
            self.augment.angle = parse_env(ENV_ANGLE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SCALE) {
            self.augment.scale = parse_scale(&raw)?;
        }
        if let Some(raw) = lookup(ENV_COLOR) {
            self.augment.color = parse_env(ENV_COLOR, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INPUT_SIZE) {
            self.augment.input_size = parse_env(ENV_INPUT_SIZE, &raw)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key}={raw:?}: {e}"))
}

/// `"min,max"`, optionally bracketed: `"[0.1, 1.0]"`.
fn parse_scale(raw: &str) -> anyhow::Result<(f32, f32)> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() != 2 {
        bail!("{ENV_SCALE}={raw:?}: expected two comma-separated bounds");
    }
    Ok((parse_env(ENV_SCALE, parts[0])?, parse_env(ENV_SCALE, parts[1])?))
}
