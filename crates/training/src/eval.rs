//! Checkpoint evaluation over the test side of a fold.

use std::path::PathBuf;

use anyhow::{anyhow, bail};
use burn::tensor::backend::Backend;
use clap::Parser;
use illum_dataset::{BatchConfig, BatchIter, ColorCheckerDataset, Split};
use log::{debug, info};
use models::{crop_to_compatible, IllumNetConfig, IlluminantPredictor};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::loss::{angular_errors, pool_prediction};
use crate::metrics::ErrorStats;
use crate::util::{load_checkpoint, validate_backend_choice, BackendKind};
use crate::TrainBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleError {
    pub id: String,
    /// Angular error in degrees.
    pub error_deg: f32,
}

/// Run `model` over every sample of `dataset` in order, one image per batch.
///
/// With `align`, each image is cropped to its decoder-compatible size first.
pub fn evaluate_split<B, M>(
    model: &M,
    dataset: &ColorCheckerDataset,
    device: &B::Device,
    align: bool,
) -> anyhow::Result<Vec<SampleError>>
where
    B: Backend,
    M: IlluminantPredictor<B>,
{
    let mut batches = BatchIter::new(dataset, BatchConfig::eval());
    let mut out = Vec::with_capacity(dataset.len());
    while let Some(batch) = batches.next_batch::<B>(device)? {
        let images = if align {
            crop_to_compatible(batch.images)?
        } else {
            batch.images
        };
        let [_, _, h, w] = images.dims();
        if h.min(w) < model.min_input_side() {
            bail!(
                "{}: {w}x{h} input is below the model minimum side {}",
                batch.ids.join(","),
                model.min_input_side()
            );
        }
        let pred = pool_prediction(model.predict(images));
        let errors = angular_errors(pred, batch.illuminants)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("tensor readback failed: {e:?}"))?;
        for (id, error_deg) in batch.ids.into_iter().zip(errors) {
            debug!("{id}: {error_deg:.3} deg");
            out.push(SampleError { id, error_deg });
        }
    }
    Ok(out)
}

#[derive(Parser, Debug, Clone)]
#[command(name = "eval", about = "Evaluate an IllumNet checkpoint on the test split of a fold")]
pub struct EvalArgs {
    /// Checkpoint to load (`fold<k>.bin`).
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// Fold whose test split is evaluated (0-based).
    #[arg(long, default_value_t = 0)]
    pub fold: usize,
    /// Dataset root; overrides the config file.
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Channel width the checkpoint was trained with.
    #[arg(long, default_value_t = 32)]
    pub width: usize,
    /// Crop evaluation images to a decoder-compatible size.
    #[arg(long)]
    pub align_eval_size: bool,
    /// Print the report as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
    /// Also write the JSON report to this file.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub fold: usize,
    pub checkpoint: PathBuf,
    pub stats: ErrorStats,
    pub samples: Vec<SampleError>,
}

pub fn run_eval(args: &EvalArgs) -> anyhow::Result<EvalReport> {
    validate_backend_choice(args.backend)?;
    let mut cfg = PipelineConfig::load(args.config.as_deref())?;
    if let Some(root) = &args.dataset_root {
        cfg.paths.root = root.clone();
    }
    let dataset = ColorCheckerDataset::open(cfg.paths, args.fold, Split::Test, cfg.augment)?;
    if dataset.is_empty() {
        bail!("fold {} has no test samples", args.fold);
    }

    let device = <TrainBackend as Backend>::Device::default();
    let model = load_checkpoint::<TrainBackend>(
        &args.checkpoint,
        IllumNetConfig { width: args.width },
        &device,
    )?;
    info!(
        "evaluating {} on {} test samples of fold {}",
        args.checkpoint.display(),
        dataset.len(),
        args.fold
    );

    let samples = evaluate_split::<TrainBackend, _>(&model, &dataset, &device, args.align_eval_size)?;
    let values: Vec<f32> = samples.iter().map(|s| s.error_deg).collect();
    let stats = ErrorStats::from_errors(&values)?;
    let report = EvalReport {
        fold: args.fold,
        checkpoint: args.checkpoint.clone(),
        stats,
        samples,
    };
    if let Some(path) = &args.output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("wrote report to {}", path.display());
    }
    Ok(report)
}

impl EvalReport {
    pub fn summary(&self) -> String {
        let s = &self.stats;
        format!(
            "fold {} ({} images): mean {:.2} median {:.2} trimean {:.2} best25 {:.2} worst25 {:.2} pct95 {:.2}",
            self.fold,
            self.samples.len(),
            s.mean,
            s.median,
            s.trimean,
            s.best25,
            s.worst25,
            s.pct95
        )
    }
}
