//! Fold training loop: Adam on the angular loss, periodic validation on the
//! test split, best-validation checkpointing and `json_stats` epoch logs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use clap::Parser;
use illum_dataset::{BatchConfig, BatchIter, ColorCheckerDataset, Split};
use log::{info, warn};
use models::{IllumNet, IllumNetConfig, IlluminantPredictor};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::eval::evaluate_split;
use crate::loss::{angular_loss, pool_prediction};
use crate::metrics::{AverageMeter, ErrorStats};
use crate::util::{
    checkpoint_path, configure_workers, load_checkpoint, save_checkpoint, scalar_f32,
    validate_backend_choice, BackendKind,
};
use crate::TrainBackend;

type ADBackend = Autodiff<TrainBackend>;

/// Validation loss a checkpoint must beat before the first save.
pub const INITIAL_BEST_VAL: f64 = 100.0;

#[derive(Parser, Debug, Clone)]
#[command(name = "train", about = "Train IllumNet on one fold of the color-checker dataset")]
pub struct TrainArgs {
    /// Batch size.
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
    /// Number of epochs.
    #[arg(long, default_value_t = 4000)]
    pub epochs: usize,
    /// Loader threads (defaults to rayon's choice).
    #[arg(long)]
    pub workers: Option<usize>,
    /// Learning rate.
    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,
    /// Fold to train on (0-based).
    #[arg(long, default_value_t = 0)]
    pub fold: usize,
    /// Run name; checkpoints and logs go under `<dir>/<model_name>/`.
    #[arg(long, default_value = "baseline")]
    pub model_name: String,
    /// Warm-start weights.
    #[arg(long)]
    pub checkpoint_in: Option<PathBuf>,
    /// Seed for shuffling and augmentation; random when absent.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Validate every N epochs.
    #[arg(long, default_value_t = 5)]
    pub val_every: usize,
    /// Dataset root; overrides the config file.
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value = "saved_model")]
    pub model_dir: PathBuf,
    #[arg(long, default_value = "log")]
    pub log_dir: PathBuf,
    /// IllumNet channel width.
    #[arg(long, default_value_t = 32)]
    pub width: usize,
    /// Load every sample into memory before training.
    #[arg(long)]
    pub preload: bool,
    /// Crop validation images to a decoder-compatible size.
    #[arg(long)]
    pub align_eval_size: bool,
}

/// One `json_stats:` line. The statistics are those of the best validation so far.
#[derive(Debug, Serialize)]
pub struct EpochLog {
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    pub epoch: usize,
    pub lr: f64,
    pub best_val_loss: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub trimean: Option<f64>,
    pub bst25: Option<f64>,
    pub wst25: Option<f64>,
    pub pct95: Option<f64>,
}

impl EpochLog {
    fn new(
        epoch: usize,
        train_loss: f64,
        val_loss: Option<f64>,
        lr: f64,
        best_val_loss: f64,
        best: Option<&ErrorStats>,
    ) -> Self {
        Self {
            train_loss,
            val_loss,
            epoch,
            lr,
            best_val_loss,
            mean: best.map(|s| s.mean),
            median: best.map(|s| s.median),
            trimean: best.map(|s| s.trimean),
            bst25: best.map(|s| s.best25),
            wst25: best.map(|s| s.worst25),
            pct95: best.map(|s| s.pct95),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs: usize,
    pub best_val_loss: f64,
    pub best_stats: Option<ErrorStats>,
    /// Set once a validation improved on the initial threshold.
    pub checkpoint: Option<PathBuf>,
    pub log_path: PathBuf,
}

pub fn run_train(args: &TrainArgs) -> anyhow::Result<TrainSummary> {
    validate_backend_choice(args.backend)?;
    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }
    if args.val_every == 0 {
        bail!("--val-every must be at least 1");
    }
    if let Some(workers) = args.workers {
        configure_workers(workers);
    }

    let mut cfg = PipelineConfig::load(args.config.as_deref())?;
    if let Some(root) = &args.dataset_root {
        cfg.paths.root = root.clone();
    }
    let mut train_set =
        ColorCheckerDataset::open(cfg.paths.clone(), args.fold, Split::Train, cfg.augment.clone())?;
    let mut test_set =
        ColorCheckerDataset::open(cfg.paths.clone(), args.fold, Split::Test, cfg.augment.clone())?;
    if train_set.is_empty() {
        bail!("fold {} has no training samples", args.fold);
    }
    if test_set.is_empty() {
        warn!("fold {} has no test samples; validation is skipped", args.fold);
    }
    if args.preload {
        train_set = train_set.preload()?;
        test_set = test_set.preload()?;
    }

    let ckpt_path = checkpoint_path(&args.model_dir, &args.model_name, args.fold);
    let log_path = args
        .log_dir
        .join(&args.model_name)
        .join(format!("fold{}.txt", args.fold));
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open training log {}", log_path.display()))?;

    let device = <ADBackend as Backend>::Device::default();
    let model_cfg = IllumNetConfig { width: args.width };
    let mut model = match &args.checkpoint_in {
        Some(path) => {
            info!("warm start from {}", path.display());
            load_checkpoint::<ADBackend>(path, model_cfg, &device)?
        }
        None => IllumNet::<ADBackend>::new(model_cfg, &device),
    };
    if (cfg.augment.input_size as usize) < model.min_input_side() {
        bail!(
            "input_size {} is below the model minimum side {}",
            cfg.augment.input_size,
            model.min_input_side()
        );
    }
    writeln!(
        log_file,
        "model: IllumNet width={} params={}",
        args.width,
        model.num_params()
    )?;
    writeln!(log_file, "augmentation: {}", cfg.augment.describe())?;

    let mut optim = AdamConfig::new().init();
    let mut train_meter = AverageMeter::new();
    let mut val_meter = AverageMeter::new();
    let mut best_val = INITIAL_BEST_VAL;
    let mut best_stats: Option<ErrorStats> = None;
    let mut saved = false;

    for epoch in 0..args.epochs {
        train_meter.reset();
        let t_epoch = Instant::now();
        let mut batches = BatchIter::new(
            &train_set,
            BatchConfig {
                seed: args.seed.map(|s| s.wrapping_add(epoch as u64)),
                ..BatchConfig::train(args.batch_size)
            },
        );
        while let Some(batch) = batches.next_batch::<ADBackend>(&device)? {
            let n = batch.ids.len();
            let pred = pool_prediction(model.predict(batch.images));
            let loss = angular_loss(pred, batch.illuminants);
            let loss_val = scalar_f32(loss.clone().detach())?;
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(args.lr, model, grads);
            train_meter.update(loss_val as f64, n);
        }
        let train_secs = t_epoch.elapsed().as_secs_f64();

        let mut val_loss = None;
        if epoch % args.val_every == 0 && !test_set.is_empty() {
            val_meter.reset();
            let valid = model.valid();
            let errors = evaluate_split::<TrainBackend, _>(
                &valid,
                &test_set,
                &device,
                args.align_eval_size,
            )?;
            let values: Vec<f32> = errors.iter().map(|e| e.error_deg).collect();
            for v in &values {
                val_meter.update(*v as f64, 1);
            }
            let stats = ErrorStats::from_errors(&values)?;
            let avg = val_meter.avg();
            val_loss = Some(avg);
            if avg > 0.0 && avg < best_val {
                best_val = avg;
                best_stats = Some(stats);
                save_checkpoint(&model, &ckpt_path)?;
                saved = true;
                info!("epoch {epoch}: val {avg:.4} improved; saved {}", ckpt_path.display());
            }
        }

        let entry = EpochLog::new(
            epoch,
            train_meter.avg(),
            val_loss,
            args.lr,
            best_val,
            best_stats.as_ref(),
        );
        writeln!(log_file, "json_stats: {}", serde_json::to_string(&entry)?)?;
        match val_loss {
            Some(v) => info!(
                "epoch {epoch}: train {:.4} val {v:.4} best {best_val:.4} ({train_secs:.1}s)",
                train_meter.avg()
            ),
            None => info!(
                "epoch {epoch}: train {:.4} ({train_secs:.1}s)",
                train_meter.avg()
            ),
        }
    }

    Ok(TrainSummary {
        epochs: args.epochs,
        best_val_loss: best_val,
        best_stats,
        checkpoint: saved.then_some(ckpt_path),
        log_path,
    })
}
