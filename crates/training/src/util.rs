use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::{backend::Backend, Tensor};
use clap::ValueEnum;
use log::warn;
use models::{IllumNet, IllumNetConfig};

pub type CheckpointRecorder = BinFileRecorder<FullPrecisionSettings>;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            warn!("built with backend-wgpu; running on the WGPU backend despite --backend nd-array");
        }
        _ => {}
    }
    Ok(())
}

/// Size the global rayon pool used by the batch loader. Only the first call wins.
pub fn configure_workers(workers: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build_global()
    {
        warn!("loader pool already configured, ignoring --workers {workers}: {e}");
    }
}

/// `<model_dir>/<model_name>/fold<k>.bin`
pub fn checkpoint_path(model_dir: &Path, model_name: &str, fold: usize) -> PathBuf {
    model_dir.join(model_name).join(format!("fold{fold}.bin"))
}

pub fn save_checkpoint<B: Backend>(model: &IllumNet<B>, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    model
        .clone()
        .save_file(path, &CheckpointRecorder::new())
        .map_err(|e| anyhow!("failed to save checkpoint {}: {e}", path.display()))
}

pub fn load_checkpoint<B: Backend>(
    path: &Path,
    config: IllumNetConfig,
    device: &B::Device,
) -> anyhow::Result<IllumNet<B>> {
    IllumNet::<B>::new(config, device)
        .load_file(path, &CheckpointRecorder::new(), device)
        .map_err(|e| anyhow!("failed to load checkpoint {}: {e}", path.display()))
}

/// First element of a (detached) tensor as f32.
pub fn scalar_f32<B: Backend>(t: Tensor<B, 1>) -> anyhow::Result<f32> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("tensor readback failed: {e:?}"))?
        .first()
        .copied()
        .ok_or_else(|| anyhow!("empty scalar tensor"))
}
