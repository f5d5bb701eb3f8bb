#![recursion_limit = "256"]

pub mod config;
pub mod eval;
pub mod loss;
pub mod metrics;
pub mod train;
pub mod util;

pub use config::PipelineConfig;
pub use eval::{evaluate_split, run_eval, EvalArgs, EvalReport, SampleError};
pub use loss::{angular_error_deg, angular_errors, angular_loss, pool_prediction};
pub use metrics::{AverageMeter, ErrorStats, StatsError};
pub use models::{IllumNet, IllumNetConfig, IlluminantPredictor};
pub use train::{run_train, TrainArgs, TrainSummary};
pub use util::{checkpoint_path, load_checkpoint, save_checkpoint, BackendKind};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
