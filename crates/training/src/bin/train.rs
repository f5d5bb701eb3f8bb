use clap::Parser;
use log::info;
use training::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrainArgs::parse();
    let summary = run_train(&args)?;
    match &summary.checkpoint {
        Some(path) => info!(
            "best validation {:.4} deg; checkpoint {}",
            summary.best_val_loss,
            path.display()
        ),
        None => info!("no validation improved on the initial threshold; nothing saved"),
    }
    Ok(())
}
