use clap::Parser;
use training::{run_eval, EvalArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = EvalArgs::parse();
    let report = run_eval(&args)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for sample in &report.samples {
            println!("{}\t{:.3}", sample.id, sample.error_deg);
        }
        println!("{}", report.summary());
    }
    Ok(())
}
