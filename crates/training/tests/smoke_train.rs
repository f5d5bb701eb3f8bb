use clap::Parser;
use illum_dataset::{write_npy, DatasetPaths};
use std::fs;
use std::path::Path;
use training::{run_eval, run_train, EvalArgs, TrainArgs};

const IDS: [&str; 5] = ["IMG_0101", "IMG_0102", "IMG_0103", "IMG_0104", "IMG_0105"];

fn synthetic_dataset(root: &Path) -> anyhow::Result<()> {
    let paths = DatasetPaths::with_root(root);
    fs::create_dir_all(root.join(&paths.images_subdir))?;
    fs::create_dir_all(root.join(&paths.labels_subdir))?;
    let mut manifest = String::new();
    for (i, id) in IDS.iter().enumerate() {
        manifest.push_str(&format!("{} {}\n", i + 1, id));
        let (h, w) = (40usize, 48usize);
        let data: Vec<f32> = (0..h * w * 3)
            .map(|k| ((k * 53 + i * 7) % 6000) as f32 * 9.0 + 100.0)
            .collect();
        write_npy(&paths.image_path(id), &[h, w, 3], &data)?;
        write_npy(&paths.label_path(id), &[3], &[0.3, 0.5 + i as f32 * 0.05, 0.2])?;
    }
    fs::write(paths.manifest_path(), manifest)?;
    fs::write(
        paths.folds_path(),
        r#"{"folds":[{"train":[1,2,3],"test":[4,5]}]}"#,
    )?;
    Ok(())
}

fn write_config(dir: &Path, root: &Path) -> anyhow::Result<std::path::PathBuf> {
    write_config_with_input(dir, root, 32)
}

fn write_config_with_input(
    dir: &Path,
    root: &Path,
    input_size: u32,
) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("illum.toml");
    fs::write(
        &path,
        format!(
            "[augmentation]\ninput_size = {input_size}\nangle = 20.0\n\n[dataset]\nroot = {:?}\n",
            root.display().to_string()
        ),
    )?;
    Ok(path)
}

#[test]
fn train_then_eval_round_trip() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = tempfile::tempdir()?;
    let data_root = tmp.path().join("cc");
    synthetic_dataset(&data_root)?;
    let config = write_config(tmp.path(), &data_root)?;
    let model_dir = tmp.path().join("saved_model");
    let log_dir = tmp.path().join("log");

    let args = TrainArgs::parse_from([
        "train",
        "--epochs",
        "2",
        "--batch-size",
        "2",
        "--val-every",
        "1",
        "--width",
        "4",
        "--seed",
        "5",
        "--model-name",
        "smoke",
        "--config",
        config.to_str().unwrap(),
        "--model-dir",
        model_dir.to_str().unwrap(),
        "--log-dir",
        log_dir.to_str().unwrap(),
    ]);
    assert_eq!(args.lr, 3e-4);
    let summary = run_train(&args)?;

    let ckpt = summary.checkpoint.clone().expect("validation beats the initial threshold");
    assert_eq!(ckpt, model_dir.join("smoke").join("fold0.bin"));
    assert!(ckpt.exists());
    assert!(summary.best_val_loss > 0.0 && summary.best_val_loss <= 90.0);
    assert!(summary.best_stats.is_some());

    let log = fs::read_to_string(&summary.log_path)?;
    let stats_lines: Vec<serde_json::Value> = log
        .lines()
        .filter_map(|l| l.strip_prefix("json_stats: "))
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(stats_lines.len(), 2);
    assert_eq!(stats_lines[1]["epoch"], 1);
    assert!(stats_lines[0]["val_loss"].is_number());
    assert!(stats_lines[1]["best_val_loss"].as_f64().unwrap() <= 90.0);

    let eval_args = EvalArgs::parse_from([
        "eval",
        "--checkpoint",
        ckpt.to_str().unwrap(),
        "--width",
        "4",
        "--config",
        config.to_str().unwrap(),
        "--output",
        tmp.path().join("report.json").to_str().unwrap(),
    ]);
    let report = run_eval(&eval_args)?;
    assert_eq!(report.samples.len(), 2);
    assert_eq!(report.samples[0].id, "IMG_0104");
    assert!(report.stats.mean <= 90.0);
    assert!(report.stats.best25 <= report.stats.worst25);
    assert!(tmp.path().join("report.json").exists());
    Ok(())
}

#[test]
fn warm_start_requires_existing_checkpoint() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let data_root = tmp.path().join("cc");
    synthetic_dataset(&data_root)?;
    let config = write_config(tmp.path(), &data_root)?;
    let args = TrainArgs::parse_from([
        "train",
        "--epochs",
        "1",
        "--width",
        "4",
        "--config",
        config.to_str().unwrap(),
        "--checkpoint-in",
        tmp.path().join("missing.bin").to_str().unwrap(),
        "--model-dir",
        tmp.path().join("m").to_str().unwrap(),
        "--log-dir",
        tmp.path().join("l").to_str().unwrap(),
    ]);
    assert!(run_train(&args).is_err());
    Ok(())
}

#[test]
fn unknown_fold_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let data_root = tmp.path().join("cc");
    synthetic_dataset(&data_root)?;
    let config = write_config(tmp.path(), &data_root)?;
    let args = TrainArgs::parse_from([
        "train",
        "--fold",
        "3",
        "--config",
        config.to_str().unwrap(),
        "--model-dir",
        tmp.path().join("m").to_str().unwrap(),
        "--log-dir",
        tmp.path().join("l").to_str().unwrap(),
    ]);
    assert!(run_train(&args).is_err());
    Ok(())
}

#[test]
fn input_size_below_model_minimum_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let data_root = tmp.path().join("cc");
    synthetic_dataset(&data_root)?;
    let config = write_config_with_input(tmp.path(), &data_root, 4)?;
    let args = TrainArgs::parse_from([
        "train",
        "--epochs",
        "1",
        "--width",
        "4",
        "--config",
        config.to_str().unwrap(),
        "--model-dir",
        tmp.path().join("m").to_str().unwrap(),
        "--log-dir",
        tmp.path().join("l").to_str().unwrap(),
    ]);
    let err = run_train(&args).unwrap_err();
    assert!(err.to_string().contains("input_size 4"), "{err}");
    Ok(())
}
