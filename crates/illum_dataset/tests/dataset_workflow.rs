//! End-to-end tests over a synthetic on-disk color-checker layout.

use illum_dataset::{
    load_raw_sample, write_npy, AugmentConfigBuilder, BatchConfig, BatchIter, ColorCheckerDataset,
    DatasetError, DatasetPaths, Split,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

const IDS: [&str; 5] = ["IMG_0001", "IMG_0002", "IMG_0003", "IMG_0004", "IMG_0005"];

/// Writes manifest, fold table and 24x20 images under `root`.
fn synthetic_dataset(root: &Path) -> anyhow::Result<DatasetPaths> {
    let paths = DatasetPaths::with_root(root);
    fs::create_dir_all(root.join(&paths.images_subdir))?;
    fs::create_dir_all(root.join(&paths.labels_subdir))?;

    let mut manifest = String::new();
    for (i, id) in IDS.iter().enumerate() {
        manifest.push_str(&format!("{} {} 0 0\n", i + 1, id));
        let (h, w) = (20usize, 24usize);
        let data: Vec<f32> = (0..h * w * 3)
            .map(|k| ((k * 37 + i * 11) % 4000) as f32 * 10.0)
            .collect();
        write_npy(&paths.image_path(id), &[h, w, 3], &data)?;
        write_npy(&paths.label_path(id), &[3], &[0.25 + i as f32 * 0.125, 0.5, 0.25])?;
    }
    fs::write(paths.manifest_path(), manifest)?;
    fs::write(
        paths.folds_path(),
        r#"{"folds":[{"train":[1,2,4],"test":[3,5]},{"train":[3,5],"test":[1,2,4]}]}"#,
    )?;
    Ok(paths)
}

fn small_cfg() -> illum_dataset::AugmentConfig {
    AugmentConfigBuilder::new().input_size(16).build().unwrap()
}

#[test]
fn folds_select_manifest_entries() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let train = ColorCheckerDataset::open(paths.clone(), 0, Split::Train, small_cfg())?;
    let test = ColorCheckerDataset::open(paths, 0, Split::Test, small_cfg())?;
    assert_eq!(train.ids(), &["IMG_0001", "IMG_0002", "IMG_0004"]);
    assert_eq!(test.ids(), &["IMG_0003", "IMG_0005"]);
    Ok(())
}

#[test]
fn train_access_is_augmented_and_reproducible() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let ds = ColorCheckerDataset::open(paths, 0, Split::Train, small_cfg())?;
    let a = ds.get(1, &mut StdRng::seed_from_u64(9))?;
    let b = ds.get(1, &mut StdRng::seed_from_u64(9))?;
    assert_eq!((a.width, a.height), (16, 16));
    assert_eq!(a.image_chw.len(), 3 * 16 * 16);
    assert_eq!(a.image_chw, b.image_chw);
    assert_eq!(a.illuminant, b.illuminant);
    assert!(a.image_chw.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(a.illuminant.iter().all(|v| (0.01..=100.0).contains(v)));
    Ok(())
}

#[test]
fn test_access_is_deterministic_downscale() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let ds = ColorCheckerDataset::open(paths, 0, Split::Test, small_cfg())?;
    let a = ds.get(0, &mut StdRng::seed_from_u64(1))?;
    let b = ds.get(0, &mut StdRng::seed_from_u64(2))?;
    assert_eq!((a.width, a.height), (12, 10));
    assert_eq!(a.image_chw, b.image_chw);
    assert_eq!(a.illuminant, [0.5, 0.5, 0.25]);
    Ok(())
}

#[test]
fn missing_sample_file_names_the_id() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    fs::remove_file(paths.label_path("IMG_0002"))?;
    let ds = ColorCheckerDataset::open(paths, 0, Split::Train, small_cfg())?;
    let err = ds.get(1, &mut StdRng::seed_from_u64(0)).unwrap_err();
    match &err {
        DatasetError::SampleFile { id, .. } => assert_eq!(id, "IMG_0002"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("IMG_0002"));
    assert!(matches!(
        ds.get(7, &mut StdRng::seed_from_u64(0)),
        Err(DatasetError::IndexOutOfRange { index: 7, len: 3 })
    ));
    Ok(())
}

#[test]
fn oversized_image_shape_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let too_tall = u32::MAX as usize + 1;
    write_npy(&paths.image_path("IMG_0003"), &[too_tall, 0, 3], &[])?;
    match load_raw_sample(&paths, "IMG_0003") {
        Err(DatasetError::Shape { id, msg }) => {
            assert_eq!(id, "IMG_0003");
            assert!(msg.contains("exceed u32"), "{msg}");
        }
        other => panic!("unexpected result {other:?}"),
    }
    Ok(())
}

#[test]
fn preloaded_dataset_matches_lazy_loads() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let lazy = ColorCheckerDataset::open(paths.clone(), 1, Split::Test, small_cfg())?;
    let eager = ColorCheckerDataset::open(paths, 1, Split::Test, small_cfg())?.preload()?;
    for i in 0..lazy.len() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            lazy.get(i, &mut rng)?.image_chw,
            eager.get(i, &mut rng)?.image_chw
        );
    }
    Ok(())
}

#[test]
fn dataset_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ColorCheckerDataset>();
}

#[test]
fn batch_iter_covers_the_split() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = tempfile::tempdir()?;
    let paths = synthetic_dataset(tmp.path())?;
    let ds = ColorCheckerDataset::open(paths, 0, Split::Train, small_cfg())?;
    let device = Default::default();
    let cfg = BatchConfig {
        seed: Some(3),
        ..BatchConfig::train(2)
    };
    let mut iter = BatchIter::new(&ds, cfg);
    assert_eq!(iter.num_batches(), 2);
    let mut seen = Vec::new();
    while let Some(batch) = iter.next_batch::<burn_ndarray::NdArray<f32>>(&device)? {
        assert_eq!(batch.images.dims()[1..], [3, 16, 16]);
        seen.extend(batch.ids);
    }
    seen.sort();
    assert_eq!(seen, vec!["IMG_0001", "IMG_0002", "IMG_0004"]);
    Ok(())
}
