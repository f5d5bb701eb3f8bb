//! Batch iteration and collation into Burn tensors.

use crate::dataset::ColorCheckerDataset;
use crate::types::{DatasetError, DatasetResult, SampleTensor};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Shuffle sample order at iterator creation.
    pub shuffle: bool,
    /// Seed for order and per-sample augmentation; drawn fresh when None.
    pub seed: Option<u64>,
    /// Drop the trailing partial batch.
    pub drop_last: bool,
}

impl BatchConfig {
    pub fn train(batch_size: usize) -> Self {
        Self {
            batch_size,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }

    /// Ordered, one sample per batch: evaluation images differ in size.
    pub fn eval() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            seed: None,
            drop_last: false,
        }
    }
}

pub struct IllumBatch<B: Backend> {
    /// `[N, 3, H, W]` network input.
    pub images: Tensor<B, 4>,
    /// `[N, 3]` ground-truth illuminants.
    pub illuminants: Tensor<B, 2>,
    pub ids: Vec<String>,
}

pub fn collate<B: Backend>(
    samples: &[SampleTensor],
    device: &B::Device,
) -> DatasetResult<IllumBatch<B>> {
    let Some(first) = samples.first() else {
        return Err(DatasetError::Other("cannot collate empty batch".into()));
    };
    let (w, h) = (first.width, first.height);
    let mut images = Vec::with_capacity(samples.len() * first.image_chw.len());
    let mut illuminants = Vec::with_capacity(samples.len() * 3);
    let mut ids = Vec::with_capacity(samples.len());
    for s in samples {
        if (s.width, s.height) != (w, h) {
            return Err(DatasetError::Shape {
                id: s.id.clone(),
                msg: format!(
                    "batch mixes {}x{} with {}x{}",
                    s.width, s.height, w, h
                ),
            });
        }
        images.extend_from_slice(&s.image_chw);
        illuminants.extend_from_slice(&s.illuminant);
        ids.push(s.id.clone());
    }
    let n = samples.len();
    Ok(IllumBatch {
        images: Tensor::from_data(
            TensorData::new(images, [n, 3, h as usize, w as usize]),
            device,
        ),
        illuminants: Tensor::from_data(TensorData::new(illuminants, [n, 3]), device),
        ids,
    })
}

pub struct BatchIter<'a> {
    dataset: &'a ColorCheckerDataset,
    order: Vec<usize>,
    cursor: usize,
    seed: u64,
    cfg: BatchConfig,
}

impl<'a> BatchIter<'a> {
    pub fn new(dataset: &'a ColorCheckerDataset, cfg: BatchConfig) -> Self {
        let seed = cfg.seed.unwrap_or_else(|| rand::rng().random());
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if cfg.shuffle {
            order.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Self {
            dataset,
            order,
            cursor: 0,
            seed,
            cfg,
        }
    }

    /// Number of batches this iterator yields in total.
    pub fn num_batches(&self) -> usize {
        let bs = self.cfg.batch_size.max(1);
        if self.cfg.drop_last {
            self.order.len() / bs
        } else {
            self.order.len().div_ceil(bs)
        }
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<IllumBatch<B>>> {
        let bs = self.cfg.batch_size.max(1);
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let end = (self.cursor + bs).min(self.order.len());
        if self.cfg.drop_last && end - self.cursor < bs {
            self.cursor = self.order.len();
            return Ok(None);
        }
        let slice = &self.order[self.cursor..end];
        self.cursor = end;

        let t_load = Instant::now();
        let seed = self.seed;
        let dataset = self.dataset;
        let samples = slice
            .par_iter()
            .map(|&i| {
                let mut rng = StdRng::seed_from_u64(sample_seed(seed, i));
                dataset.get(i, &mut rng)
            })
            .collect::<DatasetResult<Vec<_>>>()?;
        debug!(
            "loaded {} samples in {:.1} ms",
            samples.len(),
            t_load.elapsed().as_secs_f64() * 1e3
        );
        collate(&samples, device).map(Some)
    }
}

/// Per-sample RNG seed: same base seed and index give the same augmentation.
fn sample_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
