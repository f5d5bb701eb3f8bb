//! Cross-validation fold table.
//!
//! On disk the table is JSON, `{"folds": [{"train": [..], "test": [..]}]}`,
//! with 1-based manifest indices. Loading re-bases every index to 0 and checks
//! that each fold's train and test sides are disjoint and in range.

use crate::types::{DatasetError, DatasetResult, Split};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FoldFile {
    folds: Vec<FoldEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FoldEntry {
    train: Vec<usize>,
    test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Fold {
    pub fn indices(&self, split: Split) -> &[usize] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldTable {
    folds: Vec<Fold>,
}

impl FoldTable {
    pub fn load(path: &Path, manifest_len: usize) -> DatasetResult<Self> {
        let raw = fs::read(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: FoldFile = serde_json::from_slice(&raw).map_err(|e| DatasetError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_one_based(file, manifest_len).map_err(|msg| DatasetError::Folds {
            path: path.to_path_buf(),
            msg,
        })
    }

    fn from_one_based(file: FoldFile, manifest_len: usize) -> Result<Self, String> {
        let mut folds = Vec::with_capacity(file.folds.len());
        for (k, entry) in file.folds.into_iter().enumerate() {
            let train = rebase(&entry.train, manifest_len)
                .map_err(|e| format!("fold {k} train: {e}"))?;
            let test =
                rebase(&entry.test, manifest_len).map_err(|e| format!("fold {k} test: {e}"))?;
            let seen: HashSet<usize> = train.iter().copied().collect();
            if let Some(dup) = test.iter().find(|i| seen.contains(i)) {
                return Err(format!(
                    "fold {k}: index {} is in both train and test",
                    dup + 1
                ));
            }
            folds.push(Fold { train, test });
        }
        if folds.is_empty() {
            return Err("table has no folds".into());
        }
        Ok(Self { folds })
    }

    /// Build a table from 0-based folds (fixtures and generated splits).
    pub fn from_folds(folds: Vec<Fold>) -> Self {
        Self { folds }
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn fold(&self, fold: usize) -> DatasetResult<&Fold> {
        self.folds.get(fold).ok_or(DatasetError::FoldOutOfRange {
            fold,
            available: self.folds.len(),
        })
    }

    /// 0-based manifest indices for one side of a fold, in table order.
    pub fn split(&self, fold: usize, split: Split) -> DatasetResult<&[usize]> {
        Ok(self.fold(fold)?.indices(split))
    }

    /// Serialize back to the 1-based on-disk form.
    pub fn save(&self, path: &Path) -> DatasetResult<()> {
        let file = FoldFile {
            folds: self
                .folds
                .iter()
                .map(|f| FoldEntry {
                    train: f.train.iter().map(|i| i + 1).collect(),
                    test: f.test.iter().map(|i| i + 1).collect(),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| DatasetError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

fn rebase(indices: &[usize], manifest_len: usize) -> Result<Vec<usize>, String> {
    indices
        .iter()
        .map(|&i| {
            if i == 0 {
                Err("index 0 found; indices are 1-based".to_string())
            } else if i > manifest_len {
                Err(format!(
                    "index {i} exceeds manifest length {manifest_len}"
                ))
            } else {
                Ok(i - 1)
            }
        })
        .collect()
}
