//! Sample manifest: one whitespace-delimited record per line, field 1 is the
//! file stem shared by the image and illuminant arrays.

use crate::types::{DatasetError, DatasetResult};
use std::fs;
use std::path::Path;

const ID_FIELD: usize = 1;

pub fn load_manifest(path: &Path) -> DatasetResult<Vec<String>> {
    let raw = fs::read_to_string(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_manifest(&raw, path)
}

pub(crate) fn parse_manifest(raw: &str, path: &Path) -> DatasetResult<Vec<String>> {
    let mut ids = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let id = line
            .split_whitespace()
            .nth(ID_FIELD)
            .ok_or_else(|| DatasetError::Manifest {
                path: path.to_path_buf(),
                line: lineno + 1,
                msg: format!("expected at least {} fields", ID_FIELD + 1),
            })?;
        ids.push(id.to_string());
    }
    Ok(ids)
}
