//! Minimal reader/writer for NumPy `.npy` arrays (C order, little-endian).
//!
//! Supported element types: `<f4`, `<f8`, `<u2`. Everything is widened or
//! narrowed to `f32` on read; writes always use `<f4`.

use crate::types::{DatasetError, DatasetResult};
use std::fs;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NpyArray {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F4,
    F8,
    U2,
}

impl Dtype {
    fn size(self) -> usize {
        match self {
            Dtype::F4 => 4,
            Dtype::F8 => 8,
            Dtype::U2 => 2,
        }
    }
}

fn npy_err(path: &Path, msg: impl Into<String>) -> DatasetError {
    DatasetError::Npy {
        path: path.to_path_buf(),
        msg: msg.into(),
    }
}

pub fn read_npy(path: &Path) -> DatasetResult<NpyArray> {
    let bytes = fs::read(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_npy(&bytes, path)
}

pub(crate) fn parse_npy(bytes: &[u8], path: &Path) -> DatasetResult<NpyArray> {
    if bytes.len() < 10 || &bytes[0..6] != MAGIC {
        return Err(npy_err(path, "bad magic"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(npy_err(path, "truncated header length"));
            }
            let mut arr = [0u8; 4];
            arr.copy_from_slice(&bytes[8..12]);
            (u32::from_le_bytes(arr) as usize, 12)
        }
        v => return Err(npy_err(path, format!("unsupported format version {v}"))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(npy_err(path, "truncated header"));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| npy_err(path, "header is not valid text"))?;

    let descr = dict_value(header, "descr").ok_or_else(|| npy_err(path, "missing descr"))?;
    let dtype = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => Dtype::F4,
        "<f8" => Dtype::F8,
        "<u2" => Dtype::U2,
        other => return Err(npy_err(path, format!("unsupported dtype {other}"))),
    };
    let fortran =
        dict_value(header, "fortran_order").ok_or_else(|| npy_err(path, "missing fortran_order"))?;
    if fortran.trim() != "False" {
        return Err(npy_err(path, "fortran-ordered arrays are not supported"));
    }
    let shape_raw = dict_value(header, "shape").ok_or_else(|| npy_err(path, "missing shape"))?;
    let shape = parse_shape(shape_raw).ok_or_else(|| npy_err(path, "malformed shape"))?;

    let count = shape
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| npy_err(path, "overflow computing element count"))?;
    let payload = &bytes[data_start..];
    if payload.len() < count * dtype.size() {
        return Err(npy_err(
            path,
            format!(
                "payload truncated: {} bytes for {} elements",
                payload.len(),
                count
            ),
        ));
    }
    let data = payload[..count * dtype.size()]
        .chunks_exact(dtype.size())
        .map(|c| match dtype {
            Dtype::F4 => {
                let mut arr = [0u8; 4];
                arr.copy_from_slice(c);
                f32::from_le_bytes(arr)
            }
            Dtype::F8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(c);
                f64::from_le_bytes(arr) as f32
            }
            Dtype::U2 => u16::from_le_bytes([c[0], c[1]]) as f32,
        })
        .collect();
    Ok(NpyArray { shape, data })
}

/// Raw text of `key`'s value in a python dict literal, up to the next
/// top-level comma.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}'");
    let at = header.find(&needle)? + needle.len();
    let rest = header[at..].trim_start().strip_prefix(':')?.trim_start();
    let mut depth = 0i32;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[..=i]);
                }
            }
            ',' | '}' if depth == 0 => return Some(rest[..i].trim()),
            _ => {}
        }
    }
    None
}

fn parse_shape(raw: &str) -> Option<Vec<usize>> {
    let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok())
        .collect()
}

/// Write `data` as a version 1.0 `<f4` array.
pub fn write_npy(path: &Path, shape: &[usize], data: &[f32]) -> DatasetResult<()> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(npy_err(
            path,
            format!("shape {:?} needs {} elements, got {}", shape, expected, data.len()),
        ));
    }
    let dims = match shape {
        [d] => format!("({d},)"),
        _ => format!(
            "({})",
            shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {dims}, }}");
    // total preamble is padded to a multiple of 64 and ends with a newline
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let pad = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, out).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
