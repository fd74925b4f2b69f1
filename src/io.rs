//! Serialized tensor file I/O.
//!
//! Score tensors travel as safetensors containers holding exactly one
//! tensor: F32 row-major scores in, I64 indices out. Readers accept any
//! tensor name; writers name theirs `indices`. Loads are memory-mapped
//! and copied out before return, so no mapping outlives a call.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use safetensors::tensor::TensorView;
use safetensors::{serialize_to_file, Dtype, SafeTensorError, SafeTensors};

/// Failures while loading or saving tensor files.
#[derive(Debug, thiserror::Error)]
pub enum TensorFileError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: not a valid tensor container: {source}")]
    Container {
        path: String,
        #[source]
        source: SafeTensorError,
    },

    #[error("{path}: expected exactly one tensor, found {count}")]
    TensorCount { path: String, count: usize },

    #[error("{path}: expected {expect:?} data, found {found:?}")]
    Dtype {
        path: String,
        expect: Dtype,
        found: Dtype,
    },

    #[error("{path}: expected a rank-{expect} tensor, found shape {shape:?}")]
    Rank {
        path: String,
        expect: usize,
        shape: Vec<usize>,
    },
}

/// Load the single `(rows, cols)` F32 matrix in `path`.
pub fn load_matrix(path: &Path) -> Result<(Vec<f32>, usize, usize), TensorFileError> {
    let (data, shape) = load_f32(path, 2)?;
    Ok((data, shape[0], shape[1]))
}

/// Load the single length-`n` F32 vector in `path`.
pub fn load_vector(path: &Path) -> Result<Vec<f32>, TensorFileError> {
    Ok(load_f32(path, 1)?.0)
}

/// Save decoded state indices as one 1-D I64 tensor named `indices`.
pub fn save_indices(path: &Path, indices: &[i32]) -> Result<(), TensorFileError> {
    let display = path.display().to_string();
    let mut bytes = Vec::with_capacity(indices.len() * 8);
    for &index in indices {
        bytes.extend_from_slice(&i64::from(index).to_le_bytes());
    }
    let view = TensorView::new(Dtype::I64, vec![indices.len()], &bytes).map_err(|e| {
        TensorFileError::Container {
            path: display.clone(),
            source: e,
        }
    })?;
    serialize_to_file(vec![("indices", view)], &None, path).map_err(|e| {
        TensorFileError::Container {
            path: display,
            source: e,
        }
    })
}

fn load_f32(path: &Path, rank: usize) -> Result<(Vec<f32>, Vec<usize>), TensorFileError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|e| TensorFileError::Io {
        path: display.clone(),
        source: e,
    })?;
    // SAFETY: the mapping is read-only and dropped before this function
    // returns; callers only ever see an owned copy of the data.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| TensorFileError::Io {
        path: display.clone(),
        source: e,
    })?;
    let tensors =
        SafeTensors::deserialize(&map).map_err(|e| TensorFileError::Container {
            path: display.clone(),
            source: e,
        })?;
    let names = tensors.names();
    if names.len() != 1 {
        return Err(TensorFileError::TensorCount {
            path: display,
            count: names.len(),
        });
    }
    let view = tensors
        .tensor(names[0])
        .map_err(|e| TensorFileError::Container {
            path: display.clone(),
            source: e,
        })?;
    if view.dtype() != Dtype::F32 {
        return Err(TensorFileError::Dtype {
            path: display,
            expect: Dtype::F32,
            found: view.dtype(),
        });
    }
    if view.shape().len() != rank {
        return Err(TensorFileError::Rank {
            path: display,
            expect: rank,
            shape: view.shape().to_vec(),
        });
    }
    let data = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((data, view.shape().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn write_f32(path: &Path, name: &str, shape: Vec<usize>, values: &[f32]) {
        let bytes = f32_bytes(values);
        let view = TensorView::new(Dtype::F32, shape, &bytes).unwrap();
        serialize_to_file(vec![(name, view)], &None, path).unwrap();
    }

    #[test]
    fn matrix_roundtrip_any_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.safetensors");
        let values = [0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6];
        write_f32(&path, "posteriorgram", vec![2, 3], &values);

        let (data, rows, cols) = load_matrix(&path).unwrap();
        assert_eq!((rows, cols), (2, 3));
        assert_eq!(data, values);
    }

    #[test]
    fn indices_written_as_i64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indices.safetensors");
        save_indices(&path, &[3, 0, 2]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let tensors = SafeTensors::deserialize(&bytes).unwrap();
        let view = tensors.tensor("indices").unwrap();
        assert_eq!(view.dtype(), Dtype::I64);
        assert_eq!(view.shape(), &[3]);
        let decoded: Vec<i64> = view
            .data()
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(decoded, vec![3, 0, 2]);
    }

    #[test]
    fn rejects_wrong_rank_and_dtype() {
        let dir = tempfile::tempdir().unwrap();
        let vector = dir.path().join("vector.safetensors");
        write_f32(&vector, "x", vec![4], &[0.0; 4]);
        assert!(matches!(
            load_matrix(&vector),
            Err(TensorFileError::Rank { .. })
        ));

        let ints = dir.path().join("ints.safetensors");
        save_indices(&ints, &[1, 2]).unwrap();
        assert!(matches!(
            load_vector(&ints),
            Err(TensorFileError::Dtype { .. })
        ));
    }

    #[test]
    fn rejects_multi_tensor_containers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.safetensors");
        let bytes = f32_bytes(&[0.0; 2]);
        let a = TensorView::new(Dtype::F32, vec![2], &bytes).unwrap();
        let b = TensorView::new(Dtype::F32, vec![2], &bytes).unwrap();
        serialize_to_file(vec![("a", a), ("b", b)], &None, &path).unwrap();
        assert!(matches!(
            load_vector(&path),
            Err(TensorFileError::TensorCount { count: 2, .. })
        ));
    }
}
