//! Model persistence in the `SafeTensors` container format.
//!
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```
//!
//! Parameter tensors are named `dense{i}.weight` / `dense{i}.bias` so the
//! layer structure reloads without a side channel. Saves are atomic:
//! bytes go to a temporary sibling file which is renamed into place, so a
//! failed save never leaves a partial artifact at the destination.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PruningError;
use crate::model::{DenseLayer, Model};
use crate::tensor::Tensor;

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TensorMetadata {
    /// Data type of the tensor (always "F32" here).
    dtype: String,
    /// Shape of the tensor.
    shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    data_offsets: [usize; 2],
}

/// Uses `BTreeMap` for deterministic JSON serialization (sorted keys).
type SafeTensorsMetadata = BTreeMap<String, TensorMetadata>;

/// Model load/save collaborator.
///
/// Implementations must round-trip layer structure, shapes, and values
/// exactly: a saved model reloads with identical parameters.
pub trait ModelStore {
    /// Load a model from a path.
    ///
    /// # Errors
    ///
    /// [`PruningError::Load`] if the path cannot be read,
    /// [`PruningError::Format`] if the contents are not a valid model.
    fn load(&self, path: &Path) -> Result<Model, PruningError>;

    /// Persist a model to a path.
    ///
    /// # Errors
    ///
    /// [`PruningError::Save`] on any persistence failure.
    fn save(&self, model: &Model, path: &Path) -> Result<(), PruningError>;
}

/// `SafeTensors`-backed model store.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeTensorsStore;

impl SafeTensorsStore {
    /// Create a new store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Flatten a model into named tensors, `dense{i}.weight` / `dense{i}.bias`.
fn state_dict(model: &Model) -> BTreeMap<String, (Vec<f32>, Vec<usize>)> {
    let mut state = BTreeMap::new();
    for (i, layer) in model.layers().iter().enumerate() {
        state.insert(
            format!("dense{i}.weight"),
            (layer.weight().data().to_vec(), layer.weight().shape().to_vec()),
        );
        if let Some(bias) = layer.bias() {
            state.insert(
                format!("dense{i}.bias"),
                (bias.data().to_vec(), bias.shape().to_vec()),
            );
        }
    }
    state
}

/// Serialize named tensors into the container byte layout.
fn encode_container(
    tensors: &BTreeMap<String, (Vec<f32>, Vec<usize>)>,
) -> Result<Vec<u8>, String> {
    let mut metadata = SafeTensorsMetadata::new();
    let mut raw_data = Vec::new();
    let mut current_offset = 0;

    for (name, (data, shape)) in tensors {
        let start_offset = current_offset;
        let end_offset = current_offset + data.len() * 4;

        metadata.insert(
            name.clone(),
            TensorMetadata {
                dtype: "F32".to_string(),
                shape: shape.clone(),
                data_offsets: [start_offset, end_offset],
            },
        );

        for &value in data {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }
        current_offset = end_offset;
    }

    let metadata_json =
        serde_json::to_string(&metadata).map_err(|e| format!("JSON serialization failed: {e}"))?;
    let metadata_bytes = metadata_json.as_bytes();
    let metadata_len = metadata_bytes.len() as u64;

    let mut output = Vec::new();
    output.extend_from_slice(&metadata_len.to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);
    Ok(output)
}

/// Validate the 8-byte header and return the metadata length.
fn validate_and_read_header(bytes: &[u8]) -> Result<usize, PruningError> {
    if bytes.len() < 8 {
        return Err(PruningError::Format {
            message: format!("file too short for header: {} bytes", bytes.len()),
        });
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[..8]);
    let metadata_len = u64::from_le_bytes(len_bytes) as usize;

    if bytes.len() < 8 + metadata_len {
        return Err(PruningError::Format {
            message: format!(
                "metadata length {metadata_len} overruns file of {} bytes",
                bytes.len()
            ),
        });
    }
    Ok(metadata_len)
}

/// Extract one F32 tensor from the raw data section.
fn extract_tensor(raw_data: &[u8], name: &str, meta: &TensorMetadata) -> Result<Tensor, PruningError> {
    if meta.dtype != "F32" {
        return Err(PruningError::Format {
            message: format!("unsupported dtype '{}' for tensor '{name}'", meta.dtype),
        });
    }

    let [start, end] = meta.data_offsets;
    if end > raw_data.len() || start > end {
        return Err(PruningError::Format {
            message: format!("tensor '{name}' data offsets [{start}, {end}] out of bounds"),
        });
    }

    let bytes = &raw_data[start..end];
    if bytes.len() % 4 != 0 {
        return Err(PruningError::Format {
            message: format!("tensor '{name}' byte length {} not divisible by 4", bytes.len()),
        });
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let expected: usize = meta.shape.iter().product();
    if values.len() != expected {
        return Err(PruningError::Format {
            message: format!(
                "tensor '{name}' has {} values but shape {:?} expects {expected}",
                values.len(),
                meta.shape
            ),
        });
    }

    Ok(Tensor::new(&values, &meta.shape))
}

/// Parse a `dense{i}.weight` / `dense{i}.bias` parameter name.
fn parse_parameter_name(name: &str) -> Result<(usize, bool), PruningError> {
    let invalid = || PruningError::Format {
        message: format!("unrecognized parameter name '{name}'"),
    };

    let rest = name.strip_prefix("dense").ok_or_else(invalid)?;
    let (index, field) = rest.split_once('.').ok_or_else(invalid)?;
    let index: usize = index.parse().map_err(|_| invalid())?;

    match field {
        "weight" => Ok((index, true)),
        "bias" => Ok((index, false)),
        _ => Err(invalid()),
    }
}

/// Rebuild the ordered layer list from named tensors.
fn assemble_model(
    tensors: BTreeMap<String, Tensor>,
) -> Result<Model, PruningError> {
    let mut slots: BTreeMap<usize, (Option<Tensor>, Option<Tensor>)> = BTreeMap::new();
    for (name, tensor) in tensors {
        let (index, is_weight) = parse_parameter_name(&name)?;
        let entry = slots.entry(index).or_insert((None, None));
        if is_weight {
            entry.0 = Some(tensor);
        } else {
            entry.1 = Some(tensor);
        }
    }

    let mut layers = Vec::with_capacity(slots.len());
    for (expected_index, (index, (weight, bias))) in slots.into_iter().enumerate() {
        if index != expected_index {
            return Err(PruningError::Format {
                message: format!("layer indices not contiguous: missing dense{expected_index}"),
            });
        }
        let weight = weight.ok_or_else(|| PruningError::Format {
            message: format!("layer dense{index} has no weight tensor"),
        })?;
        layers.push(DenseLayer::new(weight, bias)?);
    }

    Ok(Model::new(layers))
}

impl ModelStore for SafeTensorsStore {
    fn load(&self, path: &Path) -> Result<Model, PruningError> {
        let bytes = fs::read(path).map_err(|e| PruningError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let metadata_len = validate_and_read_header(&bytes)?;
        let metadata: SafeTensorsMetadata = serde_json::from_slice(&bytes[8..8 + metadata_len])
            .map_err(|e| PruningError::Format {
                message: format!("metadata JSON parse failed: {e}"),
            })?;
        let raw_data = &bytes[8 + metadata_len..];

        let mut tensors = BTreeMap::new();
        for (name, meta) in &metadata {
            tensors.insert(name.clone(), extract_tensor(raw_data, name, meta)?);
        }

        assemble_model(tensors)
    }

    fn save(&self, model: &Model, path: &Path) -> Result<(), PruningError> {
        let save_err = |reason: String| PruningError::Save {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = encode_container(&state_dict(model)).map_err(save_err)?;

        // Write to a temporary sibling, then rename into place.
        let file_name = path
            .file_name()
            .ok_or_else(|| save_err("destination has no file name".to_string()))?;
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        fs::write(&tmp_path, &bytes).map_err(|e| save_err(e.to_string()))?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(save_err(e.to_string()));
        }
        Ok(())
    }
}
