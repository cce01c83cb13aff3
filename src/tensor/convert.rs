//! Tensor conversion utilities
//!
//! Decode ONNX TensorProto contents (typed fields or little-endian
//! `raw_data`) into buffers the target weight formats accept.

use half::f16;
use ndarray::{Array, ArrayD, IxDyn};

use crate::error::{LoweringError, LoweringResult};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::TensorProto;

use super::dtype::{dtype_size, i32_to_dtype};
use super::shape::numel;

/// Convert TensorProto to f32 ndarray
///
/// Handles both raw_data and typed data fields. Float16 and integer tensors
/// are widened to f32.
pub fn tensor_to_array_f32(tensor: &TensorProto) -> LoweringResult<ArrayD<f32>> {
    let dtype = i32_to_dtype(tensor.data_type)?;
    let shape: Vec<usize> = tensor.dims.iter().map(|&d| d.max(0) as usize).collect();
    let expected_len = numel(&tensor.dims);

    let data: Vec<f32> = if !tensor.raw_data.is_empty() {
        decode_raw_to_f32(tensor, dtype, expected_len)?
    } else {
        match dtype {
            DataType::Float => tensor.float_data.clone(),
            DataType::Double => tensor.double_data.iter().map(|&v| v as f32).collect(),
            DataType::Int32 => tensor.int32_data.iter().map(|&v| v as f32).collect(),
            DataType::Int64 => tensor.int64_data.iter().map(|&v| v as f32).collect(),
            // ONNX stores half floats as their bit patterns in int32_data
            DataType::Float16 => tensor
                .int32_data
                .iter()
                .map(|&bits| f16::from_bits(bits as u16).to_f32())
                .collect(),
            _ => return Err(LoweringError::InvalidDataType(tensor.data_type)),
        }
    };

    check_len(tensor, data.len(), expected_len)?;

    Array::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| LoweringError::Internal(e.to_string()))
}

/// Decode a float16 tensor into half floats without widening
pub fn tensor_to_vec_f16(tensor: &TensorProto) -> LoweringResult<Vec<f16>> {
    if tensor.data_type != DataType::Float16 as i32 {
        return Err(LoweringError::InvalidDataType(tensor.data_type));
    }
    let expected_len = numel(&tensor.dims);

    let data: Vec<f16> = if !tensor.raw_data.is_empty() {
        check_len(tensor, tensor.raw_data.len(), expected_len * 2)?;
        tensor
            .raw_data
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]))
            .collect()
    } else {
        tensor
            .int32_data
            .iter()
            .map(|&bits| f16::from_bits(bits as u16))
            .collect()
    };

    check_len(tensor, data.len(), expected_len)?;
    Ok(data)
}

/// Decode an int32 or int64 tensor into i64 without widening to float
pub fn tensor_to_vec_i64(tensor: &TensorProto) -> LoweringResult<Vec<i64>> {
    let dtype = i32_to_dtype(tensor.data_type)?;
    let expected_len = numel(&tensor.dims);

    let data: Vec<i64> = if !tensor.raw_data.is_empty() {
        check_len(tensor, tensor.raw_data.len(), expected_len * dtype_size(dtype)?)?;
        match dtype {
            DataType::Int32 => tensor
                .raw_data
                .chunks_exact(4)
                .map(|b| i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            DataType::Int64 => tensor
                .raw_data
                .chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            _ => return Err(LoweringError::InvalidDataType(tensor.data_type)),
        }
    } else {
        match dtype {
            DataType::Int32 => tensor.int32_data.iter().map(|&v| i64::from(v)).collect(),
            DataType::Int64 => tensor.int64_data.clone(),
            _ => return Err(LoweringError::InvalidDataType(tensor.data_type)),
        }
    };

    check_len(tensor, data.len(), expected_len)?;
    Ok(data)
}

/// Little-endian bytes of a half float buffer
pub fn f16_to_le_bytes(values: &[f16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Create 1D TensorProto from f32 slice
pub fn vec_to_tensor_f32(data: &[f32], name: &str) -> TensorProto {
    TensorProto {
        dims: vec![data.len() as i64],
        data_type: DataType::Float as i32,
        float_data: data.to_vec(),
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create 1D float16 TensorProto (raw_data encoded) from f32 slice
pub fn vec_to_tensor_f16(data: &[f32], name: &str) -> TensorProto {
    let halves: Vec<f16> = data.iter().map(|&v| f16::from_f32(v)).collect();
    TensorProto {
        dims: vec![data.len() as i64],
        data_type: DataType::Float16 as i32,
        raw_data: f16_to_le_bytes(&halves),
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create 1D TensorProto from i64 slice
pub fn vec_to_tensor_i64(data: &[i64], name: &str) -> TensorProto {
    TensorProto {
        dims: vec![data.len() as i64],
        data_type: DataType::Int64 as i32,
        int64_data: data.to_vec(),
        name: name.to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Internal helpers
// ============================================================================

fn check_len(tensor: &TensorProto, actual: usize, expected: usize) -> LoweringResult<()> {
    if actual != expected {
        return Err(LoweringError::WeightConversion {
            name: tensor.name.clone(),
            reason: format!(
                "data length {} does not match shape {:?} (expected {})",
                actual, tensor.dims, expected
            ),
        });
    }
    Ok(())
}

fn decode_raw_to_f32(
    tensor: &TensorProto,
    dtype: DataType,
    expected: usize,
) -> LoweringResult<Vec<f32>> {
    let raw = &tensor.raw_data;
    let elem_size = dtype_size(dtype)?;
    check_len(tensor, raw.len(), expected * elem_size)?;

    match dtype {
        DataType::Float => Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        DataType::Float16 => Ok(raw
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect()),
        DataType::Double => Ok(raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect()),
        DataType::Int32 => Ok(raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect()),
        DataType::Int64 => Ok(raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect()),
        _ => Err(LoweringError::InvalidDataType(dtype as i32)),
    }
}
