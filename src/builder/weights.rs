//! Constant materialization formats
//!
//! Layer records embed constants as [`WeightParams`]; program operations
//! reference `const` operations whose payload is a [`TensorValue`].
//! [`ConstantData`] is the typed buffer both are produced from.

use half::f16;

use crate::error::{LoweringError, LoweringResult};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::target::{DataType as TargetDataType, TensorValue, WeightParams};
use crate::proto::TensorProto;
use crate::tensor::{
    dtype_name, f16_to_le_bytes, tensor_to_array_f32, tensor_to_vec_f16, tensor_to_vec_i64,
};

/// Convert a constant tensor into a layer weight blob
///
/// Float32 and int64 tensors become `float_value`; float16 tensors keep
/// their precision in `float16_value`. Other element types cannot be
/// represented and fail the lowering.
pub fn create_weight(tensor: &TensorProto) -> LoweringResult<WeightParams> {
    match tensor.data_type_enum() {
        DataType::Float | DataType::Int64 => Ok(WeightParams {
            float_value: tensor_to_array_f32(tensor)?.iter().copied().collect(),
            ..Default::default()
        }),
        DataType::Float16 => Ok(WeightParams {
            float16_value: f16_to_le_bytes(&tensor_to_vec_f16(tensor)?),
            ..Default::default()
        }),
        other => Err(LoweringError::WeightConversion {
            name: tensor.name.clone(),
            reason: format!("element type {} has no weight format", dtype_name(other)),
        }),
    }
}

/// Typed constant payload
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantData {
    /// 32-bit floats
    Float32(Vec<f32>),
    /// 16-bit floats
    Float16(Vec<f16>),
    /// 32-bit integers
    Int32(Vec<i32>),
    /// 64-bit integers
    Int64(Vec<i64>),
}

impl ConstantData {
    /// Decode an initializer, keeping its element type
    pub fn from_tensor(tensor: &TensorProto) -> LoweringResult<Self> {
        match tensor.data_type_enum() {
            DataType::Float => Ok(Self::Float32(
                tensor_to_array_f32(tensor)?.iter().copied().collect(),
            )),
            DataType::Float16 => Ok(Self::Float16(tensor_to_vec_f16(tensor)?)),
            DataType::Int32 => Ok(Self::Int32(
                tensor_to_vec_i64(tensor)?.into_iter().map(|v| v as i32).collect(),
            )),
            DataType::Int64 => Ok(Self::Int64(tensor_to_vec_i64(tensor)?)),
            other => Err(LoweringError::WeightConversion {
                name: tensor.name.clone(),
                reason: format!("element type {} cannot be a constant", dtype_name(other)),
            }),
        }
    }

    /// Integer vector as int64, or int32 when the target lacks int64
    pub fn index_vector(values: &[i64], int64_supported: bool) -> Self {
        if int64_supported {
            Self::Int64(values.to_vec())
        } else {
            Self::Int32(values.iter().map(|&v| v as i32).collect())
        }
    }

    /// Program dialect element type
    pub fn dtype(&self) -> TargetDataType {
        match self {
            Self::Float32(_) => TargetDataType::Float32,
            Self::Float16(_) => TargetDataType::Float16,
            Self::Int32(_) => TargetDataType::Int32,
            Self::Int64(_) => TargetDataType::Int64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to f32, for layer weight blobs
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::Float32(v) => v.clone(),
            Self::Float16(v) => v.iter().map(|h| h.to_f32()).collect(),
            Self::Int32(v) => v.iter().map(|&i| i as f32).collect(),
            Self::Int64(v) => v.iter().map(|&i| i as f32).collect(),
        }
    }

    /// Program dialect immediate payload
    pub fn to_tensor_value(&self) -> TensorValue {
        match self {
            Self::Float32(v) => TensorValue {
                floats: v.clone(),
                ..Default::default()
            },
            Self::Float16(v) => TensorValue {
                bytes: f16_to_le_bytes(v),
                ..Default::default()
            },
            Self::Int32(v) => TensorValue {
                ints: v.clone(),
                ..Default::default()
            },
            Self::Int64(v) => TensorValue {
                long_ints: v.clone(),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{vec_to_tensor_f16, vec_to_tensor_f32, vec_to_tensor_i64};

    #[test]
    fn test_create_weight_float32() {
        let weight = create_weight(&vec_to_tensor_f32(&[1.0, 2.0], "w")).unwrap();
        assert_eq!(weight.float_value, vec![1.0, 2.0]);
        assert!(weight.float16_value.is_empty());
    }

    #[test]
    fn test_create_weight_float16_keeps_half_bytes() {
        let weight = create_weight(&vec_to_tensor_f16(&[1.0, -0.5], "w")).unwrap();
        assert!(weight.float_value.is_empty());
        assert_eq!(weight.float16_value.len(), 4);
        assert_eq!(
            f16::from_le_bytes([weight.float16_value[2], weight.float16_value[3]]),
            f16::from_f32(-0.5)
        );
    }

    #[test]
    fn test_create_weight_int64_widens() {
        let weight = create_weight(&vec_to_tensor_i64(&[4, 5], "w")).unwrap();
        assert_eq!(weight.float_value, vec![4.0, 5.0]);
    }

    #[test]
    fn test_create_weight_rejects_bool() {
        let tensor = TensorProto {
            name: "mask".to_string(),
            dims: vec![1],
            data_type: DataType::Bool as i32,
            int32_data: vec![1],
            ..Default::default()
        };
        let err = create_weight(&tensor).unwrap_err();
        assert!(err.to_string().contains("mask"));
    }

    #[test]
    fn test_index_vector_falls_back_to_int32() {
        assert_eq!(
            ConstantData::index_vector(&[1, 3], true),
            ConstantData::Int64(vec![1, 3])
        );
        let narrowed = ConstantData::index_vector(&[1, 3], false);
        assert_eq!(narrowed, ConstantData::Int32(vec![1, 3]));
        assert_eq!(narrowed.dtype(), TargetDataType::Int32);
    }

    #[test]
    fn test_from_tensor_rejects_short_int64() {
        let tensor = TensorProto {
            name: "starts".to_string(),
            dims: vec![3],
            data_type: DataType::Int64 as i32,
            int64_data: vec![1, 2],
            ..Default::default()
        };
        let err = ConstantData::from_tensor(&tensor).unwrap_err();
        assert!(matches!(err, LoweringError::WeightConversion { ref name, .. } if name == "starts"));
    }

    #[test]
    fn test_from_tensor_raw_int32() {
        let tensor = TensorProto {
            dims: vec![2],
            data_type: DataType::Int32 as i32,
            raw_data: [7i32, -1i32].iter().flat_map(|v| v.to_le_bytes()).collect(),
            ..Default::default()
        };
        assert_eq!(
            ConstantData::from_tensor(&tensor).unwrap(),
            ConstantData::Int32(vec![7, -1])
        );
    }
}
