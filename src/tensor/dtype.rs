//! ONNX data type mappings
//!
//! Maps between ONNX TensorProto data types, target program types and
//! display names used in diagnostics.

use crate::error::{LoweringError, LoweringResult};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::target::DataType as TargetDataType;

/// Size in bytes for each ONNX data type
pub fn dtype_size(dtype: DataType) -> LoweringResult<usize> {
    match dtype {
        DataType::Float => Ok(4),
        DataType::Uint8 => Ok(1),
        DataType::Int8 => Ok(1),
        DataType::Uint16 => Ok(2),
        DataType::Int16 => Ok(2),
        DataType::Int32 => Ok(4),
        DataType::Int64 => Ok(8),
        DataType::Bool => Ok(1),
        DataType::Float16 => Ok(2),
        DataType::Double => Ok(8),
        DataType::Uint32 => Ok(4),
        DataType::Uint64 => Ok(8),
        DataType::Bfloat16 => Ok(2),
        _ => Err(LoweringError::InvalidDataType(dtype as i32)),
    }
}

/// Convert i32 to DataType enum
pub fn i32_to_dtype(value: i32) -> LoweringResult<DataType> {
    DataType::try_from(value).map_err(|_| LoweringError::InvalidDataType(value))
}

/// Lower-case name of an ONNX element type
pub fn dtype_name(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Undefined => "undefined",
        DataType::Float => "float32",
        DataType::Uint8 => "uint8",
        DataType::Int8 => "int8",
        DataType::Uint16 => "uint16",
        DataType::Int16 => "int16",
        DataType::Int32 => "int32",
        DataType::Int64 => "int64",
        DataType::String => "string",
        DataType::Bool => "bool",
        DataType::Float16 => "float16",
        DataType::Double => "float64",
        DataType::Uint32 => "uint32",
        DataType::Uint64 => "uint64",
        DataType::Complex64 => "complex64",
        DataType::Complex128 => "complex128",
        DataType::Bfloat16 => "bfloat16",
    }
}

/// Program dialect type for an ONNX element type, if it has one
pub fn to_target_dtype(dtype: DataType) -> Option<TargetDataType> {
    match dtype {
        DataType::Float => Some(TargetDataType::Float32),
        DataType::Float16 => Some(TargetDataType::Float16),
        DataType::Int32 => Some(TargetDataType::Int32),
        DataType::Int64 => Some(TargetDataType::Int64),
        DataType::Bool => Some(TargetDataType::Bool),
        _ => None,
    }
}
