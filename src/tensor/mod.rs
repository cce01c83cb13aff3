//! Tensor utilities for ONNX models
//!
//! This module provides utilities for working with ONNX tensors:
//! - Data type mappings (`dtype`)
//! - Shape utilities (`shape`)
//! - Decoding TensorProto contents into weight buffers (`convert`)

pub mod convert;
pub mod dtype;
pub mod shape;

// Re-export commonly used items
pub use convert::{
    f16_to_le_bytes, tensor_to_array_f32, tensor_to_vec_f16, tensor_to_vec_i64,
    vec_to_tensor_f16, vec_to_tensor_f32, vec_to_tensor_i64,
};
pub use dtype::{dtype_name, dtype_size, i32_to_dtype, to_target_dtype};
pub use shape::{clamp_slice_bounds, is_dynamic, numel};
