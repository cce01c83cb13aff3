//! Protocol Buffer types
//!
//! Both sides of a lowering are protobuf messages derived with `prost`:
//! the ONNX source subset in [`onnx`] and the target IR records in
//! [`target`]. Accessor helpers live in the `extensions` submodule.

pub mod onnx;
pub mod target;

// Re-export commonly used types at module level
pub use onnx::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};

// Re-export submodules for nested types
pub use onnx::tensor_shape_proto;
pub use onnx::type_proto;

/// Extension methods for ONNX protobuf types
pub mod extensions;
