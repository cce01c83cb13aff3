//! Built-in lowering strategies
//!
//! One [`OpLowering`](crate::traits::OpLowering) implementation per operator
//! kind:
//!
//! - [`BatchNormLowering`]: `BatchNormalization`, both dialects
//! - [`ShapeLowering`]: `Shape` as a constant plus a slice
//! - [`ActivationLowering`]: `Relu`, `Sigmoid` and `Tanh`
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::ops::BatchNormLowering;
//! use onnx_lowering::traits::OpLowering;
//!
//! let bn = BatchNormLowering;
//! if bn.is_supported(node, &ctx, &options).is_ok() {
//!     bn.add_initializers_to_skip(node, &mut builder);
//!     bn.lower(node, &mut builder)?;
//! }
//! ```

/// Unary activations
pub mod activation;
/// BatchNormalization
pub mod batch_norm;
/// Shape
pub mod shape;

pub use activation::{Activation, ActivationLowering};
pub use batch_norm::BatchNormLowering;
pub use shape::ShapeLowering;

use crate::builder::ModelBuilder;
use crate::error::{LoweringError, LoweringResult};
use crate::proto::target::DataType as TargetDataType;
use crate::proto::NodeProto;
use crate::tensor::{dtype_name, to_target_dtype};

/// Program dialect type and shape of a graph value
pub(crate) fn value_type(
    builder: &ModelBuilder<'_>,
    value: &str,
) -> LoweringResult<(TargetDataType, Vec<i64>)> {
    let graph = builder.graph();
    let elem_type = graph
        .elem_type(value)
        .ok_or_else(|| LoweringError::ShapeUnavailable(value.to_string()))?;
    let dtype = to_target_dtype(elem_type).ok_or_else(|| {
        LoweringError::InvalidNode(format!(
            "{} has element type {} with no target equivalent",
            value,
            dtype_name(elem_type)
        ))
    })?;
    let shape = graph
        .shape(value)
        .ok_or_else(|| LoweringError::ShapeUnavailable(value.to_string()))?;
    Ok((dtype, shape))
}

/// Input at `index` of an already certified node
pub(crate) fn required_input(node: &NodeProto, index: usize) -> LoweringResult<&str> {
    node.input_at(index).ok_or_else(|| {
        LoweringError::InvalidNode(format!("{} has no input #{}", node.display_name(), index))
    })
}

/// Output at `index` of an already certified node
pub(crate) fn required_output(node: &NodeProto, index: usize) -> LoweringResult<&str> {
    node.output_at(index).ok_or_else(|| {
        LoweringError::InvalidNode(format!("{} has no output #{}", node.display_name(), index))
    })
}
