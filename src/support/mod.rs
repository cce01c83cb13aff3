//! Support predicate building blocks
//!
//! Every strategy's `check_node` is a sequence of these checks joined with
//! `?`; the first failing check becomes the node's ineligibility reason.
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::support::*;
//!
//! fn check_node(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
//!     check_output_count(node, 1)?;
//!     let input = input_name(node, 0)?;
//!     let shape = input_shape(graph, input)?;
//!     check_rank(node, input, &shape, 4)?;
//!     require_initializers(node, graph, &[(1, "scale"), (2, "B")])
//! }
//! ```

pub mod exclusions;

pub use exclusions::{check_exclusions, PlatformExclusion, PLATFORM_EXCLUSIONS};

use crate::error::{Support, Unsupported};
use crate::graph::{InitializerStore, ShapeQuery};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::NodeProto;
use crate::tensor::{dtype_name, is_dynamic};

/// Node must have exactly `expected` outputs
pub fn check_output_count(node: &NodeProto, expected: usize) -> Support {
    if node.output.len() == expected {
        Ok(())
    } else {
        Err(Unsupported::OutputCount {
            op_type: node.op_type.clone(),
            expected,
            actual: node.output.len(),
        })
    }
}

/// Name of a present input
pub fn input_name(node: &NodeProto, index: usize) -> Result<&str, Unsupported> {
    node.input_at(index).ok_or_else(|| Unsupported::MissingInput {
        op_type: node.op_type.clone(),
        index,
    })
}

/// Known shape of a value
pub fn input_shape<G>(graph: &G, value: &str) -> Result<Vec<i64>, Unsupported>
where
    G: ShapeQuery + ?Sized,
{
    graph.shape(value).ok_or_else(|| Unsupported::UnknownShape {
        input: value.to_string(),
    })
}

/// Rank of `shape` must equal `expected`
pub fn check_rank(node: &NodeProto, value: &str, shape: &[i64], expected: usize) -> Support {
    if shape.len() == expected {
        Ok(())
    } else {
        Err(Unsupported::UnsupportedRank {
            op_type: node.op_type.clone(),
            input: value.to_string(),
            expected,
            actual: shape.len(),
        })
    }
}

/// Every dimension of `shape` must be known
pub fn check_static_shape(value: &str, shape: &[i64]) -> Support {
    if is_dynamic(shape) {
        Err(Unsupported::DynamicShape {
            input: value.to_string(),
            shape: shape.to_vec(),
        })
    } else {
        Ok(())
    }
}

/// Integer attribute (or its default) must be one of `allowed`
pub fn check_int_attribute(
    node: &NodeProto,
    name: &str,
    default: i64,
    allowed: &[i64],
) -> Support {
    let value = node.get_attribute_int(name, default);
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(Unsupported::UnsupportedAttribute {
            op_type: node.op_type.clone(),
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Inputs at the given positions must be initializers
///
/// `roles` pairs an input index with the parameter it carries; the first
/// non-constant one is named in the error.
pub fn require_initializers<G: InitializerStore + ?Sized>(
    node: &NodeProto,
    graph: &G,
    roles: &[(usize, &'static str)],
) -> Support {
    for &(index, role) in roles {
        let input = input_name(node, index)?;
        if !graph.is_initializer(input) {
            return Err(Unsupported::NonConstantInput {
                op_type: node.op_type.clone(),
                role,
                input: input.to_string(),
            });
        }
    }
    Ok(())
}

/// Element type of the input at `index` must be one of `allowed`
pub fn check_input_type<G: ShapeQuery + ?Sized>(
    node: &NodeProto,
    graph: &G,
    index: usize,
    allowed: &[DataType],
) -> Support {
    let input = input_name(node, index)?;
    match graph.elem_type(input) {
        Some(dtype) if allowed.contains(&dtype) => Ok(()),
        found => Err(Unsupported::UnsupportedInputType {
            op_type: node.op_type.clone(),
            input: input.to_string(),
            dtype: found.map_or("unknown", dtype_name).to_string(),
        }),
    }
}
