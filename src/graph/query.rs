//! Source graph queries
//!
//! Strategies never touch a `GraphProto` directly; they ask these traits.
//! [`GraphContext`](super::GraphContext) is the in-crate implementation, but
//! any host graph representation can provide them.

use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::{NodeProto, TensorProto};

/// Static shape and element type of graph values
pub trait ShapeQuery {
    /// Dimensions of `value` with `-1` for unknown dims, `None` if the rank is unknown
    fn shape(&self, value: &str) -> Option<Vec<i64>>;

    /// Element type of `value`, `None` if unknown
    fn elem_type(&self, value: &str) -> Option<DataType>;
}

/// Constant tensors available at lowering time
pub trait InitializerStore {
    /// Initializer named `name`
    fn initializer(&self, name: &str) -> Option<&TensorProto>;

    /// Whether `name` resolves to a constant initializer
    fn is_initializer(&self, name: &str) -> bool {
        self.initializer(name).is_some()
    }
}

/// Everything a lowering session reads from the source graph
pub trait GraphQuery: ShapeQuery + InitializerStore {
    /// Nodes in graph-declared (topological) order
    fn nodes(&self) -> &[NodeProto];

    /// Names of the declared graph inputs, in order
    fn graph_inputs(&self) -> Vec<&str>;

    /// Names of the declared graph outputs, in order
    fn graph_outputs(&self) -> Vec<&str>;

    /// Opset version the node was exported with
    fn opset_version(&self, node: &NodeProto) -> i64;

    /// Number of node input slots reading `value`
    fn use_count(&self, value: &str) -> usize {
        self.nodes()
            .iter()
            .flat_map(|node| &node.input)
            .filter(|input| *input == value)
            .count()
    }
}
