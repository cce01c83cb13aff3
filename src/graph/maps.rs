//! Graph map types and builders
//!
//! Lookup tables a [`GraphContext`](super::GraphContext) builds once per
//! source graph. Node references are indices into the graph's node list,
//! which stays valid for unnamed nodes too.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::proto::extensions::normalize_domain;
use crate::proto::{GraphProto, OperatorSetIdProto, TensorProto, ValueInfoProto};

/// Type alias for consumer map: value name → consuming node index per input slot
/// SmallVec optimized for common case of 1-4 uses
pub type ConsumerMap = FxHashMap<String, SmallVec<[usize; 4]>>;

/// Type alias for initializer map: name → TensorProto
pub type InitializerMap = FxHashMap<String, TensorProto>;

/// Type alias for value info map: name → ValueInfoProto
pub type ValueInfoMap = FxHashMap<String, ValueInfoProto>;

/// Type alias for opset map: normalized domain → version
pub type OpsetMap = FxHashMap<String, i64>;

/// Build consumer map from graph nodes
///
/// A node reading the same value in two slots is recorded twice, so the
/// entry length is the value's use count.
pub fn build_consumer_map(graph: &GraphProto) -> ConsumerMap {
    let mut map: ConsumerMap = FxHashMap::default();

    for (index, node) in graph.node.iter().enumerate() {
        for input in node.input.iter().filter(|i| !i.is_empty()) {
            map.entry(input.clone()).or_default().push(index);
        }
    }

    map
}

/// Build initializer map from graph
pub fn build_initializer_map(graph: &GraphProto) -> InitializerMap {
    graph
        .initializer
        .iter()
        .map(|t| (t.name.clone(), t.clone()))
        .collect()
}

/// Build value info map from graph
///
/// Combines graph inputs, outputs, and intermediate value_info.
pub fn build_value_info_map(graph: &GraphProto) -> ValueInfoMap {
    graph
        .input
        .iter()
        .chain(&graph.output)
        .chain(&graph.value_info)
        .map(|vi| (vi.name.clone(), vi.clone()))
        .collect()
}

/// Build opset map from a model's opset imports
pub fn build_opset_map(opsets: &[OperatorSetIdProto]) -> OpsetMap {
    opsets
        .iter()
        .map(|op| (normalize_domain(&op.domain).to_string(), op.version))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::make_node;

    fn make_test_graph() -> GraphProto {
        GraphProto {
            node: vec![
                make_node("Relu", &["X"], &["relu_out"], "relu_0"),
                make_node("Add", &["relu_out", "relu_out"], &["add_out"], "add_0"),
                make_node("Sigmoid", &["relu_out"], &["Y"], ""),
            ],
            initializer: vec![TensorProto {
                name: "W".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_consumer_map_counts_every_slot() {
        let map = build_consumer_map(&make_test_graph());

        assert_eq!(map.get("relu_out").map(|v| v.as_slice()), Some(&[1, 1, 2][..]));
        assert_eq!(map.get("X").map(|v| v.len()), Some(1));
        assert!(map.get("W").is_none()); // unread initializer
    }

    #[test]
    fn test_build_initializer_map() {
        let map = build_initializer_map(&make_test_graph());
        assert!(map.contains_key("W"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_build_opset_map_normalizes_domain() {
        let map = build_opset_map(&[
            OperatorSetIdProto {
                domain: "ai.onnx".to_string(),
                version: 13,
            },
            OperatorSetIdProto {
                domain: "com.microsoft".to_string(),
                version: 1,
            },
        ]);

        assert_eq!(map.get(""), Some(&13));
        assert_eq!(map.get("com.microsoft"), Some(&1));
    }
}
