//! Graph context for ONNX source graphs
//!
//! `GraphContext` is the read-only view a lowering session runs against.
//! It indexes a `GraphProto` once and answers every [`GraphQuery`] in O(1).

use crate::error::{LoweringError, LoweringResult};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::{GraphProto, ModelProto, NodeProto, TensorProto};
use crate::DEFAULT_OPSET_VERSION;

use super::maps::{
    build_consumer_map, build_initializer_map, build_opset_map, build_value_info_map,
    ConsumerMap, InitializerMap, OpsetMap, ValueInfoMap,
};
use super::query::{GraphQuery, InitializerStore, ShapeQuery};

/// Indexed, read-only view of a source graph
#[derive(Debug)]
pub struct GraphContext {
    /// Nodes in declared order
    nodes: Vec<NodeProto>,

    /// Maps value name → consumer node index per input slot
    pub consumer_map: ConsumerMap,

    /// Maps initializer name → TensorProto
    pub initializer_map: InitializerMap,

    /// Maps value name → ValueInfoProto (inputs + outputs + value_info)
    pub value_info_map: ValueInfoMap,

    /// Maps normalized domain → opset version
    pub opset_map: OpsetMap,

    graph_inputs: Vec<String>,
    graph_outputs: Vec<String>,
    default_opset: i64,
}

impl GraphContext {
    /// Create a new GraphContext from a GraphProto
    ///
    /// Nodes resolve to [`DEFAULT_OPSET_VERSION`] unless opsets are supplied
    /// through [`GraphContext::from_model`] or [`GraphContext::with_default_opset`].
    pub fn new(graph: &GraphProto) -> Self {
        Self {
            nodes: graph.node.clone(),
            consumer_map: build_consumer_map(graph),
            initializer_map: build_initializer_map(graph),
            value_info_map: build_value_info_map(graph),
            opset_map: OpsetMap::default(),
            graph_inputs: graph.input.iter().map(|vi| vi.name.clone()).collect(),
            graph_outputs: graph.output.iter().map(|vi| vi.name.clone()).collect(),
            default_opset: DEFAULT_OPSET_VERSION,
        }
    }

    /// Create from a ModelProto, resolving node opsets from its imports
    pub fn from_model(model: &ModelProto) -> LoweringResult<Self> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| LoweringError::MissingField("model.graph".to_string()))?;

        let mut ctx = Self::new(graph);
        ctx.opset_map = build_opset_map(&model.opset_import);
        Ok(ctx)
    }

    /// Opset assumed for domains the model does not import
    pub fn with_default_opset(mut self, version: i64) -> Self {
        self.default_opset = version;
        self
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl ShapeQuery for GraphContext {
    fn shape(&self, value: &str) -> Option<Vec<i64>> {
        if let Some(shape) = self.value_info_map.get(value).and_then(|vi| vi.get_shape()) {
            return Some(shape);
        }
        self.initializer_map.get(value).map(|init| init.dims.clone())
    }

    fn elem_type(&self, value: &str) -> Option<DataType> {
        let raw = self
            .value_info_map
            .get(value)
            .and_then(|vi| vi.get_elem_type())
            .or_else(|| self.initializer_map.get(value).map(|init| init.data_type))?;
        DataType::try_from(raw)
            .ok()
            .filter(|dtype| *dtype != DataType::Undefined)
    }
}

impl InitializerStore for GraphContext {
    fn initializer(&self, name: &str) -> Option<&TensorProto> {
        self.initializer_map.get(name)
    }
}

impl GraphQuery for GraphContext {
    fn nodes(&self) -> &[NodeProto] {
        &self.nodes
    }

    fn graph_inputs(&self) -> Vec<&str> {
        self.graph_inputs.iter().map(String::as_str).collect()
    }

    fn graph_outputs(&self) -> Vec<&str> {
        self.graph_outputs.iter().map(String::as_str).collect()
    }

    fn opset_version(&self, node: &NodeProto) -> i64 {
        self.opset_map
            .get(node.normalized_domain())
            .copied()
            .unwrap_or(self.default_opset)
    }

    fn use_count(&self, value: &str) -> usize {
        self.consumer_map.get(value).map_or(0, |uses| uses.len())
    }
}
