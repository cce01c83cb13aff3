//! Emission context for a lowering session
//!
//! `ModelBuilder` is the single-owner accumulator strategies emit into. It
//! owns the growing unit sequence, the consumed-initializer skip set and the
//! name uniquing table, and checks that every unit only references values
//! that are already defined.
//!
//! Skipping is usage counted: each [`ModelBuilder::add_initializer_to_skip`]
//! releases one use of the initializer, and it leaves the target only once
//! every node reading it has folded it. Until then a remaining reader can
//! still reference it and gets a materialized constant.

use indexmap::IndexSet;
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{LoweringOptions, TargetDialect};
use crate::error::{LoweringError, LoweringResult};
use crate::graph::GraphQuery;
use crate::proto::target::{
    binding, neural_network_layer::Layer, Argument, Binding, DataType as TargetDataType,
    LoadConstantNdLayerParams, NamedValueType, NeuralNetworkLayer, Operation, Value, ValueType,
    WeightParams,
};
use crate::proto::{NodeProto, TensorProto};
use crate::tensor::f16_to_le_bytes;

use super::lowered::LoweredModel;
use super::weights::{create_weight, ConstantData};

/// Op type of materialized constants in the program dialect
pub const CONST_OP: &str = "const";

/// Attribute holding a constant's payload
pub const CONST_VALUE_ATTR: &str = "val";

/// Accumulates target IR for one lowering session
pub struct ModelBuilder<'g> {
    graph: &'g dyn GraphQuery,
    options: LoweringOptions,

    layers: Vec<NeuralNetworkLayer>,
    operations: Vec<Operation>,

    /// Initializers folded into emitted parameters by all of their readers
    initializers_to_skip: IndexSet<String>,

    /// Uses not yet folded, seeded from the graph on first release
    initializer_uses: FxHashMap<String, usize>,

    /// Values produced by emitted units or materialized constants
    defined: FxHashSet<String>,

    /// Values the lowered model may receive from outside
    available_inputs: IndexSet<String>,

    /// Plain inputs actually referenced, in first-use order
    inputs: IndexSet<String>,

    outputs: IndexSet<String>,

    /// Value names of the source graph plus every name handed out
    taken_names: FxHashSet<String>,
    name_counters: FxHashMap<String, usize>,
}

impl<'g> ModelBuilder<'g> {
    /// Create an empty context over a source graph
    pub fn new(graph: &'g dyn GraphQuery, options: LoweringOptions) -> Self {
        let mut taken_names = FxHashSet::default();
        for node in graph.nodes() {
            taken_names.extend(node.input.iter().filter(|n| !n.is_empty()).cloned());
            taken_names.extend(node.output.iter().filter(|n| !n.is_empty()).cloned());
        }

        let mut available_inputs = IndexSet::new();
        for name in graph.graph_inputs() {
            taken_names.insert(name.to_string());
            // Older exports list initializers as graph inputs too
            if !graph.is_initializer(name) {
                available_inputs.insert(name.to_string());
            }
        }
        taken_names.extend(graph.graph_outputs().into_iter().map(str::to_string));

        Self {
            graph,
            options,
            layers: Vec::new(),
            operations: Vec::new(),
            initializers_to_skip: IndexSet::new(),
            initializer_uses: FxHashMap::default(),
            defined: FxHashSet::default(),
            available_inputs,
            inputs: IndexSet::new(),
            outputs: IndexSet::new(),
            taken_names,
            name_counters: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Session state
    // ========================================================================

    /// Source graph being lowered
    pub fn graph(&self) -> &'g dyn GraphQuery {
        self.graph
    }

    /// Session options
    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Active dialect
    pub fn dialect(&self) -> TargetDialect {
        self.options.dialect
    }

    /// Release one use of an initializer folded into an emitted unit
    ///
    /// Call once per input slot the unit folds. The initializer is skipped
    /// when no other reader remains and it was not materialized already.
    pub fn add_initializer_to_skip(&mut self, name: &str) {
        let graph = self.graph;
        let remaining = self
            .initializer_uses
            .entry(name.to_string())
            .or_insert_with(|| graph.use_count(name));
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            debug!("initializer {} still has {} reader(s)", name, remaining);
            return;
        }
        if !self.defined.contains(name) && self.initializers_to_skip.insert(name.to_string()) {
            debug!("skipping initializer {} as a plain input", name);
        }
    }

    /// Check if every reader of an initializer folded it
    pub fn is_initializer_skipped(&self, name: &str) -> bool {
        self.initializers_to_skip.contains(name)
    }

    /// Declare a value provided from outside the lowered model
    ///
    /// Used for outputs of nodes the target cannot execute.
    pub fn add_boundary_input(&mut self, name: &str) {
        self.available_inputs.insert(name.to_string());
    }

    /// Check if a value can be referenced by the next unit
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name) || self.available_inputs.contains(name)
    }

    /// Number of units emitted so far
    pub fn unit_count(&self) -> usize {
        match self.dialect() {
            TargetDialect::Layers => self.layers.len(),
            TargetDialect::Program => self.operations.len(),
        }
    }

    /// Unique name derived from `base`
    pub fn unique_name(&mut self, base: &str) -> String {
        let counter = self.name_counters.entry(base.to_string()).or_insert(0);
        loop {
            let candidate = if *counter == 0 {
                base.to_string()
            } else {
                format!("{}_{}", base, counter)
            };
            *counter += 1;
            if self.taken_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Initializer needed by an emitter
    ///
    /// The predicate has already certified it exists, so a miss is fatal.
    pub fn get_initializer(&self, name: &str) -> LoweringResult<&'g TensorProto> {
        let graph = self.graph;
        graph
            .initializer(name)
            .ok_or_else(|| LoweringError::InitializerNotFound(name.to_string()))
    }

    /// Convert a constant tensor into a layer weight blob
    pub fn weight_from_tensor(&self, tensor: &TensorProto) -> LoweringResult<WeightParams> {
        create_weight(tensor)
    }

    // ========================================================================
    // Layer dialect
    // ========================================================================

    /// New layer record named after `node`
    pub fn create_layer(&mut self, node: &NodeProto) -> NeuralNetworkLayer {
        NeuralNetworkLayer {
            name: self.unique_name(node.display_name()),
            ..Default::default()
        }
    }

    /// Append a layer after resolving its inputs
    pub fn add_layer(&mut self, layer: NeuralNetworkLayer) -> LoweringResult<()> {
        self.expect_dialect(TargetDialect::Layers, &layer.name)?;
        for input in layer.input.iter().filter(|i| !i.is_empty()) {
            self.resolve(&layer.name, input)?;
        }
        self.define_outputs(layer.output.iter());
        self.layers.push(layer);
        Ok(())
    }

    // ========================================================================
    // Program dialect
    // ========================================================================

    /// New operation of `op_type` named after `node`
    pub fn create_operation(&mut self, node: &NodeProto, op_type: &str) -> Operation {
        Operation {
            r#type: op_type.to_string(),
            name: self.unique_name(node.display_name()),
            ..Default::default()
        }
    }

    /// Bind the operation parameter `param` to the value named `value`
    pub fn add_input(op: &mut Operation, param: &str, value: &str) {
        op.inputs.insert(
            param.to_string(),
            Argument {
                arguments: vec![Binding {
                    kind: Some(binding::Kind::Name(value.to_string())),
                }],
            },
        );
    }

    /// Declare a typed output of the operation
    pub fn add_output(op: &mut Operation, value: &str, dtype: TargetDataType, shape: &[i64]) {
        op.outputs.push(NamedValueType {
            name: value.to_string(),
            r#type: Some(ValueType {
                data_type: dtype as i32,
                shape: shape.to_vec(),
            }),
        });
    }

    /// Append an operation after resolving its inputs
    pub fn add_operation(&mut self, op: Operation) -> LoweringResult<()> {
        self.expect_dialect(TargetDialect::Program, &op.name)?;
        let referenced: Vec<String> = op
            .inputs
            .values()
            .flat_map(|arg| &arg.arguments)
            .filter_map(|b| match &b.kind {
                Some(binding::Kind::Name(name)) => Some(name.clone()),
                _ => None,
            })
            .collect();
        for value in &referenced {
            self.resolve(&op.name, value)?;
        }
        self.define_outputs(op.outputs.iter().map(|o| &o.name));
        self.operations.push(op);
        Ok(())
    }

    // ========================================================================
    // Constants
    // ========================================================================

    /// Materialize an initializer as a uniquely named constant
    ///
    /// Returns the constant's value name, `{op_type}_{name}` when free.
    pub fn add_constant(
        &mut self,
        op_type: &str,
        name: &str,
        tensor: &TensorProto,
    ) -> LoweringResult<String> {
        let data = ConstantData::from_tensor(tensor)?;
        self.add_constant_data(op_type, name, data, &tensor.dims)
    }

    /// Materialize a typed buffer as a uniquely named constant
    pub fn add_constant_data(
        &mut self,
        op_type: &str,
        name: &str,
        data: ConstantData,
        shape: &[i64],
    ) -> LoweringResult<String> {
        let value = self.unique_name(&format!("{}_{}", op_type, name));
        self.emit_constant(&value, &data, shape)?;
        Ok(value)
    }

    /// Materialize a rank-0 constant
    pub fn add_scalar_constant(
        &mut self,
        op_type: &str,
        name: &str,
        scalar: ConstantData,
    ) -> LoweringResult<String> {
        if scalar.len() != 1 {
            return Err(LoweringError::Internal(format!(
                "scalar constant {} has {} elements",
                name,
                scalar.len()
            )));
        }
        self.add_constant_data(op_type, name, scalar, &[])
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Expose a defined value as an output of the lowered model
    pub fn add_model_output(&mut self, name: &str) {
        self.outputs.insert(name.to_string());
    }

    /// Finalize into a read-only model
    pub fn finish(self) -> LoweringResult<LoweredModel> {
        if let Some(missing) = self.outputs.iter().find(|o| !self.is_defined(o)) {
            return Err(LoweringError::DanglingReference {
                unit: "model outputs".to_string(),
                value: missing.clone(),
            });
        }

        let skipped = &self.initializers_to_skip;
        let inputs = self
            .inputs
            .iter()
            .filter(|name| !skipped.contains(*name))
            .cloned()
            .collect();

        Ok(LoweredModel {
            dialect: self.options.dialect,
            layers: self.layers,
            operations: self.operations,
            inputs,
            outputs: self.outputs.into_iter().collect(),
            skipped_initializers: self.initializers_to_skip,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn expect_dialect(&self, dialect: TargetDialect, unit: &str) -> LoweringResult<()> {
        if self.dialect() == dialect {
            Ok(())
        } else {
            Err(LoweringError::Internal(format!(
                "{} unit {} emitted into a {} session",
                dialect,
                unit,
                self.dialect()
            )))
        }
    }

    fn define_outputs<'a>(&mut self, outputs: impl Iterator<Item = &'a String>) {
        for output in outputs.filter(|o| !o.is_empty()) {
            self.taken_names.insert(output.clone());
            self.defined.insert(output.clone());
        }
    }

    /// Make `value` referenceable by `unit`, materializing initializers on first use
    fn resolve(&mut self, unit: &str, value: &str) -> LoweringResult<()> {
        if self.defined.contains(value) {
            return Ok(());
        }
        if self.available_inputs.contains(value) && !self.graph.is_initializer(value) {
            self.inputs.insert(value.to_string());
            return Ok(());
        }

        let dangling = || LoweringError::DanglingReference {
            unit: unit.to_string(),
            value: value.to_string(),
        };
        // Folded initializers have no standalone value in the target
        if self.initializers_to_skip.contains(value) {
            return Err(dangling());
        }
        let graph = self.graph;
        let tensor = graph.initializer(value).ok_or_else(dangling)?;

        debug!("materializing initializer {} for {}", value, unit);
        let data = ConstantData::from_tensor(tensor)?;
        self.emit_constant(value, &data, &tensor.dims)
    }

    fn emit_constant(
        &mut self,
        value: &str,
        data: &ConstantData,
        shape: &[i64],
    ) -> LoweringResult<()> {
        match self.dialect() {
            TargetDialect::Layers => {
                let name = self.unique_name(&format!("{}_load", value));
                let dims = shape
                    .iter()
                    .map(|&d| u64::try_from(d))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| LoweringError::ShapeUnavailable(value.to_string()))?;
                let data = match data {
                    ConstantData::Float16(h) => WeightParams {
                        float16_value: f16_to_le_bytes(h),
                        ..Default::default()
                    },
                    other => WeightParams {
                        float_value: other.to_f32_vec(),
                        ..Default::default()
                    },
                };
                self.layers.push(NeuralNetworkLayer {
                    name,
                    input: Vec::new(),
                    output: vec![value.to_string()],
                    layer: Some(Layer::LoadConstantNd(LoadConstantNdLayerParams {
                        // Rank-0 constants load as a single-element vector
                        shape: if dims.is_empty() { vec![1] } else { dims },
                        data: Some(data),
                    })),
                });
            }
            TargetDialect::Program => {
                let value_type = ValueType {
                    data_type: data.dtype() as i32,
                    shape: shape.to_vec(),
                };
                let mut op = Operation {
                    r#type: CONST_OP.to_string(),
                    name: value.to_string(),
                    ..Default::default()
                };
                op.attributes.insert(
                    CONST_VALUE_ATTR.to_string(),
                    Value {
                        r#type: Some(value_type.clone()),
                        immediate: Some(data.to_tensor_value()),
                    },
                );
                op.outputs.push(NamedValueType {
                    name: value.to_string(),
                    r#type: Some(value_type),
                });
                self.operations.push(op);
            }
        }
        self.taken_names.insert(value.to_string());
        self.defined.insert(value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphContext;
    use crate::proto::extensions::{make_node, make_tensor_value_info};
    use crate::proto::GraphProto;
    use crate::tensor::vec_to_tensor_f32;

    fn make_graph() -> GraphContext {
        GraphContext::new(&GraphProto {
            node: vec![make_node("Add", &["X", "W"], &["Y"], "add_0")],
            input: vec![make_tensor_value_info("X", 1, &[1, 2])],
            output: vec![make_tensor_value_info("Y", 1, &[1, 2])],
            initializer: vec![vec_to_tensor_f32(&[0.5, 1.5], "W")],
            ..Default::default()
        })
    }

    fn layer_with(name: &str, inputs: &[&str], outputs: &[&str]) -> NeuralNetworkLayer {
        NeuralNetworkLayer {
            name: name.to_string(),
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: outputs.iter().map(|s| s.to_string()).collect(),
            layer: None,
        }
    }

    #[test]
    fn test_unique_name_avoids_graph_values() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());

        assert_eq!(builder.unique_name("W"), "W_1");
        assert_eq!(builder.unique_name("W"), "W_2");
        assert_eq!(builder.unique_name("fresh"), "fresh");
        assert_eq!(builder.unique_name("fresh"), "fresh_1");
    }

    #[test]
    fn test_layer_materializes_initializer_lazily() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());

        builder
            .add_layer(layer_with("add_0", &["X", "W"], &["Y"]))
            .unwrap();
        builder.add_model_output("Y");
        let model = builder.finish().unwrap();

        assert_eq!(model.layers.len(), 2);
        assert!(matches!(
            model.layers[0].layer,
            Some(Layer::LoadConstantNd(ref p)) if p.shape == vec![2]
        ));
        assert_eq!(model.layers[0].output, vec!["W"]);
        assert_eq!(model.inputs, vec!["X"]);
        assert_eq!(model.outputs, vec!["Y"]);
    }

    #[test]
    fn test_skipped_initializer_reference_is_dangling() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());
        builder.add_initializer_to_skip("W");

        let err = builder
            .add_layer(layer_with("add_0", &["X", "W"], &["Y"]))
            .unwrap_err();
        assert!(matches!(err, LoweringError::DanglingReference { ref value, .. } if value == "W"));
    }

    #[test]
    fn test_skip_waits_for_every_reader() {
        let ctx = GraphContext::new(&GraphProto {
            node: vec![
                make_node("Add", &["X", "W"], &["Y"], "add_0"),
                make_node("Mul", &["Y", "W"], &["Z"], "mul_0"),
            ],
            input: vec![make_tensor_value_info("X", 1, &[1, 2])],
            initializer: vec![vec_to_tensor_f32(&[0.5, 1.5], "W")],
            ..Default::default()
        });
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());

        // add_0 folds W, mul_0 still reads it
        builder.add_initializer_to_skip("W");
        assert!(!builder.is_initializer_skipped("W"));
        builder
            .add_layer(layer_with("add_0", &["X"], &["Y"]))
            .unwrap();
        builder
            .add_layer(layer_with("mul_0", &["Y", "W"], &["Z"]))
            .unwrap();

        // Releasing the last use of a materialized initializer keeps it
        builder.add_initializer_to_skip("W");
        assert!(!builder.is_initializer_skipped("W"));

        let model = builder.finish().unwrap();
        assert_eq!(model.layers.len(), 3);
        assert_eq!(model.layers[1].output, vec!["W"]);
        assert!(model.skipped_initializers.is_empty());
    }

    #[test]
    fn test_last_release_skips_initializer() {
        let ctx = GraphContext::new(&GraphProto {
            node: vec![make_node("Mul", &["W", "W"], &["Y"], "mul_0")],
            initializer: vec![vec_to_tensor_f32(&[2.0], "W")],
            ..Default::default()
        });
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());

        builder.add_initializer_to_skip("W");
        assert!(!builder.is_initializer_skipped("W"));
        builder.add_initializer_to_skip("W");
        assert!(builder.is_initializer_skipped("W"));
    }

    #[test]
    fn test_unknown_reference_is_dangling() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());

        let mut op = Operation {
            r#type: "relu".to_string(),
            name: "relu_0".to_string(),
            ..Default::default()
        };
        ModelBuilder::add_input(&mut op, "x", "nowhere");
        assert!(matches!(
            builder.add_operation(op),
            Err(LoweringError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_boundary_input_becomes_plain_input() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());

        builder.add_boundary_input("Y");
        builder
            .add_layer(layer_with("relu", &["Y"], &["Z"]))
            .unwrap();
        let model = builder.finish().unwrap();
        assert_eq!(model.inputs, vec!["Y"]);
    }

    #[test]
    fn test_program_constants_and_scalars() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());

        let tensor = builder.get_initializer("W").unwrap();
        let w = builder.add_constant("Add", "w", tensor).unwrap();
        let eps = builder
            .add_scalar_constant("Add", "eps", ConstantData::Float32(vec![1e-5]))
            .unwrap();
        assert_eq!(w, "Add_w");
        assert_eq!(eps, "Add_eps");

        let model = builder.finish().unwrap();
        assert_eq!(model.operations.len(), 2);
        let scalar = &model.operations[1];
        assert_eq!(scalar.r#type, CONST_OP);
        let ty = scalar.outputs[0].r#type.as_ref().unwrap();
        assert!(ty.shape.is_empty());
        assert_eq!(ty.data_type, TargetDataType::Float32 as i32);
    }

    #[test]
    fn test_scalar_constant_rejects_vectors() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());
        assert!(builder
            .add_scalar_constant("Add", "eps", ConstantData::Float32(vec![1.0, 2.0]))
            .is_err());
    }

    #[test]
    fn test_wrong_dialect_unit_is_rejected() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());
        assert!(builder.add_layer(layer_with("l", &["X"], &["Z"])).is_err());
    }

    #[test]
    fn test_missing_initializer_at_emission() {
        let ctx = make_graph();
        let builder = ModelBuilder::new(&ctx, LoweringOptions::layers());
        assert!(matches!(
            builder.get_initializer("gone"),
            Err(LoweringError::InitializerNotFound(_))
        ));
    }

    #[test]
    fn test_undefined_model_output_fails_finish() {
        let ctx = make_graph();
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::layers());
        builder.add_model_output("Y");
        assert!(builder.finish().is_err());
    }
}
