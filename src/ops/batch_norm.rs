//! BatchNormalization lowering
//!
//! Inference-mode batch normalization over NCHW inputs with constant
//! statistics. The four parameter tensors are folded into the emitted unit,
//! so they are registered as skipped initializers.
//!
//! Only rank-4 inputs are accepted. Rank-3 inputs could be lowered by
//! reshaping to rank 4 first; that promotion is not implemented.

use half::f16;

use crate::builder::{ConstantData, ModelBuilder};
use crate::error::{LoweringError, LoweringResult, Support};
use crate::graph::GraphQuery;
use crate::proto::target::{
    neural_network_layer::Layer, BatchNormLayerParams, DataType as TargetDataType,
};
use crate::proto::NodeProto;
use crate::support::{
    check_int_attribute, check_output_count, check_rank, input_name, input_shape,
    require_initializers,
};
use crate::traits::OpLowering;

use super::{required_input, required_output, value_type};

/// Epsilon used when the node carries none
pub const DEFAULT_EPSILON: f32 = 1e-5;

/// Program dialect op type
pub const BATCH_NORM_OP: &str = "batch_norm";

/// Parameter inputs, by position
const PARAMS: [(usize, &str); 4] = [(1, "scale"), (2, "B"), (3, "mean"), (4, "var")];

/// Lowering for `BatchNormalization`
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchNormLowering;

impl OpLowering for BatchNormLowering {
    fn name(&self) -> &'static str {
        "BatchNormalization"
    }

    // Opset 6 and older carry a non-spatial mode with different semantics
    fn min_opset(&self) -> i64 {
        7
    }

    fn supports_program(&self) -> bool {
        true
    }

    fn add_initializers_to_skip(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) {
        for (index, _) in PARAMS {
            if let Some(name) = node.input_at(index) {
                builder.add_initializer_to_skip(name);
            }
        }
    }

    fn check_node(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
        // Training-mode exports also produce the running statistics
        check_output_count(node, 1)?;

        let input = input_name(node, 0)?;
        let shape = input_shape(graph, input)?;
        check_rank(node, input, &shape, 4)?;

        check_int_attribute(node, "spatial", 1, &[1])?;
        require_initializers(node, graph, &PARAMS)
    }

    fn emit_layer(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
        let x = required_input(node, 0)?;
        let y = required_output(node, 0)?;

        let scale = builder.get_initializer(required_input(node, 1)?)?;
        let bias = builder.get_initializer(required_input(node, 2)?)?;
        let mean = builder.get_initializer(required_input(node, 3)?)?;
        let var = builder.get_initializer(required_input(node, 4)?)?;

        let channels = scale
            .dims
            .first()
            .and_then(|&d| u64::try_from(d).ok())
            .ok_or_else(|| {
                LoweringError::InvalidNode(format!(
                    "{}: scale {} has no channel dimension",
                    node.display_name(),
                    scale.name
                ))
            })?;

        let params = BatchNormLayerParams {
            channels,
            compute_mean_var: false,
            instance_normalization: false,
            epsilon: node.get_attribute_float("epsilon", DEFAULT_EPSILON),
            gamma: Some(builder.weight_from_tensor(scale)?),
            beta: Some(builder.weight_from_tensor(bias)?),
            mean: Some(builder.weight_from_tensor(mean)?),
            variance: Some(builder.weight_from_tensor(var)?),
        };

        let mut layer = builder.create_layer(node);
        layer.layer = Some(Layer::BatchNorm(params));
        layer.input.push(x.to_string());
        layer.output.push(y.to_string());
        builder.add_layer(layer)
    }

    fn emit_program(
        &self,
        node: &NodeProto,
        builder: &mut ModelBuilder<'_>,
    ) -> LoweringResult<()> {
        let x = required_input(node, 0)?;
        let y = required_output(node, 0)?;
        let (dtype, shape) = value_type(builder, x)?;
        let epsilon = node.get_attribute_float("epsilon", DEFAULT_EPSILON);

        let mut op = builder.create_operation(node, BATCH_NORM_OP);
        ModelBuilder::add_input(&mut op, "x", x);

        for (index, param) in [(3, "mean"), (4, "variance"), (1, "gamma"), (2, "beta")] {
            let tensor = builder.get_initializer(required_input(node, index)?)?;
            let value = builder.add_constant(BATCH_NORM_OP, param, tensor)?;
            ModelBuilder::add_input(&mut op, param, &value);
        }

        // Epsilon takes the activation's precision
        let epsilon = if dtype == TargetDataType::Float16 {
            ConstantData::Float16(vec![f16::from_f32(epsilon)])
        } else {
            ConstantData::Float32(vec![epsilon])
        };
        let epsilon = builder.add_scalar_constant(BATCH_NORM_OP, "epsilon", epsilon)?;
        ModelBuilder::add_input(&mut op, "epsilon", &epsilon);

        ModelBuilder::add_output(&mut op, y, dtype, &shape);
        builder.add_operation(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{LoweredModel, CONST_VALUE_ATTR};
    use crate::config::{LoweringOptions, TargetArch, TargetEnvironment, TargetOs};
    use crate::error::Unsupported;
    use crate::graph::GraphContext;
    use crate::ops::test_utils::{bn_ctx, bn_graph, BIAS, MEAN, SCALE, VAR};
    use crate::proto::extensions::{make_tensor_value_info, make_unshaped_value_info};
    use crate::proto::onnx::tensor_proto::DataType;
    use crate::proto::target::{binding, Operation};
    use crate::proto::{AttributeProto, GraphProto};

    fn check(ctx: &GraphContext, options: &LoweringOptions) -> Support {
        BatchNormLowering.is_supported(&ctx.nodes()[0], ctx, options)
    }

    fn lower(ctx: &GraphContext, options: LoweringOptions) -> LoweringResult<LoweredModel> {
        let node = &ctx.nodes()[0];
        let mut builder = ModelBuilder::new(ctx, options);
        BatchNormLowering.add_initializers_to_skip(node, &mut builder);
        BatchNormLowering.lower(node, &mut builder)?;
        builder.add_model_output("Y");
        builder.finish()
    }

    /// Immediate behind the value bound to `param`
    fn bound_const<'a>(model: &'a LoweredModel, op: &Operation, param: &str) -> &'a Operation {
        let binding = &op.inputs[param].arguments[0];
        let Some(binding::Kind::Name(value)) = &binding.kind else {
            panic!("{} is not bound by name", param);
        };
        model.producer_of(value).unwrap()
    }

    fn const_floats(op: &Operation) -> Vec<f32> {
        let immediate = op.attributes[CONST_VALUE_ATTR].immediate.as_ref().unwrap();
        if immediate.bytes.is_empty() {
            immediate.floats.clone()
        } else {
            immediate
                .bytes
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect()
        }
    }

    // ========================================================================
    // Support predicate
    // ========================================================================

    #[test]
    fn test_supported_rank4_with_constant_params() {
        let ctx = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        assert!(check(&ctx, &LoweringOptions::layers()).is_ok());
        assert!(check(&ctx, &LoweringOptions::program()).is_ok());
    }

    #[test]
    fn test_explicit_spatial_one_is_supported() {
        let mut graph = bn_graph(DataType::Float, &[1, 3, 8, 8], None);
        graph.node[0]
            .attribute
            .push(AttributeProto::new_int("spatial", 1));
        assert!(check(&GraphContext::new(&graph), &LoweringOptions::layers()).is_ok());
    }

    #[test]
    fn test_non_spatial_rejected() {
        let mut graph = bn_graph(DataType::Float, &[1, 3, 8, 8], None);
        graph.node[0]
            .attribute
            .push(AttributeProto::new_int("spatial", 0));
        assert!(matches!(
            check(&GraphContext::new(&graph), &LoweringOptions::layers()),
            Err(Unsupported::UnsupportedAttribute { .. })
        ));
    }

    #[test]
    fn test_training_outputs_rejected() {
        let mut graph = bn_graph(DataType::Float, &[1, 3, 8, 8], None);
        graph.node[0]
            .output
            .extend(["running_mean".to_string(), "running_var".to_string()]);
        let err = check(&GraphContext::new(&graph), &LoweringOptions::layers()).unwrap_err();
        assert!(matches!(err, Unsupported::OutputCount { expected: 1, actual: 3, .. }));
        assert!(err.to_string().contains("inference mode"));
    }

    #[test]
    fn test_rank_other_than_4_rejected() {
        for shape in [&[1, 3, 8][..], &[1, 3, 2, 8, 8][..], &[3][..]] {
            let ctx = bn_ctx(DataType::Float, shape);
            assert!(
                matches!(
                    check(&ctx, &LoweringOptions::layers()),
                    Err(Unsupported::UnsupportedRank { expected: 4, .. })
                ),
                "rank {} accepted",
                shape.len()
            );
        }
    }

    #[test]
    fn test_unknown_shape_rejected() {
        let mut graph = bn_graph(DataType::Float, &[1, 3, 8, 8], None);
        graph.input[0] = make_unshaped_value_info("X", 1);
        assert!(matches!(
            check(&GraphContext::new(&graph), &LoweringOptions::layers()),
            Err(Unsupported::UnknownShape { .. })
        ));
    }

    #[test]
    fn test_non_constant_param_rejected() {
        let mut graph = bn_graph(DataType::Float, &[1, 3, 8, 8], None);
        graph.initializer.retain(|t| t.name != "mean");
        graph.input.push(make_tensor_value_info("mean", 1, &[3]));

        let err = check(&GraphContext::new(&graph), &LoweringOptions::layers()).unwrap_err();
        assert_eq!(
            err,
            Unsupported::NonConstantInput {
                op_type: "BatchNormalization".to_string(),
                role: "mean",
                input: "mean".to_string(),
            }
        );
    }

    #[test]
    fn test_old_opset_rejected() {
        let ctx = GraphContext::new(&bn_graph(DataType::Float, &[1, 3, 8, 8], None))
            .with_default_opset(6);
        assert!(matches!(
            check(&ctx, &LoweringOptions::layers()),
            Err(Unsupported::OpsetTooOld { min: 7, .. })
        ));
    }

    #[test]
    fn test_fp16_only_in_program_dialect() {
        let ctx = bn_ctx(DataType::Float16, &[1, 3, 8, 8]);
        assert!(matches!(
            check(&ctx, &LoweringOptions::layers()),
            Err(Unsupported::UnsupportedInputType { .. })
        ));
        assert!(check(&ctx, &LoweringOptions::program()).is_ok());
    }

    #[test]
    fn test_fp16_excluded_on_old_ios_simulator() {
        let ios_x86 = |runtime_version| TargetEnvironment {
            os: TargetOs::Ios,
            arch: TargetArch::X86_64,
            runtime_version,
        };
        let fp16 = bn_ctx(DataType::Float16, &[1, 3, 8, 8]);
        let fp32 = bn_ctx(DataType::Float, &[1, 3, 8, 8]);

        let old = LoweringOptions::program().with_environment(ios_x86(6));
        let err = check(&fp16, &old).unwrap_err();
        assert!(matches!(
            err,
            Unsupported::PlatformExcluded { ref op_type, .. } if op_type == "BatchNormalization"
        ));
        assert!(check(&fp32, &old).is_ok());

        let current = LoweringOptions::program().with_environment(ios_x86(7));
        assert!(check(&fp16, &current).is_ok());
    }

    #[test]
    fn test_predicate_is_idempotent() {
        let good = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        let bad = bn_ctx(DataType::Float, &[1, 3, 8]);
        let options = LoweringOptions::layers();

        assert_eq!(check(&good, &options), check(&good, &options));
        assert_eq!(check(&bad, &options), check(&bad, &options));
    }

    // ========================================================================
    // Emission
    // ========================================================================

    #[test]
    fn test_layer_emission() {
        let ctx = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        let model = lower(&ctx, LoweringOptions::layers()).unwrap();

        assert_eq!(model.layers.len(), 1);
        let layer = &model.layers[0];
        assert_eq!(layer.name, "bn_0");
        assert_eq!(layer.input, vec!["X"]);
        assert_eq!(layer.output, vec!["Y"]);

        let Some(Layer::BatchNorm(params)) = &layer.layer else {
            panic!("expected a batch norm layer");
        };
        assert_eq!(params.channels, 3);
        assert_eq!(params.epsilon, 1e-3);
        assert!(!params.compute_mean_var);
        assert!(!params.instance_normalization);
        assert_eq!(params.gamma.as_ref().unwrap().float_value, SCALE);
        assert_eq!(params.variance.as_ref().unwrap().float_value, VAR);
    }

    #[test]
    fn test_default_epsilon() {
        let ctx = GraphContext::new(&bn_graph(DataType::Float, &[1, 3, 8, 8], None));
        let model = lower(&ctx, LoweringOptions::layers()).unwrap();
        let Some(Layer::BatchNorm(params)) = &model.layers[0].layer else {
            panic!("expected a batch norm layer");
        };
        assert_eq!(params.epsilon, DEFAULT_EPSILON);
    }

    #[test]
    fn test_program_emission() {
        let ctx = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        let model = lower(&ctx, LoweringOptions::program()).unwrap();

        let ops: Vec<_> = model.operations_of_type(BATCH_NORM_OP).collect();
        assert_eq!(ops.len(), 1);
        let op = ops[0];
        assert_eq!(op.inputs.len(), 6);
        assert_eq!(op.outputs[0].name, "Y");
        assert_eq!(
            op.outputs[0].r#type.as_ref().unwrap().shape,
            vec![1, 3, 8, 8]
        );

        // Each parameter is its own const, emitted before the op
        assert_eq!(model.operations.len(), 6);
        assert_eq!(model.operations.last().unwrap().r#type, BATCH_NORM_OP);
        assert_eq!(const_floats(bound_const(&model, op, "beta")), BIAS);
    }

    #[test]
    fn test_dialects_bind_identical_values() {
        let ctx = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        let layers = lower(&ctx, LoweringOptions::layers()).unwrap();
        let program = lower(&ctx, LoweringOptions::program()).unwrap();

        let Some(Layer::BatchNorm(params)) = &layers.layers[0].layer else {
            panic!("expected a batch norm layer");
        };
        let op = program.operations_of_type(BATCH_NORM_OP).next().unwrap();

        let pairs = [
            ("gamma", &params.gamma),
            ("beta", &params.beta),
            ("mean", &params.mean),
            ("variance", &params.variance),
        ];
        for (param, weight) in pairs {
            assert_eq!(
                const_floats(bound_const(&program, op, param)),
                weight.as_ref().unwrap().float_value,
                "{} differs between dialects",
                param
            );
        }
        assert_eq!(
            const_floats(bound_const(&program, op, "epsilon")),
            vec![params.epsilon]
        );
        assert_eq!(const_floats(bound_const(&program, op, "mean")), MEAN);
    }

    #[test]
    fn test_epsilon_matches_input_precision() {
        for (elem_type, expected) in [
            (DataType::Float, TargetDataType::Float32),
            (DataType::Float16, TargetDataType::Float16),
        ] {
            let ctx = bn_ctx(elem_type, &[1, 3, 8, 8]);
            let model = lower(&ctx, LoweringOptions::program()).unwrap();
            let op = model.operations_of_type(BATCH_NORM_OP).next().unwrap();

            let epsilon = bound_const(&model, op, "epsilon");
            let ty = epsilon.outputs[0].r#type.as_ref().unwrap();
            assert_eq!(ty.data_type, expected as i32);
            assert!(ty.shape.is_empty());
            assert!((const_floats(epsilon)[0] - 1e-3).abs() < 1e-5);
        }
    }

    #[test]
    fn test_params_skipped_and_not_plain_inputs() {
        let ctx = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        for options in [LoweringOptions::layers(), LoweringOptions::program()] {
            let model = lower(&ctx, options).unwrap();
            for name in ["scale", "B", "mean", "var"] {
                assert!(model.is_initializer_skipped(name));
                assert!(!model.inputs.iter().any(|i| i == name));
            }
            assert_eq!(model.inputs, vec!["X"]);
        }
    }

    #[test]
    fn test_missing_initializer_at_emission_is_fatal() {
        // Certified against the full graph, emitted against one without params
        let full = bn_ctx(DataType::Float, &[1, 3, 8, 8]);
        assert!(check(&full, &LoweringOptions::layers()).is_ok());

        let stripped = GraphContext::new(&GraphProto {
            initializer: Vec::new(),
            ..bn_graph(DataType::Float, &[1, 3, 8, 8], None)
        });
        for options in [LoweringOptions::layers(), LoweringOptions::program()] {
            assert!(matches!(
                lower(&stripped, options),
                Err(LoweringError::InitializerNotFound(_))
            ));
        }
    }
}
