//! Unary activation lowering

use crate::builder::ModelBuilder;
use crate::error::{LoweringResult, Support};
use crate::graph::GraphQuery;
use crate::proto::target::{
    activation_params::NonlinearityType, neural_network_layer::Layer, ActivationParams,
    ActivationReLu, ActivationSigmoid, ActivationTanh,
};
use crate::proto::NodeProto;
use crate::support::{check_output_count, input_name, input_shape};
use crate::traits::OpLowering;

use super::{required_input, required_output, value_type};

/// Elementwise activation kinds sharing one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// `max(x, 0)`
    Relu,
    /// `1 / (1 + exp(-x))`
    Sigmoid,
    /// `tanh(x)`
    Tanh,
}

impl Activation {
    /// All kinds, in registration order
    pub const ALL: [Activation; 3] = [Activation::Relu, Activation::Sigmoid, Activation::Tanh];

    /// ONNX operator kind
    pub fn op_type(self) -> &'static str {
        match self {
            Activation::Relu => "Relu",
            Activation::Sigmoid => "Sigmoid",
            Activation::Tanh => "Tanh",
        }
    }

    /// Program dialect op type
    pub fn program_op(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        }
    }

    fn nonlinearity(self) -> NonlinearityType {
        match self {
            Activation::Relu => NonlinearityType::ReLu(ActivationReLu {}),
            Activation::Sigmoid => NonlinearityType::Sigmoid(ActivationSigmoid {}),
            Activation::Tanh => NonlinearityType::Tanh(ActivationTanh {}),
        }
    }
}

/// Lowering for one [`Activation`] kind
#[derive(Debug, Clone, Copy)]
pub struct ActivationLowering {
    kind: Activation,
}

impl ActivationLowering {
    /// Strategy for `kind`
    pub fn new(kind: Activation) -> Self {
        Self { kind }
    }

    /// Activation this strategy emits
    pub fn kind(&self) -> Activation {
        self.kind
    }
}

impl OpLowering for ActivationLowering {
    fn name(&self) -> &'static str {
        self.kind.op_type()
    }

    fn min_opset(&self) -> i64 {
        6
    }

    fn supports_program(&self) -> bool {
        true
    }

    fn check_node(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
        check_output_count(node, 1)?;
        input_shape(graph, input_name(node, 0)?).map(|_| ())
    }

    fn emit_layer(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
        let mut layer = builder.create_layer(node);
        layer.layer = Some(Layer::Activation(ActivationParams {
            nonlinearity_type: Some(self.kind.nonlinearity()),
        }));
        layer.input.push(required_input(node, 0)?.to_string());
        layer.output.push(required_output(node, 0)?.to_string());
        builder.add_layer(layer)
    }

    fn emit_program(
        &self,
        node: &NodeProto,
        builder: &mut ModelBuilder<'_>,
    ) -> LoweringResult<()> {
        let x = required_input(node, 0)?;
        let (dtype, shape) = value_type(builder, x)?;

        let mut op = builder.create_operation(node, self.kind.program_op());
        ModelBuilder::add_input(&mut op, "x", x);
        ModelBuilder::add_output(&mut op, required_output(node, 0)?, dtype, &shape);
        builder.add_operation(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringOptions;
    use crate::error::Unsupported;
    use crate::graph::GraphContext;
    use crate::proto::extensions::{make_node, make_tensor_value_info, make_unshaped_value_info};
    use crate::proto::GraphProto;

    fn unary_ctx(op_type: &str) -> GraphContext {
        GraphContext::new(&GraphProto {
            node: vec![make_node(op_type, &["X"], &["Y"], "act_0")],
            input: vec![make_tensor_value_info("X", 1, &[1, 16])],
            output: vec![make_unshaped_value_info("Y", 1)],
            ..Default::default()
        })
    }

    #[test]
    fn test_every_kind_lowers_to_layers() {
        for kind in Activation::ALL {
            let ctx = unary_ctx(kind.op_type());
            let node = &ctx.nodes()[0];
            let strategy = ActivationLowering::new(kind);
            let options = LoweringOptions::layers();

            assert!(strategy.is_supported(node, &ctx, &options).is_ok());
            let mut builder = ModelBuilder::new(&ctx, options);
            strategy.lower(node, &mut builder).unwrap();
            let model = builder.finish().unwrap();

            let Some(Layer::Activation(params)) = &model.layers[0].layer else {
                panic!("expected an activation layer");
            };
            assert_eq!(params.nonlinearity_type, Some(kind.nonlinearity()));
        }
    }

    #[test]
    fn test_program_op_takes_input_type() {
        let ctx = unary_ctx("Sigmoid");
        let node = &ctx.nodes()[0];
        let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());
        ActivationLowering::new(Activation::Sigmoid)
            .lower(node, &mut builder)
            .unwrap();
        let model = builder.finish().unwrap();

        let op = &model.operations[0];
        assert_eq!(op.r#type, "sigmoid");
        assert_eq!(op.outputs[0].name, "Y");
        assert_eq!(op.outputs[0].r#type.as_ref().unwrap().shape, vec![1, 16]);
    }

    #[test]
    fn test_two_outputs_rejected() {
        let mut ctx_graph = GraphProto {
            node: vec![make_node("Relu", &["X"], &["Y", "Z"], "relu")],
            input: vec![make_tensor_value_info("X", 1, &[4])],
            ..Default::default()
        };
        let ctx = GraphContext::new(&ctx_graph);
        let strategy = ActivationLowering::new(Activation::Relu);
        assert!(matches!(
            strategy.is_supported(&ctx.nodes()[0], &ctx, &LoweringOptions::layers()),
            Err(Unsupported::OutputCount { actual: 2, .. })
        ));

        ctx_graph.node[0].output.pop();
        let ctx = GraphContext::new(&ctx_graph).with_default_opset(5);
        assert!(matches!(
            strategy.is_supported(&ctx.nodes()[0], &ctx, &LoweringOptions::layers()),
            Err(Unsupported::OpsetTooOld { .. })
        ));
    }
}
