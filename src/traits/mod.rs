//! Core traits for onnx-lowering
//!
//! Defines the per-operator lowering contract.

use log::debug;

use crate::builder::ModelBuilder;
use crate::config::{LoweringOptions, TargetDialect};
use crate::error::{LoweringError, LoweringResult, Support, Unsupported};
use crate::graph::GraphQuery;
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::NodeProto;
use crate::support::{check_exclusions, check_input_type};

/// Lowering strategy for one operator kind
///
/// A strategy is stateless: a support predicate deciding whether a node can
/// run on the active target, and one emission procedure per dialect. Every
/// capability has a default that reports the node as unsupported, so a
/// strategy only overrides what it implements.
///
/// # Example
///
/// ```ignore
/// struct ReluLowering;
///
/// impl OpLowering for ReluLowering {
///     fn name(&self) -> &'static str {
///         "Relu"
///     }
///
///     fn check_node(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
///         check_output_count(node, 1)
///     }
///
///     fn emit_layer(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
///         // ...
///     }
/// }
/// ```
pub trait OpLowering: Send + Sync {
    /// Strategy name used in diagnostics
    fn name(&self) -> &'static str;

    /// Oldest opset whose semantics this strategy implements
    fn min_opset(&self) -> i64 {
        1
    }

    /// Newest opset whose semantics this strategy implements
    fn max_opset(&self) -> i64 {
        i64::MAX
    }

    /// Whether `emit_layer` is implemented
    fn supports_layers(&self) -> bool {
        true
    }

    /// Whether `emit_program` is implemented
    fn supports_program(&self) -> bool {
        false
    }

    /// Register constant inputs folded into the emitted parameters
    fn add_initializers_to_skip(&self, _node: &NodeProto, _builder: &mut ModelBuilder<'_>) {}

    /// Element type gate applied before `check_node`
    ///
    /// The first input must be float32, or float16 in the program dialect.
    fn has_supported_inputs(
        &self,
        node: &NodeProto,
        graph: &dyn GraphQuery,
        options: &LoweringOptions,
    ) -> Support {
        let allowed: &[DataType] = match options.dialect {
            TargetDialect::Layers => &[DataType::Float],
            TargetDialect::Program => &[DataType::Float, DataType::Float16],
        };
        check_input_type(node, graph, 0, allowed)
    }

    /// Operator-specific predicate
    fn check_node(&self, node: &NodeProto, _graph: &dyn GraphQuery) -> Support {
        Err(Unsupported::NotImplemented(node.op_type.clone()))
    }

    /// Full support predicate
    ///
    /// Checks dialect capability, opset range, input types, the
    /// operator-specific predicate and platform exclusions, in that order.
    /// Has no side effects besides logging.
    fn is_supported(
        &self,
        node: &NodeProto,
        graph: &dyn GraphQuery,
        options: &LoweringOptions,
    ) -> Support {
        let result = check_support(self, node, graph, options);
        if let Err(reason) = &result {
            debug!(
                "{} [{}] is not supported by {}: {}",
                node.display_name(),
                node.op_type,
                self.name(),
                reason
            );
        }
        result
    }

    /// Emit the node as layer records
    fn emit_layer(&self, node: &NodeProto, _builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
        Err(LoweringError::DialectMismatch {
            op_type: node.op_type.clone(),
            dialect: TargetDialect::Layers.name(),
        })
    }

    /// Emit the node as program operations
    fn emit_program(
        &self,
        node: &NodeProto,
        _builder: &mut ModelBuilder<'_>,
    ) -> LoweringResult<()> {
        Err(LoweringError::DialectMismatch {
            op_type: node.op_type.clone(),
            dialect: TargetDialect::Program.name(),
        })
    }

    /// Emit the node in the builder's dialect
    fn lower(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
        match builder.dialect() {
            TargetDialect::Layers => self.emit_layer(node, builder),
            TargetDialect::Program => self.emit_program(node, builder),
        }
    }
}

fn check_support<S: OpLowering + ?Sized>(
    strategy: &S,
    node: &NodeProto,
    graph: &dyn GraphQuery,
    options: &LoweringOptions,
) -> Support {
    let dialect_supported = match options.dialect {
        TargetDialect::Layers => strategy.supports_layers(),
        TargetDialect::Program => strategy.supports_program(),
    };
    if !dialect_supported {
        return Err(Unsupported::DialectNotSupported {
            op_type: node.op_type.clone(),
            dialect: options.dialect.name(),
        });
    }

    let version = graph.opset_version(node);
    if version < strategy.min_opset() {
        return Err(Unsupported::OpsetTooOld {
            op_type: node.op_type.clone(),
            version,
            min: strategy.min_opset(),
        });
    }
    if version > strategy.max_opset() {
        return Err(Unsupported::OpsetTooNew {
            op_type: node.op_type.clone(),
            version,
            max: strategy.max_opset(),
        });
    }

    strategy.has_supported_inputs(node, graph, options)?;
    strategy.check_node(node, graph)?;
    check_exclusions(node, graph, &options.environment)
}
