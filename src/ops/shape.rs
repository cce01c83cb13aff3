//! Shape lowering
//!
//! Neither dialect has a shape-query primitive. With a static input shape the
//! result is known at lowering time, so `Shape` becomes a constant vector of
//! the input's dimensions followed by a slice selecting `[start, end)`.

use crate::builder::{ConstantData, ModelBuilder};
use crate::config::{LoweringOptions, TargetDialect};
use crate::error::{LoweringError, LoweringResult, Support, Unsupported};
use crate::graph::GraphQuery;
use crate::proto::target::{neural_network_layer::Layer, SliceStaticLayerParams};
use crate::proto::NodeProto;
use crate::support::{check_output_count, check_static_shape, input_name, input_shape};
use crate::tensor::clamp_slice_bounds;
use crate::traits::OpLowering;

use super::{required_input, required_output};

/// Program dialect op slicing a vector by start and length
pub const SLICE_BY_SIZE_OP: &str = "slice_by_size";

/// Lowering for `Shape`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapeLowering;

/// Resolved slice of the shape vector
struct ShapeSlice {
    dims: Vec<i64>,
    start: i64,
    end: i64,
}

impl ShapeSlice {
    fn size(&self) -> i64 {
        self.end - self.start
    }
}

/// Largest dimension the dims constant holds exactly
fn max_exact_dim(options: &LoweringOptions) -> i64 {
    match options.dialect {
        // LoadConstantNd payloads are float32
        TargetDialect::Layers => 1_i64 << f32::MANTISSA_DIGITS,
        TargetDialect::Program if options.int64_supported => i64::MAX,
        TargetDialect::Program => i64::from(i32::MAX),
    }
}

fn resolve_slice(node: &NodeProto, builder: &ModelBuilder<'_>) -> LoweringResult<ShapeSlice> {
    let input = required_input(node, 0)?;
    let dims = builder
        .graph()
        .shape(input)
        .ok_or_else(|| LoweringError::ShapeUnavailable(input.to_string()))?;
    let rank = dims.len() as i64;

    // Attributes exist from opset 15; older nodes take the whole vector
    let start = node.get_attribute_int("start", 0);
    let end = node.get_attribute_int("end", rank);
    let (start, end) = clamp_slice_bounds(start, end, rank);
    Ok(ShapeSlice { dims, start, end })
}

impl OpLowering for ShapeLowering {
    fn name(&self) -> &'static str {
        "Shape"
    }

    fn supports_program(&self) -> bool {
        true
    }

    // Only the shape is read, so any element type works, but every
    // dimension must survive the constant's encoding
    fn has_supported_inputs(
        &self,
        node: &NodeProto,
        graph: &dyn GraphQuery,
        options: &LoweringOptions,
    ) -> Support {
        let input = input_name(node, 0)?;
        let max = max_exact_dim(options);
        let Some(shape) = graph.shape(input) else {
            return Ok(());
        };
        match shape.into_iter().find(|&dim| dim > max) {
            Some(dim) => Err(Unsupported::DimensionOutOfRange {
                op_type: node.op_type.clone(),
                input: input.to_string(),
                dim,
                max,
            }),
            None => Ok(()),
        }
    }

    fn check_node(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
        check_output_count(node, 1)?;
        let input = input_name(node, 0)?;
        let shape = input_shape(graph, input)?;
        check_static_shape(input, &shape)
    }

    fn emit_layer(&self, node: &NodeProto, builder: &mut ModelBuilder<'_>) -> LoweringResult<()> {
        let slice = resolve_slice(node, builder)?;
        let y = required_output(node, 0)?;

        let int64_supported = builder.options().int64_supported;
        let dims = builder.add_constant_data(
            &node.op_type,
            "dims",
            ConstantData::index_vector(&slice.dims, int64_supported),
            &[slice.dims.len() as i64],
        )?;

        let mut layer = builder.create_layer(node);
        layer.layer = Some(Layer::SliceStatic(SliceStaticLayerParams {
            begin_ids: vec![slice.start],
            begin_masks: vec![false],
            end_ids: vec![slice.end],
            end_masks: vec![false],
            strides: vec![1],
        }));
        layer.input.push(dims);
        layer.output.push(y.to_string());
        builder.add_layer(layer)
    }

    fn emit_program(
        &self,
        node: &NodeProto,
        builder: &mut ModelBuilder<'_>,
    ) -> LoweringResult<()> {
        let slice = resolve_slice(node, builder)?;
        let y = required_output(node, 0)?;

        let int64_supported = builder.options().int64_supported;
        let vector = ConstantData::index_vector(&slice.dims, int64_supported);
        let dtype = vector.dtype();
        let dims = builder.add_constant_data(
            &node.op_type,
            "dims",
            vector,
            &[slice.dims.len() as i64],
        )?;
        let begin = builder.add_constant_data(
            SLICE_BY_SIZE_OP,
            "begin",
            ConstantData::index_vector(&[slice.start], int64_supported),
            &[1],
        )?;
        let size = builder.add_constant_data(
            SLICE_BY_SIZE_OP,
            "size",
            ConstantData::index_vector(&[slice.size()], int64_supported),
            &[1],
        )?;

        let mut op = builder.create_operation(node, SLICE_BY_SIZE_OP);
        ModelBuilder::add_input(&mut op, "x", &dims);
        ModelBuilder::add_input(&mut op, "begin", &begin);
        ModelBuilder::add_input(&mut op, "size", &size);
        ModelBuilder::add_output(&mut op, y, dtype, &[slice.size()]);
        builder.add_operation(op)
    }
}
