//! Environment-scoped exclusions
//!
//! Narrow, versioned gates for operator configurations known to misbehave on
//! one deployment target. Each entry is data so the list can be inspected and
//! tested without building for the affected platform.

use std::fmt;

use crate::config::{TargetArch, TargetEnvironment, TargetOs};
use crate::error::{Support, Unsupported};
use crate::graph::GraphQuery;
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::NodeProto;

/// Condition over the environment and the node being checked
pub type ExclusionPredicate = fn(&TargetEnvironment, &NodeProto, &dyn GraphQuery) -> bool;

/// One row of the exclusion table
#[derive(Clone, Copy)]
pub struct PlatformExclusion {
    /// Operator kind the row applies to
    pub op_type: &'static str,
    /// Diagnostic reported when the row matches
    pub reason: &'static str,
    /// Whether the row matches
    pub applies: ExclusionPredicate,
}

impl fmt::Debug for PlatformExclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformExclusion")
            .field("op_type", &self.op_type)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Built-in exclusions
pub static PLATFORM_EXCLUSIONS: &[PlatformExclusion] = &[PlatformExclusion {
    op_type: "BatchNormalization",
    reason: "float16 batch normalization is incorrect on iOS x86_64 before runtime version 7",
    applies: fp16_on_ios_x86_64_before_v7,
}];

fn fp16_on_ios_x86_64_before_v7(
    env: &TargetEnvironment,
    node: &NodeProto,
    graph: &dyn GraphQuery,
) -> bool {
    env.os == TargetOs::Ios
        && env.arch == TargetArch::X86_64
        && env.runtime_version < 7
        && node
            .input_at(0)
            .and_then(|input| graph.elem_type(input))
            .is_some_and(|dtype| dtype == DataType::Float16)
}

/// Check `node` against the built-in table
pub fn check_exclusions(
    node: &NodeProto,
    graph: &dyn GraphQuery,
    env: &TargetEnvironment,
) -> Support {
    check_exclusions_in(PLATFORM_EXCLUSIONS, node, graph, env)
}

/// Check `node` against an explicit table
pub fn check_exclusions_in(
    table: &[PlatformExclusion],
    node: &NodeProto,
    graph: &dyn GraphQuery,
    env: &TargetEnvironment,
) -> Support {
    match table
        .iter()
        .find(|row| row.op_type == node.op_type && (row.applies)(env, node, graph))
    {
        Some(row) => Err(Unsupported::PlatformExcluded {
            op_type: node.op_type.clone(),
            reason: row.reason,
        }),
        None => Ok(()),
    }
}
