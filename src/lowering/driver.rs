//! Lowering driver
//!
//! Walks the source graph in declared order and routes every node through
//! the registry: predicate first, then skip bookkeeping and emission for the
//! nodes the target can run. Ineligible nodes are reported and left to the
//! fallback device; a failed emission aborts the whole session.

use log::{debug, error, info};
use rustc_hash::FxHashSet;

use crate::builder::{LoweredModel, ModelBuilder};
use crate::config::LoweringOptions;
use crate::error::{LoweringError, LoweringResult, Support, Unsupported};
use crate::graph::GraphQuery;
use crate::proto::NodeProto;
use crate::registry::{default_registry, OpRegistry};

/// A node the active target cannot run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IneligibleNode {
    /// Node name (op type for unnamed nodes)
    pub node: String,
    /// Operator kind
    pub op_type: String,
    /// First failing check
    pub reason: Unsupported,
}

impl IneligibleNode {
    fn new(node: &NodeProto, reason: Unsupported) -> Self {
        Self {
            node: node.display_name().to_string(),
            op_type: node.op_type.clone(),
            reason,
        }
    }
}

/// Eligibility of every node, without emission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportReport {
    /// Eligible nodes in declared order
    pub supported: Vec<String>,
    /// Ineligible nodes in declared order
    pub ineligible: Vec<IneligibleNode>,
}

impl SupportReport {
    /// Check if every node is eligible
    pub fn is_fully_supported(&self) -> bool {
        self.ineligible.is_empty()
    }

    /// Total number of nodes checked
    pub fn node_count(&self) -> usize {
        self.supported.len() + self.ineligible.len()
    }
}

/// Result of a full lowering pass
#[derive(Debug, Clone)]
pub struct LoweringReport {
    /// Finalized target model
    pub model: LoweredModel,
    /// Lowered nodes in declared order
    pub lowered: Vec<String>,
    /// Nodes left to the fallback device
    pub ineligible: Vec<IneligibleNode>,
}

/// Lowering driver over a strategy registry
#[derive(Debug, Clone)]
pub struct Lowering<'r> {
    registry: &'r OpRegistry,
    options: LoweringOptions,
}

impl Lowering<'static> {
    /// Driver over the built-in strategies
    pub fn with_default_registry(options: LoweringOptions) -> Self {
        Self::new(default_registry(), options)
    }
}

impl<'r> Lowering<'r> {
    /// Create a driver
    pub fn new(registry: &'r OpRegistry, options: LoweringOptions) -> Self {
        Self { registry, options }
    }

    /// Session options
    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Strategy registry
    pub fn registry(&self) -> &'r OpRegistry {
        self.registry
    }

    /// Whether the active target can run `node`
    pub fn is_supported(&self, node: &NodeProto, graph: &dyn GraphQuery) -> Support {
        if !node.normalized_domain().is_empty() {
            return Err(Unsupported::NoLowering(format!(
                "{}.{}",
                node.domain, node.op_type
            )));
        }
        let strategy = self
            .registry
            .lookup(&node.op_type)
            .ok_or_else(|| Unsupported::NoLowering(node.op_type.clone()))?;
        strategy.is_supported(node, graph, &self.options)
    }

    /// Check every node without emitting anything
    pub fn partition(&self, graph: &dyn GraphQuery) -> SupportReport {
        let mut report = SupportReport::default();
        for node in graph.nodes() {
            match self.is_supported(node, graph) {
                Ok(()) => report.supported.push(node.display_name().to_string()),
                Err(reason) => report.ineligible.push(IneligibleNode::new(node, reason)),
            }
        }
        report
    }

    /// Emit a node already certified by [`Lowering::is_supported`]
    ///
    /// Registers the node's folded initializers, then emits it. Any failure
    /// is fatal and names the node.
    pub fn lower_node(
        &self,
        builder: &mut ModelBuilder<'_>,
        node: &NodeProto,
    ) -> LoweringResult<()> {
        let wrap = |source: LoweringError| {
            error!(
                "failed to lower {} [{}]: {}",
                node.display_name(),
                node.op_type,
                source
            );
            LoweringError::NodeLowering {
                node: node.display_name().to_string(),
                op_type: node.op_type.clone(),
                source: Box::new(source),
            }
        };

        let strategy = self.registry.lookup(&node.op_type).ok_or_else(|| {
            wrap(LoweringError::InvalidNode(format!(
                "no lowering registered for {}",
                node.op_type
            )))
        })?;
        strategy.add_initializers_to_skip(node, builder);
        strategy.lower(node, builder).map_err(wrap)
    }

    /// Lower every eligible node of `graph`
    ///
    /// Outputs of ineligible nodes become inputs of the lowered model. Values
    /// produced here and read by ineligible nodes or by the graph's consumers
    /// become its outputs.
    pub fn lower(&self, graph: &dyn GraphQuery) -> LoweringResult<LoweringReport> {
        let mut builder = ModelBuilder::new(graph, self.options.clone());
        let mut lowered: Vec<&NodeProto> = Vec::new();
        let mut fallback: Vec<&NodeProto> = Vec::new();
        let mut ineligible = Vec::new();

        for node in graph.nodes() {
            match self.is_supported(node, graph) {
                Ok(()) => {
                    self.lower_node(&mut builder, node)?;
                    lowered.push(node);
                }
                Err(reason) => {
                    for output in node.output.iter().filter(|o| !o.is_empty()) {
                        builder.add_boundary_input(output);
                    }
                    ineligible.push(IneligibleNode::new(node, reason));
                    fallback.push(node);
                }
            }
        }

        let produced: FxHashSet<&str> = lowered
            .iter()
            .flat_map(|n| n.output.iter())
            .map(String::as_str)
            .filter(|o| !o.is_empty())
            .collect();
        for output in graph.graph_outputs() {
            if produced.contains(output) {
                builder.add_model_output(output);
            }
        }
        let fallback_reads: FxHashSet<&str> = fallback
            .iter()
            .flat_map(|n| n.input.iter())
            .map(String::as_str)
            .collect();
        for output in lowered.iter().flat_map(|n| n.output.iter()) {
            if fallback_reads.contains(output.as_str()) {
                debug!("{} crosses to the fallback device", output);
                builder.add_model_output(output);
            }
        }

        let model = builder.finish()?;
        info!(
            "lowered {}/{} nodes into {} {} units",
            lowered.len(),
            graph.nodes().len(),
            model.unit_count(),
            model.dialect
        );

        Ok(LoweringReport {
            model,
            lowered: lowered
                .iter()
                .map(|n| n.display_name().to_string())
                .collect(),
            ineligible,
        })
    }
}
