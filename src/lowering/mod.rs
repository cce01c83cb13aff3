//! Lowering sessions
//!
//! [`Lowering`] is the entry point for both collaborators of this crate:
//!
//! - the partitioner asks [`Lowering::is_supported`] or
//!   [`Lowering::partition`] which nodes the target can run;
//! - [`Lowering::lower`] runs a full session and returns the finalized
//!   [`LoweredModel`](crate::builder::LoweredModel) for serialization.
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::config::LoweringOptions;
//! use onnx_lowering::graph::GraphContext;
//! use onnx_lowering::lowering::Lowering;
//!
//! let ctx = GraphContext::from_model(&model)?;
//! let driver = Lowering::with_default_registry(LoweringOptions::program());
//!
//! for node in driver.partition(&ctx).ineligible {
//!     println!("{} stays on the host: {}", node.node, node.reason);
//! }
//!
//! let report = driver.lower(&ctx)?;
//! println!("{} units", report.model.unit_count());
//! ```

pub mod driver;

// Re-export main types
pub use driver::{IneligibleNode, Lowering, LoweringReport, SupportReport};
