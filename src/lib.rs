//! # ONNX Lowering
//!
//! Lowers ONNX graphs into the native IR of an accelerator runtime.
//!
//! Each supported operator kind has a strategy with a support predicate and
//! an emission procedure. The driver checks every node and emits the
//! eligible ones into one of two target dialects:
//!
//! - **Layers**: fixed-function layer records with embedded weight blobs
//! - **Program**: named operations whose parameters bind to graph values or
//!   materialized constants
//!
//! Nodes the target cannot run are reported with the first failing check and
//! left to the fallback device.
//!
//! ## Example
//!
//! ```ignore
//! use onnx_lowering::prelude::*;
//!
//! let ctx = GraphContext::from_model(&model)?;
//! let report = Lowering::with_default_registry(LoweringOptions::layers()).lower(&ctx)?;
//! println!("lowered {} of {} nodes", report.lowered.len(), ctx.node_count());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod lowering;
pub mod ops;
pub mod proto;
pub mod registry;
pub mod support;
pub mod tensor;
pub mod traits;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use onnx_lowering::prelude::*`
pub mod prelude {
    pub use crate::builder::{LoweredModel, ModelBuilder};
    pub use crate::config::{LoweringOptions, TargetDialect, TargetEnvironment};
    pub use crate::error::{LoweringError, LoweringResult, Support, Unsupported};
    pub use crate::graph::{GraphContext, GraphQuery, InitializerStore, ShapeQuery};
    pub use crate::lowering::{Lowering, LoweringReport, SupportReport};
    pub use crate::proto::onnx::*;
    pub use crate::registry::{default_registry, OpRegistry};
    pub use crate::traits::OpLowering;
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{LoweringError, LoweringResult, Unsupported};
pub use traits::OpLowering;

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Opset assumed for graphs without opset imports
pub const DEFAULT_OPSET_VERSION: i64 = 17;
