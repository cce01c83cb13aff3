//! Source graph access
//!
//! - [`query`]: the [`ShapeQuery`], [`InitializerStore`] and [`GraphQuery`]
//!   traits strategies read the source graph through
//! - [`GraphContext`]: indexed implementation over a `GraphProto`
//! - [`maps`]: lookup table types and builders
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::graph::{GraphContext, GraphQuery, ShapeQuery};
//!
//! let ctx = GraphContext::from_model(&model)?;
//! let rank = ctx.shape("input").map(|s| s.len());
//! let opset = ctx.opset_version(&ctx.nodes()[0]);
//! ```

pub mod context;
pub mod maps;
pub mod query;

// Re-export main types
pub use context::GraphContext;
pub use maps::{ConsumerMap, InitializerMap, OpsetMap, ValueInfoMap};
pub use query::{GraphQuery, InitializerStore, ShapeQuery};
