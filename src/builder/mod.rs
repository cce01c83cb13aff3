//! Target IR emission
//!
//! - [`ModelBuilder`]: the per-session emission context strategies write into
//! - [`LoweredModel`]: the finalized, read-only result
//! - [`weights`]: weight blob and constant payload conversion
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::builder::ModelBuilder;
//! use onnx_lowering::config::LoweringOptions;
//!
//! let mut builder = ModelBuilder::new(&ctx, LoweringOptions::program());
//! let mut op = builder.create_operation(node, "relu");
//! ModelBuilder::add_input(&mut op, "x", &node.input[0]);
//! ModelBuilder::add_output(&mut op, &node.output[0], dtype, &shape);
//! builder.add_operation(op)?;
//!
//! let lowered = builder.finish()?;
//! ```
//!
//! # Constants
//!
//! Initializers referenced by name are materialized on first use: a
//! `LoadConstantNd` layer or a `const` operation carrying the initializer's
//! own name. Initializers registered with
//! [`ModelBuilder::add_initializer_to_skip`] are folded into a unit's
//! parameters instead and never become standalone values.

pub mod lowered;
pub mod model;
pub mod weights;

// Re-export main types and functions
pub use lowered::LoweredModel;
pub use model::{ModelBuilder, CONST_OP, CONST_VALUE_ATTR};
pub use weights::{create_weight, ConstantData};
