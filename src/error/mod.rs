//! Error types for onnx-lowering
//!
//! Two disjoint classes live here:
//!
//! - [`Unsupported`]: a node is not eligible for the active target. Expected,
//!   reported back to the partitioner, never fatal.
//! - [`LoweringError`]: emission could not produce valid target IR. Fatal for
//!   the whole lowering session.

use thiserror::Error;

/// Reason a node cannot be lowered to the active target
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// No strategy is registered for the operator kind
    #[error("no lowering registered for op type {0}")]
    NoLowering(String),

    /// The strategy does not implement a support predicate
    #[error("{0} has no support predicate for this target")]
    NotImplemented(String),

    /// The strategy cannot emit the active dialect
    #[error("{op_type} cannot be emitted as {dialect}")]
    DialectNotSupported {
        /// Operator kind
        op_type: String,
        /// Active dialect name
        dialect: &'static str,
    },

    /// Node opset is older than the strategy supports
    #[error("{op_type} opset {version} is below the minimum supported opset {min}")]
    OpsetTooOld {
        /// Operator kind
        op_type: String,
        /// Node opset version
        version: i64,
        /// Minimum supported opset
        min: i64,
    },

    /// Node opset is newer than the strategy supports
    #[error("{op_type} opset {version} is above the maximum supported opset {max}")]
    OpsetTooNew {
        /// Operator kind
        op_type: String,
        /// Node opset version
        version: i64,
        /// Maximum supported opset
        max: i64,
    },

    /// Output arity differs from an inference-mode export
    #[error(
        "{op_type} has {actual} outputs, expected {expected}; the model may be exported in \
         training mode, please export it in inference mode"
    )]
    OutputCount {
        /// Operator kind
        op_type: String,
        /// Expected output count
        expected: usize,
        /// Actual output count
        actual: usize,
    },

    /// A required input slot is absent
    #[error("{op_type} is missing input #{index}")]
    MissingInput {
        /// Operator kind
        op_type: String,
        /// Input position
        index: usize,
    },

    /// The shape of an input is not known
    #[error("shape of input {input} is unknown")]
    UnknownShape {
        /// Value name
        input: String,
    },

    /// The shape of an input has unknown dimensions where static ones are required
    #[error("shape of input {input} has dynamic dimensions: {shape:?}")]
    DynamicShape {
        /// Value name
        input: String,
        /// Shape with -1 for unknown dims
        shape: Vec<i64>,
    },

    /// Input rank is outside the supported set
    #[error("{op_type} only supports rank {expected} input, {input} has rank {actual}")]
    UnsupportedRank {
        /// Operator kind
        op_type: String,
        /// Value name
        input: String,
        /// Required rank
        expected: usize,
        /// Actual rank
        actual: usize,
    },

    /// An attribute selects an unsupported mode
    #[error("{op_type} attribute {name}={value} is not supported")]
    UnsupportedAttribute {
        /// Operator kind
        op_type: String,
        /// Attribute name
        name: String,
        /// Attribute value as text
        value: String,
    },

    /// A parameter input must be a constant initializer
    #[error("{role} of {op_type} ({input}) must be a constant initializer")]
    NonConstantInput {
        /// Operator kind
        op_type: String,
        /// Semantic role of the input (e.g. "scale")
        role: &'static str,
        /// Value name
        input: String,
    },

    /// Input element type is not accepted
    #[error("input {input} of {op_type} has unsupported element type {dtype}")]
    UnsupportedInputType {
        /// Operator kind
        op_type: String,
        /// Value name
        input: String,
        /// Element type name
        dtype: String,
    },

    /// A dimension cannot be encoded exactly by the target
    #[error("{op_type}: dimension {dim} of {input} exceeds {max}, the largest exactly encodable value")]
    DimensionOutOfRange {
        /// Operator kind
        op_type: String,
        /// Value name
        input: String,
        /// Offending dimension
        dim: i64,
        /// Largest encodable dimension
        max: i64,
    },

    /// A platform-scoped exclusion applies
    #[error("{op_type} is excluded on this target: {reason}")]
    PlatformExcluded {
        /// Operator kind
        op_type: String,
        /// Reason from the exclusion table
        reason: &'static str,
    },
}

/// Result of a support predicate
pub type Support = Result<(), Unsupported>;

/// Fatal error raised while building target IR
#[derive(Error, Debug)]
pub enum LoweringError {
    /// Two strategies registered for the same operator kind
    #[error("duplicate lowering registered for op type {0}")]
    DuplicateRegistration(String),

    /// A target unit references a value nothing defines
    #[error("{unit} references undefined value {value}")]
    DanglingReference {
        /// Layer or operation name
        unit: String,
        /// Referenced value name
        value: String,
    },

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Initializer vanished between predicate and emission
    #[error("initializer not found: {0}")]
    InitializerNotFound(String),

    /// Invalid tensor data type
    #[error("invalid data type: {0}")]
    InvalidDataType(i32),

    /// Invalid node configuration
    #[error("invalid node: {0}")]
    InvalidNode(String),

    /// Shape needed for emission is not available
    #[error("shape unavailable for value: {0}")]
    ShapeUnavailable(String),

    /// Constant tensor could not be converted to a weight blob
    #[error("weight conversion failed for {name}: {reason}")]
    WeightConversion {
        /// Tensor name
        name: String,
        /// Failure description
        reason: String,
    },

    /// A strategy was asked to emit a dialect it does not implement
    #[error("{op_type} does not implement {dialect} emission")]
    DialectMismatch {
        /// Operator kind
        op_type: String,
        /// Requested dialect name
        dialect: &'static str,
    },

    /// Emission of a certified node failed
    #[error("failed to lower node {node} ({op_type}): {source}")]
    NodeLowering {
        /// Node name
        node: String,
        /// Operator kind
        op_type: String,
        /// Underlying failure
        #[source]
        source: Box<LoweringError>,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for lowering operations
pub type LoweringResult<T> = Result<T, LoweringError>;
