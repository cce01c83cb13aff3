//! Target IR messages
//!
//! Two dialects are described here:
//!
//! - **Layer dialect**: [`NeuralNetworkLayer`] records with a typed parameter
//!   block per layer kind. Constant tensors are embedded as [`WeightParams`].
//! - **Program dialect**: [`Operation`] records with named inputs bound to
//!   values or immediates, and typed named outputs. Constant tensors become
//!   separate `const` operations.

#![allow(missing_docs)]

use std::collections::BTreeMap;

// ============================================================================
// Layer dialect
// ============================================================================

/// Weight blob of a layer parameter
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WeightParams {
    #[prost(float, repeated, tag = "1")]
    pub float_value: Vec<f32>,
    /// Little-endian IEEE half floats
    #[prost(bytes = "vec", tag = "2")]
    pub float16_value: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NeuralNetworkLayer {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, repeated, tag = "2")]
    pub input: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub output: Vec<String>,
    #[prost(oneof = "neural_network_layer::Layer", tags = "10, 11, 12, 13")]
    pub layer: Option<neural_network_layer::Layer>,
}

pub mod neural_network_layer {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Layer {
        #[prost(message, tag = "10")]
        BatchNorm(super::BatchNormLayerParams),
        #[prost(message, tag = "11")]
        Activation(super::ActivationParams),
        #[prost(message, tag = "12")]
        LoadConstantNd(super::LoadConstantNdLayerParams),
        #[prost(message, tag = "13")]
        SliceStatic(super::SliceStaticLayerParams),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchNormLayerParams {
    #[prost(uint64, tag = "1")]
    pub channels: u64,
    #[prost(bool, tag = "5")]
    pub compute_mean_var: bool,
    #[prost(bool, tag = "6")]
    pub instance_normalization: bool,
    #[prost(float, tag = "10")]
    pub epsilon: f32,
    #[prost(message, optional, tag = "15")]
    pub gamma: Option<WeightParams>,
    #[prost(message, optional, tag = "16")]
    pub beta: Option<WeightParams>,
    #[prost(message, optional, tag = "17")]
    pub mean: Option<WeightParams>,
    #[prost(message, optional, tag = "18")]
    pub variance: Option<WeightParams>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActivationReLu {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActivationSigmoid {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActivationTanh {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActivationParams {
    #[prost(oneof = "activation_params::NonlinearityType", tags = "10, 20, 30")]
    pub nonlinearity_type: Option<activation_params::NonlinearityType>,
}

pub mod activation_params {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum NonlinearityType {
        #[prost(message, tag = "10")]
        ReLu(super::ActivationReLu),
        #[prost(message, tag = "20")]
        Tanh(super::ActivationTanh),
        #[prost(message, tag = "30")]
        Sigmoid(super::ActivationSigmoid),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoadConstantNdLayerParams {
    #[prost(uint64, repeated, tag = "1")]
    pub shape: Vec<u64>,
    #[prost(message, optional, tag = "10")]
    pub data: Option<WeightParams>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SliceStaticLayerParams {
    #[prost(int64, repeated, tag = "1")]
    pub begin_ids: Vec<i64>,
    #[prost(bool, repeated, tag = "2")]
    pub begin_masks: Vec<bool>,
    #[prost(int64, repeated, tag = "3")]
    pub end_ids: Vec<i64>,
    #[prost(bool, repeated, tag = "4")]
    pub end_masks: Vec<bool>,
    #[prost(int64, repeated, tag = "5")]
    pub strides: Vec<i64>,
}

// ============================================================================
// Program dialect
// ============================================================================

/// Element types of the program dialect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DataType {
    UnusedType = 0,
    Bool = 1,
    Float16 = 10,
    Float32 = 11,
    Int32 = 23,
    Int64 = 24,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValueType {
    #[prost(enumeration = "DataType", tag = "1")]
    pub data_type: i32,
    /// Dimensions; empty for scalars
    #[prost(int64, repeated, tag = "2")]
    pub shape: Vec<i64>,
}

/// Immediate tensor payload; exactly one field is populated
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TensorValue {
    #[prost(float, repeated, tag = "1")]
    pub floats: Vec<f32>,
    #[prost(int32, repeated, tag = "2")]
    pub ints: Vec<i32>,
    #[prost(int64, repeated, tag = "3")]
    pub long_ints: Vec<i64>,
    /// Raw little-endian bytes (float16 payloads)
    #[prost(bytes = "vec", tag = "4")]
    pub bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Value {
    #[prost(message, optional, tag = "1")]
    pub r#type: Option<ValueType>,
    #[prost(message, optional, tag = "3")]
    pub immediate: Option<TensorValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NamedValueType {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub r#type: Option<ValueType>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Binding {
    #[prost(oneof = "binding::Kind", tags = "1, 2")]
    pub kind: Option<binding::Kind>,
}

pub mod binding {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        /// Reference to a named value in the program
        #[prost(string, tag = "1")]
        Name(String),
        /// Inline value
        #[prost(message, tag = "2")]
        Value(super::Value),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Argument {
    #[prost(message, repeated, tag = "1")]
    pub arguments: Vec<Binding>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(btree_map = "string, message", tag = "2")]
    pub inputs: BTreeMap<String, Argument>,
    #[prost(message, repeated, tag = "3")]
    pub outputs: Vec<NamedValueType>,
    #[prost(btree_map = "string, message", tag = "5")]
    pub attributes: BTreeMap<String, Value>,
    #[prost(string, tag = "6")]
    pub name: String,
}
