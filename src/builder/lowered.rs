//! Finalized result of a lowering session

use indexmap::IndexSet;

use crate::config::TargetDialect;
use crate::proto::target::{NeuralNetworkLayer, Operation};

/// Read-only target model handed to serialization
///
/// Exactly one of `layers` / `operations` is populated, matching `dialect`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredModel {
    /// Dialect the units are expressed in
    pub dialect: TargetDialect,
    /// Layer records in emission order
    pub layers: Vec<NeuralNetworkLayer>,
    /// Program operations in emission order
    pub operations: Vec<Operation>,
    /// Plain inputs of the target graph
    pub inputs: Vec<String>,
    /// Outputs of the target graph
    pub outputs: Vec<String>,
    /// Initializers folded into unit parameters; omitted from `inputs`
    pub skipped_initializers: IndexSet<String>,
}

impl LoweredModel {
    /// Number of emitted units
    pub fn unit_count(&self) -> usize {
        self.layers.len() + self.operations.len()
    }

    /// Check if nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }

    /// Layer by name
    pub fn find_layer(&self, name: &str) -> Option<&NeuralNetworkLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Operation by name
    pub fn find_operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Operations with the given target op type
    pub fn operations_of_type<'a>(
        &'a self,
        op_type: &'a str,
    ) -> impl Iterator<Item = &'a Operation> {
        self.operations.iter().filter(move |op| op.r#type == op_type)
    }

    /// Operation producing `value`
    pub fn producer_of(&self, value: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.outputs.iter().any(|o| o.name == value))
    }

    /// Check if an initializer was folded into a unit
    pub fn is_initializer_skipped(&self, name: &str) -> bool {
        self.skipped_initializers.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::target::NamedValueType;

    #[test]
    fn test_lookup_helpers() {
        let model = LoweredModel {
            dialect: TargetDialect::Program,
            layers: Vec::new(),
            operations: vec![
                Operation {
                    r#type: "const".to_string(),
                    name: "c".to_string(),
                    outputs: vec![NamedValueType {
                        name: "c".to_string(),
                        r#type: None,
                    }],
                    ..Default::default()
                },
                Operation {
                    r#type: "relu".to_string(),
                    name: "relu_0".to_string(),
                    ..Default::default()
                },
            ],
            inputs: vec!["X".to_string()],
            outputs: Vec::new(),
            skipped_initializers: IndexSet::from(["scale".to_string()]),
        };

        assert_eq!(model.unit_count(), 2);
        assert!(!model.is_empty());
        assert_eq!(model.operations_of_type("const").count(), 1);
        assert_eq!(model.producer_of("c").unwrap().name, "c");
        assert!(model.find_operation("relu_0").is_some());
        assert!(model.find_layer("relu_0").is_none());
        assert!(model.is_initializer_skipped("scale"));
    }
}
