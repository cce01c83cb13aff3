//! Strategy registry
//!
//! Maps operator kinds to their [`OpLowering`] strategy. A registry is built
//! once and then only read, so one instance can be shared by concurrent
//! lowering sessions.
//!
//! # Example
//!
//! ```ignore
//! use onnx_lowering::registry::{default_registry, OpRegistry};
//!
//! let registry = default_registry();
//! assert!(registry.lookup("BatchNormalization").is_some());
//!
//! // Custom catalog
//! let mut registry = OpRegistry::builtin();
//! registry.register("Gelu", Arc::new(GeluLowering))?;
//! ```

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::error::{LoweringError, LoweringResult};
use crate::ops::{Activation, ActivationLowering, BatchNormLowering, ShapeLowering};
use crate::traits::OpLowering;

/// Operator kind → lowering strategy
#[derive(Default, Clone)]
pub struct OpRegistry {
    strategies: IndexMap<String, Arc<dyn OpLowering>>,
}

impl std::fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpRegistry")
            .field("op_types", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OpRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy
    ///
    /// # Panics
    ///
    /// Panics if two built-in strategies claim the same op type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .try_register_builtin()
            .expect("built-in strategies have distinct op types");
        registry
    }

    fn try_register_builtin(&mut self) -> LoweringResult<()> {
        self.register("BatchNormalization", Arc::new(BatchNormLowering))?
            .register("Shape", Arc::new(ShapeLowering))?;
        for kind in Activation::ALL {
            self.register(kind.op_type(), Arc::new(ActivationLowering::new(kind)))?;
        }
        Ok(())
    }

    /// Register `strategy` for `op_type`
    ///
    /// A second registration for the same kind is rejected.
    pub fn register(
        &mut self,
        op_type: &str,
        strategy: Arc<dyn OpLowering>,
    ) -> LoweringResult<&mut Self> {
        if self.strategies.contains_key(op_type) {
            return Err(LoweringError::DuplicateRegistration(op_type.to_string()));
        }
        self.strategies.insert(op_type.to_string(), strategy);
        Ok(self)
    }

    /// Strategy for `op_type`
    pub fn lookup(&self, op_type: &str) -> Option<&dyn OpLowering> {
        self.strategies.get(op_type).map(|s| s.as_ref())
    }

    /// Check if `op_type` has a strategy
    pub fn contains(&self, op_type: &str) -> bool {
        self.strategies.contains_key(op_type)
    }

    /// Registered operator kinds, sorted
    pub fn supported_op_types(&self) -> Vec<&str> {
        let mut op_types: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        op_types.sort_unstable();
        op_types
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Process-wide registry of the built-in strategies
///
/// # Panics
///
/// Panics on first use if two built-in strategies claim the same op type.
pub fn default_registry() -> &'static OpRegistry {
    static REGISTRY: OnceLock<OpRegistry> = OnceLock::new();
    REGISTRY.get_or_init(OpRegistry::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let registry = OpRegistry::builtin();
        assert_eq!(
            registry.supported_op_types(),
            vec!["BatchNormalization", "Relu", "Shape", "Sigmoid", "Tanh"]
        );
        assert_eq!(registry.lookup("Tanh").unwrap().name(), "Tanh");
        assert!(registry.lookup("Conv").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = OpRegistry::builtin();
        let err = registry
            .register("Shape", Arc::new(ShapeLowering))
            .unwrap_err();
        assert!(matches!(err, LoweringError::DuplicateRegistration(ref op) if op == "Shape"));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_register_chains() {
        let mut registry = OpRegistry::new();
        registry
            .register("A", Arc::new(ShapeLowering))
            .unwrap()
            .register("B", Arc::new(BatchNormLowering))
            .unwrap();
        assert!(registry.contains("A") && registry.contains("B"));
    }

    #[test]
    fn test_default_registry_is_shared() {
        let a = default_registry() as *const OpRegistry;
        let b = default_registry() as *const OpRegistry;
        assert_eq!(a, b);

        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpRegistry>();
    }
}
