//! Mode → backend registry

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use lib_types::{Address, CompiledUnit, ExecutionMode};

use crate::backends::{ScriptVm, WasmVm};
use crate::errors::{VmError, VmResult};
use crate::limits::ExecutionLimits;
use crate::metadata::ContractMetadata;
use crate::vm::{ContextFactory, ContractRunner, ContractVm};

/// Dispatches purely on the mode tag; the engine never inspects a backend
#[derive(Clone, Default)]
pub struct VmRegistry {
    backends: HashMap<ExecutionMode, Arc<dyn ContractVm>>,
}

impl VmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script (mode 1) and wasm (mode 2) backends sharing one set of limits
    pub fn with_default_backends(limits: ExecutionLimits) -> VmResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ScriptVm::new(limits.clone())));
        registry.register(Arc::new(WasmVm::new(limits)?));
        Ok(registry)
    }

    /// Register a backend under its own mode, replacing any previous one
    pub fn register(&mut self, vm: Arc<dyn ContractVm>) {
        debug!(mode = %vm.mode(), backend = vm.name(), "registering contract backend");
        self.backends.insert(vm.mode(), vm);
    }

    pub fn get(&self, mode: ExecutionMode) -> VmResult<Arc<dyn ContractVm>> {
        self.backends
            .get(&mode)
            .cloned()
            .ok_or(VmError::UnknownMode(mode))
    }

    pub fn modes(&self) -> Vec<ExecutionMode> {
        let mut modes: Vec<_> = self.backends.keys().copied().collect();
        modes.sort();
        modes
    }

    /// Run a unit under its backend's dummy context and collect its metadata
    pub async fn metadata(
        &self,
        mode: ExecutionMode,
        address: &Address,
        unit: &CompiledUnit,
    ) -> VmResult<ContractMetadata> {
        let vm = self.get(mode)?;
        let mut ctx = vm.dummy_context(address.clone());
        vm.run(unit, &mut ctx).await?;
        ctx.take_metadata().ok_or_else(|| {
            VmError::HostError(format!("{} backend produced no metadata", vm.name()))
        })
    }
}

impl std::fmt::Debug for VmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmRegistry")
            .field("modes", &self.modes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backends() {
        let registry = VmRegistry::with_default_backends(ExecutionLimits::for_testing()).unwrap();
        assert_eq!(registry.modes(), vec![ExecutionMode::SCRIPT, ExecutionMode::WASM]);
        assert_eq!(registry.get(ExecutionMode::WASM).unwrap().name(), "wasm");
        assert!(matches!(
            registry.get(ExecutionMode::new(9)),
            Err(VmError::UnknownMode(_))
        ));
    }
}
