//! Mode 1: JSON-manifest script contracts
//!
//! Source is a manifest of named members, each a list of statements.
//! `verify` bounds everything statically (loop counts, nesting, call graph);
//! the interpreter still meters every statement and expression against
//! `max_steps`.

mod interpreter;
pub mod manifest;
mod verify;

use async_trait::async_trait;
use tracing::debug;

use lib_types::{CompiledUnit, ExecutionMode, Value};

use crate::context::{AccessLevel, ExecutionContext};
use crate::errors::{VmError, VmResult};
use crate::limits::ExecutionLimits;
use crate::metadata::{ON_DEPLOYED, ON_RECEIVED};
use crate::vm::{ContextFactory, ContractCompiler, ContractRunner, ContractVm};

use interpreter::Interpreter;
use manifest::{Hook, Manifest};

pub struct ScriptVm {
    limits: ExecutionLimits,
}

impl ScriptVm {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    fn load(unit: &CompiledUnit) -> VmResult<Manifest> {
        serde_json::from_slice(unit.as_bytes())
            .map_err(|e| VmError::InvalidPayload(format!("corrupt script unit: {}", e)))
    }
}

impl Default for ScriptVm {
    fn default() -> Self {
        Self::new(ExecutionLimits::default())
    }
}

impl ContractCompiler for ScriptVm {
    fn compile(&self, source: &[u8]) -> VmResult<CompiledUnit> {
        let manifest: Manifest = serde_json::from_slice(source)
            .map_err(|e| VmError::CompileFailed(e.to_string()))?;
        let canonical =
            serde_json::to_vec(&manifest).map_err(|e| VmError::CompileFailed(e.to_string()))?;
        Ok(CompiledUnit::new(canonical))
    }

    fn verify(&self, unit: &CompiledUnit) -> VmResult<()> {
        let manifest = serde_json::from_slice::<Manifest>(unit.as_bytes())
            .map_err(|e| VmError::VerifyFailed(e.to_string()))?;
        verify::verify_manifest(&manifest, &self.limits)
    }
}

#[async_trait]
impl ContractRunner for ScriptVm {
    async fn run(&self, unit: &CompiledUnit, ctx: &mut ExecutionContext<'_>) -> VmResult<Value> {
        let manifest = Self::load(unit)?;

        if ctx.access() == AccessLevel::Metadata {
            ctx.set_metadata(manifest.metadata())?;
            return Ok(Value::Null);
        }

        let function = ctx.function().to_string();
        let params = ctx.params().to_vec();
        let value = ctx.env().value;
        debug!(function = %function, access = ?ctx.access(), "running script member");

        let mut interpreter = Interpreter::new(&manifest, ctx, &self.limits);
        match function.as_str() {
            ON_DEPLOYED => interpreter.run_hooks(Hook::Deployed),
            ON_RECEIVED => interpreter.run_hooks(Hook::Received),
            name => {
                let member = manifest
                    .members
                    .get(name)
                    .ok_or_else(|| VmError::FunctionNotFound(name.to_string()))?;
                if member.on.is_some() {
                    return Err(VmError::AccessDenied(format!(
                        "lifecycle member '{}' cannot be invoked directly",
                        name
                    )));
                }
                if value > 0 && !member.payable {
                    return Err(VmError::ContractFailed(format!(
                        "member '{}' is not payable",
                        name
                    )));
                }
                interpreter.invoke(name, params)
            }
        }
    }
}

impl ContextFactory for ScriptVm {}

impl ContractVm for ScriptVm {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::SCRIPT
    }

    fn name(&self) -> &'static str {
        "script"
    }
}
