//! Backend capability traits
//!
//! A backend ("mode") is the triple compiler + runner + context factory.
//! The engine only ever talks to these traits through [`crate::VmRegistry`].

use async_trait::async_trait;

use lib_types::{Address, BlockEnv, CompiledUnit, ExecutionMode, LedgerState, Transaction, Value};

use crate::context::{CallTarget, ExecutionContext};
use crate::errors::VmResult;

/// Turns decoded source into a runnable unit and checks it statically
pub trait ContractCompiler: Send + Sync {
    fn compile(&self, source: &[u8]) -> VmResult<CompiledUnit>;

    /// Reject units that are malformed or fail static safety checks
    fn verify(&self, unit: &CompiledUnit) -> VmResult<()>;
}

/// Executes the context's target member of a compiled unit.
///
/// Under a `Metadata` context the runner must not execute contract logic
/// with side effects; it records [`crate::ContractMetadata`] on the context
/// and returns `Value::Null`.
#[async_trait]
pub trait ContractRunner: Send + Sync {
    async fn run(&self, unit: &CompiledUnit, ctx: &mut ExecutionContext<'_>) -> VmResult<Value>;
}

/// Builds the sandbox a unit runs in. The provided constructors cover both
/// shipped backends; a backend with stricter rules overrides them.
pub trait ContextFactory: Send + Sync {
    fn context_for_write<'a>(
        &self,
        tx: &Transaction,
        block: &BlockEnv,
        snapshot: &'a mut LedgerState,
        target: CallTarget,
    ) -> ExecutionContext<'a> {
        ExecutionContext::for_write(tx, block, snapshot, target)
    }

    fn context_for_view<'a>(&self, ledger: &'a LedgerState, target: CallTarget) -> ExecutionContext<'a> {
        ExecutionContext::for_view(ledger, target)
    }

    fn context_for_pure(&self, target: CallTarget) -> ExecutionContext<'static> {
        ExecutionContext::for_pure(target)
    }

    fn dummy_context(&self, address: Address) -> ExecutionContext<'static> {
        ExecutionContext::for_metadata(address)
    }
}

/// Full capability set of one execution mode
pub trait ContractVm: ContractCompiler + ContractRunner + ContextFactory {
    fn mode(&self) -> ExecutionMode;

    fn name(&self) -> &'static str;
}
