//! Contract virtual-machine abstraction
//!
//! Each execution mode plugs in a compiler, a runner and a context factory
//! (see [`vm`]). The engine stays mode-agnostic and reaches backends only
//! through [`VmRegistry`].

pub mod backends;
pub mod context;
pub mod errors;
pub mod limits;
pub mod metadata;
pub mod registry;
pub mod source;
pub mod vm;

pub use backends::{ScriptVm, WasmVm};
pub use context::{AccessLevel, CallTarget, ContractEnv, ExecutionContext};
pub use errors::{VmError, VmResult};
pub use limits::ExecutionLimits;
pub use metadata::{is_reserved, ContractMetadata, ON_DEPLOYED, ON_RECEIVED, RESERVED_METHODS};
pub use registry::VmRegistry;
pub use source::{decode_deploy_payload, encode_deploy_payload};
pub use vm::{ContextFactory, ContractCompiler, ContractRunner, ContractVm};
