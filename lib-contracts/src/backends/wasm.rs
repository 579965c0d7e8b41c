//! Mode 2: WebAssembly contracts on wasmtime
//!
//! ABI expected from a contract module:
//! - exports `memory` and `allocate(len: i32) -> i32`
//! - each member is `(ptr: i32, len: i32) -> i64`, receiving its params as a
//!   JSON array and returning `ptr << 32 | len` of a JSON result (len 0 = null)
//! - optional `__metadata() -> i64` returning
//!   `{"view": [..], "payable": [..], "deployed": [..], "received": [..]}`
//! - imports only from module `env`, see [`HOST_IMPORTS`]
//!
//! A lifecycle hook runs the export literally named `__on_deployed` /
//! `__on_received` when present, then every member the `deployed` /
//! `received` list names, in list order, inside one instance. Listed members
//! are not directly callable.
//!
//! Storage writes and outgoing transfers are staged in host state and only
//! handed to the execution context once the member returns without trapping.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use wasmtime::*;

use lib_types::{Address, Amount, CompiledUnit, ExecutionMode, Value};

use crate::context::{AccessLevel, ExecutionContext};
use crate::errors::{VmError, VmResult};
use crate::limits::ExecutionLimits;
use crate::metadata::{ContractMetadata, ON_DEPLOYED, ON_RECEIVED};
use crate::vm::{ContextFactory, ContractCompiler, ContractRunner, ContractVm};

pub const MEMORY_EXPORT: &str = "memory";
pub const ALLOCATE_EXPORT: &str = "allocate";
pub const METADATA_EXPORT: &str = "__metadata";

/// Functions a contract may import from module `env`
pub const HOST_IMPORTS: [&str; 6] = [
    "state_get",
    "state_set",
    "get_caller",
    "get_value",
    "self_balance",
    "transfer",
];

const HOST_CALL_FUEL: u64 = 1_000;
const HOST_BYTE_FUEL: u64 = 10;

/// Host-side state reachable from imported functions
struct HostState {
    access: AccessLevel,
    sender: Option<Address>,
    value: Amount,
    storage: BTreeMap<String, Value>,
    balance: Option<Amount>,
    staged_writes: BTreeMap<String, Value>,
    staged_transfers: Vec<(Address, Amount)>,
    memory: Option<Memory>,
    limits: StoreLimits,
}

impl HostState {
    fn new(access: AccessLevel, limits: &ExecutionLimits) -> Self {
        Self {
            access,
            sender: None,
            value: 0,
            storage: BTreeMap::new(),
            balance: None,
            staged_writes: BTreeMap::new(),
            staged_transfers: Vec::new(),
            memory: None,
            limits: StoreLimitsBuilder::new()
                .memory_size(limits.max_memory_bytes)
                .instances(1)
                .build(),
        }
    }

    fn from_context(ctx: &ExecutionContext<'_>, limits: &ExecutionLimits) -> VmResult<Self> {
        let mut host = Self::new(ctx.access(), limits);
        host.sender = ctx.env().sender.clone();
        host.value = ctx.env().value;
        if ctx.access().can_read_state() {
            host.storage = ctx.storage_view()?;
            host.balance = Some(ctx.self_balance()?);
        }
        Ok(host)
    }

    fn available_balance(&self) -> Option<Amount> {
        let staged: Amount = self.staged_transfers.iter().map(|(_, amount)| *amount).sum();
        self.balance.map(|balance| balance.saturating_sub(staged))
    }
}

// ============================================================================
// Host functions
// ============================================================================

fn charge(caller: &mut Caller<'_, HostState>, cost: u64) -> Result<()> {
    let fuel = caller.get_fuel()?;
    caller.set_fuel(fuel.saturating_sub(cost))?;
    Ok(())
}

fn guest_memory(caller: &Caller<'_, HostState>) -> Result<Memory> {
    caller
        .data()
        .memory
        .ok_or_else(|| anyhow!("Memory not found"))
}

fn read_guest(caller: &mut Caller<'_, HostState>, ptr: u32, len: u32) -> Result<Vec<u8>> {
    charge(caller, u64::from(len) * HOST_BYTE_FUEL)?;
    let memory = guest_memory(caller)?;
    let mut buf = vec![0u8; len as usize];
    memory
        .read(&*caller, ptr as usize, &mut buf)
        .map_err(|e| anyhow!("guest read out of bounds: {}", e))?;
    Ok(buf)
}

fn write_guest(caller: &mut Caller<'_, HostState>, ptr: u32, data: &[u8]) -> Result<u32> {
    charge(caller, data.len() as u64 * HOST_BYTE_FUEL)?;
    let memory = guest_memory(caller)?;
    memory
        .write(&mut *caller, ptr as usize, data)
        .map_err(|e| anyhow!("guest write out of bounds: {}", e))?;
    Ok(data.len() as u32)
}

fn read_guest_string(caller: &mut Caller<'_, HostState>, ptr: u32, len: u32) -> Result<String> {
    let bytes = read_guest(caller, ptr, len)?;
    String::from_utf8(bytes).map_err(|_| anyhow!("guest string is not UTF-8"))
}

fn require_state_access(caller: &Caller<'_, HostState>) -> Result<()> {
    if caller.data().access.can_read_state() {
        Ok(())
    } else {
        bail!("storage is not available in a {:?} context", caller.data().access)
    }
}

fn host_state_get(
    mut caller: Caller<'_, HostState>,
    key_ptr: u32,
    key_len: u32,
    out_ptr: u32,
) -> Result<u32> {
    charge(&mut caller, HOST_CALL_FUEL)?;
    require_state_access(&caller)?;

    let key = read_guest_string(&mut caller, key_ptr, key_len)?;
    let host = caller.data();
    let value = host
        .staged_writes
        .get(&key)
        .or_else(|| host.storage.get(&key))
        .cloned();

    match value {
        Some(value) => {
            let encoded = serde_json::to_vec(&value)?;
            write_guest(&mut caller, out_ptr, &encoded)
        }
        None => Ok(0),
    }
}

fn host_state_set(
    mut caller: Caller<'_, HostState>,
    key_ptr: u32,
    key_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> Result<()> {
    charge(&mut caller, HOST_CALL_FUEL)?;
    require_state_access(&caller)?;

    let key = read_guest_string(&mut caller, key_ptr, key_len)?;
    let raw = read_guest(&mut caller, value_ptr, value_len)?;
    let value: Value =
        serde_json::from_slice(&raw).map_err(|e| anyhow!("state_set value is not JSON: {}", e))?;

    caller.data_mut().staged_writes.insert(key, value);
    Ok(())
}

fn host_get_caller(mut caller: Caller<'_, HostState>, out_ptr: u32) -> Result<u32> {
    charge(&mut caller, HOST_CALL_FUEL / 10)?;
    if caller.data().access == AccessLevel::Metadata {
        bail!("get_caller is not available while harvesting metadata");
    }

    match caller.data().sender.clone() {
        Some(sender) => write_guest(&mut caller, out_ptr, sender.as_str().as_bytes()),
        None => Ok(0),
    }
}

fn host_get_value(mut caller: Caller<'_, HostState>) -> Result<i64> {
    charge(&mut caller, HOST_CALL_FUEL / 10)?;
    if caller.data().access == AccessLevel::Metadata {
        bail!("get_value is not available while harvesting metadata");
    }
    Ok(i64::try_from(caller.data().value)?)
}

fn host_self_balance(mut caller: Caller<'_, HostState>) -> Result<i64> {
    charge(&mut caller, HOST_CALL_FUEL)?;
    let balance = caller
        .data()
        .available_balance()
        .ok_or_else(|| anyhow!("balances are not available in a {:?} context", caller.data().access))?;
    Ok(i64::try_from(balance)?)
}

/// Returns 0 on success, 1 if the contract cannot cover `amount`
fn host_transfer(
    mut caller: Caller<'_, HostState>,
    to_ptr: u32,
    to_len: u32,
    amount: i64,
) -> Result<i32> {
    charge(&mut caller, HOST_CALL_FUEL)?;
    if caller.data().access != AccessLevel::Write {
        bail!("transfer is not available in a {:?} context", caller.data().access);
    }

    let to = Address::from(read_guest_string(&mut caller, to_ptr, to_len)?);
    let amount = Amount::try_from(amount).map_err(|_| anyhow!("negative transfer amount"))?;
    let available = caller.data().available_balance().unwrap_or(0);
    if amount > available {
        return Ok(1);
    }

    caller.data_mut().staged_transfers.push((to, amount));
    Ok(0)
}

fn build_linker(engine: &Engine) -> Result<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    linker.func_wrap("env", "state_get", host_state_get)?;
    linker.func_wrap("env", "state_set", host_state_set)?;
    linker.func_wrap("env", "get_caller", host_get_caller)?;
    linker.func_wrap("env", "get_value", host_get_value)?;
    linker.func_wrap("env", "self_balance", host_self_balance)?;
    linker.func_wrap("env", "transfer", host_transfer)?;
    Ok(linker)
}

// ============================================================================
// Instances
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataDoc {
    view: Vec<String>,
    payable: Vec<String>,
    deployed: Vec<String>,
    received: Vec<String>,
}

struct Session {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
    fuel: u64,
    max_return_bytes: usize,
}

impl Session {
    fn has_function(&mut self, name: &str) -> bool {
        self.instance.get_func(&mut self.store, name).is_some()
    }

    fn call_member(&mut self, name: &str, input: &[u8]) -> VmResult<Value> {
        let allocate = self
            .instance
            .get_typed_func::<u32, u32>(&mut self.store, ALLOCATE_EXPORT)
            .map_err(|e| VmError::FunctionNotFound(format!("'{}': {}", ALLOCATE_EXPORT, e)))?;
        let member = self
            .instance
            .get_typed_func::<(u32, u32), u64>(&mut self.store, name)
            .map_err(|e| VmError::FunctionNotFound(format!("'{}': {}", name, e)))?;

        let input_len = u32::try_from(input.len())
            .map_err(|_| VmError::InvalidParams("parameters too large".to_string()))?;
        let input_ptr = allocate
            .call(&mut self.store, input_len)
            .map_err(|e| self.trap(e))?;
        self.memory
            .write(&mut self.store, input_ptr as usize, input)
            .map_err(|e| VmError::MemoryError(e.to_string()))?;

        let packed = member
            .call(&mut self.store, (input_ptr, input_len))
            .map_err(|e| self.trap(e))?;
        self.read_result(packed)
    }

    fn call_metadata(&mut self) -> VmResult<MetadataDoc> {
        if !self.has_function(METADATA_EXPORT) {
            return Ok(MetadataDoc::default());
        }

        let export = self
            .instance
            .get_typed_func::<(), u64>(&mut self.store, METADATA_EXPORT)
            .map_err(|e| VmError::FunctionNotFound(format!("'{}': {}", METADATA_EXPORT, e)))?;
        let packed = export.call(&mut self.store, ()).map_err(|e| self.trap(e))?;
        let bytes = self.read_packed(packed)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VmError::ExecutionTrap(format!("malformed metadata: {}", e)))
    }

    fn read_packed(&mut self, packed: u64) -> VmResult<Vec<u8>> {
        let ptr = (packed >> 32) as u32;
        let len = packed as u32 as usize;
        if len > self.max_return_bytes {
            return Err(VmError::MemoryError(format!(
                "result of {} bytes exceeds {}",
                len, self.max_return_bytes
            )));
        }

        let mut data = vec![0u8; len];
        self.memory
            .read(&self.store, ptr as usize, &mut data)
            .map_err(|e| VmError::MemoryError(e.to_string()))?;
        Ok(data)
    }

    fn read_result(&mut self, packed: u64) -> VmResult<Value> {
        let data = self.read_packed(packed)?;
        if data.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&data)
            .map_err(|e| VmError::ExecutionTrap(format!("malformed result: {}", e)))
    }

    fn trap(&self, err: anyhow::Error) -> VmError {
        match err.downcast_ref::<Trap>() {
            Some(Trap::OutOfFuel) => VmError::OutOfSteps(self.fuel),
            _ => VmError::ExecutionTrap(format!("{:#}", err)),
        }
    }

    fn into_host(self) -> HostState {
        self.store.into_data()
    }
}

/// A Wasmtime-based virtual machine for contract members.
pub struct WasmVm {
    engine: Engine,
    linker: Linker<HostState>,
    limits: ExecutionLimits,
}

impl WasmVm {
    pub fn new(limits: ExecutionLimits) -> VmResult<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        let engine = Engine::new(&config).map_err(|e| VmError::HostError(e.to_string()))?;
        let linker = build_linker(&engine).map_err(|e| VmError::HostError(e.to_string()))?;

        Ok(Self {
            engine,
            linker,
            limits,
        })
    }

    fn instantiate(&self, unit: &CompiledUnit, host: HostState) -> VmResult<Session> {
        let module = Module::new(&self.engine, unit.as_bytes())
            .map_err(|e| VmError::InvalidPayload(format!("{:#}", e)))?;

        let mut store = Store::new(&self.engine, host);
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(self.limits.wasm_fuel)
            .map_err(|e| VmError::HostError(e.to_string()))?;

        let instance = self
            .linker
            .instantiate(&mut store, &module)
            .map_err(|e| match e.downcast_ref::<Trap>() {
                Some(Trap::OutOfFuel) => VmError::OutOfSteps(self.limits.wasm_fuel),
                _ => VmError::ExecutionTrap(format!("instantiation: {:#}", e)),
            })?;
        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| VmError::MemoryError("memory export not found".to_string()))?;
        store.data_mut().memory = Some(memory);

        Ok(Session {
            store,
            instance,
            memory,
            fuel: self.limits.wasm_fuel,
            max_return_bytes: self.limits.max_return_bytes,
        })
    }

    fn harvest_metadata(&self, unit: &CompiledUnit) -> VmResult<ContractMetadata> {
        let module = Module::new(&self.engine, unit.as_bytes())
            .map_err(|e| VmError::InvalidPayload(format!("{:#}", e)))?;
        let members: Vec<String> = module
            .exports()
            .filter(|export| matches!(export.ty(), ExternType::Func(_)))
            .map(|export| export.name().to_string())
            .filter(|name| name != ALLOCATE_EXPORT && name != METADATA_EXPORT)
            .collect();

        let host = HostState::new(AccessLevel::Metadata, &self.limits);
        let mut session = self.instantiate(unit, host)?;
        let doc = session.call_metadata()?;

        Ok(ContractMetadata {
            members,
            view: doc.view,
            payable: doc.payable,
            deployed: doc.deployed,
            received: doc.received,
        })
    }
}

impl ContractCompiler for WasmVm {
    fn compile(&self, source: &[u8]) -> VmResult<CompiledUnit> {
        Module::validate(&self.engine, source)
            .map_err(|e| VmError::CompileFailed(format!("{:#}", e)))?;
        Ok(CompiledUnit::new(source.to_vec()))
    }

    fn verify(&self, unit: &CompiledUnit) -> VmResult<()> {
        let module = Module::new(&self.engine, unit.as_bytes())
            .map_err(|e| VmError::VerifyFailed(format!("{:#}", e)))?;

        let mut has_memory = false;
        let mut has_allocate = false;
        for export in module.exports() {
            match (export.name(), export.ty()) {
                (MEMORY_EXPORT, ExternType::Memory(_)) => has_memory = true,
                (ALLOCATE_EXPORT, ExternType::Func(_)) => has_allocate = true,
                _ => {}
            }
        }
        if !has_memory {
            return Err(VmError::VerifyFailed("module must export 'memory'".to_string()));
        }
        if !has_allocate {
            return Err(VmError::VerifyFailed("module must export 'allocate'".to_string()));
        }

        for import in module.imports() {
            if import.module() != "env" || !HOST_IMPORTS.contains(&import.name()) {
                return Err(VmError::VerifyFailed(format!(
                    "unsupported import {}::{}",
                    import.module(),
                    import.name()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContractRunner for WasmVm {
    async fn run(&self, unit: &CompiledUnit, ctx: &mut ExecutionContext<'_>) -> VmResult<Value> {
        if ctx.access() == AccessLevel::Metadata {
            let metadata = self.harvest_metadata(unit)?;
            ctx.set_metadata(metadata)?;
            return Ok(Value::Null);
        }

        let function = ctx.function().to_string();
        if function == ALLOCATE_EXPORT || function == METADATA_EXPORT {
            return Err(VmError::FunctionNotFound(function));
        }
        debug!(function = %function, access = ?ctx.access(), "running wasm member");

        let host = HostState::from_context(ctx, &self.limits)?;
        let mut session = self.instantiate(unit, host)?;

        let input = serde_json::to_vec(ctx.params())
            .map_err(|e| VmError::InvalidParams(e.to_string()))?;
        let result = if function == ON_DEPLOYED || function == ON_RECEIVED {
            for member in hook_members(&mut session, &function)? {
                session.call_member(&member, &input)?;
            }
            Value::Null
        } else {
            session.call_member(&function, &input)?
        };

        let host = session.into_host();
        for (key, value) in host.staged_writes {
            ctx.set_state(key, value)?;
        }
        for (to, amount) in host.staged_transfers {
            ctx.transfer(&to, amount)?;
        }
        Ok(result)
    }
}

/// Exports a lifecycle hook dispatches to, in call order
fn hook_members(session: &mut Session, hook: &str) -> VmResult<Vec<String>> {
    let doc = session.call_metadata()?;
    let listed = if hook == ON_DEPLOYED {
        doc.deployed
    } else {
        doc.received
    };

    let mut members = Vec::with_capacity(listed.len() + 1);
    if session.has_function(hook) {
        members.push(hook.to_string());
    }
    for name in listed {
        if !members.contains(&name) {
            members.push(name);
        }
    }
    Ok(members)
}

impl ContextFactory for WasmVm {}

impl ContractVm for WasmVm {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::WASM
    }

    fn name(&self) -> &'static str {
        "wasm"
    }
}
