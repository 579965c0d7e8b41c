//! Shipped execution modes

pub mod script;
pub mod wasm;

pub use script::ScriptVm;
pub use wasm::WasmVm;
