//! # Contract Execution Limits
//!
//! Hard bounds applied by every backend. Script contracts are bounded
//! statically by `verify` and dynamically by the step budget; wasm contracts
//! by fuel and linear-memory size.

use serde::{Deserialize, Serialize};

/// Default interpreter step budget per invocation.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Largest iteration count a script `repeat` may declare.
pub const DEFAULT_MAX_REPEAT: u32 = 1_000;

/// Maximum block nesting inside a script member body.
pub const DEFAULT_MAX_NESTING: usize = 16;

/// Maximum number of statements in one script manifest.
pub const DEFAULT_MAX_STATEMENTS: usize = 4_096;

/// Wasm fuel per invocation.
pub const DEFAULT_WASM_FUEL: u64 = 10_000_000;

/// Maximum wasm linear memory per instance (16 pages of 64 KiB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 16 * 65_536;

/// Largest result a contract may hand back to the host.
pub const DEFAULT_MAX_RETURN_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    pub max_steps: u64,
    pub max_repeat: u32,
    pub max_nesting: usize,
    pub max_statements: usize,
    pub wasm_fuel: u64,
    pub max_memory_bytes: usize,
    pub max_return_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_repeat: DEFAULT_MAX_REPEAT,
            max_nesting: DEFAULT_MAX_NESTING,
            max_statements: DEFAULT_MAX_STATEMENTS,
            wasm_fuel: DEFAULT_WASM_FUEL,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_return_bytes: DEFAULT_MAX_RETURN_BYTES,
        }
    }
}

impl ExecutionLimits {
    /// Tight budgets so runaway-code tests fail fast
    pub fn for_testing() -> Self {
        Self {
            max_steps: 1_000,
            max_repeat: 50,
            max_nesting: 8,
            max_statements: 256,
            wasm_fuel: 1_000_000,
            max_memory_bytes: 4 * 65_536,
            max_return_bytes: 4 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_limits_fill_from_defaults() {
        let limits: ExecutionLimits = serde_json::from_str(r#"{"max_steps": 7}"#).unwrap();
        assert_eq!(limits.max_steps, 7);
        assert_eq!(limits.wasm_fuel, DEFAULT_WASM_FUEL);
    }
}
