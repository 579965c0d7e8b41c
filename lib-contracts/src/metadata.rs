//! Static contract metadata and reserved member names

use serde::{Deserialize, Serialize};

/// Constructor-style hook run once right after deployment
pub const ON_DEPLOYED: &str = "__on_deployed";

/// Hook run when a plain transfer credits a contract
pub const ON_RECEIVED: &str = "__on_received";

/// Members a transaction may never invoke directly
pub const RESERVED_METHODS: [&str; 6] = [
    "constructor",
    ON_DEPLOYED,
    ON_RECEIVED,
    "getState",
    "setState",
    "getEnv",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_METHODS.contains(&name)
}

/// Member classification harvested from a compiled unit under the dummy
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContractMetadata {
    /// Every exported member, in backend order
    pub members: Vec<String>,
    pub view: Vec<String>,
    pub payable: Vec<String>,
    /// Members run by the deployment hook
    pub deployed: Vec<String>,
    /// Members run by the received hook
    pub received: Vec<String>,
}

impl ContractMetadata {
    pub fn is_view(&self, name: &str) -> bool {
        self.view.iter().any(|m| m == name)
    }

    pub fn is_payable(&self, name: &str) -> bool {
        self.payable.iter().any(|m| m == name)
    }

    /// Lifecycle hook members, reachable only through engine dispatch
    pub fn is_hook(&self, name: &str) -> bool {
        self.deployed.iter().chain(self.received.iter()).any(|m| m == name)
    }

    /// Externally callable surface: members minus hooks and reserved names
    pub fn callable_members(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| !is_reserved(m) && !self.is_hook(m))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callable_members_exclude_hooks_and_reserved() {
        let metadata = ContractMetadata {
            members: vec![
                "__on_deployed".to_string(),
                "init".to_string(),
                "bump".to_string(),
                "getState".to_string(),
                "total".to_string(),
            ],
            view: vec!["total".to_string()],
            payable: vec![],
            deployed: vec!["init".to_string()],
            received: vec![],
        };

        assert_eq!(metadata.callable_members(), vec!["bump", "total"]);
        assert!(metadata.is_hook("init"));
        assert!(metadata.is_view("total"));
        assert!(!metadata.is_payable("bump"));
    }

    #[test]
    fn test_reserved_names() {
        for name in RESERVED_METHODS {
            assert!(is_reserved(name));
        }
        assert!(!is_reserved("transfer"));
    }
}
