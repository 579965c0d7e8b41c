//! Script manifest format
//!
//! ```json
//! {
//!   "name": "counter",
//!   "members": {
//!     "init":  { "on": "deployed", "body": [ { "set": { "key": "count", "value": { "lit": 0 } } } ] },
//!     "bump":  { "body": [ { "set": { "key": "count", "value": { "add": [ { "state": "count" }, { "lit": 1 } ] } } } ] },
//!     "count": { "view": true, "body": [ { "return": { "state": "count" } } ] }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lib_types::Value;

use crate::metadata::ContractMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    pub members: BTreeMap<String, Member>,
}

impl Manifest {
    pub fn metadata(&self) -> ContractMetadata {
        let names_where = |pred: &dyn Fn(&Member) -> bool| -> Vec<String> {
            self.members
                .iter()
                .filter(|(_, m)| pred(m))
                .map(|(name, _)| name.clone())
                .collect()
        };

        ContractMetadata {
            members: self.members.keys().cloned().collect(),
            view: names_where(&|m| m.view),
            payable: names_where(&|m| m.payable),
            deployed: names_where(&|m| m.on == Some(Hook::Deployed)),
            received: names_where(&|m| m.on == Some(Hook::Received)),
        }
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Member {
    #[serde(default, skip_serializing_if = "is_false")]
    pub view: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub payable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Hook>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Deployed,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Set {
        key: String,
        value: Expr,
    },
    Transfer {
        to: Expr,
        amount: Expr,
    },
    Require {
        cond: Expr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Fail(String),
    Return(Expr),
    If {
        cond: Expr,
        #[serde(default)]
        then: Vec<Stmt>,
        #[serde(default, rename = "else", skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<Stmt>,
    },
    Repeat {
        times: u32,
        body: Vec<Stmt>,
    },
    Call {
        member: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Lit(Value),
    Param(usize),
    State(String),
    Env(EnvField),
    Balance(Box<Expr>),
    Add(Vec<Expr>),
    Sub(Vec<Expr>),
    Eq(Vec<Expr>),
    Gt(Vec<Expr>),
    Not(Box<Expr>),
    Concat(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvField {
    Sender,
    Value,
    Fee,
    Address,
    BlockNumber,
    BlockTimestamp,
    TxHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_classify() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "name": "vault",
                "members": {
                    "setup": { "on": "deployed", "body": [ { "set": { "key": "n", "value": { "lit": 0 } } } ] },
                    "deposit": { "payable": true, "body": [] },
                    "total": { "view": true, "body": [ { "return": { "state": "n" } } ] },
                    "thanks": { "on": "received", "body": [ { "fail": "no" } ] }
                }
            }"#,
        )
        .unwrap();

        let metadata = manifest.metadata();
        assert_eq!(metadata.members, vec!["deposit", "setup", "thanks", "total"]);
        assert_eq!(metadata.view, vec!["total"]);
        assert_eq!(metadata.payable, vec!["deposit"]);
        assert_eq!(metadata.deployed, vec!["setup"]);
        assert_eq!(metadata.received, vec!["thanks"]);
        assert_eq!(metadata.callable_members(), vec!["deposit", "total"]);
    }

    #[test]
    fn test_floats_are_rejected() {
        let parsed: Result<Manifest, _> = serde_json::from_str(
            r#"{ "members": { "f": { "body": [ { "return": { "lit": 1.5 } } ] } } }"#,
        );
        assert!(parsed.is_err());
    }
}
