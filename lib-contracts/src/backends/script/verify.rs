//! Static checks run at deployment

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{VmError, VmResult};
use crate::limits::ExecutionLimits;
use crate::metadata::is_reserved;

use super::manifest::{Expr, Manifest, Stmt};

fn reject(reason: impl Into<String>) -> VmError {
    VmError::VerifyFailed(reason.into())
}

pub(super) fn verify_manifest(manifest: &Manifest, limits: &ExecutionLimits) -> VmResult<()> {
    if manifest.members.is_empty() {
        return Err(reject("manifest declares no members"));
    }

    let mut walker = Walker {
        manifest,
        limits,
        statements: 0,
        calls: BTreeMap::new(),
    };

    for (name, member) in &manifest.members {
        if name.is_empty() {
            return Err(reject("empty member name"));
        }
        if is_reserved(name) {
            return Err(reject(format!("member name '{}' is reserved", name)));
        }
        if member.view && member.on.is_some() {
            return Err(reject(format!("lifecycle hook '{}' cannot be a view", name)));
        }

        walker.calls.insert(name.as_str(), BTreeSet::new());
        walker.block(name, &member.body, 1)?;
    }

    detect_call_cycles(&walker.calls)
}

struct Walker<'m> {
    manifest: &'m Manifest,
    limits: &'m ExecutionLimits,
    statements: usize,
    /// caller → callees
    calls: BTreeMap<&'m str, BTreeSet<&'m str>>,
}

impl<'m> Walker<'m> {
    fn block(&mut self, owner: &'m str, stmts: &'m [Stmt], depth: usize) -> VmResult<()> {
        if depth > self.limits.max_nesting {
            return Err(reject(format!(
                "'{}' nests deeper than {} blocks",
                owner, self.limits.max_nesting
            )));
        }

        for stmt in stmts {
            self.statements += 1;
            if self.statements > self.limits.max_statements {
                return Err(reject(format!(
                    "manifest exceeds {} statements",
                    self.limits.max_statements
                )));
            }
            self.stmt(owner, stmt, depth)?;
        }
        Ok(())
    }

    fn stmt(&mut self, owner: &'m str, stmt: &'m Stmt, depth: usize) -> VmResult<()> {
        match stmt {
            Stmt::Set { key, value } => {
                if key.is_empty() {
                    return Err(reject(format!("'{}' writes an empty storage key", owner)));
                }
                self.expr(value, depth)
            }
            Stmt::Transfer { to, amount } => {
                self.expr(to, depth)?;
                self.expr(amount, depth)
            }
            Stmt::Require { cond, .. } => self.expr(cond, depth),
            Stmt::Fail(_) => Ok(()),
            Stmt::Return(value) => self.expr(value, depth),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond, depth)?;
                self.block(owner, then, depth + 1)?;
                self.block(owner, otherwise, depth + 1)
            }
            Stmt::Repeat { times, body } => {
                if *times > self.limits.max_repeat {
                    return Err(reject(format!(
                        "'{}' repeats {} times, limit is {}",
                        owner, times, self.limits.max_repeat
                    )));
                }
                self.block(owner, body, depth + 1)
            }
            Stmt::Call { member, args } => {
                if !self.manifest.members.contains_key(member) {
                    return Err(reject(format!("'{}' calls unknown member '{}'", owner, member)));
                }
                self.calls.entry(owner).or_default().insert(member.as_str());
                for arg in args {
                    self.expr(arg, depth)?;
                }
                Ok(())
            }
        }
    }

    fn expr(&self, expr: &Expr, depth: usize) -> VmResult<()> {
        if depth > self.limits.max_nesting {
            return Err(reject("expression nests too deeply"));
        }

        let (op, operands, arity_ok): (&str, &[Expr], bool) = match expr {
            Expr::Lit(_) | Expr::Param(_) | Expr::State(_) | Expr::Env(_) => return Ok(()),
            Expr::Balance(inner) | Expr::Not(inner) => return self.expr(inner, depth + 1),
            Expr::Add(items) => ("add", items.as_slice(), items.len() >= 2),
            Expr::Sub(items) => ("sub", items.as_slice(), items.len() == 2),
            Expr::Eq(items) => ("eq", items.as_slice(), items.len() == 2),
            Expr::Gt(items) => ("gt", items.as_slice(), items.len() == 2),
            Expr::Concat(items) => ("concat", items.as_slice(), !items.is_empty()),
        };

        if !arity_ok {
            return Err(reject(format!(
                "'{}' called with {} operands",
                op,
                operands.len()
            )));
        }
        for operand in operands {
            self.expr(operand, depth + 1)?;
        }
        Ok(())
    }
}

/// Any cycle in the member call graph could recurse without bound
fn detect_call_cycles(calls: &BTreeMap<&str, BTreeSet<&str>>) -> VmResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'g>(
        node: &'g str,
        calls: &'g BTreeMap<&str, BTreeSet<&str>>,
        marks: &mut BTreeMap<&'g str, Mark>,
    ) -> VmResult<()> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(reject(format!("recursive call cycle through '{}'", node)))
            }
            None => {}
        }

        marks.insert(node, Mark::Visiting);
        if let Some(callees) = calls.get(node) {
            for callee in callees {
                visit(callee, calls, marks)?;
            }
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    for node in calls.keys() {
        visit(node, calls, &mut marks)?;
    }
    Ok(())
}
