//! Step-metered manifest interpreter

use lib_types::{Address, Amount, Value};

use crate::context::ExecutionContext;
use crate::errors::{VmError, VmResult};
use crate::limits::ExecutionLimits;

use super::manifest::{EnvField, Expr, Hook, Manifest, Stmt};

enum Flow {
    Next,
    Return(Value),
}

pub(super) struct Interpreter<'m, 'c, 'a> {
    manifest: &'m Manifest,
    ctx: &'c mut ExecutionContext<'a>,
    steps: u64,
    max_steps: u64,
    max_depth: usize,
    depth: usize,
}

impl<'m, 'c, 'a> Interpreter<'m, 'c, 'a> {
    pub(super) fn new(
        manifest: &'m Manifest,
        ctx: &'c mut ExecutionContext<'a>,
        limits: &ExecutionLimits,
    ) -> Self {
        Self {
            manifest,
            ctx,
            steps: 0,
            max_steps: limits.max_steps,
            max_depth: limits.max_nesting,
            depth: 0,
        }
    }

    /// Run every member registered for `hook`, in name order
    pub(super) fn run_hooks(&mut self, hook: Hook) -> VmResult<Value> {
        let manifest = self.manifest;
        for (name, member) in &manifest.members {
            if member.on == Some(hook) {
                self.invoke(name, Vec::new())?;
            }
        }
        Ok(Value::Null)
    }

    pub(super) fn invoke(&mut self, name: &str, params: Vec<Value>) -> VmResult<Value> {
        let manifest = self.manifest;
        let member = manifest
            .members
            .get(name)
            .ok_or_else(|| VmError::FunctionNotFound(name.to_string()))?;

        if self.depth >= self.max_depth {
            return Err(VmError::ContractFailed(format!(
                "call depth limit {} reached",
                self.max_depth
            )));
        }

        self.depth += 1;
        let flow = self.block(&member.body, &params);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Null),
        }
    }

    fn charge(&mut self) -> VmResult<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(VmError::OutOfSteps(self.max_steps));
        }
        Ok(())
    }

    fn block(&mut self, stmts: &'m [Stmt], params: &[Value]) -> VmResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.stmt(stmt, params)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn stmt(&mut self, stmt: &'m Stmt, params: &[Value]) -> VmResult<Flow> {
        self.charge()?;

        match stmt {
            Stmt::Set { key, value } => {
                let value = self.eval(value, params)?;
                self.ctx.set_state(key.clone(), value)?;
            }
            Stmt::Transfer { to, amount } => {
                let to = self.eval(to, params)?;
                let to = to
                    .as_str()
                    .map(Address::from)
                    .ok_or_else(|| type_error("transfer target", "string", &to))?;
                let amount = self.eval(amount, params)?;
                let amount = to_amount(&amount)?;
                self.ctx.transfer(&to, amount)?;
            }
            Stmt::Require { cond, message } => {
                if !self.eval(cond, params)?.is_truthy() {
                    return Err(VmError::ContractFailed(
                        message.clone().unwrap_or_else(|| "requirement failed".to_string()),
                    ));
                }
            }
            Stmt::Fail(message) => return Err(VmError::ContractFailed(message.clone())),
            Stmt::Return(value) => return Ok(Flow::Return(self.eval(value, params)?)),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let branch = if self.eval(cond, params)?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                return self.block(branch, params);
            }
            Stmt::Repeat { times, body } => {
                for _ in 0..*times {
                    if let Flow::Return(value) = self.block(body, params)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Call { member, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, params))
                    .collect::<VmResult<Vec<_>>>()?;
                self.invoke(member, args)?;
            }
        }
        Ok(Flow::Next)
    }

    fn eval(&mut self, expr: &Expr, params: &[Value]) -> VmResult<Value> {
        self.charge()?;

        match expr {
            Expr::Lit(value) => Ok(value.clone()),
            Expr::Param(index) => params
                .get(*index)
                .cloned()
                .ok_or_else(|| VmError::InvalidParams(format!("missing parameter {}", index))),
            Expr::State(key) => Ok(self.ctx.get_state(key)?.unwrap_or_default()),
            Expr::Env(field) => self.env(*field),
            Expr::Balance(address) => {
                let address = self.eval(address, params)?;
                let address = address
                    .as_str()
                    .map(Address::from)
                    .ok_or_else(|| type_error("balance address", "string", &address))?;
                from_amount(self.ctx.balance_of(&address)?)
            }
            Expr::Add(items) => {
                let mut total: i64 = 0;
                for item in items {
                    let n = self.eval_int(item, params, "add")?;
                    total = total.checked_add(n).ok_or_else(overflow)?;
                }
                Ok(Value::Int(total))
            }
            Expr::Sub(items) => {
                let (a, b) = self.eval_pair(items, params, "sub")?;
                a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
            }
            Expr::Gt(items) => {
                let (a, b) = self.eval_pair(items, params, "gt")?;
                Ok(Value::Bool(a > b))
            }
            Expr::Eq(items) => match items.as_slice() {
                [a, b] => {
                    let a = self.eval(a, params)?;
                    let b = self.eval(b, params)?;
                    Ok(Value::Bool(a == b))
                }
                _ => Err(VmError::ContractFailed("eq takes two operands".to_string())),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner, params)?.is_truthy())),
            Expr::Concat(items) => {
                let mut out = String::new();
                for item in items {
                    out.push_str(&self.eval(item, params)?.to_string());
                }
                Ok(Value::Str(out))
            }
        }
    }

    fn eval_int(&mut self, expr: &Expr, params: &[Value], op: &str) -> VmResult<i64> {
        let value = self.eval(expr, params)?;
        value.as_int().ok_or_else(|| type_error(op, "int", &value))
    }

    fn eval_pair(&mut self, items: &[Expr], params: &[Value], op: &str) -> VmResult<(i64, i64)> {
        match items {
            [a, b] => Ok((self.eval_int(a, params, op)?, self.eval_int(b, params, op)?)),
            _ => Err(VmError::ContractFailed(format!("{} takes two operands", op))),
        }
    }

    fn env(&self, field: EnvField) -> VmResult<Value> {
        let env = self.ctx.env();
        Ok(match field {
            EnvField::Sender => env
                .sender
                .as_ref()
                .map(|s| Value::from(s.as_str()))
                .unwrap_or_default(),
            EnvField::Value => from_amount(env.value)?,
            EnvField::Fee => from_amount(env.fee)?,
            EnvField::Address => Value::from(env.contract.as_str()),
            EnvField::BlockNumber => match env.block {
                Some(block) => from_amount(block.number)?,
                None => Value::Null,
            },
            EnvField::BlockTimestamp => match env.block {
                Some(block) => from_amount(block.timestamp)?,
                None => Value::Null,
            },
            EnvField::TxHash => env
                .tx_hash
                .map(|hash| Value::Str(hash.to_string()))
                .unwrap_or_default(),
        })
    }
}

fn overflow() -> VmError {
    VmError::ContractFailed("integer overflow".to_string())
}

fn type_error(what: &str, expected: &str, got: &Value) -> VmError {
    VmError::ContractFailed(format!(
        "{} expects {}, got {}",
        what,
        expected,
        got.type_name()
    ))
}

fn to_amount(value: &Value) -> VmResult<Amount> {
    let n = value
        .as_int()
        .ok_or_else(|| type_error("transfer amount", "int", value))?;
    Amount::try_from(n).map_err(|_| VmError::ContractFailed(format!("negative amount {}", n)))
}

fn from_amount(amount: u64) -> VmResult<Value> {
    i64::try_from(amount)
        .map(Value::Int)
        .map_err(|_| VmError::ContractFailed(format!("amount {} out of range", amount)))
}
