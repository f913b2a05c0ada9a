//! Textual rendering of functions and modules.
//!
//! The format is meant for humans (logs, CLI output, test failure messages):
//!
//! ```text
//! define i32 @sum(i32 %n, i32 %acc) {
//! entry:
//!   %retval = alloca i32
//!   %cmp = cmp eq %n, 0
//!   br %cmp, label %base, label %recurse
//! ...
//! }
//! ```
//!
//! Unnamed values are numbered in order of first definition.

use std::{collections::HashMap, fmt};

use crate::ir::{BlockId, Callee, Function, Module, Op, Operand, Terminator, ValueId};

struct Namer<'a> {
    func: &'a Function,
    numbers: HashMap<ValueId, usize>,
}

impl<'a> Namer<'a> {
    fn new(func: &'a Function) -> Self {
        let mut numbers = HashMap::new();
        let mut next = 0usize;
        let mut number = |value: ValueId| {
            if func.value(value).is_some_and(|v| v.name.is_none()) {
                numbers.entry(value).or_insert_with(|| {
                    next += 1;
                    next - 1
                });
            }
        };
        for &param in func.params() {
            number(param);
        }
        for (block_id, block) in func.iter_blocks() {
            for phi in block.phis() {
                number(phi.result());
            }
            for (_, inst) in func.block_insts(block_id) {
                if let Some(result) = inst.result() {
                    number(result);
                }
            }
        }
        Self { func, numbers }
    }

    fn value(&self, value: ValueId) -> String {
        match self.func.value(value) {
            Some(data) => match &data.name {
                Some(name) => format!("%{name}"),
                None => format!("%{}", self.numbers.get(&value).copied().unwrap_or_default()),
            },
            None => "%<deleted>".to_string(),
        }
    }

    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Value(v) => self.value(*v),
            Operand::Const(c) => c.to_string(),
            Operand::Undef(_) => "undef".to_string(),
        }
    }

    fn block(&self, block: BlockId) -> String {
        self.func
            .block(block)
            .map_or_else(|| "%<deleted>".to_string(), |b| format!("%{}", b.name()))
    }

    fn op(&self, op: &Op) -> String {
        match op {
            Op::Binary { op, lhs, rhs } => {
                format!("{op} {}, {}", self.operand(lhs), self.operand(rhs))
            }
            Op::Cmp {
                predicate,
                lhs,
                rhs,
            } => format!(
                "cmp {predicate} {}, {}",
                self.operand(lhs),
                self.operand(rhs)
            ),
            Op::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|a| self.operand(a)).collect();
                let target = match callee {
                    Callee::Direct(_) => callee.to_string(),
                    Callee::Indirect(target) => self.operand(target),
                };
                format!("call {target}({})", args.join(", "))
            }
            Op::Alloca { ty } => format!("alloca {ty}"),
            Op::Load { ptr, ty } => format!("load {ty}, {}", self.operand(ptr)),
            Op::Store { value, ptr } => {
                format!("store {}, {}", self.operand(value), self.operand(ptr))
            }
            Op::Debug { value } => format!("dbg {}", self.operand(value)),
        }
    }

    fn terminator(&self, term: &Terminator) -> String {
        match term {
            Terminator::Jump { target } => format!("jump label {}", self.block(*target)),
            Terminator::Branch {
                cond,
                true_target,
                false_target,
            } => format!(
                "br {}, label {}, label {}",
                self.operand(cond),
                self.block(*true_target),
                self.block(*false_target)
            ),
            Terminator::Return { value: Some(value) } => format!("ret {}", self.operand(value)),
            Terminator::Return { value: None } => "ret void".to_string(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let namer = Namer::new(self);
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|&p| {
                let ty = self.value(p).map_or_else(String::new, |v| v.ty.to_string());
                format!("{ty} {}", namer.value(p))
            })
            .collect();
        writeln!(
            f,
            "define {} @{}({}) {{",
            self.return_type(),
            self.name(),
            params.join(", ")
        )?;

        for (block_id, block) in self.iter_blocks() {
            let preds: Vec<String> = self
                .block_predecessors(block_id)
                .iter()
                .filter_map(|&p| self.block(p).map(|b| b.name().to_string()))
                .collect();
            if preds.is_empty() {
                writeln!(f, "{}:", block.name())?;
            } else {
                writeln!(f, "{}:    ; preds = {}", block.name(), preds.join(", "))?;
            }

            for phi in block.phis() {
                let ty = self
                    .value(phi.result())
                    .map_or_else(String::new, |v| v.ty.to_string());
                let incoming: Vec<String> = phi
                    .operands()
                    .iter()
                    .map(|op| {
                        format!(
                            "[{}, {}]",
                            namer.operand(&op.value),
                            namer.block(op.predecessor)
                        )
                    })
                    .collect();
                writeln!(
                    f,
                    "  {} = phi {ty} {}",
                    namer.value(phi.result()),
                    incoming.join(", ")
                )?;
            }

            for (_, inst) in self.block_insts(block_id) {
                match inst.result() {
                    Some(result) => {
                        writeln!(f, "  {} = {}", namer.value(result), namer.op(inst.op()))?;
                    }
                    None => writeln!(f, "  {}", namer.op(inst.op()))?,
                }
            }

            match block.terminator() {
                Some(term) => writeln!(f, "  {}", namer.terminator(term))?,
                None => writeln!(f, "  <no terminator>")?,
            }
        }

        write!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, function) in self.functions().iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
