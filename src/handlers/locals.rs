//! Typed loads and stores between the locals and the operand stack.
use super::{operand_mismatch, InstructionHandler, InstructionHandlers, Kind};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Local slot addressed by `instruction`: the fixed slot of the `_<n>`
/// forms, the operand otherwise.
fn slot(instruction: &Instruction, fixed: Option<u16>) -> VmResult<usize> {
    match (fixed, instruction.operand()) {
        (Some(index), _) => Ok(usize::from(index)),
        (None, Operand::Local(index)) => Ok(usize::from(*index)),
        (None, other) => Err(operand_mismatch(instruction, other)),
    }
}

struct Load {
    kind: Kind,
    fixed: Option<u16>,
}

impl InstructionHandler for Load {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let index = slot(instruction, self.fixed)?;
        let value = if self.kind.is_wide() {
            context.load_wide(index)?
        } else {
            context.load(index)?
        };
        if !self.kind.accepts(&value) {
            return Err(VmError::invalid(format!(
                "local {index} holds {}, not {}",
                value.kind_name(),
                self.kind.name()
            )));
        }
        self.kind.push(context, value)?;
        Ok(Step::Continue)
    }
}

struct Store {
    kind: Kind,
    fixed: Option<u16>,
}

impl InstructionHandler for Store {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let index = slot(instruction, self.fixed)?;
        let value = self.kind.pop(context)?;
        if self.kind.is_wide() {
            context.store_wide(index, value)?;
        } else {
            context.store(index, value)?;
        }
        Ok(Step::Continue)
    }
}

/// `iinc`: adds a signed constant to an int local in place.
struct Increment;

impl InstructionHandler for Increment {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let (local, delta) = match instruction.operand() {
            Operand::Increment { local, delta } => (usize::from(*local), i32::from(*delta)),
            other => return Err(operand_mismatch(instruction, other)),
        };
        let value = context.load(local)?;
        let current = match value {
            Value::Int(v) => v,
            Value::Byte(_) | Value::Short(_) => value.to_int().unwrap_or_default(),
            other => {
                return Err(VmError::invalid(format!(
                    "iinc on local {local} holding {}",
                    other.kind_name()
                )))
            }
        };
        context.store(local, Value::Int(current.wrapping_add(delta)))?;
        Ok(Step::Continue)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    let families = [
        (ILOAD, ILOAD_0, ISTORE, ISTORE_0, Kind::Int),
        (LLOAD, LLOAD_0, LSTORE, LSTORE_0, Kind::Long),
        (FLOAD, FLOAD_0, FSTORE, FSTORE_0, Kind::Float),
        (DLOAD, DLOAD_0, DSTORE, DSTORE_0, Kind::Double),
        (ALOAD, ALOAD_0, ASTORE, ASTORE_0, Kind::Reference),
    ];
    for (load, load_0, store, store_0, kind) in families {
        table.set(load, Load { kind, fixed: None });
        table.set(store, Store { kind, fixed: None });
        for n in 0..4u8 {
            let fixed = Some(u16::from(n));
            table.set(load_0 + n, Load { kind, fixed });
            table.set(store_0 + n, Store { kind, fixed });
        }
    }
    table.set(IINC, Increment);
}
