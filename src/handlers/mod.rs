//! Opcode handlers and the dispatch table mapping every opcode to one of
//! them.
//!
//! Handlers are grouped by instruction family, one submodule each. Each
//! submodule registers its handlers into [`InstructionHandlers`] when the
//! table is first built.
use once_cell::sync::Lazy;

use crate::bytecode::{Instruction, Label, Operand};
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::Value;

mod arrays;
mod compare;
mod constants;
mod control;
mod conversions;
mod locals;
mod math;
mod stack;
mod unsupported;

/// Strategy executing a single opcode against an invocation's state.
pub trait InstructionHandler: Send + Sync {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step>;
}

static HANDLERS: Lazy<InstructionHandlers> = Lazy::new(InstructionHandlers::build);

/// Dense opcode-indexed dispatch table, built once and shared read-only.
pub struct InstructionHandlers {
    handlers: Vec<Box<dyn InstructionHandler>>,
}

impl InstructionHandlers {
    /// Returns the process-wide table.
    pub fn get() -> &'static InstructionHandlers {
        &HANDLERS
    }

    fn build() -> Self {
        let mut table = Self {
            handlers: (0..=u8::MAX)
                .map(|_| Box::new(unsupported::Unsupported) as Box<dyn InstructionHandler>)
                .collect(),
        };
        constants::register(&mut table);
        locals::register(&mut table);
        arrays::register(&mut table);
        stack::register(&mut table);
        math::register(&mut table);
        conversions::register(&mut table);
        compare::register(&mut table);
        control::register(&mut table);
        table
    }

    fn set(&mut self, opcode: u8, handler: impl InstructionHandler + 'static) {
        self.handlers[usize::from(opcode)] = Box::new(handler);
    }

    pub fn handler(&self, opcode: u8) -> &dyn InstructionHandler {
        self.handlers[usize::from(opcode)].as_ref()
    }
}

/// Computational type of a stack value, as named by an opcode prefix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Kind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl Kind {
    /// Pops a value of this kind, with its `Top` half for wide kinds.
    pub(crate) fn pop(self, context: &mut ExecutionContext) -> VmResult<Value> {
        Ok(match self {
            Self::Int => Value::Int(context.pop_int()?),
            Self::Long => Value::Long(context.pop_long()?),
            Self::Float => Value::Float(context.pop_float()?),
            Self::Double => Value::Double(context.pop_double()?),
            Self::Reference => context.pop_reference()?,
        })
    }

    pub(crate) fn push(self, context: &mut ExecutionContext, value: Value) -> VmResult<()> {
        if self.is_wide() {
            context.push_top(value)
        } else {
            context.push(value)
        }
    }

    pub(crate) const fn is_wide(self) -> bool {
        matches!(self, Self::Long | Self::Double)
    }

    /// Whether `value` may sit in a local declared with this kind.
    pub(crate) fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Int => matches!(value, Value::Int(_) | Value::Byte(_) | Value::Short(_)),
            Self::Long => matches!(value, Value::Long(_)),
            Self::Float => matches!(value, Value::Float(_)),
            Self::Double => matches!(value, Value::Double(_)),
            Self::Reference => value.is_reference(),
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Reference => "reference",
        }
    }
}

/// Branch target of a jump instruction.
pub(crate) fn target(instruction: &Instruction) -> VmResult<Label> {
    match instruction.operand() {
        Operand::Jump(label) => Ok(*label),
        other => Err(operand_mismatch(instruction, other)),
    }
}

pub(crate) fn operand_mismatch(instruction: &Instruction, operand: &Operand) -> VmError {
    VmError::invalid(format!(
        "{} cannot take operand {operand:?}",
        instruction.mnemonic()
    ))
}


#[cfg(test)]
mod tests {
    use super::testing::eval;
    use super::*;
    use crate::bytecode::{self, *};

    #[test]
    fn every_opcode_has_a_handler() {
        let table = InstructionHandlers::get();
        for opcode in 0..=u8::MAX {
            let _ = table.handler(opcode);
        }
        assert!(std::ptr::eq(table, InstructionHandlers::get()));
    }

    #[test]
    fn net_stack_effect_matches_arity() {
        let i = Value::Int(6);
        let l = Value::Long(6);
        let f = Value::Float(6.0);
        let d = Value::Double(6.0);
        let t = Value::Top;
        let cases: Vec<(Vec<Value>, Instruction, isize)> = vec![
            (vec![], Instruction::new(NOP), 0),
            (vec![], Instruction::new(ICONST_1), 1),
            (vec![], Instruction::new(LCONST_1), 2),
            (vec![i.clone(), i.clone()], Instruction::new(IADD), -1),
            (vec![i.clone(), i.clone()], Instruction::new(IMUL), -1),
            (vec![l.clone(), t.clone(), l.clone(), t.clone()], Instruction::new(LADD), -2),
            (vec![l.clone(), t.clone(), i.clone()], Instruction::new(LSHL), -1),
            (vec![l.clone(), t.clone(), l.clone(), t.clone()], Instruction::new(LCMP), -3),
            (vec![f.clone(), f.clone()], Instruction::new(FCMPL), -1),
            (vec![d.clone(), t.clone(), d.clone(), t.clone()], Instruction::new(DCMPG), -3),
            (vec![i.clone()], Instruction::new(I2L), 1),
            (vec![d.clone(), t.clone()], Instruction::new(D2I), -1),
            (vec![i.clone()], Instruction::new(INEG), 0),
            (vec![i.clone()], Instruction::new(DUP), 1),
            (vec![l.clone(), t.clone()], Instruction::new(DUP2), 2),
            (vec![i.clone(), i.clone()], Instruction::new(DUP_X1), 1),
            (vec![i.clone(), i.clone()], Instruction::new(SWAP), 0),
            (vec![i.clone()], Instruction::new(POP), -1),
            (vec![l.clone(), t.clone()], Instruction::new(POP2), -2),
            (vec![i.clone()], Instruction::jump(IFEQ, 0), -1),
            (vec![i.clone(), i.clone()], Instruction::jump(IF_ICMPLT, 0), -2),
        ];
        for (stack, instruction, effect) in cases {
            let mnemonic = bytecode::mnemonic(instruction.opcode());
            let before = stack.len() as isize;
            let (_, left) = eval(&stack, instruction).unwrap();
            assert_eq!(left.len() as isize - before, effect, "{mnemonic}");
        }
    }
}
