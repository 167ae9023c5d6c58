//! `nop` and the constant pushes.
use tracing::trace;

use super::{operand_mismatch, InstructionHandler, InstructionHandlers};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::VmResult;
use crate::value::Value;

struct Nop;

impl InstructionHandler for Nop {
    fn process(&self, _: &Instruction, _: &mut ExecutionContext) -> VmResult<Step> {
        Ok(Step::Continue)
    }
}

/// `aconst_null`, `iconst_<i>`, `lconst_<l>`, `fconst_<f>` and
/// `dconst_<d>`.
struct PushConstant(Value);

impl InstructionHandler for PushConstant {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        push(context, self.0.clone())?;
        Ok(Step::Continue)
    }
}

/// `bipush` and `sipush`: the immediate was sign-extended by the decoder.
struct PushImmediate;

impl InstructionHandler for PushImmediate {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        match instruction.operand() {
            Operand::Int(value) => context.push(Value::Int(*value))?,
            other => return Err(operand_mismatch(instruction, other)),
        }
        Ok(Step::Continue)
    }
}

/// `ldc`, `ldc_w` and `ldc2_w`.
struct LoadConstant;

impl InstructionHandler for LoadConstant {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let constant = match instruction.operand() {
            Operand::Constant(constant) => constant,
            other => return Err(operand_mismatch(instruction, other)),
        };
        let value = match constant {
            Constant::Int(v) => Value::Int(*v),
            Constant::Float(v) => Value::Float(*v),
            Constant::Long(v) => Value::Long(*v),
            Constant::Double(v) => Value::Double(*v),
            Constant::String(v) => Value::from(v.as_str()),
            Constant::Type(name) => {
                trace!(class = %name, "loading class literal");
                Value::Class(context.vm().find_class(name)?)
            }
        };
        push(context, value)?;
        Ok(Step::Continue)
    }
}

fn push(context: &mut ExecutionContext, value: Value) -> VmResult<()> {
    if value.is_wide() {
        context.push_top(value)
    } else {
        context.push(value)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    table.set(NOP, Nop);
    table.set(ACONST_NULL, PushConstant(Value::Null));
    for (opcode, value) in (ICONST_M1..=ICONST_5).zip(-1..) {
        table.set(opcode, PushConstant(Value::Int(value)));
    }
    table.set(LCONST_0, PushConstant(Value::Long(0)));
    table.set(LCONST_1, PushConstant(Value::Long(1)));
    table.set(FCONST_0, PushConstant(Value::Float(0.0)));
    table.set(FCONST_1, PushConstant(Value::Float(1.0)));
    table.set(FCONST_2, PushConstant(Value::Float(2.0)));
    table.set(DCONST_0, PushConstant(Value::Double(0.0)));
    table.set(DCONST_1, PushConstant(Value::Double(1.0)));
    table.set(BIPUSH, PushImmediate);
    table.set(SIPUSH, PushImmediate);
    for opcode in [LDC, LDC_W, LDC2_W] {
        table.set(opcode, LoadConstant);
    }
}
