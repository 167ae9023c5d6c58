//! Comparisons and conditional branches.
use std::cmp::Ordering;

use super::{target, InstructionHandler, InstructionHandlers};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::Value;

fn ordering(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

struct LongCompare;

impl InstructionHandler for LongCompare {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_long()?;
        let a = context.pop_long()?;
        context.push(Value::Int(ordering(a.cmp(&b))))?;
        Ok(Step::Continue)
    }
}

/// `fcmp<op>`: `on_nan` is -1 for the `l` form and 1 for the `g` form.
struct FloatCompare {
    on_nan: i32,
}

impl InstructionHandler for FloatCompare {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_float()?;
        let a = context.pop_float()?;
        let result = a.partial_cmp(&b).map_or(self.on_nan, ordering);
        context.push(Value::Int(result))?;
        Ok(Step::Continue)
    }
}

struct DoubleCompare {
    on_nan: i32,
}

impl InstructionHandler for DoubleCompare {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_double()?;
        let a = context.pop_double()?;
        let result = a.partial_cmp(&b).map_or(self.on_nan, ordering);
        context.push(Value::Int(result))?;
        Ok(Step::Continue)
    }
}

fn branch(
    context: &mut ExecutionContext,
    instruction: &Instruction,
    taken: bool,
) -> VmResult<Step> {
    if taken {
        context.jump(target(instruction)?);
    }
    Ok(Step::Continue)
}

/// `if<cond>`: compares an int against zero.
struct IfZero(fn(i32) -> bool);

impl InstructionHandler for IfZero {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let value = context.pop_int()?;
        branch(context, instruction, (self.0)(value))
    }
}

struct IfIntCompare(fn(i32, i32) -> bool);

impl InstructionHandler for IfIntCompare {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_int()?;
        let a = context.pop_int()?;
        branch(context, instruction, (self.0)(a, b))
    }
}

/// `if_acmpeq` and `if_acmpne`.
struct IfReferenceCompare {
    equal: bool,
}

impl InstructionHandler for IfReferenceCompare {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_reference()?;
        let a = context.pop_reference()?;
        let same = a
            .same_reference(&b)
            .ok_or_else(|| VmError::invalid("reference comparison of non-references"))?;
        branch(context, instruction, same == self.equal)
    }
}

/// `ifnull` and `ifnonnull`.
struct IfNull {
    null: bool,
}

impl InstructionHandler for IfNull {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let value = context.pop_reference()?;
        branch(context, instruction, matches!(value, Value::Null) == self.null)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    table.set(LCMP, LongCompare);
    table.set(FCMPL, FloatCompare { on_nan: -1 });
    table.set(FCMPG, FloatCompare { on_nan: 1 });
    table.set(DCMPL, DoubleCompare { on_nan: -1 });
    table.set(DCMPG, DoubleCompare { on_nan: 1 });

    table.set(IFEQ, IfZero(|v| v == 0));
    table.set(IFNE, IfZero(|v| v != 0));
    table.set(IFLT, IfZero(|v| v < 0));
    table.set(IFGE, IfZero(|v| v >= 0));
    table.set(IFGT, IfZero(|v| v > 0));
    table.set(IFLE, IfZero(|v| v <= 0));

    table.set(IF_ICMPEQ, IfIntCompare(|a, b| a == b));
    table.set(IF_ICMPNE, IfIntCompare(|a, b| a != b));
    table.set(IF_ICMPLT, IfIntCompare(|a, b| a < b));
    table.set(IF_ICMPGE, IfIntCompare(|a, b| a >= b));
    table.set(IF_ICMPGT, IfIntCompare(|a, b| a > b));
    table.set(IF_ICMPLE, IfIntCompare(|a, b| a <= b));

    table.set(IF_ACMPEQ, IfReferenceCompare { equal: true });
    table.set(IF_ACMPNE, IfReferenceCompare { equal: false });
    table.set(IFNULL, IfNull { null: true });
    table.set(IFNONNULL, IfNull { null: false });
}
