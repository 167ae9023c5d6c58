//! Arithmetic, bitwise and shift instructions.
//!
//! Integer arithmetic wraps; shift distances are masked to the operand
//! width; integer division by zero throws `ArithmeticException`.
use super::{InstructionHandler, InstructionHandlers, Kind};
use crate::bootstrap::ARITHMETIC_EXCEPTION;
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::VmResult;
use crate::value::Value;

const DIVIDE_BY_ZERO: &str = "/ by zero";

/// `None` from the operation means division by zero.
struct IntBinary(fn(i32, i32) -> Option<i32>);

impl InstructionHandler for IntBinary {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_int()?;
        let a = context.pop_int()?;
        match (self.0)(a, b) {
            Some(result) => {
                context.push(Value::Int(result))?;
                Ok(Step::Continue)
            }
            None => context.raise(ARITHMETIC_EXCEPTION, DIVIDE_BY_ZERO),
        }
    }
}

struct LongBinary(fn(i64, i64) -> Option<i64>);

impl InstructionHandler for LongBinary {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_long()?;
        let a = context.pop_long()?;
        match (self.0)(a, b) {
            Some(result) => {
                context.push_top(Value::Long(result))?;
                Ok(Step::Continue)
            }
            None => context.raise(ARITHMETIC_EXCEPTION, DIVIDE_BY_ZERO),
        }
    }
}

/// `lshl`, `lshr`, `lushr`: the distance is an int.
struct LongShift(fn(i64, u32) -> i64);

impl InstructionHandler for LongShift {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let distance = (context.pop_int()? & 0x3f) as u32;
        let value = context.pop_long()?;
        context.push_top(Value::Long((self.0)(value, distance)))?;
        Ok(Step::Continue)
    }
}

struct FloatBinary(fn(f32, f32) -> f32);

impl InstructionHandler for FloatBinary {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_float()?;
        let a = context.pop_float()?;
        context.push(Value::Float((self.0)(a, b)))?;
        Ok(Step::Continue)
    }
}

struct DoubleBinary(fn(f64, f64) -> f64);

impl InstructionHandler for DoubleBinary {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let b = context.pop_double()?;
        let a = context.pop_double()?;
        context.push_top(Value::Double((self.0)(a, b)))?;
        Ok(Step::Continue)
    }
}

struct Negate(Kind);

impl InstructionHandler for Negate {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let negated = match self.0.pop(context)? {
            Value::Int(v) => Value::Int(v.wrapping_neg()),
            Value::Long(v) => Value::Long(v.wrapping_neg()),
            Value::Float(v) => Value::Float(-v),
            Value::Double(v) => Value::Double(-v),
            other => other,
        };
        self.0.push(context, negated)?;
        Ok(Step::Continue)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    table.set(IADD, IntBinary(|a, b| Some(a.wrapping_add(b))));
    table.set(ISUB, IntBinary(|a, b| Some(a.wrapping_sub(b))));
    table.set(IMUL, IntBinary(|a, b| Some(a.wrapping_mul(b))));
    table.set(IDIV, IntBinary(|a, b| (b != 0).then(|| a.wrapping_div(b))));
    table.set(IREM, IntBinary(|a, b| (b != 0).then(|| a.wrapping_rem(b))));
    table.set(IAND, IntBinary(|a, b| Some(a & b)));
    table.set(IOR, IntBinary(|a, b| Some(a | b)));
    table.set(IXOR, IntBinary(|a, b| Some(a ^ b)));
    table.set(ISHL, IntBinary(|a, b| Some(a.wrapping_shl(b as u32 & 0x1f))));
    table.set(ISHR, IntBinary(|a, b| Some(a.wrapping_shr(b as u32 & 0x1f))));
    table.set(
        IUSHR,
        IntBinary(|a, b| Some(((a as u32) >> (b as u32 & 0x1f)) as i32)),
    );

    table.set(LADD, LongBinary(|a, b| Some(a.wrapping_add(b))));
    table.set(LSUB, LongBinary(|a, b| Some(a.wrapping_sub(b))));
    table.set(LMUL, LongBinary(|a, b| Some(a.wrapping_mul(b))));
    table.set(LDIV, LongBinary(|a, b| (b != 0).then(|| a.wrapping_div(b))));
    table.set(LREM, LongBinary(|a, b| (b != 0).then(|| a.wrapping_rem(b))));
    table.set(LAND, LongBinary(|a, b| Some(a & b)));
    table.set(LOR, LongBinary(|a, b| Some(a | b)));
    table.set(LXOR, LongBinary(|a, b| Some(a ^ b)));
    table.set(LSHL, LongShift(|a, n| a.wrapping_shl(n)));
    table.set(LSHR, LongShift(|a, n| a.wrapping_shr(n)));
    table.set(LUSHR, LongShift(|a, n| ((a as u64) >> n) as i64));

    table.set(FADD, FloatBinary(|a, b| a + b));
    table.set(FSUB, FloatBinary(|a, b| a - b));
    table.set(FMUL, FloatBinary(|a, b| a * b));
    table.set(FDIV, FloatBinary(|a, b| a / b));
    table.set(FREM, FloatBinary(|a, b| a % b));

    table.set(DADD, DoubleBinary(|a, b| a + b));
    table.set(DSUB, DoubleBinary(|a, b| a - b));
    table.set(DMUL, DoubleBinary(|a, b| a * b));
    table.set(DDIV, DoubleBinary(|a, b| a / b));
    table.set(DREM, DoubleBinary(|a, b| a % b));

    table.set(INEG, Negate(Kind::Int));
    table.set(LNEG, Negate(Kind::Long));
    table.set(FNEG, Negate(Kind::Float));
    table.set(DNEG, Negate(Kind::Double));
}
