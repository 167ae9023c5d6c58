//! Widening and narrowing conversions (`i2l` through `i2s`).
use super::{InstructionHandler, InstructionHandlers, Kind};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::Value;

struct Convert {
    from: Kind,
    to: Kind,
}

impl InstructionHandler for Convert {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let value = self.from.pop(context)?;
        let converted = match self.to {
            Kind::Int => value.to_int().map(Value::Int),
            Kind::Long => value.to_long().map(Value::Long),
            Kind::Float => value.to_float().map(Value::Float),
            Kind::Double => value.to_double().map(Value::Double),
            Kind::Reference => None,
        }
        .ok_or_else(|| {
            VmError::invalid(format!(
                "{} cannot convert {}",
                instruction.mnemonic(),
                value.kind_name()
            ))
        })?;
        self.to.push(context, converted)?;
        Ok(Step::Continue)
    }
}

/// `i2b`, `i2c`, `i2s`: the result stays an int.
struct Narrow(fn(i32) -> i32);

impl InstructionHandler for Narrow {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let value = context.pop_int()?;
        context.push(Value::Int((self.0)(value)))?;
        Ok(Step::Continue)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    use Kind::*;
    let conversions = [
        (I2L, Int, Long),
        (I2F, Int, Float),
        (I2D, Int, Double),
        (L2I, Long, Int),
        (L2F, Long, Float),
        (L2D, Long, Double),
        (F2I, Float, Int),
        (F2L, Float, Long),
        (F2D, Float, Double),
        (D2I, Double, Int),
        (D2L, Double, Long),
        (D2F, Double, Float),
    ];
    for (opcode, from, to) in conversions {
        table.set(opcode, Convert { from, to });
    }
    table.set(I2B, Narrow(|v| i32::from(v as i8)));
    table.set(I2C, Narrow(|v| i32::from(v as u16)));
    table.set(I2S, Narrow(|v| i32::from(v as i16)));
}

#[cfg(test)]
mod tests {
    use super::super::testing::after;
    use super::*;

    #[test]
    fn widening() {
        assert_eq!(
            after(&[Value::Int(-3)], Instruction::new(I2L)),
            vec![Value::Long(-3), Value::Top]
        );
        assert_eq!(
            after(&[Value::Float(1.5)], Instruction::new(F2D)),
            vec![Value::Double(1.5), Value::Top]
        );
    }

    #[test]
    fn narrowing_saturates() {
        assert_eq!(
            after(&[Value::Double(1e100), Value::Top], Instruction::new(D2I)),
            vec![Value::Int(i32::MAX)]
        );
        assert_eq!(
            after(&[Value::Float(f32::NAN)], Instruction::new(F2L)),
            vec![Value::Long(0), Value::Top]
        );
        assert_eq!(
            after(&[Value::Long(0x1_2345_6789), Value::Top], Instruction::new(L2I)),
            vec![Value::Int(0x2345_6789)]
        );
    }

    #[test]
    fn int_truncation() {
        assert_eq!(after(&[Value::Int(0x1ff)], Instruction::new(I2B)), vec![Value::Int(-1)]);
        assert_eq!(after(&[Value::Int(-1)], Instruction::new(I2C)), vec![Value::Int(0xffff)]);
        assert_eq!(after(&[Value::Int(0x18000)], Instruction::new(I2S)), vec![Value::Int(-32768)]);
    }
}
