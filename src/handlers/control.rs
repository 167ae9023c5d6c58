//! Unconditional transfers, switches, returns and `athrow`.
use super::{operand_mismatch, target, InstructionHandler, InstructionHandlers, Kind};
use crate::bootstrap::{NULL_POINTER_EXCEPTION, THROWABLE};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::descriptor::FieldType;
use crate::error::{VmError, VmResult};
use crate::value::Value;

struct Goto;

impl InstructionHandler for Goto {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        context.jump(target(instruction)?);
        Ok(Step::Continue)
    }
}

struct TableSwitch;

impl InstructionHandler for TableSwitch {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let key = context.pop_int()?;
        let label = match instruction.operand() {
            Operand::TableSwitch {
                low,
                high,
                default,
                targets,
            } => {
                if (*low..=*high).contains(&key) {
                    let offset = (i64::from(key) - i64::from(*low)) as usize;
                    *targets.get(offset).ok_or_else(|| {
                        VmError::invalid("tableswitch has fewer targets than its range")
                    })?
                } else {
                    *default
                }
            }
            other => return Err(operand_mismatch(instruction, other)),
        };
        context.jump(label);
        Ok(Step::Continue)
    }
}

struct LookupSwitch;

impl InstructionHandler for LookupSwitch {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let key = context.pop_int()?;
        let label = match instruction.operand() {
            Operand::LookupSwitch { default, pairs } => pairs
                .iter()
                .find(|(matched, _)| *matched == key)
                .map_or(*default, |(_, label)| *label),
            other => return Err(operand_mismatch(instruction, other)),
        };
        context.jump(label);
        Ok(Step::Continue)
    }
}

/// `<t>return`; `None` is the `void` return.
struct Return(Option<Kind>);

impl InstructionHandler for Return {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let declared = context.method().signature().return_type();
        let Some(kind) = self.0 else {
            if let Some(ret) = declared {
                return Err(VmError::invalid(format!("void return from a method returning {ret}")));
            }
            return context.complete(None);
        };
        let value = kind.pop(context)?;
        // boolean, byte, char and short results travel as ints
        let value = match (declared, value) {
            (Some(FieldType::Boolean), Value::Int(v)) => Value::Int(v & 1),
            (Some(FieldType::Byte), Value::Int(v)) => Value::Int(i32::from(v as i8)),
            (Some(FieldType::Char), Value::Int(v)) => Value::Int(i32::from(v as u16)),
            (Some(FieldType::Short), Value::Int(v)) => Value::Int(i32::from(v as i16)),
            (None, _) => {
                return Err(VmError::invalid(format!(
                    "{} value returned from a void method",
                    kind.name()
                )))
            }
            (_, value) => value,
        };
        context.complete(Some(value))
    }
}

struct Throw;

impl InstructionHandler for Throw {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        match context.pop_reference()? {
            Value::Null => context.raise(NULL_POINTER_EXCEPTION, "cannot throw null"),
            Value::Object(object) if object.class().is_subclass_of(THROWABLE)? => {
                Ok(Step::Threw(object))
            }
            other => Err(VmError::invalid(format!(
                "athrow of a non-throwable {}",
                other.kind_name()
            ))),
        }
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    table.set(GOTO, Goto);
    table.set(GOTO_W, Goto);
    table.set(TABLESWITCH, TableSwitch);
    table.set(LOOKUPSWITCH, LookupSwitch);
    table.set(IRETURN, Return(Some(Kind::Int)));
    table.set(LRETURN, Return(Some(Kind::Long)));
    table.set(FRETURN, Return(Some(Kind::Float)));
    table.set(DRETURN, Return(Some(Kind::Double)));
    table.set(ARETURN, Return(Some(Kind::Reference)));
    table.set(RETURN, Return(None));
    table.set(ATHROW, Throw);
}

#[cfg(test)]
mod tests {
    use super::super::testing::{eval, run, scratch, thrown};
    use super::*;
    use crate::bootstrap::ARITHMETIC_EXCEPTION;
    use crate::value::Object;

    fn switch_target(key: i32, instruction: Instruction) -> usize {
        let (vm, method) = scratch();
        let mut context = ExecutionContext::new(&method, vm);
        context.push(Value::Int(key)).unwrap();
        run(&mut context, instruction).unwrap();
        context.cursor()
    }

    #[test]
    fn tableswitch_picks_by_offset() {
        let switch = Instruction::with(
            TABLESWITCH,
            Operand::TableSwitch {
                low: -1,
                high: 1,
                default: Label(9),
                targets: vec![Label(3), Label(4), Label(5)],
            },
        );
        assert_eq!(switch_target(-1, switch.clone()), 3);
        assert_eq!(switch_target(1, switch.clone()), 5);
        assert_eq!(switch_target(2, switch.clone()), 9);
        assert_eq!(switch_target(i32::MIN, switch), 9);
    }

    #[test]
    fn lookupswitch_matches_keys() {
        let switch = Instruction::with(
            LOOKUPSWITCH,
            Operand::LookupSwitch {
                default: Label(1),
                pairs: vec![(10, Label(2)), (1000, Label(3))],
            },
        );
        assert_eq!(switch_target(1000, switch.clone()), 3);
        assert_eq!(switch_target(11, switch), 1);
    }

    #[test]
    fn void_return_completes() {
        let (step, left) = eval(&[Value::Int(1)], Instruction::new(RETURN)).unwrap();
        assert!(matches!(step, Step::Completed));
        assert!(left.is_empty());
    }

    #[test]
    fn typed_return_must_match_the_descriptor() {
        // the scratch method is declared `()V`
        let err = eval(&[Value::Int(1)], Instruction::new(IRETURN)).unwrap_err();
        assert!(err.to_string().contains("void method"));
    }

    #[test]
    fn athrow() {
        let (vm, method) = scratch();
        let error = vm.new_throwable(ARITHMETIC_EXCEPTION, None).unwrap();
        let mut context = ExecutionContext::new(&method, vm.clone());
        context.push(Value::Object(error.clone())).unwrap();
        match run(&mut context, Instruction::new(ATHROW)).unwrap() {
            Step::Threw(object) => assert!(std::sync::Arc::ptr_eq(&object, &error)),
            step => panic!("unexpected {step:?}"),
        }

        assert_eq!(thrown(&[Value::Null], Instruction::new(ATHROW)).0, NULL_POINTER_EXCEPTION);

        let plain = Object::new(&vm.find_class("java/lang/Object").unwrap()).unwrap();
        context.push(Value::Object(plain)).unwrap();
        assert!(run(&mut context, Instruction::new(ATHROW)).is_err());
    }
}
