//! Array element access and `arraylength`.
use super::{InstructionHandler, InstructionHandlers, Kind};
use crate::bootstrap::{ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION, NULL_POINTER_EXCEPTION};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::{ArrayKind, ArrayRef, Value};

/// Element type named by the opcode prefix. Sub-int elements travel as
/// `int` on the stack.
#[derive(Debug, Copy, Clone)]
enum Element {
    Int,
    Long,
    Float,
    Double,
    Reference,
    /// `baload`/`bastore`, shared by `byte[]` and `boolean[]`.
    Byte,
    Char,
    Short,
}

impl Element {
    fn kind(self) -> Kind {
        match self {
            Self::Long => Kind::Long,
            Self::Float => Kind::Float,
            Self::Double => Kind::Double,
            Self::Reference => Kind::Reference,
            Self::Int | Self::Byte | Self::Char | Self::Short => Kind::Int,
        }
    }

    fn accepts(self, array: &ArrayKind) -> bool {
        matches!(
            (self, array),
            (Self::Int, ArrayKind::Int)
                | (Self::Long, ArrayKind::Long)
                | (Self::Float, ArrayKind::Float)
                | (Self::Double, ArrayKind::Double)
                | (Self::Reference, ArrayKind::Reference(_))
                | (Self::Byte, ArrayKind::Byte | ArrayKind::Boolean)
                | (Self::Char, ArrayKind::Char)
                | (Self::Short, ArrayKind::Short)
        )
    }

    /// Truncates a stored value to the element width.
    fn narrow(self, array: &ArrayKind, value: Value) -> Value {
        match (self, value) {
            (Self::Byte, Value::Int(v)) if *array == ArrayKind::Boolean => Value::Int(v & 1),
            (Self::Byte, Value::Int(v)) => Value::Int(i32::from(v as i8)),
            (Self::Char, Value::Int(v)) => Value::Int(i32::from(v as u16)),
            (Self::Short, Value::Int(v)) => Value::Int(i32::from(v as i16)),
            (_, value) => value,
        }
    }
}

enum Target {
    Array(ArrayRef),
    Null,
}

fn pop_array(context: &mut ExecutionContext, element: Option<Element>) -> VmResult<Target> {
    match context.pop_reference()? {
        Value::Null => Ok(Target::Null),
        Value::Array(array) => match element {
            Some(element) if !element.accepts(array.kind()) => Err(VmError::invalid(format!(
                "{element:?} access on a {:?} array",
                array.kind()
            ))),
            _ => Ok(Target::Array(array)),
        },
        other => Err(VmError::invalid(format!(
            "expected an array, found {}",
            other.kind_name()
        ))),
    }
}

fn out_of_bounds(context: &mut ExecutionContext, index: i32, array: &ArrayRef) -> VmResult<Step> {
    context.raise(
        ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
        &format!("Index {index} out of bounds for length {}", array.len()),
    )
}

struct ArrayLoad(Element);

impl InstructionHandler for ArrayLoad {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let index = context.pop_int()?;
        let array = match pop_array(context, Some(self.0))? {
            Target::Array(array) => array,
            Target::Null => return context.raise(NULL_POINTER_EXCEPTION, "array is null"),
        };
        match array.get(index) {
            Some(value) => {
                self.0.kind().push(context, value)?;
                Ok(Step::Continue)
            }
            None => out_of_bounds(context, index, &array),
        }
    }
}

struct ArrayStore(Element);

impl InstructionHandler for ArrayStore {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let value = self.0.kind().pop(context)?;
        let index = context.pop_int()?;
        let array = match pop_array(context, Some(self.0))? {
            Target::Array(array) => array,
            Target::Null => return context.raise(NULL_POINTER_EXCEPTION, "array is null"),
        };
        if array.set(index, self.0.narrow(array.kind(), value)) {
            Ok(Step::Continue)
        } else {
            out_of_bounds(context, index, &array)
        }
    }
}

struct ArrayLength;

impl InstructionHandler for ArrayLength {
    fn process(&self, _: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        match pop_array(context, None)? {
            Target::Array(array) => {
                let len = i32::try_from(array.len())
                    .map_err(|_| VmError::invalid("array length exceeds int range"))?;
                context.push(Value::Int(len))?;
                Ok(Step::Continue)
            }
            Target::Null => context.raise(NULL_POINTER_EXCEPTION, "array is null"),
        }
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    let elements = [
        (IALOAD, IASTORE, Element::Int),
        (LALOAD, LASTORE, Element::Long),
        (FALOAD, FASTORE, Element::Float),
        (DALOAD, DASTORE, Element::Double),
        (AALOAD, AASTORE, Element::Reference),
        (BALOAD, BASTORE, Element::Byte),
        (CALOAD, CASTORE, Element::Char),
        (SALOAD, SASTORE, Element::Short),
    ];
    for (load, store, element) in elements {
        table.set(load, ArrayLoad(element));
        table.set(store, ArrayStore(element));
    }
    table.set(ARRAYLENGTH, ArrayLength);
}

#[cfg(test)]
mod tests {
    use super::super::testing::{after, eval, run, scratch, thrown};
    use super::*;
    use crate::value::Array;

    #[test]
    fn loads_elements() {
        let array = Array::from_values(ArrayKind::Int, vec![Value::Int(4), Value::Int(5)]);
        assert_eq!(
            after(&[Value::Array(array), Value::Int(1)], Instruction::new(IALOAD)),
            vec![Value::Int(5)]
        );
        let longs = Array::from_values(ArrayKind::Long, vec![Value::Long(7)]);
        assert_eq!(
            after(&[Value::Array(longs), Value::Int(0)], Instruction::new(LALOAD)),
            vec![Value::Long(7), Value::Top]
        );
    }

    #[test]
    fn stores_truncate_to_element_width() {
        let (vm, method) = scratch();
        let mut context = ExecutionContext::new(&method, vm);
        let bytes = Array::new(ArrayKind::Byte, 1);
        let chars = Array::new(ArrayKind::Char, 1);
        let flags = Array::new(ArrayKind::Boolean, 1);
        for (array, opcode) in [(&bytes, BASTORE), (&chars, CASTORE), (&flags, BASTORE)] {
            context.push(Value::Array(array.clone())).unwrap();
            context.push(Value::Int(0)).unwrap();
            context.push(Value::Int(0x1_ff_ff)).unwrap();
            run(&mut context, Instruction::new(opcode)).unwrap();
        }
        assert_eq!(bytes.get(0), Some(Value::Int(-1)));
        assert_eq!(chars.get(0), Some(Value::Int(0xffff)));
        assert_eq!(flags.get(0), Some(Value::Int(1)));
    }

    #[test]
    fn guest_faults_are_thrown() {
        let array = Array::new(ArrayKind::Int, 2);
        assert_eq!(
            thrown(&[Value::Array(array.clone()), Value::Int(2)], Instruction::new(IALOAD)),
            (
                ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION.to_string(),
                Some("Index 2 out of bounds for length 2".to_string())
            )
        );
        assert_eq!(
            thrown(
                &[Value::Array(array), Value::Int(-1), Value::Int(0)],
                Instruction::new(IASTORE)
            )
            .0,
            ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION
        );
        assert_eq!(
            thrown(&[Value::Null], Instruction::new(ARRAYLENGTH)).0,
            NULL_POINTER_EXCEPTION
        );
    }

    #[test]
    fn element_kind_must_match() {
        let array = Array::new(ArrayKind::Float, 1);
        assert!(eval(&[Value::Array(array), Value::Int(0)], Instruction::new(IALOAD)).is_err());
    }

    #[test]
    fn length() {
        let array = Array::new(ArrayKind::Reference("java/lang/Object".into()), 3);
        assert_eq!(
            after(&[Value::Array(array)], Instruction::new(ARRAYLENGTH)),
            vec![Value::Int(3)]
        );
    }
}
