//! Interpreter state of a single method invocation.
use std::sync::Arc;

use crate::bytecode::Label;
use crate::error::{VmError, VmResult};
use crate::member::Method;
use crate::stack::ExecutionStack;
use crate::value::{ObjectRef, Value};
use crate::vm::VirtualMachine;

/// What the driving loop does after a handler ran.
#[derive(Debug)]
pub enum Step {
    /// Fetch the instruction at the cursor.
    Continue,
    /// The method returned; its result, if any, is the only value left on
    /// the stack.
    Completed,
    /// The guest threw: route the throwable through the exception table.
    Threw(ObjectRef),
}

/// Execution environment of one invocation: operand stack, locals and the
/// instruction cursor. Owned by the call that created it and dropped once
/// the invocation completes or fails.
pub struct ExecutionContext<'m> {
    method: &'m Method,
    vm: Arc<VirtualMachine>,
    stack: ExecutionStack,
    locals: Box<[Option<Value>]>,
    cursor: usize,
}

impl<'m> ExecutionContext<'m> {
    pub fn new(method: &'m Method, vm: Arc<VirtualMachine>) -> Self {
        Self {
            method,
            vm,
            stack: ExecutionStack::with_capacity(method.max_stack()),
            locals: vec![None; method.max_locals()].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn method(&self) -> &'m Method {
        self.method
    }

    pub fn vm(&self) -> &Arc<VirtualMachine> {
        &self.vm
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value)
    }

    /// Pushes a `long` or `double` followed by its `Top` half.
    pub fn push_top(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value)?;
        self.stack.push(Value::Top)
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop()
    }

    pub fn peek(&self, depth: usize) -> VmResult<&Value> {
        self.stack.peek(depth)
    }

    pub fn pop_long(&mut self) -> VmResult<i64> {
        match self.pop_wide()? {
            Value::Long(value) => Ok(value),
            other => Err(mismatch("long", &other)),
        }
    }

    pub fn pop_double(&mut self) -> VmResult<f64> {
        match self.pop_wide()? {
            Value::Double(value) => Ok(value),
            other => Err(mismatch("double", &other)),
        }
    }

    fn pop_wide(&mut self) -> VmResult<Value> {
        let top = self.pop()?;
        if !top.is_top() {
            return Err(VmError::invalid(format!(
                "expected the top half of a wide value, found {}",
                top.kind_name()
            )));
        }
        self.pop()
    }

    /// Pops any numeric and narrows it to `int`.
    pub fn pop_int(&mut self) -> VmResult<i32> {
        let value = self.pop()?;
        match value {
            Value::Long(_) | Value::Double(_) => Err(mismatch("int", &value)),
            _ => value.to_int().ok_or_else(|| mismatch("int", &value)),
        }
    }

    pub fn pop_float(&mut self) -> VmResult<f32> {
        match self.pop()? {
            Value::Float(value) => Ok(value),
            other => Err(mismatch("float", &other)),
        }
    }

    pub fn pop_reference(&mut self) -> VmResult<Value> {
        let value = self.pop()?;
        if value.is_reference() {
            Ok(value)
        } else {
            Err(mismatch("reference", &value))
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn store(&mut self, index: usize, value: Value) -> VmResult<()> {
        let max_locals = self.locals.len();
        let slot = self.locals.get_mut(index).ok_or_else(|| {
            VmError::invalid(format!("local {index} out of range, max locals is {max_locals}"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// Stores a `long` or `double` in `index` and its `Top` half in the
    /// slot above.
    pub fn store_wide(&mut self, index: usize, value: Value) -> VmResult<()> {
        self.store(index + 1, Value::Top)?;
        self.store(index, value)
    }

    pub fn load(&self, index: usize) -> VmResult<Value> {
        match self.locals.get(index) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(VmError::invalid(format!("local {index} read before assignment"))),
            None => Err(VmError::invalid(format!(
                "local {index} out of range, max locals is {}",
                self.locals.len()
            ))),
        }
    }

    pub fn load_wide(&self, index: usize) -> VmResult<Value> {
        if !self.load(index + 1)?.is_top() {
            return Err(VmError::invalid(format!(
                "local {} does not hold the top half of a wide value",
                index + 1
            )));
        }
        self.load(index)
    }

    pub fn jump(&mut self, label: Label) {
        self.cursor = label.0;
    }

    /// Returns the current position and advances past it.
    pub fn next_cursor(&mut self) -> usize {
        let position = self.cursor;
        self.cursor += 1;
        position
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Leaves `result` as the only value on the stack and stops the
    /// invocation.
    pub fn complete(&mut self, result: Option<Value>) -> VmResult<Step> {
        self.stack.clear();
        match result {
            Some(value) if value.is_wide() => self.push_top(value)?,
            Some(value) => self.push(value)?,
            None => {}
        }
        Ok(Step::Completed)
    }

    /// Allocates a `class_name` throwable and hands it to the exception
    /// table.
    pub fn raise(&mut self, class_name: &str, message: &str) -> VmResult<Step> {
        let throwable = self.vm.new_throwable(class_name, Some(message))?;
        Ok(Step::Threw(throwable))
    }

    /// Pops the value `complete` left behind, shaped by the method's
    /// return type.
    pub(crate) fn take_result(&mut self) -> VmResult<Option<Value>> {
        let result = match self.method.signature().return_type() {
            None => None,
            Some(ret) if ret.size() == 2 => Some(self.pop_wide()?),
            Some(_) => Some(self.pop()?),
        };
        if !self.stack.is_empty() {
            return Err(VmError::invalid(format!(
                "{} values left on the stack after return",
                self.stack.len()
            )));
        }
        Ok(result)
    }
}

fn mismatch(expected: &str, found: &Value) -> VmError {
    VmError::invalid(format!("expected {expected}, found {}", found.kind_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_PUBLIC, ACC_STATIC};
    use crate::compiler::StandardCompiler;
    use crate::error::ErrorKind;
    use crate::source::{ClassNode, MemorySource, MethodNode};

    fn method(max_stack: u16, max_locals: u16) -> (Arc<VirtualMachine>, Arc<Method>) {
        let source = MemorySource::new().with(
            ClassNode::new("demo/Ctx", Some("java/lang/Object"), ACC_PUBLIC).method(
                MethodNode::new("f", "()J", ACC_PUBLIC | ACC_STATIC).code(
                    max_stack,
                    max_locals,
                    Vec::new(),
                ),
            ),
        );
        let vm = VirtualMachine::new(source, StandardCompiler);
        let method = vm.find_method("demo/Ctx", "f", "()J").unwrap();
        (vm, method)
    }

    #[test]
    fn wide_values_round_trip() {
        let (vm, method) = method(4, 4);
        let mut context = ExecutionContext::new(&method, vm);
        context.push_top(Value::Long(i64::MIN)).unwrap();
        assert_eq!(context.depth(), 2);
        assert_eq!(context.pop_long().unwrap(), i64::MIN);
        context.push_top(Value::Double(2.5)).unwrap();
        assert_eq!(context.pop_double().unwrap(), 2.5);
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn wide_pop_requires_top() {
        let (vm, method) = method(4, 4);
        let mut context = ExecutionContext::new(&method, vm);
        context.push(Value::Long(1)).unwrap();
        let err = context.pop_long().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBytecode);

        context.push_top(Value::Double(1.0)).unwrap();
        assert!(context.pop_long().is_err());
    }

    #[test]
    fn pop_int_narrows_the_int_family() {
        let (vm, method) = method(4, 4);
        let mut context = ExecutionContext::new(&method, vm);
        context.push(Value::Byte(-7)).unwrap();
        assert_eq!(context.pop_int().unwrap(), -7);
        context.push(Value::Short(300)).unwrap();
        assert_eq!(context.pop_int().unwrap(), 300);
        context.push(Value::Null).unwrap();
        assert!(context.pop_int().is_err());
        context.push(Value::Long(1)).unwrap();
        assert!(context.pop_int().is_err());
    }

    #[test]
    fn locals_are_bounds_checked() {
        let (vm, method) = method(1, 3);
        let mut context = ExecutionContext::new(&method, vm);
        context.store_wide(1, Value::Long(9)).unwrap();
        assert_eq!(context.load_wide(1).unwrap(), Value::Long(9));
        assert!(context.load(0).is_err());
        assert!(context.store(3, Value::Int(0)).is_err());
        assert!(context.store_wide(2, Value::Long(0)).is_err());
        assert_eq!(context.load(2).unwrap(), Value::Top);
    }

    #[test]
    fn complete_leaves_only_the_result() {
        let (vm, method) = method(4, 1);
        let mut context = ExecutionContext::new(&method, vm);
        context.push(Value::Int(1)).unwrap();
        context.push(Value::Int(2)).unwrap();
        assert!(matches!(
            context.complete(Some(Value::Long(42))).unwrap(),
            Step::Completed
        ));
        assert_eq!(context.depth(), 2);
        assert_eq!(context.take_result().unwrap(), Some(Value::Long(42)));
    }

    #[test]
    fn cursor_advances_and_jumps() {
        let (vm, method) = method(0, 0);
        let mut context = ExecutionContext::new(&method, vm);
        assert_eq!(context.next_cursor(), 0);
        assert_eq!(context.next_cursor(), 1);
        context.jump(Label(7));
        assert_eq!(context.cursor(), 7);
    }
}
