//! Operand stack of a single invocation.
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Fixed-capacity operand stack sized by the verifier's `max_stack`.
///
/// Every access is bounds-checked: pushing past capacity or popping an
/// empty stack is reported as invalid bytecode instead of growing or
/// panicking.
#[derive(Debug)]
pub struct ExecutionStack {
    slots: Box<[Option<Value>]>,
    cursor: usize,
}

impl ExecutionStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        let capacity = self.slots.len();
        let slot = self.slots.get_mut(self.cursor).ok_or_else(|| {
            VmError::invalid(format!("operand stack overflow, max stack is {capacity}"))
        })?;
        *slot = Some(value);
        self.cursor += 1;
        Ok(())
    }

    /// Removes the top value, clearing its slot so the stack does not keep
    /// references alive.
    pub fn pop(&mut self) -> VmResult<Value> {
        if self.cursor == 0 {
            return Err(VmError::invalid("operand stack underflow"));
        }
        self.cursor -= 1;
        self.slots[self.cursor]
            .take()
            .ok_or_else(|| VmError::invalid("operand stack slot was empty"))
    }

    /// Value `depth` slots below the top, `0` being the top itself.
    pub fn peek(&self, depth: usize) -> VmResult<&Value> {
        self.cursor
            .checked_sub(depth + 1)
            .and_then(|index| self.slots[index].as_ref())
            .ok_or_else(|| VmError::invalid("operand stack underflow"))
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.cursor] {
            *slot = None;
        }
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
