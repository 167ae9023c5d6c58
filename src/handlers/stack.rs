//! `pop`, `dup` and `swap` families.
//!
//! These work on raw slots, so a wide value counts as its value plus its
//! `Top` half. A shuffle may never split a wide value.
use super::{InstructionHandler, InstructionHandlers};
use crate::bytecode::*;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// Pops `take` slots and pushes them back in `order`, bottom first. Index
/// 0 is the slot that was on top.
struct Shuffle {
    take: usize,
    order: &'static [usize],
}

impl Shuffle {
    /// Every `Top` in the popped window must sit directly above its long or
    /// double, and `order` must push each such pair back value first.
    fn keeps_pairs(&self, slots: &[Value]) -> bool {
        slots.iter().enumerate().filter(|(_, slot)| slot.is_top()).all(|(top, _)| {
            let value = top + 1;
            slots.get(value).is_some_and(Value::is_wide)
                && self.order.iter().enumerate().all(|(at, &index)| {
                    let next = self.order.get(at + 1);
                    let previous = at.checked_sub(1).map(|before| self.order[before]);
                    (index != value || next == Some(&top))
                        && (index != top || previous == Some(value))
                })
        })
    }
}

impl InstructionHandler for Shuffle {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        let mut slots: Vec<Value> = Vec::with_capacity(self.take);
        for _ in 0..self.take {
            slots.push(context.pop()?);
        }
        if !self.keeps_pairs(&slots) {
            return Err(VmError::invalid(format!(
                "{} would split a long or double",
                instruction.mnemonic()
            )));
        }
        for &index in self.order {
            context.push(slots[index].clone())?;
        }
        Ok(Step::Continue)
    }
}

pub(super) fn register(table: &mut InstructionHandlers) {
    let shuffles: [(u8, usize, &'static [usize]); 9] = [
        (POP, 1, &[]),
        (POP2, 2, &[]),
        (DUP, 1, &[0, 0]),
        (DUP_X1, 2, &[0, 1, 0]),
        (DUP_X2, 3, &[0, 2, 1, 0]),
        (DUP2, 2, &[1, 0, 1, 0]),
        (DUP2_X1, 3, &[1, 0, 2, 1, 0]),
        (DUP2_X2, 4, &[1, 0, 3, 2, 1, 0]),
        (SWAP, 2, &[0, 1]),
    ];
    for (opcode, take, order) in shuffles {
        table.set(opcode, Shuffle { take, order });
    }
}
