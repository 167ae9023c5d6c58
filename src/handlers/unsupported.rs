//! Default handler for opcodes the interpreter does not execute: field
//! access, invocation, allocation, type checks, monitors and subroutines.
use tracing::warn;

use super::InstructionHandler;
use crate::bytecode::Instruction;
use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};

pub(super) struct Unsupported;

impl InstructionHandler for Unsupported {
    fn process(&self, instruction: &Instruction, context: &mut ExecutionContext) -> VmResult<Step> {
        warn!(
            method = %context.method(),
            position = context.cursor().saturating_sub(1),
            opcode = instruction.mnemonic(),
            "unsupported opcode"
        );
        Err(VmError::UnsupportedOpcode {
            opcode: instruction.opcode(),
            mnemonic: instruction.mnemonic(),
        })
    }
}
