//! Failure taxonomy of the interpreter.
//!
//! Normal completion of a method is never an error: handlers report it with
//! [`crate::context::Step::Completed`]. Everything in here is a reported
//! failure that travels back through `Method::invoke`.
use crate::value::ObjectRef;

pub type VmResult<T> = std::result::Result<T, VmError>;

/// `ErrorKind` groups failures by who is to blame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller broke an entry condition, e.g. a null receiver.
    Precondition,
    /// The stack or locals held a value the bytecode did not declare.
    InvalidBytecode,
    /// The interpreter could not carry on with well-typed bytecode.
    Execution,
    /// The guest program threw and nothing caught it.
    Simulation,
}

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("cannot invoke instance method {method} without a receiver")]
    NullInstance { method: String },

    #[error("{0}")]
    Precondition(String),

    #[error("no such member {owner}.{name}{descriptor}")]
    NoSuchMember {
        owner: String,
        name: String,
        descriptor: String,
    },

    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("malformed descriptor: {0}")]
    Descriptor(String),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("unsupported opcode {mnemonic} (0x{opcode:02x})")]
    UnsupportedOpcode { opcode: u8, mnemonic: &'static str },

    #[error("step budget exhausted after {steps} instructions")]
    StepBudgetExhausted { steps: u64 },

    #[error("class parse failure: {0}")]
    Parse(String),

    #[error("uncaught exception {0}")]
    Uncaught(ObjectRef),

    #[error("at instruction {position} ({mnemonic}): {source}")]
    At {
        position: usize,
        mnemonic: &'static str,
        #[source]
        source: Box<VmError>,
    },
}

impl VmError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidBytecode(message.into())
    }

    /// Returns the failure class, looking through position wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NullInstance { .. } | Self::Precondition(_) | Self::NoSuchMember { .. } => {
                ErrorKind::Precondition
            }
            Self::InvalidBytecode(_) | Self::Descriptor(_) => ErrorKind::InvalidBytecode,
            Self::ClassNotFound(_)
            | Self::UnsupportedOpcode { .. }
            | Self::StepBudgetExhausted { .. }
            | Self::Parse(_) => ErrorKind::Execution,
            Self::Uncaught(_) => ErrorKind::Simulation,
            Self::At { source, .. } => source.kind(),
        }
    }

    /// Instruction index the failure originated from, when known.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::At { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Innermost error, without position wrappers.
    pub fn root(&self) -> &VmError {
        match self {
            Self::At { source, .. } => source.root(),
            other => other,
        }
    }

    /// Tags the error with the instruction that raised it. An error that
    /// already carries a position keeps it.
    pub(crate) fn at(self, position: usize, mnemonic: &'static str) -> Self {
        match self {
            Self::At { .. } => self,
            other => Self::At {
                position,
                mnemonic,
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_wrapper_is_transparent_for_kind() {
        let err = VmError::invalid("expected top").at(4, "lload");
        assert_eq!(err.kind(), ErrorKind::InvalidBytecode);
        assert_eq!(err.position(), Some(4));
        assert!(matches!(err.root(), VmError::InvalidBytecode(_)));
        assert_eq!(
            err.to_string(),
            "at instruction 4 (lload): invalid bytecode: expected top"
        );
    }

    #[test]
    fn first_position_wins() {
        let err = VmError::ClassNotFound("a/B".into()).at(1, "ldc").at(9, "ireturn");
        assert_eq!(err.position(), Some(1));
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn precondition_kinds() {
        let err = VmError::NullInstance {
            method: "a/B.f()V".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.position(), None);
    }
}
