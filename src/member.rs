//! Runtime descriptors of class members.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::access::Modifiers;
use crate::bytecode::{Instruction, Label};
use crate::class::Class;
use crate::context::ExecutionContext;
use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::value::Value;
use crate::vm::VirtualMachine;

/// Dispatch-table key: a member is identified by name and descriptor only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberIdentifier {
    pub name: String,
    pub descriptor: String,
}

impl MemberIdentifier {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl fmt::Display for MemberIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// State shared by fields and methods.
///
/// Equality and hashing only look at the name and descriptor, so two
/// members that differ in modifiers alone are the same member.
#[derive(Clone)]
pub struct Member {
    id: MemberIdentifier,
    declaring_class: Weak<Class>,
    modifiers: Modifiers,
}

impl Member {
    pub fn new(
        declaring_class: Weak<Class>,
        name: &str,
        descriptor: &str,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            id: MemberIdentifier::new(name, descriptor),
            declaring_class,
            modifiers,
        }
    }

    pub fn id(&self) -> &MemberIdentifier {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn descriptor(&self) -> &str {
        &self.id.descriptor
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_synthetic(&self) -> bool {
        self.modifiers.is_synthetic()
    }

    /// `None` once the owning class has been dropped.
    pub fn declaring_class(&self) -> Option<Arc<Class>> {
        self.declaring_class.upgrade()
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("modifiers", &self.modifiers)
            .finish()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.declaring_class() {
            Some(class) => write!(f, "{}.{}", class.name(), self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A class field and the slot it occupies, in the object for instance
/// fields or in the class static storage for static ones.
#[derive(Debug, Clone)]
pub struct Field {
    member: Member,
    field_type: FieldType,
    slot: usize,
}

impl Field {
    pub fn new(member: Member, field_type: FieldType, slot: usize) -> Self {
        Self {
            member,
            field_type,
            slot,
        }
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_static(&self) -> bool {
        self.member.is_static()
    }
}

/// A compiled method: its code, frame sizes and exception table.
#[derive(Debug)]
pub struct Method {
    member: Member,
    signature: MethodDescriptor,
    instructions: Vec<Instruction>,
    max_stack: usize,
    max_locals: usize,
    try_catch: Vec<TryCatchBlock>,
}

/// Resolved exception-table entry covering `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch_type: Option<String>,
}

impl TryCatchBlock {
    pub fn covers(&self, position: usize) -> bool {
        self.start.0 <= position && position < self.end.0
    }
}

impl Method {
    pub fn new(
        member: Member,
        signature: MethodDescriptor,
        instructions: Vec<Instruction>,
        max_stack: usize,
        max_locals: usize,
        try_catch: Vec<TryCatchBlock>,
    ) -> Self {
        Self {
            member,
            signature,
            instructions,
            max_stack,
            max_locals,
            try_catch,
        }
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn name(&self) -> &str {
        self.member.name()
    }

    pub fn signature(&self) -> &MethodDescriptor {
        &self.signature
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn try_catch(&self) -> &[TryCatchBlock] {
        &self.try_catch
    }

    /// Instance methods receive `this` in local slot 0.
    pub fn is_instance(&self) -> bool {
        !self.member.is_static()
    }

    pub(crate) fn vm(&self) -> VmResult<Arc<VirtualMachine>> {
        self.member
            .declaring_class()
            .and_then(|class| class.vm())
            .ok_or_else(|| {
                VmError::Precondition(format!(
                    "{} outlived its virtual machine",
                    self.member
                ))
            })
    }

    /// Runs the method to completion.
    ///
    /// `instance` is the receiver and must be present for instance methods.
    /// Returns the value left by the return instruction, `None` for `void`.
    pub fn invoke(&self, instance: Option<Value>, args: &[Value]) -> VmResult<Option<Value>> {
        if self.is_instance() && matches!(instance, None | Some(Value::Null)) {
            return Err(VmError::NullInstance {
                method: self.member.to_string(),
            });
        }
        if self.instructions.is_empty() {
            return Err(VmError::Precondition(format!(
                "{} has no code to interpret",
                self.member
            )));
        }
        let params = self.signature.params();
        if params.len() != args.len() {
            return Err(VmError::Precondition(format!(
                "{} takes {} arguments, {} given",
                self.member,
                params.len(),
                args.len()
            )));
        }
        let mismatch = params.iter().zip(args).find(|(param, arg)| !arg.fits(param));
        if let Some((param, arg)) = mismatch {
            return Err(VmError::Precondition(format!(
                "{} expects {param} but was given {}",
                self.member,
                arg.kind_name()
            )));
        }

        let vm = self.vm()?;
        let mut context = ExecutionContext::new(self, vm);
        let mut slot = 0;
        if let Some(receiver) = instance.filter(|_| self.is_instance()) {
            context.store(slot, receiver)?;
            slot += 1;
        }
        for (param, arg) in params.iter().zip(args) {
            if param.size() == 2 {
                context.store_wide(slot, arg.clone())?;
            } else {
                context.store(slot, arg.clone())?;
            }
            slot += param.size();
        }

        debug!(method = %self.member, args = args.len(), "invoking");
        interpreter::execute(&mut context)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.member.fmt(f)
    }
}
