//! Translation of parsed class descriptors into runtime classes and
//! members.
use std::sync::Arc;

use crate::bytecode::Label;
use crate::class::Class;
use crate::descriptor::{FieldType, MethodDescriptor};
use crate::error::{VmError, VmResult};
use crate::member::{Field, Member, Method, TryCatchBlock};
use crate::source::{FieldNode, MethodNode, UnresolvedClass};
use crate::vm::VirtualMachine;

/// Factory for runtime descriptors. Swappable so tools can plug in
/// instrumenting variants.
pub trait Compiler: Send + Sync {
    fn compile_class(
        &self,
        vm: &Arc<VirtualMachine>,
        parent: Option<Arc<Class>>,
        source: Arc<UnresolvedClass>,
    ) -> VmResult<Class>;

    /// `slot` is the storage slot picked by the declaring class.
    fn compile_field(
        &self,
        vm: &Arc<VirtualMachine>,
        class: &Arc<Class>,
        node: &FieldNode,
        slot: usize,
    ) -> VmResult<Field>;

    fn compile_method(
        &self,
        vm: &Arc<VirtualMachine>,
        class: &Arc<Class>,
        node: &MethodNode,
    ) -> VmResult<Method>;
}

/// Compiler producing plain interpreted members.
#[derive(Debug, Default, Copy, Clone)]
pub struct StandardCompiler;

impl Compiler for StandardCompiler {
    fn compile_class(
        &self,
        vm: &Arc<VirtualMachine>,
        parent: Option<Arc<Class>>,
        source: Arc<UnresolvedClass>,
    ) -> VmResult<Class> {
        Ok(Class::new(Arc::downgrade(vm), parent, source))
    }

    fn compile_field(
        &self,
        _vm: &Arc<VirtualMachine>,
        class: &Arc<Class>,
        node: &FieldNode,
        slot: usize,
    ) -> VmResult<Field> {
        let field_type = FieldType::parse(&node.descriptor)?;
        let member = Member::new(Arc::downgrade(class), &node.name, &node.descriptor, node.access);
        Ok(Field::new(member, field_type, slot))
    }

    fn compile_method(
        &self,
        _vm: &Arc<VirtualMachine>,
        class: &Arc<Class>,
        node: &MethodNode,
    ) -> VmResult<Method> {
        let signature = MethodDescriptor::parse(&node.descriptor)?;
        let member = Member::new(Arc::downgrade(class), &node.name, &node.descriptor, node.access);
        let has_code = !(node.access.is_abstract() || node.access.is_native());
        if has_code {
            check_labels(node)?;
        }
        let try_catch = node
            .try_catch
            .iter()
            .map(|block| TryCatchBlock {
                start: block.start,
                end: block.end,
                handler: block.handler,
                catch_type: block.catch_type.clone(),
            })
            .collect();
        Ok(Method::new(
            member,
            signature,
            if has_code { node.instructions.clone() } else { Vec::new() },
            usize::from(node.max_stack),
            usize::from(node.max_locals),
            try_catch,
        ))
    }
}

/// Every branch target and exception-table label must name an instruction.
fn check_labels(node: &MethodNode) -> VmResult<()> {
    let len = node.instructions.len();
    let in_range = |label: Label| label.0 < len;
    for (position, instruction) in node.instructions.iter().enumerate() {
        if let Some(label) = instruction.labels().into_iter().find(|l| !in_range(*l)) {
            return Err(VmError::invalid(format!(
                "{}{}: {} at {} jumps to {}, past the last instruction",
                node.name,
                node.descriptor,
                instruction.mnemonic(),
                position,
                label.0
            )));
        }
    }
    for block in &node.try_catch {
        if block.start >= block.end || block.end.0 > len || !in_range(block.handler) {
            return Err(VmError::invalid(format!(
                "{}{}: exception range {:?}..{:?} with handler {:?} is out of bounds",
                node.name, node.descriptor, block.start, block.end, block.handler
            )));
        }
    }
    Ok(())
}
