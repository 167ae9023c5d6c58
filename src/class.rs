//! Runtime classes and their lazily built member tables.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::access::Modifiers;
use crate::error::{VmError, VmResult};
use crate::member::{Field, MemberIdentifier, Method};
use crate::source::UnresolvedClass;
use crate::value::Value;
use crate::vm::VirtualMachine;

/// Member tables of a resolved class. Read-only once built, apart from the
/// static field values.
struct MemberTables {
    methods: HashMap<MemberIdentifier, Arc<Method>>,
    fields: HashMap<MemberIdentifier, Arc<Field>>,
    // Zero values of every instance field, superclass fields first.
    instance_template: Vec<Value>,
    statics: Mutex<Vec<Value>>,
}

/// A loaded class.
///
/// Created unresolved: only the header is known. [`Class::resolve`] compiles
/// the declared members exactly once, however many threads ask for it.
/// The tables hold the class's own members; [`Class::lookup_method`] and
/// [`Class::lookup_field`] continue the search up the superclass chain.
pub struct Class {
    vm: Weak<VirtualMachine>,
    source: Arc<UnresolvedClass>,
    superclass: Option<Arc<Class>>,
    tables: OnceCell<MemberTables>,
}

impl Class {
    pub fn new(
        vm: Weak<VirtualMachine>,
        superclass: Option<Arc<Class>>,
        source: Arc<UnresolvedClass>,
    ) -> Self {
        Self {
            vm,
            source,
            superclass,
            tables: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.source.class_name()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.source.access()
    }

    pub fn superclass(&self) -> Option<&Arc<Class>> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.source.header().interfaces
    }

    pub fn vm(&self) -> Option<Arc<VirtualMachine>> {
        self.vm.upgrade()
    }

    pub fn is_resolved(&self) -> bool {
        self.tables.get().is_some()
    }

    /// Builds the method and field tables on first call. Concurrent callers
    /// wait for the first one; a failed build is retried by the next call.
    pub fn resolve(self: &Arc<Self>) -> VmResult<()> {
        self.tables().map(|_| ())
    }

    fn tables(self: &Arc<Self>) -> VmResult<&MemberTables> {
        self.tables.get_or_try_init(|| self.build_tables())
    }

    fn build_tables(self: &Arc<Self>) -> VmResult<MemberTables> {
        let vm = self.vm().ok_or_else(|| {
            VmError::Precondition(format!("{} outlived its virtual machine", self.name()))
        })?;
        let node = self.source.node()?;
        let compiler = vm.compiler();

        let mut instance_template = match &self.superclass {
            Some(parent) => parent.instance_template()?,
            None => Vec::new(),
        };
        let mut statics = Vec::new();
        let mut fields = HashMap::with_capacity(node.fields.len());
        for field_node in &node.fields {
            let storage = if field_node.access.is_static() {
                &mut statics
            } else {
                &mut instance_template
            };
            let field = compiler.compile_field(&vm, self, field_node, storage.len())?;
            storage.push(Value::default_for(field.field_type()));
            fields.insert(field.member().id().clone(), Arc::new(field));
        }

        let mut methods = HashMap::with_capacity(node.methods.len());
        for method_node in &node.methods {
            let method = compiler.compile_method(&vm, self, method_node)?;
            methods.insert(method.member().id().clone(), Arc::new(method));
        }

        debug!(
            class = %self.name(),
            methods = methods.len(),
            fields = fields.len(),
            "resolved"
        );
        Ok(MemberTables {
            methods,
            fields,
            instance_template,
            statics: Mutex::new(statics),
        })
    }

    /// Method declared by this class itself.
    pub fn find_method(
        self: &Arc<Self>,
        name: &str,
        descriptor: &str,
    ) -> VmResult<Option<Arc<Method>>> {
        let id = MemberIdentifier::new(name, descriptor);
        Ok(self.tables()?.methods.get(&id).cloned())
    }

    /// Field declared by this class itself.
    pub fn find_field(
        self: &Arc<Self>,
        name: &str,
        descriptor: &str,
    ) -> VmResult<Option<Arc<Field>>> {
        let id = MemberIdentifier::new(name, descriptor);
        Ok(self.tables()?.fields.get(&id).cloned())
    }

    /// Method of this class or the nearest superclass declaring it.
    pub fn lookup_method(
        self: &Arc<Self>,
        name: &str,
        descriptor: &str,
    ) -> VmResult<Option<Arc<Method>>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.find_method(name, descriptor)? {
                return Ok(Some(method));
            }
            current = class.superclass.as_ref();
        }
        Ok(None)
    }

    /// Field of this class or the nearest superclass declaring it.
    pub fn lookup_field(
        self: &Arc<Self>,
        name: &str,
        descriptor: &str,
    ) -> VmResult<Option<Arc<Field>>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(field) = class.find_field(name, descriptor)? {
                return Ok(Some(field));
            }
            current = class.superclass.as_ref();
        }
        Ok(None)
    }

    pub fn methods(self: &Arc<Self>) -> VmResult<Vec<Arc<Method>>> {
        Ok(self.tables()?.methods.values().cloned().collect())
    }

    pub fn fields(self: &Arc<Self>) -> VmResult<Vec<Arc<Field>>> {
        Ok(self.tables()?.fields.values().cloned().collect())
    }

    /// True when values of this class can be assigned to `name`: the class
    /// itself, a superclass, or an interface implemented along the chain.
    /// Each interface is visited once, so interfaces that extend each other
    /// end the walk instead of recursing forever.
    pub fn is_subclass_of(&self, name: &str) -> VmResult<bool> {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        if self.extends(name, &mut seen, &mut pending)? {
            return Ok(true);
        }
        while let Some(interface) = pending.pop() {
            if interface.extends(name, &mut seen, &mut pending)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Walks the superclass chain, queueing interfaces not seen before.
    fn extends(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        pending: &mut Vec<Arc<Class>>,
    ) -> VmResult<bool> {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name() == name {
                return Ok(true);
            }
            for interface in class.interfaces() {
                if interface == name {
                    return Ok(true);
                }
                if !seen.insert(interface.clone()) {
                    continue;
                }
                let vm = class.vm().ok_or_else(|| {
                    VmError::Precondition(format!("{} outlived its virtual machine", class.name()))
                })?;
                pending.push(vm.find_class(interface)?);
            }
            current = class.superclass.as_deref();
        }
        Ok(false)
    }

    pub(crate) fn instance_template(self: &Arc<Self>) -> VmResult<Vec<Value>> {
        Ok(self.tables()?.instance_template.clone())
    }

    pub fn static_value(self: &Arc<Self>, field: &Field) -> VmResult<Value> {
        let slot = self.static_slot(field)?;
        Ok(self.tables()?.statics.lock()[slot].clone())
    }

    pub fn set_static_value(self: &Arc<Self>, field: &Field, value: Value) -> VmResult<()> {
        let slot = self.static_slot(field)?;
        self.tables()?.statics.lock()[slot] = value;
        Ok(())
    }

    fn static_slot(self: &Arc<Self>, field: &Field) -> VmResult<usize> {
        let owned = field
            .member()
            .declaring_class()
            .is_some_and(|owner| Arc::ptr_eq(&owner, self));
        if !field.is_static() || !owned {
            return Err(VmError::Precondition(format!(
                "{} is not a static field of {}",
                field.member(),
                self.name()
            )));
        }
        Ok(field.slot())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name())
            .field("superclass", &self.superclass.as_ref().map(|c| c.name()))
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_PUBLIC, ACC_STATIC};
    use crate::bytecode::{Instruction, RETURN};
    use crate::compiler::{Compiler, StandardCompiler};
    use crate::source::{ClassNode, FieldNode, MemorySource, MethodNode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Compiler that counts how often members are compiled.
    #[derive(Default)]
    struct CountingCompiler {
        methods: Arc<AtomicUsize>,
    }

    impl Compiler for CountingCompiler {
        fn compile_class(
            &self,
            vm: &Arc<VirtualMachine>,
            parent: Option<Arc<Class>>,
            source: Arc<UnresolvedClass>,
        ) -> VmResult<Class> {
            StandardCompiler.compile_class(vm, parent, source)
        }

        fn compile_field(
            &self,
            vm: &Arc<VirtualMachine>,
            class: &Arc<Class>,
            node: &FieldNode,
            slot: usize,
        ) -> VmResult<Field> {
            StandardCompiler.compile_field(vm, class, node, slot)
        }

        fn compile_method(
            &self,
            vm: &Arc<VirtualMachine>,
            class: &Arc<Class>,
            node: &MethodNode,
        ) -> VmResult<Method> {
            // widen the race window
            thread::yield_now();
            self.methods.fetch_add(1, Ordering::SeqCst);
            StandardCompiler.compile_method(vm, class, node)
        }
    }

    fn void_method(name: &str, access: u16) -> MethodNode {
        MethodNode::new(name, "()V", access).code(0, 1, vec![Instruction::new(RETURN)])
    }

    fn sample_source() -> MemorySource {
        MemorySource::new()
            .with(
                ClassNode::new("demo/Base", Some("java/lang/Object"), ACC_PUBLIC)
                    .field(FieldNode::new("id", "J", 0))
                    .field(FieldNode::new("count", "I", ACC_STATIC))
                    .method(void_method("base", ACC_PUBLIC)),
            )
            .with(
                ClassNode::new("demo/Child", Some("demo/Base"), ACC_PUBLIC)
                    .implements("demo/Marker")
                    .field(FieldNode::new("name", "Ljava/lang/String;", 0))
                    .method(void_method("a", ACC_PUBLIC))
                    .method(void_method("b", ACC_STATIC))
                    .method(void_method("c", 0)),
            )
            .with(ClassNode::new("demo/Marker", Some("java/lang/Object"), 0x0601))
    }

    #[test]
    fn concurrent_resolution_builds_once() {
        let compiler = CountingCompiler::default();
        let counter = Arc::clone(&compiler.methods);
        let vm = VirtualMachine::new(sample_source(), compiler);
        let class = vm.find_class("demo/Child").unwrap();
        assert!(!class.is_resolved());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let class = Arc::clone(&class);
                thread::spawn(move || class.resolve())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        class.resolve().unwrap();

        assert!(class.is_resolved());
        // three own methods plus the one of the superclass, resolved on the way
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(class.methods().unwrap().len(), 3);
    }

    #[test]
    fn own_table_versus_chain_lookup() {
        let vm = VirtualMachine::new(sample_source(), StandardCompiler);
        let child = vm.find_class("demo/Child").unwrap();
        assert!(child.find_method("base", "()V").unwrap().is_none());
        let inherited = child.lookup_method("base", "()V").unwrap().unwrap();
        assert_eq!(
            inherited.member().declaring_class().unwrap().name(),
            "demo/Base"
        );
        assert!(child.lookup_method("missing", "()V").unwrap().is_none());
    }

    #[test]
    fn instance_fields_continue_superclass_layout() {
        let vm = VirtualMachine::new(sample_source(), StandardCompiler);
        let child = vm.find_class("demo/Child").unwrap();
        let id = child.lookup_field("id", "J").unwrap().unwrap();
        let name = child.find_field("name", "Ljava/lang/String;").unwrap().unwrap();
        assert_eq!(id.slot(), 0);
        assert_eq!(name.slot(), 1);
        assert_eq!(
            child.instance_template().unwrap(),
            vec![Value::Long(0), Value::Null]
        );
    }

    #[test]
    fn static_storage_is_per_class() {
        let vm = VirtualMachine::new(sample_source(), StandardCompiler);
        let base = vm.find_class("demo/Base").unwrap();
        let child = vm.find_class("demo/Child").unwrap();
        let count = base.find_field("count", "I").unwrap().unwrap();
        assert_eq!(base.static_value(&count).unwrap(), Value::Int(0));
        base.set_static_value(&count, Value::Int(5)).unwrap();
        assert_eq!(base.static_value(&count).unwrap(), Value::Int(5));
        assert!(child.static_value(&count).is_err());
        let id = base.find_field("id", "J").unwrap().unwrap();
        assert!(base.static_value(&id).is_err());
    }

    #[test]
    fn subclass_checks_walk_superclasses_and_interfaces() {
        let vm = VirtualMachine::new(sample_source(), StandardCompiler);
        let child = vm.find_class("demo/Child").unwrap();
        assert!(child.is_subclass_of("demo/Child").unwrap());
        assert!(child.is_subclass_of("demo/Base").unwrap());
        assert!(child.is_subclass_of("java/lang/Object").unwrap());
        assert!(child.is_subclass_of("demo/Marker").unwrap());
        assert!(!child.is_subclass_of("java/lang/Throwable").unwrap());
    }

    #[test]
    fn interfaces_extending_each_other_end_the_walk() {
        let interface = |name: &str, extends: &str| {
            ClassNode::new(name, Some("java/lang/Object"), 0x0601).implements(extends)
        };
        let source = MemorySource::new()
            .with(interface("demo/I", "demo/J"))
            .with(interface("demo/J", "demo/I"))
            .with(
                ClassNode::new("demo/C", Some("java/lang/Object"), ACC_PUBLIC).implements("demo/I"),
            );
        let vm = VirtualMachine::new(source, StandardCompiler);
        let class = vm.find_class("demo/C").unwrap();
        assert!(class.is_subclass_of("demo/J").unwrap());
        assert!(!class.is_subclass_of("demo/Unrelated").unwrap());
    }
}
