//! Interpretation session: binds a class source to a compiler and caches
//! the classes it loads.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::bootstrap;
use crate::class::Class;
use crate::compiler::Compiler;
use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::member::Method;
use crate::source::{ClassSource, UnresolvedClass};
use crate::value::{Object, ObjectRef, Value};

/// `VirtualMachine` owns no per-call state: invocations carry their own
/// `ExecutionContext`, so one machine can serve many threads.
pub struct VirtualMachine {
    this: Weak<VirtualMachine>,
    source: Box<dyn ClassSource>,
    compiler: Box<dyn Compiler>,
    config: VmConfig,
    classes: Mutex<HashMap<String, Arc<Class>>>,
    dispatched: AtomicU64,
}

impl VirtualMachine {
    pub fn new(source: impl ClassSource + 'static, compiler: impl Compiler + 'static) -> Arc<Self> {
        Self::with_config(source, compiler, VmConfig::default())
    }

    pub fn with_config(
        source: impl ClassSource + 'static,
        compiler: impl Compiler + 'static,
        config: VmConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            source: Box::new(source),
            compiler: Box::new(compiler),
            config,
            classes: Mutex::new(HashMap::new()),
            dispatched: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn compiler(&self) -> &dyn Compiler {
        self.compiler.as_ref()
    }

    /// Returns the class named `name`, loading it and its superclasses on
    /// first use. Classes unknown to the source fall back to the bootstrap
    /// set.
    pub fn find_class(&self, name: &str) -> VmResult<Arc<Class>> {
        self.load(name, &mut Vec::new())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.classes.lock().contains_key(name)
    }

    fn load(&self, name: &str, chain: &mut Vec<String>) -> VmResult<Arc<Class>> {
        if let Some(class) = self.classes.lock().get(name) {
            return Ok(Arc::clone(class));
        }
        if chain.iter().any(|loading| loading == name) {
            return Err(VmError::invalid(format!(
                "class circularity: {} -> {name}",
                chain.join(" -> ")
            )));
        }

        let source = match self.source.lookup(name)? {
            Some(source) => source,
            None => bootstrap::lookup(name)
                .map(|node| Arc::new(UnresolvedClass::parsed(node)))
                .ok_or_else(|| VmError::ClassNotFound(name.to_string()))?,
        };
        if source.class_name() != name {
            return Err(VmError::Parse(format!(
                "lookup of {name} produced {}",
                source.class_name()
            )));
        }

        chain.push(name.to_string());
        let parent = match source.super_name() {
            Some(super_name) => Some(self.load(super_name, chain)?),
            None => None,
        };
        chain.pop();

        let vm = self.this.upgrade().ok_or_else(|| {
            VmError::Precondition("virtual machine is shutting down".to_string())
        })?;
        let class = Arc::new(self.compiler.compile_class(&vm, parent, source)?);
        debug!(class = name, "loaded");
        // a concurrent load of the same class may have won the race
        let mut classes = self.classes.lock();
        Ok(Arc::clone(classes.entry(name.to_string()).or_insert(class)))
    }

    /// Resolves `class_name` and looks the method up along its superclass
    /// chain.
    pub fn find_method(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> VmResult<Arc<Method>> {
        self.find_class(class_name)?
            .lookup_method(name, descriptor)?
            .ok_or_else(|| VmError::NoSuchMember {
                owner: class_name.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }

    /// Allocates a throwable of class `class_name` carrying `message`.
    pub fn new_throwable(&self, class_name: &str, message: Option<&str>) -> VmResult<ObjectRef> {
        let class = self.find_class(class_name)?;
        let object = Object::new(&class)?;
        if let Some(message) = message {
            let (name, descriptor) = bootstrap::DETAIL_MESSAGE;
            if let Some(field) = class.lookup_field(name, descriptor)? {
                object.set(&field, Value::from(message))?;
            }
        }
        Ok(object)
    }

    /// Total instructions dispatched by every invocation so far.
    pub fn instructions_dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub(crate) fn count_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("config", &self.config)
            .field("classes", &self.classes.lock().len())
            .finish_non_exhaustive()
    }
}
