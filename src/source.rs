//! Boundary with the code that reads class files.
//!
//! Parsing class bytes is not done here: a [`ClassParser`] turns bytes into
//! [`ClassNode`]s and a [`ClassSource`] hands classes to the virtual machine
//! by name.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::access::Modifiers;
use crate::bytecode::{Instruction, Label};
use crate::error::VmResult;

/// The part of a class answerable without parsing its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub name: String,
    pub super_name: Option<String>,
    pub access: Modifiers,
    pub interfaces: Vec<String>,
}

/// One entry of a method's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchNode {
    pub start: Label,
    /// Exclusive.
    pub end: Label,
    pub handler: Label,
    /// `None` catches everything (`finally` blocks).
    pub catch_type: Option<String>,
}

impl TryCatchNode {
    pub fn new(start: usize, end: usize, handler: usize, catch_type: Option<&str>) -> Self {
        Self {
            start: Label(start),
            end: Label(end),
            handler: Label(handler),
            catch_type: catch_type.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    pub name: String,
    pub descriptor: String,
    pub access: Modifiers,
}

impl FieldNode {
    pub fn new(name: &str, descriptor: &str, access: u16) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: Modifiers(access),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodNode {
    pub name: String,
    pub descriptor: String,
    pub access: Modifiers,
    pub instructions: Vec<Instruction>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub try_catch: Vec<TryCatchNode>,
}

impl MethodNode {
    pub fn new(name: &str, descriptor: &str, access: u16) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: Modifiers(access),
            instructions: Vec::new(),
            max_stack: 0,
            max_locals: 0,
            try_catch: Vec::new(),
        }
    }

    #[must_use]
    pub fn code(mut self, max_stack: u16, max_locals: u16, instructions: Vec<Instruction>) -> Self {
        self.max_stack = max_stack;
        self.max_locals = max_locals;
        self.instructions = instructions;
        self
    }

    #[must_use]
    pub fn try_catch(mut self, block: TryCatchNode) -> Self {
        self.try_catch.push(block);
        self
    }
}

/// Parsed class as produced by a [`ClassParser`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassNode {
    pub header: ClassHeader,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(name: &str, super_name: Option<&str>, access: u16) -> Self {
        Self {
            header: ClassHeader {
                name: name.to_string(),
                super_name: super_name.map(str::to_string),
                access: Modifiers(access),
                interfaces: Vec::new(),
            },
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn implements(mut self, interface: &str) -> Self {
        self.header.interfaces.push(interface.to_string());
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldNode) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodNode) -> Self {
        self.methods.push(method);
        self
    }
}

/// Class-file reader supplied by the embedding tool.
pub trait ClassParser: Send + Sync {
    /// Reads only the header: name, super name, access and interfaces.
    fn read_header(&self, bytes: &[u8]) -> VmResult<ClassHeader>;

    /// Full parse, including members and code.
    fn parse(&self, bytes: &[u8]) -> VmResult<ClassNode>;
}

enum Pending {
    Raw {
        bytes: Vec<u8>,
        parser: Arc<dyn ClassParser>,
    },
    Parsed(Arc<ClassNode>),
}

/// A class whose header is known but whose body may not be parsed yet.
///
/// The full parse happens on the first call to [`UnresolvedClass::node`];
/// the result is cached and the raw bytes are released.
pub struct UnresolvedClass {
    header: ClassHeader,
    state: Mutex<Pending>,
}

impl UnresolvedClass {
    /// Wraps raw class bytes, reading only the header up front.
    pub fn lazy(bytes: Vec<u8>, parser: Arc<dyn ClassParser>) -> VmResult<Self> {
        let header = parser.read_header(&bytes)?;
        Ok(Self {
            header,
            state: Mutex::new(Pending::Raw { bytes, parser }),
        })
    }

    /// Wraps an already parsed class.
    pub fn parsed(node: ClassNode) -> Self {
        Self {
            header: node.header.clone(),
            state: Mutex::new(Pending::Parsed(Arc::new(node))),
        }
    }

    pub fn header(&self) -> &ClassHeader {
        &self.header
    }

    pub fn class_name(&self) -> &str {
        &self.header.name
    }

    pub fn super_name(&self) -> Option<&str> {
        self.header.super_name.as_deref()
    }

    pub fn access(&self) -> Modifiers {
        self.header.access
    }

    pub fn is_parsed(&self) -> bool {
        matches!(*self.state.lock(), Pending::Parsed(_))
    }

    /// Full class body, parsing it on first use. A failed parse keeps the
    /// bytes so a later call can retry.
    pub fn node(&self) -> VmResult<Arc<ClassNode>> {
        let mut state = self.state.lock();
        let node = match &*state {
            Pending::Parsed(node) => return Ok(Arc::clone(node)),
            Pending::Raw { bytes, parser } => Arc::new(parser.parse(bytes)?),
        };
        *state = Pending::Parsed(Arc::clone(&node));
        Ok(node)
    }
}

impl fmt::Debug for UnresolvedClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UnresolvedClass")
            .field("header", &self.header)
            .field("parsed", &self.is_parsed())
            .finish()
    }
}

/// Where the virtual machine gets classes from.
pub trait ClassSource: Send + Sync {
    /// Looks a class up by internal name. `Ok(None)` means the source does
    /// not know the class.
    fn lookup(&self, name: &str) -> VmResult<Option<Arc<UnresolvedClass>>>;
}

/// Class source backed by a map, filled by the embedding tool.
#[derive(Debug, Default)]
pub struct MemorySource {
    classes: RwLock<HashMap<String, Arc<UnresolvedClass>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, class: UnresolvedClass) {
        let name = class.class_name().to_string();
        self.classes.write().insert(name, Arc::new(class));
    }

    pub fn insert_node(&self, node: ClassNode) {
        self.insert(UnresolvedClass::parsed(node));
    }

    #[must_use]
    pub fn with(self, node: ClassNode) -> Self {
        self.insert_node(node);
        self
    }
}

impl ClassSource for MemorySource {
    fn lookup(&self, name: &str) -> VmResult<Option<Arc<UnresolvedClass>>> {
        Ok(self.classes.read().get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Parser for a toy format: `name` or `name:super`.
    #[derive(Default)]
    struct ToyParser {
        parses: AtomicUsize,
    }

    impl ClassParser for ToyParser {
        fn read_header(&self, bytes: &[u8]) -> VmResult<ClassHeader> {
            let text = std::str::from_utf8(bytes).map_err(|e| VmError::Parse(e.to_string()))?;
            let mut parts = text.splitn(2, ':');
            let name = parts.next().unwrap_or_default();
            Ok(ClassHeader {
                name: name.to_string(),
                super_name: parts.next().map(str::to_string),
                access: Modifiers(0),
                interfaces: Vec::new(),
            })
        }

        fn parse(&self, bytes: &[u8]) -> VmResult<ClassNode> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            let header = self.read_header(bytes)?;
            Ok(ClassNode {
                header,
                fields: Vec::new(),
                methods: Vec::new(),
            })
        }
    }

    #[test]
    fn header_queries_do_not_parse() {
        let parser = Arc::new(ToyParser::default());
        let class = UnresolvedClass::lazy(b"a/B:a/A".to_vec(), parser.clone()).unwrap();
        assert_eq!(class.class_name(), "a/B");
        assert_eq!(class.super_name(), Some("a/A"));
        assert!(!class.is_parsed());
        assert_eq!(parser.parses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parses_once_and_drops_bytes() {
        let parser = Arc::new(ToyParser::default());
        let class = UnresolvedClass::lazy(b"a/B".to_vec(), parser.clone()).unwrap();
        let first = class.node().unwrap();
        let second = class.node().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(class.is_parsed());
        assert_eq!(parser.parses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memory_source_lookup() {
        let source = MemorySource::new().with(ClassNode::new("a/B", Some("java/lang/Object"), 0));
        assert!(source.lookup("a/B").unwrap().is_some());
        assert!(source.lookup("a/C").unwrap().is_none());
    }
}
