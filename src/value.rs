//! Operand values manipulated by the interpreter.
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class::Class;
use crate::descriptor::FieldType;
use crate::error::{VmError, VmResult};
use crate::member::Field;

pub type ObjectRef = Arc<Object>;
pub type ArrayRef = Arc<Array>;

/// Widening and narrowing between the JVM numeric kinds.
///
/// Conversions follow the JVM rules, which Rust's `as` already implements:
/// float to integer saturates and maps NaN to zero, sub-int narrowing goes
/// through `int` first.
pub trait Numeric: Copy {
    fn to_int(self) -> i32;
    fn to_long(self) -> i64;
    fn to_float(self) -> f32;
    fn to_double(self) -> f64;

    fn to_byte(self) -> i8 {
        self.to_int() as i8
    }

    fn to_short(self) -> i16 {
        self.to_int() as i16
    }

    fn to_char(self) -> u16 {
        self.to_int() as u16
    }
}

macro_rules! impl_numeric {
    ($($t:ty),*) => {
        $(
            impl Numeric for $t {
                fn to_int(self) -> i32 {
                    self as i32
                }
                fn to_long(self) -> i64 {
                    self as i64
                }
                fn to_float(self) -> f32 {
                    self as f32
                }
                fn to_double(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_numeric!(i8, i16, i32, i64, f32, f64);

/// JVM value types.
///
/// The numeric variants form the closed set of boxed numbers the
/// interpreter understands. `Top` fills the upper slot of a `long` or
/// `double` on the operand stack and in the locals.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Byte(i8),
    Short(i16),
    Null,
    Object(ObjectRef),
    Array(ArrayRef),
    Str(Arc<str>),
    Class(Arc<Class>),
    Top,
}

macro_rules! numeric_accessor {
    ($name:ident, $t:ty) => {
        pub fn $name(&self) -> Option<$t> {
            match *self {
                Self::Int(v) => Some(v.$name()),
                Self::Long(v) => Some(v.$name()),
                Self::Float(v) => Some(v.$name()),
                Self::Double(v) => Some(v.$name()),
                Self::Byte(v) => Some(v.$name()),
                Self::Short(v) => Some(v.$name()),
                _ => None,
            }
        }
    };
}

impl Value {
    numeric_accessor!(to_int, i32);
    numeric_accessor!(to_long, i64);
    numeric_accessor!(to_float, f32);
    numeric_accessor!(to_double, f64);
    numeric_accessor!(to_byte, i8);
    numeric_accessor!(to_short, i16);
    numeric_accessor!(to_char, u16);

    /// Zero value of a field or array element of the given type.
    pub fn default_for(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Long => Self::Long(0),
            FieldType::Float => Self::Float(0.0),
            FieldType::Double => Self::Double(0.0),
            FieldType::Object(_) | FieldType::Array(_) => Self::Null,
            _ => Self::Int(0),
        }
    }

    /// True when this value has the computational kind `field_type` is
    /// carried as. Reference types are not checked for assignability.
    pub fn fits(&self, field_type: &FieldType) -> bool {
        match field_type {
            FieldType::Long => matches!(self, Self::Long(_)),
            FieldType::Float => matches!(self, Self::Float(_)),
            FieldType::Double => matches!(self, Self::Double(_)),
            FieldType::Object(_) | FieldType::Array(_) => self.is_reference(),
            _ => matches!(self, Self::Int(_) | Self::Byte(_) | Self::Short(_)),
        }
    }

    /// Category-2 values take two slots.
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    pub const fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int(_)
                | Self::Long(_)
                | Self::Float(_)
                | Self::Double(_)
                | Self::Byte(_)
                | Self::Short(_)
        )
    }

    pub const fn is_reference(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Object(_) | Self::Array(_) | Self::Str(_) | Self::Class(_)
        )
    }

    /// Reference identity as `if_acmpeq` sees it. String constants are
    /// interned so they compare by content.
    pub fn same_reference(&self, other: &Value) -> Option<bool> {
        let same = match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (a, b) if a.is_reference() && b.is_reference() => false,
            _ => return None,
        };
        Some(same)
    }

    /// Short name of the variant, used in diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Null => "null",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Str(_) => "string",
            Self::Class(_) => "class",
            Self::Top => "top",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Top, Self::Top) => true,
            (a, b) => a.same_reference(b).unwrap_or(false),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Arc::from(v))
    }
}

/// Heap object: its class plus one slot per instance field, superclass
/// fields first.
pub struct Object {
    class: Arc<Class>,
    fields: Mutex<Vec<Value>>,
}

impl Object {
    /// Allocates a zeroed instance, resolving the class if needed.
    pub fn new(class: &Arc<Class>) -> VmResult<ObjectRef> {
        let fields = class.instance_template()?;
        Ok(Arc::new(Self {
            class: Arc::clone(class),
            fields: Mutex::new(fields),
        }))
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn get(&self, field: &Field) -> VmResult<Value> {
        let slot = self.slot_of(field)?;
        Ok(self.fields.lock()[slot].clone())
    }

    pub fn set(&self, field: &Field, value: Value) -> VmResult<()> {
        let slot = self.slot_of(field)?;
        self.fields.lock()[slot] = value;
        Ok(())
    }

    /// Detail message of a throwable, if one was recorded.
    pub fn message(&self) -> Option<Arc<str>> {
        let field = self
            .class
            .lookup_field("detailMessage", "Ljava/lang/String;")
            .ok()??;
        match self.get(&field) {
            Ok(Value::Str(message)) => Some(message),
            _ => None,
        }
    }

    fn slot_of(&self, field: &Field) -> VmResult<usize> {
        let len = self.fields.lock().len();
        if field.is_static() || field.slot() >= len {
            return Err(VmError::Precondition(format!(
                "field {} is not an instance field of {}",
                field.member(),
                self.class.name()
            )));
        }
        Ok(field.slot())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.class.name(), message),
            None => write!(f, "{}", self.class.name()),
        }
    }
}

/// Element type of an array, as encoded by `newarray` or a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference(String),
}

impl ArrayKind {
    /// Decodes the `atype` operand of `newarray`.
    pub fn from_atype(atype: u8) -> Option<Self> {
        let kind = match atype {
            4 => Self::Boolean,
            5 => Self::Char,
            6 => Self::Float,
            7 => Self::Double,
            8 => Self::Byte,
            9 => Self::Short,
            10 => Self::Int,
            11 => Self::Long,
            _ => return None,
        };
        Some(kind)
    }

    pub fn default_value(&self) -> Value {
        match self {
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Reference(_) => Value::Null,
            _ => Value::Int(0),
        }
    }
}

/// Fixed-length array. Sub-int elements are kept as `Int` already narrowed
/// to their element width.
pub struct Array {
    kind: ArrayKind,
    elements: Mutex<Vec<Value>>,
}

impl Array {
    pub fn new(kind: ArrayKind, len: usize) -> ArrayRef {
        let elements = vec![kind.default_value(); len];
        Arc::new(Self {
            kind,
            elements: Mutex::new(elements),
        })
    }

    pub fn from_values(kind: ArrayKind, elements: Vec<Value>) -> ArrayRef {
        Arc::new(Self {
            kind,
            elements: Mutex::new(elements),
        })
    }

    pub fn kind(&self) -> &ArrayKind {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, `None` when out of bounds.
    pub fn get(&self, index: i32) -> Option<Value> {
        let index = usize::try_from(index).ok()?;
        self.elements.lock().get(index).cloned()
    }

    /// Overwrites the element at `index`, returns false when out of bounds.
    pub fn set(&self, index: i32, value: Value) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        match self.elements.lock().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.elements.lock().clone()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Array")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}
