//! Minimal `java/lang` classes the interpreter needs to report guest faults
//! when the class source does not provide them.
use crate::access::{ACC_PRIVATE, ACC_PUBLIC};
use crate::source::{ClassNode, FieldNode};

pub const OBJECT: &str = "java/lang/Object";
pub const THROWABLE: &str = "java/lang/Throwable";
pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
pub const ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION: &str = "java/lang/ArrayIndexOutOfBoundsException";

/// Field holding the message of every throwable.
pub const DETAIL_MESSAGE: (&str, &str) = ("detailMessage", "Ljava/lang/String;");

const HIERARCHY: &[(&str, Option<&str>)] = &[
    (OBJECT, None),
    (THROWABLE, Some(OBJECT)),
    ("java/lang/Exception", Some(THROWABLE)),
    ("java/lang/Error", Some(THROWABLE)),
    ("java/lang/RuntimeException", Some("java/lang/Exception")),
    (ARITHMETIC_EXCEPTION, Some("java/lang/RuntimeException")),
    (NULL_POINTER_EXCEPTION, Some("java/lang/RuntimeException")),
    ("java/lang/IndexOutOfBoundsException", Some("java/lang/RuntimeException")),
    (
        ARRAY_INDEX_OUT_OF_BOUNDS_EXCEPTION,
        Some("java/lang/IndexOutOfBoundsException"),
    ),
];

/// Built-in definition of `name`, if it is one of the bootstrap classes.
pub fn lookup(name: &str) -> Option<ClassNode> {
    let (name, super_name) = HIERARCHY.iter().find(|(candidate, _)| *candidate == name)?;
    let mut node = ClassNode::new(name, *super_name, ACC_PUBLIC);
    if *name == THROWABLE {
        let (field, descriptor) = DETAIL_MESSAGE;
        node = node.field(FieldNode::new(field, descriptor, ACC_PRIVATE));
    }
    Some(node)
}
