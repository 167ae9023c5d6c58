//! Field and method type descriptors, e.g. `I`, `[Ljava/lang/String;` or
//! `(IJ)V`.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{VmError, VmResult};

static METHOD_DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([^)]*)\)(.+)$").expect("method descriptor pattern"));

static FIELD_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\[*)([ZBCSIJFD]|L[^;\[]+;)").expect("field type pattern"));

/// Type of a field, parameter or array element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Internal class name, e.g. `java/lang/String`.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> VmResult<Self> {
        let (field_type, length) = Self::parse_prefix(descriptor)?;
        if length != descriptor.len() {
            return Err(VmError::Descriptor(descriptor.to_string()));
        }
        Ok(field_type)
    }

    /// Parses one type at the start of `input`, returning it with the number
    /// of bytes consumed.
    fn parse_prefix(input: &str) -> VmResult<(Self, usize)> {
        let caps = FIELD_TYPE
            .captures(input)
            .ok_or_else(|| VmError::Descriptor(input.to_string()))?;
        let dims = caps.get(1).map_or(0, |m| m.len());
        let element = caps.get(2).map_or("", |m| m.as_str());
        let mut field_type = match element {
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "C" => Self::Char,
            "S" => Self::Short,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            object => Self::Object(object[1..object.len() - 1].to_string()),
        };
        for _ in 0..dims {
            field_type = Self::Array(Box::new(field_type));
        }
        Ok((field_type, dims + element.len()))
    }

    /// Returns the size in slots of a given type.
    pub const fn size(&self) -> usize {
        match self {
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("Z"),
            Self::Byte => f.write_str("B"),
            Self::Char => f.write_str("C"),
            Self::Short => f.write_str("S"),
            Self::Int => f.write_str("I"),
            Self::Long => f.write_str("J"),
            Self::Float => f.write_str("F"),
            Self::Double => f.write_str("D"),
            Self::Object(name) => write!(f, "L{name};"),
            Self::Array(element) => write!(f, "[{element}"),
        }
    }
}

/// Parameter types and return type of a method. A `None` return type is
/// `void`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    params: Vec<FieldType>,
    ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> VmResult<Self> {
        let caps = METHOD_DESCRIPTOR
            .captures(descriptor)
            .ok_or_else(|| VmError::Descriptor(descriptor.to_string()))?;
        let mut rest = caps.get(1).map_or("", |m| m.as_str());
        let ret = caps.get(2).map_or("", |m| m.as_str());

        let mut params = Vec::new();
        while !rest.is_empty() {
            let (param, length) = FieldType::parse_prefix(rest)?;
            params.push(param);
            rest = &rest[length..];
        }
        let ret = match ret {
            "V" => None,
            other => Some(FieldType::parse(other)?),
        };
        Ok(Self { params, ret })
    }

    pub fn params(&self) -> &[FieldType] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&FieldType> {
        self.ret.as_ref()
    }

    /// Local slots taken by the parameters, not counting `this`.
    pub fn arg_slots(&self) -> usize {
        self.params.iter().map(FieldType::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_descriptors() {
        let desc = MethodDescriptor::parse("(I[Ljava/lang/String;JD)V").unwrap();
        assert_eq!(
            desc.params(),
            &[
                FieldType::Int,
                FieldType::Array(Box::new(FieldType::Object("java/lang/String".into()))),
                FieldType::Long,
                FieldType::Double,
            ]
        );
        assert_eq!(desc.return_type(), None);
        assert_eq!(desc.arg_slots(), 6);

        let desc = MethodDescriptor::parse("()[[I").unwrap();
        assert!(desc.params().is_empty());
        assert_eq!(desc.return_type().map(ToString::to_string), Some("[[I".into()));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Q)V").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(FieldType::parse("II").is_err());
        assert!(matches!(FieldType::parse(""), Err(VmError::Descriptor(_))));
    }

    #[test]
    fn field_sizes() {
        assert_eq!(FieldType::parse("J").unwrap().size(), 2);
        assert_eq!(FieldType::parse("[J").unwrap().size(), 1);
        assert!(FieldType::parse("Ljava/lang/Object;").unwrap().is_reference());
    }
}
