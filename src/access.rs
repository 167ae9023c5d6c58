//! JVM access flags as carried by classes and members.
use std::fmt;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// Raw access flags with named accessors.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub const fn is_public(self) -> bool {
        self.contains(ACC_PUBLIC)
    }

    pub const fn is_static(self) -> bool {
        self.contains(ACC_STATIC)
    }

    pub const fn is_final(self) -> bool {
        self.contains(ACC_FINAL)
    }

    pub const fn is_native(self) -> bool {
        self.contains(ACC_NATIVE)
    }

    pub const fn is_abstract(self) -> bool {
        self.contains(ACC_ABSTRACT)
    }

    pub const fn is_interface(self) -> bool {
        self.contains(ACC_INTERFACE)
    }

    pub const fn is_synthetic(self) -> bool {
        self.contains(ACC_SYNTHETIC)
    }
}

impl fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Modifiers(0x{:04x})", self.0)
    }
}

impl From<u16> for Modifiers {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}
