//! cortado is a JVM bytecode interpreter meant to be embedded in analysis
//! tooling: it runs already-parsed method bytecode directly so the host can
//! simulate what a method does without a real JVM.
//!
//! The moving parts, leaves first:
//!
//! * [`stack::ExecutionStack`] and [`context::ExecutionContext`] hold the
//!   state of a single invocation.
//! * [`handlers::InstructionHandlers`] maps every opcode to one
//!   [`handlers::InstructionHandler`].
//! * [`member::Method`], [`member::Field`] and [`class::Class`] are the
//!   runtime descriptors built by a [`compiler::Compiler`].
//! * [`vm::VirtualMachine`] ties a [`source::ClassSource`] to a compiler and
//!   caches loaded classes.
pub mod access;
pub mod bootstrap;
pub mod bytecode;
pub mod class;
pub mod compiler;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod interpreter;
pub mod member;
pub mod source;
pub mod stack;
pub mod value;
pub mod vm;

pub use error::{ErrorKind, VmError, VmResult};
pub use value::Value;
pub use vm::VirtualMachine;
