#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! JVM method-body code generation.
//!
//! Callers describe classes with a typed instruction vocabulary; lowering
//! simulates the operand stack and local table while selecting concrete
//! opcodes, resolves labels to instruction indices, and assembles verified
//! `Code` attributes into serialized classfiles.
//!
//! The crate is organized in layers:
//! - [`types`]: the type model (descriptors, generic signatures, widths).
//! - [`frame`] / [`pos`] / [`sink`]: operand-stack tracking, positions, and
//!   the raw instruction stream.
//! - [`insn`]: the instruction vocabulary and its lowering rules.
//! - [`control`]: loops and switch dispatch built on the flat substrate.
//! - [`synth`]: structural `equals`/`hashCode`/`toString` and bridges.
//! - [`model`] / [`classfile`]: class declarations and emission.

pub mod classfile;
pub mod control;
pub mod error;
pub mod frame;
pub mod insn;
pub mod method;
pub mod model;
pub mod pos;
pub mod sink;
pub mod synth;
pub mod types;

pub use classfile::{assemble, emit_class};
pub use control::{ForEach, IntSwitch, StrSwitch, StrSwitchStrategy};
pub use error::{Error, Result};
pub use frame::{Frame, Local};
pub use insn::{ArithOp, CmpOp, Cond, FieldRef, Insn, InvokeKind, MethodRef, Value};
pub use method::{CompiledBody, MethodCx, MethodShape, compile_body};
pub use model::{BuiltClass, ClassBuilder, ClassDef, FieldDef, MethodDef};
pub use pos::Label;
pub use synth::{
    FieldSelection, synthesize_bridge, synthesize_equals, synthesize_hash_code,
    synthesize_to_string,
};
pub use types::{Primitive, Signature, Type};
