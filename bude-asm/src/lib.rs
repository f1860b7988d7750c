//! Atomic instruction and type definitions for the Bude word-oriented IR.
//!
//! This crate plays the same role for [`bude`](https://docs.rs/bude) that
//! `fuel-asm` plays for `fuel-vm`: it owns the byte-level vocabulary (opcodes,
//! operand widths, type indices, calling conventions, diagnostic kinds) with
//! no allocation, no I/O, and no knowledge of how a block of code is built or
//! checked. Everything here is `Copy` data.
#![warn(missing_docs)]
#![deny(unsafe_code)]

mod calling_convention;
mod diagnostic;
mod opcode;
mod types;

pub use calling_convention::CallingConvention;
pub use diagnostic::ErrorKind;
pub use opcode::{InvalidOpcode, Opcode};
pub use types::{is_simple, SimpleType, TypeIndex, TypeInfo, TypeKind, SIMPLE_TYPE_COUNT};
