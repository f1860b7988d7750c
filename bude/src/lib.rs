//! Region allocator, word-oriented IR, type checker, BudeBWF container
//! codec, and PE64 assembly emitter for the Bude compiler.
//!
//! Plays the same role for the Bude toolchain that `fuel-vm` plays for the
//! FuelVM: `bude-asm` (analogous to `fuel-asm`) owns the byte-level
//! vocabulary, and this crate owns the stateful subsystems built on top of
//! it — allocation, the IR itself, type checking and lowering, the on-disk
//! container format, and code generation.
#![warn(missing_docs)]

pub mod bwf;
pub mod check;
pub mod emit;
pub mod error;
pub mod externs;
pub mod function;
pub mod ir;
pub mod module;
pub mod region;
pub mod strings;
pub mod symbol;
pub mod types;

pub use bwf::{read_module, write_module, CURRENT_VERSION};
pub use check::{check, CheckerOptions};
pub use emit::generate;
pub use error::{BudeError, CheckReport, Diagnostic, DiagnosticSink};
pub use function::Function;
pub use ir::Block;
pub use module::Module;
pub use region::{Region, RegionSlice, RegionSnapshot};
