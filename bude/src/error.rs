//! Error taxonomy for the core (spec §7).
//!
//! Mirrors how `fuel_vm::error::InterpreterError<StorageError>` wraps
//! narrower, component-owned error enums (`CheckError`, storage errors,
//! panic reasons) behind one top-level type: each subsystem here gets its
//! own `thiserror` enum, and [`BudeError`] aggregates them with `#[from]`.
//! Allocation and I/O failures are fatal and propagate immediately; type and
//! stack-merge errors are *data* ([`Diagnostic`]) accumulated by the checker
//! rather than returned early, per spec §7's propagation policy.

use bude_asm::ErrorKind;

/// The region allocator's only failure mode (spec §4.1): the host allocator
/// refused a request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("region allocator: host allocator refused to provide {requested} bytes")]
pub struct RegionError {
    /// Number of bytes that were requested.
    pub requested: usize,
}

/// One accumulated checker finding, carrying enough context to print a
/// useful line (spec §6: "one line per error, each carrying the offending
/// IR offset or source location when available").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Which taxonomy bucket this finding falls into.
    pub kind: ErrorKind,
    /// Byte offset into the block's code, if the finding is tied to one.
    pub offset: Option<usize>,
    /// Human-readable detail.
    pub message: String,
}

impl Diagnostic {
    /// Builds a diagnostic anchored to an instruction offset.
    pub fn at(kind: ErrorKind, offset: usize, message: impl Into<String>) -> Self {
        Diagnostic { kind, offset: Some(offset), message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{offset}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Sink diagnostics are reported to as the checker walks a block. The caller
/// owns this (spec §5: "a shared error sink owned by the caller").
pub trait DiagnosticSink {
    /// Records one diagnostic. Never fails; a sink that wants to bound
    /// memory should simply stop appending past some cap of its own choosing.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Aggregate result of a type-checking pass: every diagnostic recorded,
/// regardless of severity. `had_error()` mirrors the C checker's sticky
/// `had_error` flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// All diagnostics recorded during the pass, in the order produced.
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    /// Whether any diagnostic was recorded; the checker's `OK`/error result
    /// is exactly `!had_error()`.
    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl DiagnosticSink for CheckReport {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Failure modes of the BudeBWF reader/writer (spec §4.4, §7). All are
/// non-recoverable for the file being processed.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Fewer bytes were available than a fixed-size field required.
    #[error("truncated container: needed {needed} more byte(s) at offset {offset}")]
    Truncated {
        /// Offset the read was attempted at.
        offset: usize,
        /// Additional bytes that would have been required.
        needed: usize,
    },
    /// The header's magic literal did not read `BudeBWF`.
    #[error("bad magic number")]
    BadMagic,
    /// The header's version digits failed to parse, or were absent.
    #[error("malformed version header")]
    BadVersionHeader,
    /// `version > reader's supported version`.
    #[error("unsupported version {found}: this reader supports up to {supported}")]
    UnsupportedVersion {
        /// Version declared by the file.
        found: u32,
        /// Highest version this reader understands.
        supported: u32,
    },
    /// A count field that must be non-negative was negative.
    #[error("negative count in field `{field}`: {value}")]
    NegativeCount {
        /// Name of the offending field, for diagnostics.
        field: &'static str,
        /// The negative value read.
        value: i32,
    },
    /// An index field pointed outside the table it indexes.
    #[error("index {index} out of range for {table} (len {len})")]
    OutOfRangeIndex {
        /// Name of the table being indexed.
        table: &'static str,
        /// The offending index.
        index: i32,
        /// Number of entries actually present.
        len: usize,
    },
    /// `data_info_field_count` (or an entry's `entry_size`) was too small to
    /// hold the fields the reader's version requires.
    #[error("malformed section length: {0}")]
    MalformedSectionLength(String),
    /// A function's code section contained a byte that does not decode to
    /// any known opcode.
    #[error("invalid opcode byte {byte:#04x} at code offset {offset}")]
    InvalidOpcode {
        /// Offset into the function's code section.
        offset: usize,
        /// The offending byte.
        byte: u8,
    },
}

/// Failure modes of the assembly emitter.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The caller tried to emit a block the checker reported errors for.
    #[error("refusing to emit: type checker reported {0} error(s)")]
    CheckerFailed(usize),
    /// Writing to the output sink failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type aggregating every subsystem, the way
/// `InterpreterError<StorageError>` aggregates `fuel-vm`'s component errors.
#[derive(Debug, thiserror::Error)]
pub enum BudeError {
    /// The region allocator could not satisfy a request.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// The container reader or writer failed.
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// Type checking completed with errors.
    #[error("type checking failed with {} error(s)", .0.diagnostics.len())]
    Check(CheckReport),
    /// The assembly emitter failed.
    #[error(transparent)]
    Emit(#[from] EmitError),
}
