/// Taxonomy of error conditions the core can report, independent of how a
/// particular caller chooses to surface them. Mirrors the way
/// `fuel_asm::PanicReason` gives the interpreter's error machinery a plain
/// data vocabulary, separate from the `Display`/control-flow wrapper that
/// lives in `bude::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Host allocator refused a request.
    AllocationFailure,
    /// Read/write/seek failed on the container.
    IoFailure,
    /// Bad magic, truncation, inconsistent lengths, or out-of-range index.
    MalformedContainer,
    /// File version is newer than this reader supports.
    UnsupportedVersion,
    /// Arithmetic on incompatible types, wrong operand kind, or `PTR+PTR`.
    TypeError,
    /// Underflow or overflow of the compile-time type stack.
    StackError,
    /// Inconsistent stack profiles at a jump destination.
    StackMergeError,
    /// Non-`NOP` bytes between an unconditional transfer and the next jump
    /// destination.
    UnreachableCode,
}

impl ErrorKind {
    /// Whether this error kind is fatal to the current operation (aborts
    /// immediately) as opposed to accumulated diagnostics the checker keeps
    /// going after recording (spec §7 propagation policy).
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::AllocationFailure
                | ErrorKind::IoFailure
                | ErrorKind::MalformedContainer
                | ErrorKind::UnsupportedVersion
        )
    }
}
