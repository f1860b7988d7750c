//! The type checker / lowering pass (spec §4.3). Walks one [`Block`] left to
//! right, maintains a compile-time operand-type stack, rewrites arithmetic
//! and print instructions in place, and checks that the stack profile at
//! every jump destination agrees across all incoming edges.
//!
//! Grounded on `type_checker.c`'s `type_check` and its `arithmetic_conversions`
//! table; see `DESIGN.md` for the handful of places this implementation
//! follows the specification's text over a literal reading of that source
//! (pointer subtraction's conversion site, in particular).

use std::collections::BTreeMap;

use bude_asm::{ErrorKind, Opcode, SimpleType, TypeIndex};

use crate::error::{CheckReport, Diagnostic, DiagnosticSink};
use crate::ir::Block;

/// Knobs controlling one checking pass.
#[derive(Debug, Clone, Copy)]
pub struct CheckerOptions {
    /// Whether to run the peephole optimizer before type checking.
    pub peephole: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        CheckerOptions { peephole: true }
    }
}

/// The four-way result of looking up how to combine two arithmetic operand
/// types: the result type and the three conversion opcodes to splice into
/// the block's reserved padding slots. Mirrors `struct arithm_conv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArithmeticConversion {
    result: TypeIndex,
    lhs_conv: Opcode,
    rhs_conv: Opcode,
    result_conv: Opcode,
}

const ERROR_TYPE: TypeIndex = SimpleType::Error as TypeIndex;

impl ArithmeticConversion {
    const ERROR: ArithmeticConversion = ArithmeticConversion {
        result: ERROR_TYPE,
        lhs_conv: Opcode::Nop,
        rhs_conv: Opcode::Nop,
        result_conv: Opcode::Nop,
    };

    const fn of(result: SimpleType, lhs_conv: Opcode, rhs_conv: Opcode, result_conv: Opcode) -> Self {
        ArithmeticConversion { result: result.index(), lhs_conv, rhs_conv, result_conv }
    }
}

/// The dispatch table backing `ADD`/`SUB`/`MULT`/`DIVMOD` lowering. Only
/// `WORD`/`BYTE`/`INT` combinations are populated — every other pairing
/// (including any involving `PTR`, which is special-cased separately) is a
/// type error. Values below mirror `type_checker.c`'s `arithmetic_conversions`
/// table exactly.
fn arithmetic_conversion(lhs: TypeIndex, rhs: TypeIndex) -> ArithmeticConversion {
    use SimpleType::*;
    let word = Word.index();
    let byte = Byte.index();
    let int = Int.index();
    match (lhs, rhs) {
        (l, r) if l == word && r == word => ArithmeticConversion::of(Word, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == word && r == byte => ArithmeticConversion::of(Word, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == word && r == int => ArithmeticConversion::of(Word, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == byte && r == word => ArithmeticConversion::of(Word, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == byte && r == byte => ArithmeticConversion::of(Byte, Opcode::Nop, Opcode::Nop, Opcode::Zx8),
        (l, r) if l == byte && r == int => ArithmeticConversion::of(Int, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == int && r == word => ArithmeticConversion::of(Word, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == int && r == byte => ArithmeticConversion::of(Int, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        (l, r) if l == int && r == int => ArithmeticConversion::of(Int, Opcode::Nop, Opcode::Nop, Opcode::Nop),
        _ => ArithmeticConversion::ERROR,
    }
}

fn is_integral(ty: TypeIndex) -> bool {
    ty == SimpleType::Word.index() || ty == SimpleType::Byte.index() || ty == SimpleType::Int.index()
}

fn is_signed(ty: TypeIndex) -> bool {
    ty == SimpleType::Int.index()
}

/// The conversion needed to reinterpret a `WORD`/`BYTE`/`INT` value as
/// `INT`. For this type set it is always `NOP` — every representable value
/// already occupies a full, correctly-extended machine word — but it is
/// computed from the dispatch table (not hardcoded) to stay data-driven.
fn promote_to_int(ty: TypeIndex) -> Opcode {
    arithmetic_conversion(SimpleType::Int.index(), ty).rhs_conv
}

fn sign_extend_for_print(ty: TypeIndex) -> Opcode {
    if ty == SimpleType::Byte.index() {
        Opcode::Sx8
    } else {
        Opcode::Nop
    }
}

/// Per-destination checkpoint: the operand-type stack recorded the first
/// time control reached this offset, plus the offset of the jump that
/// registered it (`None` if first reached by fall-through).
struct Checkpoint {
    stack: Vec<TypeIndex>,
    #[allow(dead_code)]
    source: Option<usize>,
}

struct Checker {
    stack: Vec<TypeIndex>,
    checkpoints: BTreeMap<usize, Checkpoint>,
}

/// Depth past which a block is certainly malformed rather than merely deep;
/// guards against unbounded growth on a corrupt or adversarial block.
const MAX_STACK_DEPTH: usize = 4096;

impl Checker {
    fn new() -> Self {
        Checker { stack: Vec::new(), checkpoints: BTreeMap::new() }
    }

    fn push(&mut self, ty: TypeIndex, offset: usize, sink: &mut impl DiagnosticSink) {
        if self.stack.len() >= MAX_STACK_DEPTH {
            sink.report(Diagnostic::at(ErrorKind::StackError, offset, "type stack overflow"));
            return;
        }
        self.stack.push(ty);
    }

    fn pop(&mut self, offset: usize, sink: &mut impl DiagnosticSink) -> TypeIndex {
        match self.stack.pop() {
            Some(ty) => ty,
            None => {
                sink.report(Diagnostic::at(ErrorKind::StackError, offset, "type stack underflow"));
                ERROR_TYPE
            }
        }
    }

    fn peek(&mut self, offset: usize, sink: &mut impl DiagnosticSink) -> TypeIndex {
        match self.stack.last() {
            Some(ty) => *ty,
            None => {
                sink.report(Diagnostic::at(ErrorKind::StackError, offset, "type stack underflow"));
                ERROR_TYPE
            }
        }
    }

    fn enter_destination(&mut self, offset: usize, sink: &mut impl DiagnosticSink) {
        match self.checkpoints.get(&offset) {
            None => {
                self.checkpoints.insert(offset, Checkpoint { stack: self.stack.clone(), source: None });
            }
            Some(checkpoint) => {
                if checkpoint.stack != self.stack {
                    sink.report(Diagnostic::at(
                        ErrorKind::StackMergeError,
                        offset,
                        "inconsistent stack at jump destination",
                    ));
                }
            }
        }
    }

    fn save_jump(&mut self, block: &mut Block, source: usize, sink: &mut impl DiagnosticSink) {
        let rel = block.read_s16(source + 1) as isize;
        let dest = (source as isize + 1 + rel).max(0) as usize;
        block.register_jump_dest(dest);
        match self.checkpoints.get(&dest) {
            None => {
                self.checkpoints.insert(dest, Checkpoint { stack: self.stack.clone(), source: Some(source) });
            }
            Some(checkpoint) => {
                if checkpoint.stack != self.stack {
                    sink.report(Diagnostic::at(
                        ErrorKind::StackMergeError,
                        source,
                        "inconsistent stack after jump instruction",
                    ));
                }
            }
        }
    }

    /// Scans forward from `after`, skipping `NOP`s that are not themselves
    /// jump destinations, reports any genuinely unreachable byte range found,
    /// and restores the stack to the checkpoint recorded at whatever
    /// destination is reached next. Returns the offset the main scan should
    /// resume at.
    fn check_unreachable(&mut self, block: &Block, after: usize, sink: &mut impl DiagnosticSink) -> usize {
        let len = block.len();
        let mut pos = after;
        while pos < len && block.opcode_at(pos) == Opcode::Nop && !block.is_jump_dest(pos) {
            pos += 1;
        }
        if pos >= len {
            return len;
        }
        if !block.is_jump_dest(pos) {
            let start = pos;
            let mut end = pos;
            while end + 1 < len && !block.is_jump_dest(end + 1) {
                end += 1;
            }
            if end + 1 < len {
                sink.report(Diagnostic::at(
                    ErrorKind::UnreachableCode,
                    start,
                    format!("code from index {start} to {end} is unreachable"),
                ));
                pos = end + 1;
            } else {
                sink.report(Diagnostic::at(
                    ErrorKind::UnreachableCode,
                    start,
                    format!("code from index {start} to end is unreachable"),
                ));
                return len;
            }
        }
        if let Some(checkpoint) = self.checkpoints.get(&pos) {
            self.stack = checkpoint.stack.clone();
        }
        pos
    }
}

enum PointerAdd {
    NotApplicable,
    BothPointers,
    Promote { slot: usize, conv: Opcode },
}

fn check_pointer_add(lhs: TypeIndex, rhs: TypeIndex, lhs_slot: usize, rhs_slot: usize) -> PointerAdd {
    let ptr = SimpleType::Ptr.index();
    if lhs == ptr && rhs == ptr {
        PointerAdd::BothPointers
    } else if lhs == ptr {
        PointerAdd::Promote { slot: rhs_slot, conv: promote_to_int(rhs) }
    } else if rhs == ptr {
        PointerAdd::Promote { slot: lhs_slot, conv: promote_to_int(lhs) }
    } else {
        PointerAdd::NotApplicable
    }
}

enum PointerSub {
    NotApplicable,
    BothPointers,
    PtrMinusIntegral { slot: usize, conv: Opcode },
    Invalid,
}

fn check_pointer_sub(lhs: TypeIndex, rhs: TypeIndex, rhs_slot: usize) -> PointerSub {
    let ptr = SimpleType::Ptr.index();
    if lhs == ptr && rhs == ptr {
        PointerSub::BothPointers
    } else if lhs == ptr && is_integral(rhs) {
        PointerSub::PtrMinusIntegral { slot: rhs_slot, conv: promote_to_int(rhs) }
    } else if lhs == ptr || rhs == ptr {
        PointerSub::Invalid
    } else {
        PointerSub::NotApplicable
    }
}

/// Runs the peephole optimizer: elides a pushed-then-immediately-discarded
/// value, collapses double negation, and folds a negation into the
/// following conditional jump's polarity. Each rewrite is skipped if the
/// second instruction is itself a jump destination (spec §9's open
/// question: the rewrite must not swallow a destination other code jumps
/// to).
pub fn run_peephole(block: &mut Block) {
    let mut offset = 0;
    while offset < block.len() {
        let op = block.opcode_at(offset);
        let next_offset = offset + op.len();
        if next_offset >= block.len() {
            offset = next_offset;
            continue;
        }
        let next_op = block.opcode_at(next_offset);
        if block.is_jump_dest(next_offset) {
            offset = next_offset;
            continue;
        }
        let produces_one_word = matches!(
            op,
            Opcode::Push8
                | Opcode::Push16
                | Opcode::Push32
                | Opcode::Push64
                | Opcode::PushInt8
                | Opcode::PushInt16
                | Opcode::PushInt32
                | Opcode::PushInt64
                | Opcode::PushChar8
        );
        if produces_one_word && next_op == Opcode::Pop {
            block.fill_nop(offset, op.len());
            block.fill_nop(next_offset, next_op.len());
            offset = next_offset + next_op.len();
            continue;
        }
        if op == Opcode::Not && next_op == Opcode::Not {
            block.fill_nop(offset, 1);
            block.fill_nop(next_offset, 1);
            offset = next_offset + 1;
            continue;
        }
        if op == Opcode::Not && next_op == Opcode::JumpCond {
            block.fill_nop(offset, 1);
            block.overwrite_opcode(next_offset, Opcode::JumpNcond);
            offset = next_offset + next_op.len();
            continue;
        }
        if op == Opcode::Not && next_op == Opcode::JumpNcond {
            block.fill_nop(offset, 1);
            block.overwrite_opcode(next_offset, Opcode::JumpCond);
            offset = next_offset + next_op.len();
            continue;
        }
        offset = next_offset;
    }
}

/// Type-checks and lowers `block` in place, returning every diagnostic
/// recorded. An empty report means the block is safe to pass to the
/// emitter.
#[tracing::instrument(level = "debug", skip_all, fields(code_len = block.len()))]
pub fn check(block: &mut Block, options: &CheckerOptions) -> CheckReport {
    let mut report = CheckReport::default();
    if options.peephole {
        run_peephole(block);
        tracing::trace!("peephole pass complete");
    }
    let mut checker = Checker::new();
    let mut offset = 0;
    while offset < block.len() {
        if block.is_jump_dest(offset) {
            checker.enter_destination(offset, &mut report);
        }
        let op = block.opcode_at(offset);
        let mut next_offset = offset + op.len();
        match op {
            Opcode::Nop => {}
            Opcode::Push8 | Opcode::Push16 | Opcode::Push32 | Opcode::Push64 => {
                checker.push(SimpleType::Word.index(), offset, &mut report);
            }
            Opcode::PushInt8 | Opcode::PushInt16 | Opcode::PushInt32 | Opcode::PushInt64 => {
                checker.push(SimpleType::Int.index(), offset, &mut report);
            }
            Opcode::PushChar8 => {
                checker.push(SimpleType::Byte.index(), offset, &mut report);
            }
            Opcode::LoadString8 | Opcode::LoadString16 | Opcode::LoadString32 => {
                checker.push(SimpleType::Ptr.index(), offset, &mut report);
                checker.push(SimpleType::Word.index(), offset, &mut report);
            }
            Opcode::Pop => {
                checker.pop(offset, &mut report);
            }
            Opcode::Dupe => {
                let ty = checker.pop(offset, &mut report);
                checker.push(ty, offset, &mut report);
                checker.push(ty, offset, &mut report);
            }
            Opcode::Swap => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                checker.push(rhs, offset, &mut report);
                checker.push(lhs, offset, &mut report);
            }
            Opcode::Add => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let lhs_slot = offset - 2;
                let rhs_slot = offset - 1;
                let result = match check_pointer_add(lhs, rhs, lhs_slot, rhs_slot) {
                    PointerAdd::BothPointers => {
                        report.report(Diagnostic::at(ErrorKind::TypeError, offset, "cannot add two pointers"));
                        SimpleType::Word.index()
                    }
                    PointerAdd::Promote { slot, conv } => {
                        block.overwrite_opcode(slot, conv);
                        SimpleType::Ptr.index()
                    }
                    PointerAdd::NotApplicable => {
                        let conv = arithmetic_conversion(lhs, rhs);
                        let result = if conv.result == ERROR_TYPE {
                            report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `+`"));
                            SimpleType::Word.index()
                        } else {
                            conv.result
                        };
                        block.overwrite_opcode(lhs_slot, conv.lhs_conv);
                        block.overwrite_opcode(rhs_slot, conv.rhs_conv);
                        block.overwrite_opcode(offset + 1, conv.result_conv);
                        result
                    }
                };
                checker.push(result, offset, &mut report);
            }
            Opcode::Sub => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let lhs_slot = offset - 2;
                let rhs_slot = offset - 1;
                let result = match check_pointer_sub(lhs, rhs, rhs_slot) {
                    PointerSub::BothPointers => SimpleType::Int.index(),
                    PointerSub::PtrMinusIntegral { slot, conv } => {
                        block.overwrite_opcode(slot, conv);
                        SimpleType::Ptr.index()
                    }
                    PointerSub::Invalid => {
                        report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `-`"));
                        SimpleType::Word.index()
                    }
                    PointerSub::NotApplicable => {
                        let conv = arithmetic_conversion(lhs, rhs);
                        let result = if conv.result == ERROR_TYPE {
                            report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `-`"));
                            SimpleType::Word.index()
                        } else {
                            conv.result
                        };
                        block.overwrite_opcode(lhs_slot, conv.lhs_conv);
                        block.overwrite_opcode(rhs_slot, conv.rhs_conv);
                        block.overwrite_opcode(offset + 1, conv.result_conv);
                        result
                    }
                };
                checker.push(result, offset, &mut report);
            }
            Opcode::Mult => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let conv = arithmetic_conversion(lhs, rhs);
                let result = if conv.result == ERROR_TYPE {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `*`"));
                    SimpleType::Word.index()
                } else {
                    conv.result
                };
                block.overwrite_opcode(offset - 2, conv.lhs_conv);
                block.overwrite_opcode(offset - 1, conv.rhs_conv);
                block.overwrite_opcode(offset + 1, conv.result_conv);
                checker.push(result, offset, &mut report);
            }
            Opcode::Divmod => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let conv = arithmetic_conversion(lhs, rhs);
                let result = if conv.result == ERROR_TYPE {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `divmod`"));
                    SimpleType::Word.index()
                } else {
                    conv.result
                };
                if is_signed(result) {
                    let chosen = if is_signed(lhs) { Opcode::Edivmod } else { Opcode::Idivmod };
                    block.overwrite_opcode(offset, chosen);
                }
                block.overwrite_opcode(offset - 2, conv.lhs_conv);
                block.overwrite_opcode(offset - 1, conv.rhs_conv);
                block.overwrite_opcode(offset + 1, conv.result_conv);
                checker.push(result, offset, &mut report);
                checker.push(result, offset, &mut report);
            }
            Opcode::Idivmod | Opcode::Edivmod => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let conv = arithmetic_conversion(lhs, rhs);
                let result = if conv.result == ERROR_TYPE {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid types for `idivmod`"));
                    SimpleType::Word.index()
                } else {
                    conv.result
                };
                block.overwrite_opcode(offset - 2, conv.lhs_conv);
                block.overwrite_opcode(offset - 1, conv.rhs_conv);
                block.overwrite_opcode(offset + 1, conv.result_conv);
                checker.push(result, offset, &mut report);
                checker.push(result, offset, &mut report);
            }
            Opcode::And | Opcode::Or => {
                let rhs = checker.pop(offset, &mut report);
                let lhs = checker.pop(offset, &mut report);
                let result = if lhs != rhs {
                    let name = if op == Opcode::And { "and" } else { "or" };
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, format!("mismatched types for `{name}`")));
                    SimpleType::Word.index()
                } else {
                    lhs
                };
                checker.push(result, offset, &mut report);
            }
            Opcode::Not => {
                checker.peek(offset, &mut report);
            }
            Opcode::Deref => {
                let ty = checker.pop(offset, &mut report);
                if ty != SimpleType::Ptr.index() {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "expected pointer"));
                }
                checker.push(SimpleType::Byte.index(), offset, &mut report);
            }
            Opcode::Sx8
            | Opcode::Sx16
            | Opcode::Sx32
            | Opcode::Sx8L
            | Opcode::Sx16L
            | Opcode::Sx32L
            | Opcode::Zx8
            | Opcode::Zx16
            | Opcode::Zx32
            | Opcode::Zx8L
            | Opcode::Zx16L
            | Opcode::Zx32L => {}
            Opcode::Print => {
                let ty = checker.pop(offset, &mut report);
                if is_signed(ty) {
                    block.overwrite_opcode(offset - 1, promote_to_int(ty));
                    block.overwrite_opcode(offset, Opcode::PrintInt);
                }
            }
            Opcode::PrintInt => {
                let ty = checker.pop(offset, &mut report);
                if is_integral(ty) {
                    block.overwrite_opcode(offset - 1, sign_extend_for_print(ty));
                } else {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "invalid type for `print-int`"));
                }
            }
            Opcode::PrintChar => {
                let ty = checker.pop(offset, &mut report);
                if ty != SimpleType::Byte.index() {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "expected byte for `print-char`"));
                }
            }
            Opcode::Jump => {
                checker.save_jump(block, offset, &mut report);
                next_offset = checker.check_unreachable(block, next_offset, &mut report);
            }
            Opcode::JumpCond | Opcode::JumpNcond => {
                checker.pop(offset, &mut report);
                checker.save_jump(block, offset, &mut report);
            }
            Opcode::ForIncStart | Opcode::ForDecStart => {
                checker.pop(offset, &mut report);
                checker.save_jump(block, offset, &mut report);
            }
            Opcode::ForInc | Opcode::ForDec => {
                checker.save_jump(block, offset, &mut report);
            }
            Opcode::GetLoopVar => {
                checker.push(SimpleType::Int.index(), offset, &mut report);
            }
            Opcode::Exit => {
                let ty = checker.pop(offset, &mut report);
                if !is_integral(ty) {
                    report.report(Diagnostic::at(ErrorKind::TypeError, offset, "expected integral type for `exit`"));
                }
                next_offset = checker.check_unreachable(block, next_offset, &mut report);
            }
        }
        offset = next_offset;
    }
    if report.had_error() {
        tracing::debug!(errors = report.diagnostics.len(), "type checking failed");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e1_simple_add_lowers_and_rewrites_print() {
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 1);
        block.write_i8(Opcode::PushInt8, 2);
        let add_ip = block.write_arithmetic_site(Opcode::Add);
        let print_ip = block.write_unary_conv_site(Opcode::Print);
        block.write_i8(Opcode::PushInt8, 0);
        block.write_simple(Opcode::Exit);

        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(!report.had_error(), "{:?}", report.diagnostics);
        assert_eq!(block.opcode_at(add_ip), Opcode::Add);
        assert_eq!(block.opcode_at(add_ip - 2), Opcode::Nop);
        assert_eq!(block.opcode_at(add_ip - 1), Opcode::Nop);
        assert_eq!(block.opcode_at(add_ip + 1), Opcode::Nop);
        assert_eq!(block.opcode_at(print_ip), Opcode::PrintInt);
    }

    #[test]
    fn e2_signed_unsigned_mix_widens_to_word_and_leaves_print() {
        let mut block = Block::new();
        block.write_u8(Opcode::Push8, 255);
        block.write_i8(Opcode::PushInt8, -1);
        block.write_arithmetic_site(Opcode::Add);
        let print_ip = block.write_unary_conv_site(Opcode::Print);
        block.write_i8(Opcode::PushInt8, 0);
        block.write_simple(Opcode::Exit);

        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(!report.had_error());
        assert_eq!(block.opcode_at(print_ip), Opcode::Print);
    }

    #[test]
    fn property_7_divmod_selection() {
        // INT, INT -> EDIVMOD.
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 7);
        block.write_i8(Opcode::PushInt8, 2);
        let divmod_ip = block.write_arithmetic_site(Opcode::Divmod);
        block.write_simple(Opcode::Pop);
        block.write_simple(Opcode::Pop);
        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(!report.had_error());
        assert_eq!(block.opcode_at(divmod_ip), Opcode::Edivmod);

        // WORD, INT -> stays DIVMOD (result widens to WORD, unsigned).
        let mut block = Block::new();
        block.write_u8(Opcode::Push8, 7);
        block.write_i8(Opcode::PushInt8, 2);
        let divmod_ip = block.write_arithmetic_site(Opcode::Divmod);
        block.write_simple(Opcode::Pop);
        block.write_simple(Opcode::Pop);
        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(!report.had_error());
        assert_eq!(block.opcode_at(divmod_ip), Opcode::Divmod);

        // BYTE, BYTE -> stays DIVMOD, result BYTE.
        let mut block = Block::new();
        block.write_u8(Opcode::PushChar8, 7);
        block.write_u8(Opcode::PushChar8, 2);
        let divmod_ip = block.write_arithmetic_site(Opcode::Divmod);
        block.write_simple(Opcode::Pop);
        block.write_simple(Opcode::Pop);
        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(!report.had_error());
        assert_eq!(block.opcode_at(divmod_ip), Opcode::Divmod);
        assert_eq!(block.opcode_at(divmod_ip + 1), Opcode::Zx8);
    }

    #[test]
    fn pointer_plus_pointer_is_an_error() {
        let mut block = Block::new();
        block.write_u8(Opcode::LoadString8, 0);
        block.write_simple(Opcode::Pop); // drop the first length, leaving a PTR
        block.write_u8(Opcode::LoadString8, 1);
        block.write_simple(Opcode::Pop); // drop the second length, leaving a PTR
        block.write_arithmetic_site(Opcode::Add);
        block.write_simple(Opcode::Pop);

        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(report.diagnostics.iter().any(|d| d.kind == ErrorKind::TypeError));
    }

    #[test]
    fn e4_inconsistent_merge_is_rejected() {
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 1); // condition
        let jump_cond_ip = block.write_i16(Opcode::JumpCond, 0); // patched below
        block.write_i8(Opcode::PushInt8, 2); // arm A leaves one INT
        let jump_ip = block.write_i16(Opcode::Jump, 0); // patched below
        let arm_b = block.write_i8(Opcode::PushInt8, 3);
        block.write_i8(Opcode::PushInt8, 4); // arm B leaves two INTs: deeper stack
        let merge = block.write_simple(Opcode::Pop);
        block.register_jump_dest(arm_b);
        block.register_jump_dest(merge);
        block.patch_jump_offset(jump_cond_ip, (arm_b as isize - jump_cond_ip as isize - 1) as i16);
        block.patch_jump_offset(jump_ip, (merge as isize - jump_ip as isize - 1) as i16);

        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(report.diagnostics.iter().any(|d| d.kind == ErrorKind::StackMergeError));
    }

    #[test]
    fn e5_unreachable_code_after_exit_is_reported() {
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 0);
        block.write_simple(Opcode::Exit);
        block.write_i8(Opcode::PushInt8, 1);
        block.write_unary_conv_site(Opcode::Print);

        let report = check(&mut block, &CheckerOptions { peephole: false });
        assert!(report.diagnostics.iter().any(|d| d.kind == ErrorKind::UnreachableCode));
    }

    #[test]
    fn peephole_elides_push_pop_and_double_not() {
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 5);
        block.write_simple(Opcode::Pop);
        block.write_simple(Opcode::Not);
        block.write_simple(Opcode::Not);
        run_peephole(&mut block);
        let mut offset = 0;
        while offset < block.len() {
            assert_eq!(block.opcode_at(offset), Opcode::Nop);
            offset += block.opcode_at(offset).len();
        }
    }

    #[test]
    fn peephole_respects_jump_destination_guard() {
        let mut block = Block::new();
        block.write_simple(Opcode::Not);
        let dest = block.write_simple(Opcode::Not);
        block.register_jump_dest(dest);
        run_peephole(&mut block);
        assert_eq!(block.opcode_at(0), Opcode::Not);
        assert_eq!(block.opcode_at(dest), Opcode::Not);
    }

    #[test]
    fn checking_twice_is_idempotent() {
        let mut block = Block::new();
        block.write_i8(Opcode::PushInt8, 1);
        block.write_i8(Opcode::PushInt8, 2);
        block.write_arithmetic_site(Opcode::Add);
        block.write_simple(Opcode::Pop);

        let first = check(&mut block, &CheckerOptions { peephole: false });
        let before = block.code().to_vec();
        let second = check(&mut block, &CheckerOptions { peephole: false });
        assert_eq!(before, block.code());
        assert_eq!(first.had_error(), second.had_error());
    }
}
