//! PE64 assembly emitter (spec §4.5): walks one checked [`Block`] and
//! renders a flat-assembler-compatible (FASM) text program targeting the
//! Microsoft x64 calling convention, the way `generate_code` walks a word
//! block in the reference compiler.
//!
//! The emitter never runs on an unchecked block: [`generate`] refuses with
//! [`EmitError::CheckerFailed`] if the supplied [`CheckReport`] recorded any
//! diagnostic, mirroring "the emitter refuses to run if the checker reported
//! errors" (spec §7).

use std::io::Write;

use bude_asm::Opcode;

use crate::error::{CheckReport, EmitError};
use crate::ir::Block;
use crate::region::Region;
use crate::strings::StringTable;

/// Quadwords reserved for the combined loop-variable/auxiliary stack,
/// sized to the 1 MiB the container spec calls for (`1 MiB / 8 bytes`),
/// rather than the `1024*1024`-quadword (8 MiB) figure the reference
/// generator's `.bss` section literally emits.
const AUX_RESERVATION_QWORDS: u64 = 131_072;

/// Accumulates FASM source text one logical line at a time, mirroring the
/// reference `asm_write`/`asm_write_inst*`/`asm_label`/`asm_section` helpers.
#[derive(Default)]
struct AsmWriter {
    out: String,
}

impl AsmWriter {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn section(&mut self, name: &str, perms: &[&str]) {
        let mut line = format!("section '{name}'");
        for perm in perms {
            line.push(' ');
            line.push_str(perm);
        }
        self.line(&line);
    }

    fn label(&mut self, name: &str) {
        self.line(&format!("  {name}:"));
    }

    fn comment_heading(&mut self, text: &str) {
        self.line(&format!("  ;;\t{text}"));
    }

    fn inst0(&mut self, inst: &str) {
        self.line(&format!("\t{inst}"));
    }

    fn inst1(&mut self, inst: &str, a: &str) {
        self.line(&format!("\t{inst}\t{a}"));
    }

    fn inst1c(&mut self, inst: &str, a: &str, comment: &str) {
        self.line(&format!("\t{inst}\t{a}\t\t; {comment}"));
    }

    fn inst2(&mut self, inst: &str, a: &str, b: &str) {
        self.line(&format!("\t{inst}\t{a}, {b}"));
    }

    fn inst2c(&mut self, inst: &str, a: &str, b: &str, comment: &str) {
        self.line(&format!("\t{inst}\t{a}, {b}\t; {comment}"));
    }

    fn inst3(&mut self, inst: &str, a: &str, b: &str, c: &str) {
        self.line(&format!("\t{inst}\t{a}, {b}, {c}"));
    }

    fn inst3c(&mut self, inst: &str, a: &str, b: &str, c: &str, comment: &str) {
        self.line(&format!("\t{inst}\t{a}, {b}, {c}\t; {comment}"));
    }

    /// Encodes `bytes` as a FASM `db` directive: printable runs are quoted,
    /// anything else falls back to a comma-separated decimal byte value.
    fn db_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            self.line("\tdb\t0");
            return;
        }
        let mut parts: Vec<String> = Vec::new();
        let mut run = String::new();
        for &byte in bytes {
            if byte.is_ascii_graphic() || byte == b' ' {
                if byte == b'\'' {
                    run.push_str("''");
                } else {
                    run.push(byte as char);
                }
            } else {
                if !run.is_empty() {
                    parts.push(format!("'{run}'"));
                    run.clear();
                }
                parts.push(byte.to_string());
            }
        }
        if !run.is_empty() {
            parts.push(format!("'{run}'"));
        }
        self.line(&format!("\tdb\t{}", parts.join(", ")));
    }
}

fn generate_header(asm: &mut AsmWriter) {
    asm.line("format PE64 console");
    asm.line("include 'win64ax.inc'");
    asm.blank();
}

fn jump_target(block: &Block, offset: usize) -> i64 {
    let rel = block.read_s16(offset + 1) as i64;
    offset as i64 + 1 + rel
}

fn generate_code(asm: &mut AsmWriter, block: &Block, strings: &StringTable) {
    asm.section(".code", &["code", "readable", "executable"]);
    asm.blank();
    asm.label("start");
    asm.blank();
    asm.comment_heading("Initialisation.");
    asm.inst2c("lea", "rsi", "[aux]", "Loop stack pointer.");
    asm.inst2c(
        "lea",
        "rbx",
        &format!("[rsi + {}*8]", block.max_for_loop_level()),
        "Auxiliary stack pointer (space reserved for loop stack).",
    );
    asm.inst2c("xor", "rdi", "rdi", "Loop counter.");

    let mut offset = 0;
    while offset < block.len() {
        if block.is_jump_dest(offset) {
            asm.label(&format!("addr_{offset}"));
        }
        let op = block.opcode_at(offset);
        if op == Opcode::Nop {
            offset += op.len();
            continue;
        }
        asm.comment_heading(&format!("=== {} ===", op.mnemonic()));
        match op {
            Opcode::Nop => unreachable!("nops are skipped above"),

            Opcode::Push8 => {
                asm.inst2("mov", "rax", &block.read_u8(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::Push16 => {
                asm.inst2("mov", "rax", &block.read_u16(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::Push32 => {
                asm.inst2("mov", "rax", &block.read_u32(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::Push64 => {
                asm.inst2("mov", "rax", &block.read_u64(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::PushInt8 => {
                asm.inst2("mov", "rax", &block.read_s8(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::PushInt16 => {
                asm.inst2("mov", "rax", &block.read_s16(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::PushInt32 => {
                asm.inst2("mov", "rax", &block.read_s32(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::PushInt64 => {
                asm.inst2("mov", "rax", &block.read_s64(offset + 1).to_string());
                asm.inst1("push", "rax");
            }
            Opcode::PushChar8 => {
                asm.inst2("mov", "rax", &block.read_u8(offset + 1).to_string());
                asm.inst1("push", "rax");
            }

            Opcode::LoadString8 => {
                let index = block.read_u8(offset + 1) as usize;
                let length = strings.get(index).expect("valid string index").len();
                asm.inst2("lea", "rax", &format!("[str{index}]"));
                asm.inst1("push", "rax");
                asm.inst1("push", &length.to_string());
            }
            Opcode::LoadString16 => {
                let index = block.read_u16(offset + 1) as usize;
                let length = strings.get(index).expect("valid string index").len();
                asm.inst2("lea", "rax", &format!("[str{index}]"));
                asm.inst1("push", "rax");
                asm.inst1("push", &length.to_string());
            }
            Opcode::LoadString32 => {
                let index = block.read_u32(offset + 1) as usize;
                let length = strings.get(index).expect("valid string index").len();
                asm.inst2("lea", "rax", &format!("[str{index}]"));
                asm.inst1("push", "rax");
                asm.inst1("push", &length.to_string());
            }

            Opcode::Pop => asm.inst1("pop", "rax"),
            Opcode::Dupe => asm.inst1("push", "qword [rsp]"),

            Opcode::Add => {
                asm.inst1c("pop", "rdx", "RHS.");
                asm.inst2c("add", "[rsp]", "rdx", "LHS left on stack.");
            }
            Opcode::Sub => {
                asm.inst1c("pop", "rdx", "RHS.");
                asm.inst2c("sub", "[rsp]", "rdx", "LHS left on stack.");
            }
            Opcode::Mult => {
                asm.inst1("pop", "rax");
                asm.inst2c("imul", "rax", "[rsp]", "Multiplication is commutative.");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Divmod => {
                asm.inst1c("pop", "rcx", "Divisor.");
                asm.inst1c("pop", "rax", "Dividend.");
                asm.inst2c("xor", "rdx", "rdx", "Zero out extra bytes in dividend.");
                asm.inst1("div", "rcx");
                asm.inst1c("push", "rax", "Quotient.");
                asm.inst1c("push", "rdx", "Remainder.");
            }
            Opcode::Idivmod => {
                asm.inst1c("pop", "rcx", "Divisor.");
                asm.inst1c("pop", "rax", "Dividend.");
                asm.inst2("xor", "rdx", "rdx");
                asm.inst1("idiv", "rcx");
                asm.inst1c("push", "rax", "Quotient.");
                asm.inst1c("push", "rdx", "Remainder.");
            }
            Opcode::Edivmod => {
                asm.inst1c("pop", "rcx", "Divisor.");
                asm.inst1c("pop", "rax", "Dividend.");
                asm.inst2c("mov", "r8", "rcx", "Save divisor.");
                asm.inst1("neg", "r8");
                asm.inst2c("cmovg", "r8", "rcx", "r8 = -abs(rcx).");
                asm.inst2("mov", "r9", "rcx");
                asm.inst2c("sal", "r9", "63", "r9 = sign(rcx).");
                asm.inst2("xor", "rdx", "rdx");
                asm.inst1("idiv", "rcx");
                asm.inst2c("add", "r8", "rax", "q - sign(b)");
                asm.inst2c("add", "r9", "rdx", "r + abs(b)");
                asm.inst2c("test", "rdx", "rdx", "Ensure r >= 0 and adjust q accordingly.");
                asm.inst2("cmovl", "rax", "r8");
                asm.inst2("cmovl", "rdx", "r9");
                asm.inst1c("push", "rax", "Quotient.");
                asm.inst1c("push", "rdx", "Remainder.");
            }

            Opcode::And => {
                asm.inst1c("pop", "rdx", "'Then' value.");
                asm.inst2c("mov", "rax", "[rsp]", "'Else' value.");
                asm.inst2("test", "rax", "rax");
                asm.inst2("cmovnz", "rax", "rdx");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Or => {
                asm.inst1c("pop", "rdx", "'Else' value.");
                asm.inst2c("mov", "rax", "[rsp]", "'Then' value.");
                asm.inst2("test", "rax", "rax");
                asm.inst2("cmovz", "rax", "rdx");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Not => {
                asm.inst1("pop", "rax");
                asm.inst2c("xor", "edx", "edx", "Zero out rdx.");
                asm.inst2("test", "rax", "rax");
                asm.inst1("setz", "dl");
                asm.inst1("push", "rdx");
            }

            Opcode::Deref => {
                asm.inst1("pop", "rax");
                asm.inst2("movzx", "rdx", "byte [rax]");
                asm.inst1("push", "rdx");
            }

            Opcode::Sx8 => {
                asm.inst2("movsx", "rax", "byte [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Sx8L => {
                asm.inst2("movsx", "rax", "byte [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }
            Opcode::Sx16 => {
                asm.inst2("movsx", "rax", "word [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Sx16L => {
                asm.inst2("movsx", "rax", "word [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }
            Opcode::Sx32 => {
                asm.inst2("movsx", "rax", "dword [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Sx32L => {
                asm.inst2("movsx", "rax", "dword [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }
            Opcode::Zx8 => {
                asm.inst2("movzx", "rax", "byte [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Zx8L => {
                asm.inst2("movzx", "rax", "byte [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }
            Opcode::Zx16 => {
                asm.inst2("movzx", "rax", "word [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Zx16L => {
                asm.inst2("movzx", "rax", "word [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }
            Opcode::Zx32 => {
                asm.inst2("movzx", "rax", "dword [rsp]");
                asm.inst2("mov", "[rsp]", "rax");
            }
            Opcode::Zx32L => {
                // A 32-bit `mov` already zero-extends into the full 64-bit
                // register, so `movzx` would be redundant here (unlike the
                // byte/word-width ZX_*L cases above).
                asm.inst2("mov", "rax", "dword [rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
            }

            Opcode::Print => {
                asm.inst1c("pop", "rdx", "Value to be printed.");
                asm.inst2c("lea", "rcx", "[fmt_u64]", "Format string.");
                asm.inst2c("mov", "rbp", "rsp", "Save rsp for later (rbp is non-volatile in MS x64)");
                asm.inst2c("and", "spl", "0F0h", "Align stack.");
                asm.inst2c("sub", "rsp", "32", "Shadow space.");
                asm.inst1("call", "[printf]");
                asm.inst2c("mov", "rsp", "rbp", "Restore cached version of rsp.");
            }
            Opcode::PrintInt => {
                asm.inst1("pop", "rdx");
                asm.inst2("lea", "rcx", "[fmt_s64]");
                asm.inst2("mov", "rbp", "rsp");
                asm.inst2("and", "spl", "0F0h");
                asm.inst2("sub", "rsp", "32");
                asm.inst1("call", "[printf]");
                asm.inst2("mov", "rsp", "rbp");
            }
            Opcode::PrintChar => {
                asm.inst1("pop", "rdx");
                asm.inst2("lea", "rcx", "[fmt_char]");
                asm.inst2("mov", "rbp", "rsp");
                asm.inst2("and", "spl", "0F0h");
                asm.inst2("sub", "rsp", "32");
                asm.inst1("call", "[printf]");
                asm.inst2("mov", "rsp", "rbp");
            }

            Opcode::Jump => {
                let dest = jump_target(block, offset);
                asm.inst1("jmp", &format!("addr_{dest}"));
            }
            Opcode::JumpCond => {
                let dest = jump_target(block, offset);
                asm.inst1c("pop", "rax", "Condition.");
                asm.inst2("test", "rax", "rax");
                asm.inst1("jnz", &format!("addr_{dest}"));
            }
            Opcode::JumpNcond => {
                let dest = jump_target(block, offset);
                asm.inst1c("pop", "rax", "Condition.");
                asm.inst2("test", "rax", "rax");
                asm.inst1("jz", &format!("addr_{dest}"));
            }

            Opcode::ForIncStart => {
                let dest = jump_target(block, offset);
                asm.inst1c("pop", "rax", "Load loop target.");
                asm.inst2("test", "rax", "rax");
                asm.inst1("jz", &format!("addr_{dest}"));
                asm.inst2c("mov", "[rbx]", "rax", "Push loop target to aux.");
                asm.inst2("add", "rbx", "8");
                asm.inst2c("mov", "[rsi]", "rdi", "Push old loop counter onto loop stack.");
                asm.inst2("add", "rsi", "8");
                asm.inst2c("xor", "rdi", "rdi", "Zero out loop counter.");
            }
            Opcode::ForDecStart => {
                let dest = jump_target(block, offset);
                asm.inst1c("pop", "rdi", "Load loop counter.");
                asm.inst2("test", "rdi", "rdi");
                asm.inst1("jz", &format!("addr_{dest}"));
                asm.inst2c("mov", "[rsi]", "rdi", "Push old loop counter onto loop stack.");
                asm.inst2("add", "rsi", "8");
            }
            Opcode::ForInc => {
                let dest = jump_target(block, offset);
                asm.inst1("inc", "rdi");
                asm.inst2("cmp", "rdi", "[rbx-8]");
                asm.inst1("jl", &format!("addr_{dest}"));
                asm.inst2c("sub", "rbx", "8", "Pop target.");
                asm.inst2c("sub", "rsi", "8", "Pop old loop counter into rdi.");
                asm.inst2("mov", "rdi", "[rsi]");
            }
            Opcode::ForDec => {
                let dest = jump_target(block, offset);
                asm.inst1("dec", "rdi");
                asm.inst2("test", "rdi", "rdi");
                asm.inst1("jnz", &format!("addr_{dest}"));
                asm.inst2c("sub", "rsi", "8", "Pop old loop counter into rdi.");
                asm.inst2("mov", "rdi", "[rsi]");
            }
            Opcode::GetLoopVar => {
                let loop_offset = block.read_u16(offset + 1);
                if loop_offset == 0 {
                    asm.inst1("push", "rdi");
                } else {
                    asm.inst2c(
                        "mov",
                        "rax",
                        &format!("[rsi - {loop_offset}*8]"),
                        "Offset of loop variable.",
                    );
                    asm.inst1("push", "rax");
                }
            }

            Opcode::Swap => {
                asm.inst2("mov", "rax", "[rsp]");
                asm.inst2("mov", "rdx", "[rsp+8]");
                asm.inst2("mov", "[rsp+8]", "rax");
                asm.inst2("mov", "[rsp]", "rdx");
            }

            Opcode::Exit => {
                asm.inst1c("pop", "rcx", "Exit code.");
                asm.inst1("call", "[ExitProcess]");
            }
        }
        offset += op.len();
    }

    asm.comment_heading("=== END ===");
    asm.inst2c("xor", "rcx", "rcx", "Successful exit.");
    asm.inst2("and", "spl", "0F0h");
    asm.inst2("sub", "rsp", "32");
    asm.inst1("call", "[ExitProcess]");
    asm.blank();
}

fn generate_constants(asm: &mut AsmWriter, block: &Block, strings: &StringTable, region: &Region) {
    asm.section(".rdata", &["data", "readable"]);
    asm.blank();
    asm.label("fmt_s64");
    asm.inst3c(
        "db",
        "'%I64d'",
        "10",
        "0",
        "NOTE: I64 is a Non-ISO Microsoft extension.",
    );
    asm.blank();
    asm.label("fmt_u64");
    asm.inst3("db", "'%I64u'", "10", "0");
    asm.blank();
    asm.label("fmt_char");
    asm.inst2("db", "'%c'", "0");
    asm.blank();

    let _ = block; // the constant table is per-module; strings live alongside it.
    for (index, view) in strings.iter().enumerate() {
        asm.label(&format!("str{index}"));
        asm.db_bytes(view.as_bytes(region));
        asm.blank();
        asm.blank();
    }
}

fn generate_imports(asm: &mut AsmWriter) {
    asm.section(".idata", &["import", "data", "readable"]);
    asm.blank();
    asm.line("  library\\");
    asm.line("\tkernel, 'kernel32.dll',\\");
    asm.line("\tmsvcrt, 'msvcrt.dll'");
    asm.blank();
    asm.line("  import msvcrt,\\");
    asm.line("\tprintf, 'printf'");
    asm.blank();
    asm.line("  import kernel,\\");
    asm.line("\tExitProcess, 'ExitProcess'");
    asm.blank();
}

fn generate_bss(asm: &mut AsmWriter) {
    asm.section(".bss", &["data", "readable", "writeable"]);
    asm.label("aux");
    asm.inst1("rq", &AUX_RESERVATION_QWORDS.to_string());
}

/// Translates `block` into a complete PE64 assembly program and writes it to
/// `sink`. Refuses with [`EmitError::CheckerFailed`] if `report` recorded any
/// diagnostic (spec §7: "the emitter refuses to run if the checker reported
/// errors").
#[tracing::instrument(level = "debug", skip_all, fields(code_len = block.len(), strings = strings.len()))]
pub fn generate(
    block: &Block,
    strings: &StringTable,
    region: &Region,
    report: &CheckReport,
    sink: &mut impl Write,
) -> Result<(), EmitError> {
    if report.had_error() {
        tracing::debug!(errors = report.diagnostics.len(), "refusing to emit");
        return Err(EmitError::CheckerFailed(report.diagnostics.len()));
    }

    let mut asm = AsmWriter::default();
    generate_header(&mut asm);
    generate_code(&mut asm, block, strings);
    generate_constants(&mut asm, block, strings, region);
    generate_imports(&mut asm);
    generate_bss(&mut asm);

    sink.write_all(asm.out.as_bytes())?;
    tracing::trace!(bytes = asm.out.len(), "wrote assembly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{check, CheckerOptions};
    use bude_asm::Opcode;

    fn checked_block(build: impl FnOnce(&mut Block)) -> (Block, CheckReport) {
        let mut block = Block::new();
        build(&mut block);
        let report = check(&mut block, &CheckerOptions::default());
        (block, report)
    }

    #[test]
    fn refuses_to_emit_when_checker_reported_errors() {
        let (block, report) = checked_block(|block| {
            block.write_simple(Opcode::Not);
            block.write_simple(Opcode::Exit);
        });
        assert!(report.had_error());

        let strings = StringTable::new();
        let region = Region::new(64);
        let mut out = Vec::new();
        let err = generate(&block, &strings, &region, &report, &mut out).unwrap_err();
        assert!(matches!(err, EmitError::CheckerFailed(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn e1_simple_add_emits_one_printf_and_one_exit_process() {
        let (block, report) = checked_block(|block| {
            block.write_i8(Opcode::PushInt8, 1);
            block.write_i8(Opcode::PushInt8, 2);
            block.write_arithmetic_site(Opcode::Add);
            block.write_unary_conv_site(Opcode::Print);
            block.write_i64(Opcode::PushInt64, 0);
            block.write_simple(Opcode::Exit);
        });
        assert!(!report.had_error());

        let strings = StringTable::new();
        let region = Region::new(64);
        let mut out = Vec::new();
        generate(&block, &strings, &region, &report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.matches("call\t[printf]").count(), 1);
        assert_eq!(text.matches("call\t[ExitProcess]").count(), 2); // one from EXIT, one from the fall-through epilogue.
        assert!(text.contains("format PE64 console"));
        assert!(text.contains("section '.code'"));
        assert!(text.contains("section '.rdata'"));
        assert!(text.contains("section '.idata'"));
        assert!(text.contains("section '.bss'"));
    }

    #[test]
    fn labels_every_jump_destination() {
        let mut block = Block::new();
        let jump = block.write_jump(Opcode::Jump, 0); // patched below
        let dest = block.write_simple(Opcode::Exit);
        block.patch_jump_offset(jump, (dest as i16) - (jump as i16) - 1);
        block.recompute_jumps();
        let report = CheckReport::default();

        let strings = StringTable::new();
        let region = Region::new(64);
        let mut out = Vec::new();
        generate(&block, &strings, &region, &report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("addr_{dest}:")));
        assert!(text.contains(&format!("jmp\taddr_{dest}")));
    }

    #[test]
    fn string_constants_are_rendered_with_their_own_labels() {
        let mut region = Region::new(64);
        let mut strings = StringTable::new();
        strings.intern(&mut region, b"hi").unwrap();

        let mut block = Block::new();
        block.write_u8(Opcode::LoadString8, 0);
        block.write_simple(Opcode::Pop);
        block.write_simple(Opcode::Pop);
        block.write_i64(Opcode::PushInt64, 0);
        block.write_simple(Opcode::Exit);
        let report = check(&mut block, &CheckerOptions::default());
        assert!(!report.had_error());

        let mut out = Vec::new();
        generate(&block, &strings, &region, &report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("str0:"));
        assert!(text.contains("db\t'hi'"));
        assert!(text.contains("push\t2")); // the string's length, pushed by LOAD_STRING8.
    }

    #[test]
    fn zx32l_uses_a_plain_mov_not_movzx() {
        // The emitter's per-opcode template doesn't need a type-correct
        // block, just a valid byte stream; build one directly rather than
        // routing it through the checker.
        let mut block = Block::new();
        block.write_simple(Opcode::Zx32L);
        block.write_simple(Opcode::Exit);
        let report = CheckReport::default();

        let strings = StringTable::new();
        let region = Region::new(64);
        let mut out = Vec::new();
        generate(&block, &strings, &region, &report, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mov\trax, dword [rsp+8]"));
        assert!(!text.contains("movzx\trax, dword [rsp+8]"));
    }
}
