//! The BudeBWF container codec (spec §4.4): a versioned little-endian file
//! format with a `data_info_field_count`-driven forward-compatible
//! data-info section and per-entry `entry_size` markers that let a reader
//! skip fields it does not understand.
//!
//! Grounded on `original_source/src/reader.c`'s `parse_*` functions for the
//! read side. The reference writer (`original_source/src/writer.c`) never
//! implemented `write_bytecode` — it is a stub returning success without
//! writing anything — so the write side here is original work, built to be
//! exactly what the read side above expects of a version-5 file (spec
//! §4.4's "writer symmetry" clause).

use std::io::{self, Write};

use bude_asm::{CallingConvention, TypeIndex, TypeInfo, TypeKind, SIMPLE_TYPE_COUNT};

use crate::error::ContainerError;
use crate::externs::{ExternalFunction, Signature};
use crate::function::Function;
use crate::module::Module;

/// Highest format version this crate reads and the only version it writes.
pub const CURRENT_VERSION: u32 = 5;

const MAGIC: &[u8] = b"BudeBWF";

/// Small cursor over an in-memory buffer that tracks its own offset, so
/// every read can report exactly where a truncation or malformed field was
/// found.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ContainerError> {
        if self.pos + len > self.bytes.len() {
            return Err(ContainerError::Truncated {
                offset: self.pos,
                needed: self.pos + len - self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, ContainerError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, ContainerError> {
        Ok(self.u32()? as i32)
    }

    fn non_negative(field: &'static str, value: i32) -> Result<usize, ContainerError> {
        if value < 0 {
            return Err(ContainerError::NegativeCount { field, value });
        }
        Ok(value as usize)
    }

    /// Skips to `start + (field_count + extra) * 4`, erroring if that is
    /// behind the current position (spec §4.4: "if that is in the past, the
    /// file is malformed").
    fn skip_to(&mut self, start: usize, target: usize) -> Result<(), ContainerError> {
        if target < self.pos {
            return Err(ContainerError::MalformedSectionLength(format!(
                "section starting at {start} claims a length ending before its own fields"
            )));
        }
        let remaining = target - self.pos;
        self.take(remaining)?;
        Ok(())
    }
}

fn parse_header(bytes: &[u8]) -> Result<(u32, usize), ContainerError> {
    let newline = bytes.iter().position(|&b| b == b'\n').ok_or(ContainerError::BadVersionHeader)?;
    let line = &bytes[..newline];
    let rest = line.strip_prefix(MAGIC).ok_or(ContainerError::BadMagic)?;
    let rest = rest.strip_prefix(b"v").ok_or(ContainerError::BadVersionHeader)?;
    if rest.is_empty() || !rest.iter().all(u8::is_ascii_digit) {
        return Err(ContainerError::BadVersionHeader);
    }
    let version: u32 =
        std::str::from_utf8(rest).ok().and_then(|s| s.parse().ok()).ok_or(ContainerError::BadVersionHeader)?;
    Ok((version, newline + 1))
}

struct DataInfo {
    string_count: usize,
    function_count: usize,
    ud_type_count: usize,
    ext_function_count: usize,
    ext_library_count: usize,
}

fn parse_data_info(reader: &mut ByteReader, version: u32) -> Result<DataInfo, ContainerError> {
    let start = reader.position();
    let field_count = if version >= 2 {
        let count = reader.i32()?;
        if count < 2 {
            return Err(ContainerError::MalformedSectionLength(format!(
                "data_info_field_count must be at least 2, found {count}"
            )));
        }
        count as usize
    } else {
        2
    };
    let string_count = ByteReader::non_negative("string_count", reader.i32()?)?;
    let function_count = ByteReader::non_negative("function_count", reader.i32()?)?;
    let mut ud_type_count = 0;
    let mut ext_function_count = 0;
    let mut ext_library_count = 0;
    if version >= 4 {
        ud_type_count = ByteReader::non_negative("ud_type_count", reader.i32()?)?;
    }
    if version >= 5 {
        ext_function_count = ByteReader::non_negative("ext_function_count", reader.i32()?)?;
        ext_library_count = ByteReader::non_negative("ext_library_count", reader.i32()?)?;
    }
    // The `data_info_field_count` word itself only exists in the file for
    // version >= 2; a v1 file's data-info section is exactly `field_count`
    // words long, with no leading count word to account for.
    let count_word_words = if version >= 2 { 1 } else { 0 };
    reader.skip_to(start, start + (field_count + count_word_words) * 4)?;
    Ok(DataInfo { string_count, function_count, ud_type_count, ext_function_count, ext_library_count })
}

fn parse_function(reader: &mut ByteReader, version: u32) -> Result<Function, ContainerError> {
    let start = reader.position();
    let entry_size = if version >= 3 { Some(reader.i32()?) } else { None };
    let code_size = ByteReader::non_negative("code_size", reader.i32()?)?;
    let entry_size = entry_size.map(|s| s as usize).filter(|&s| s != 0).unwrap_or(code_size);
    let code_bytes = reader.take(code_size)?;

    let mut function = Function::new(Signature::default());
    function.w_code.load_code(code_bytes);

    if version >= 4 {
        let max_for_loop_level = reader.i32()? as u32;
        let locals_size = ByteReader::non_negative("locals_size", reader.i32()?)?;
        let local_count = ByteReader::non_negative("local_count", reader.i32()?)?;
        let mut locals = Vec::with_capacity(local_count);
        for _ in 0..local_count {
            locals.push(reader.i32()? as TypeIndex);
        }
        function.w_code.load_locals(locals, locals_size);
        function.w_code.observe_for_loop_level(max_for_loop_level);
    }

    reader.skip_to(start, start + 4 + entry_size)?;
    function
        .w_code
        .try_recompute_jumps()
        .map_err(|e| ContainerError::InvalidOpcode { offset: e.offset, byte: e.byte })?;
    Ok(function)
}

fn parse_type(reader: &mut ByteReader, module: &mut Module) -> Result<(), ContainerError> {
    let start = reader.position();
    let entry_size = ByteReader::non_negative("entry_size", reader.i32()?)?;
    let kind = reader.i32()?;
    let field_count = ByteReader::non_negative("field_count", reader.i32()?)?;
    let word_count = ByteReader::non_negative("word_count", reader.i32()?)? as u32;
    let kind = TypeKind::try_from(kind)
        .map_err(|_| ContainerError::MalformedSectionLength(format!("unknown type kind {kind}")))?;
    match kind {
        TypeKind::Pack => {
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                fields.push(reader.i32()? as TypeIndex);
            }
            module.types.register_pack(&fields, word_count);
        }
        TypeKind::Comp => {
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                fields.push(reader.i32()? as TypeIndex);
            }
            module
                .types
                .register_comp(&mut module.region, &fields, word_count)
                .map_err(|_| ContainerError::MalformedSectionLength("region exhausted reading type table".into()))?;
        }
        TypeKind::Uninit | TypeKind::Simple => {
            module.types.register_pack(&[], word_count);
        }
    }
    reader.skip_to(start, start + 4 + entry_size)?;
    Ok(())
}

fn parse_ext_function(reader: &mut ByteReader, module: &Module) -> Result<ExternalFunction, ContainerError> {
    let start = reader.position();
    let entry_size = ByteReader::non_negative("entry_size", reader.i32()?)?;
    let param_count = ByteReader::non_negative("param_count", reader.i32()?)?;
    let ret_count = ByteReader::non_negative("ret_count", reader.i32()?)?;
    let mut params = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        params.push(reader.i32()? as TypeIndex);
    }
    let mut rets = Vec::with_capacity(ret_count);
    for _ in 0..ret_count {
        rets.push(reader.i32()? as TypeIndex);
    }
    let name_index = ByteReader::non_negative("name_index", reader.i32()?)?;
    let calling_convention = reader.i32()?;
    let name = module.strings.get(name_index).ok_or(ContainerError::OutOfRangeIndex {
        table: "string_table",
        index: name_index as i32,
        len: module.strings.len(),
    })?;
    let calling_convention = CallingConvention::try_from(calling_convention)
        .map_err(|_| ContainerError::MalformedSectionLength(format!("unknown calling convention {calling_convention}")))?;
    reader.skip_to(start, start + 4 + entry_size)?;
    Ok(ExternalFunction { signature: Signature { params, rets }, name, calling_convention })
}

fn parse_ext_library(
    reader: &mut ByteReader,
    module: &mut Module,
    function_count: usize,
) -> Result<(), ContainerError> {
    let start = reader.position();
    let entry_size = ByteReader::non_negative("entry_size", reader.i32()?)?;
    let external_count = ByteReader::non_negative("external_count", reader.i32()?)?;
    let mut externals = Vec::with_capacity(external_count);
    for _ in 0..external_count {
        let index = ByteReader::non_negative("external_index", reader.i32()?)?;
        if index >= function_count {
            return Err(ContainerError::OutOfRangeIndex { table: "external_function_table", index: index as i32, len: function_count });
        }
        externals.push(index);
    }
    let filename_index = ByteReader::non_negative("filename_index", reader.i32()?)?;
    let filename = module.strings.get(filename_index).ok_or(ContainerError::OutOfRangeIndex {
        table: "string_table",
        index: filename_index as i32,
        len: module.strings.len(),
    })?;
    module.externs.load_library(crate::externs::ExternalLibrary { filename: Some(filename), externals });
    reader.skip_to(start, start + 4 + entry_size)?;
    Ok(())
}

/// Parses a complete BudeBWF file from `bytes` into a fresh [`Module`].
#[tracing::instrument(level = "debug", skip_all, fields(input_len = bytes.len()))]
pub fn read_module(bytes: &[u8]) -> Result<Module, ContainerError> {
    let (version, header_len) = parse_header(bytes)?;
    if version > CURRENT_VERSION {
        return Err(ContainerError::UnsupportedVersion { found: version, supported: CURRENT_VERSION });
    }
    if version == 0 {
        return Err(ContainerError::BadVersionHeader);
    }
    tracing::debug!(version, "parsed container header");
    let mut reader = ByteReader::new(&bytes[header_len..]);
    let data_info = parse_data_info(&mut reader, version)?;

    let mut module = Module::init();
    for _ in 0..data_info.string_count {
        let size = reader.u32()? as usize;
        let bytes = reader.take(size)?;
        module
            .strings
            .intern(&mut module.region, bytes)
            .map_err(|_| ContainerError::MalformedSectionLength("region exhausted reading string table".into()))?;
    }
    for _ in 0..data_info.function_count {
        let function = parse_function(&mut reader, version)?;
        module.add_function(function);
    }
    if version >= 4 {
        for _ in 0..data_info.ud_type_count {
            parse_type(&mut reader, &mut module)?;
        }
    }
    if version >= 5 {
        let mut functions = Vec::with_capacity(data_info.ext_function_count);
        for _ in 0..data_info.ext_function_count {
            functions.push(parse_ext_function(&mut reader, &module)?);
        }
        let function_count = functions.len();
        module.externs.load_functions(functions);
        for _ in 0..data_info.ext_library_count {
            parse_ext_library(&mut reader, &mut module, function_count)?;
        }
    }
    tracing::debug!(
        functions = module.functions().len(),
        strings = module.strings.len(),
        "finished reading module"
    );
    Ok(module)
}

fn write_entry(out: &mut Vec<u8>, body: impl FnOnce(&mut Vec<u8>)) {
    let mut entry = Vec::new();
    body(&mut entry);
    out.extend_from_slice(&(entry.len() as i32).to_le_bytes());
    out.extend_from_slice(&entry);
}

/// Serializes `module` as a version-[`CURRENT_VERSION`] BudeBWF file.
#[tracing::instrument(level = "debug", skip_all, fields(functions = module.functions().len()))]
pub fn write_module(module: &Module, out: &mut impl Write) -> io::Result<()> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(MAGIC);
    buffer.extend_from_slice(format!("v{CURRENT_VERSION}\n").as_bytes());

    let ud_type_count = module.types.len() as i32 - SIMPLE_TYPE_COUNT;
    let data_info_fields: [i32; 5] = [
        module.strings.len() as i32,
        module.functions().len() as i32,
        ud_type_count.max(0),
        module.externs.functions().len() as i32,
        module.externs.libraries().len() as i32,
    ];
    buffer.extend_from_slice(&(data_info_fields.len() as i32).to_le_bytes());
    for field in data_info_fields {
        buffer.extend_from_slice(&field.to_le_bytes());
    }

    for view in module.strings.iter() {
        let bytes = view.as_bytes(&module.region);
        buffer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buffer.extend_from_slice(bytes);
    }

    for function in module.functions() {
        write_entry(&mut buffer, |entry| {
            let code = function.w_code.code();
            entry.extend_from_slice(&(code.len() as i32).to_le_bytes());
            entry.extend_from_slice(code);
            entry.extend_from_slice(&(function.w_code.max_for_loop_level() as i32).to_le_bytes());
            entry.extend_from_slice(&(function.w_code.locals_size() as i32).to_le_bytes());
            entry.extend_from_slice(&(function.w_code.locals().len() as i32).to_le_bytes());
            for &ty in function.w_code.locals() {
                entry.extend_from_slice(&ty.to_le_bytes());
            }
        });
    }

    write_user_types(module, &mut buffer);

    for external in module.externs.functions() {
        write_entry(&mut buffer, |entry| {
            entry.extend_from_slice(&(external.signature.params.len() as i32).to_le_bytes());
            entry.extend_from_slice(&(external.signature.rets.len() as i32).to_le_bytes());
            for &ty in &external.signature.params {
                entry.extend_from_slice(&ty.to_le_bytes());
            }
            for &ty in &external.signature.rets {
                entry.extend_from_slice(&ty.to_le_bytes());
            }
            let name_index = module.strings.iter().position(|v| v.bytewise_eq(&external.name, &module.region)).unwrap_or(0);
            entry.extend_from_slice(&(name_index as i32).to_le_bytes());
            entry.extend_from_slice(&i32::from(external.calling_convention).to_le_bytes());
        });
    }

    for library in module.externs.libraries() {
        write_entry(&mut buffer, |entry| {
            entry.extend_from_slice(&(library.externals.len() as i32).to_le_bytes());
            for &index in &library.externals {
                entry.extend_from_slice(&(index as i32).to_le_bytes());
            }
            let filename_index = library
                .filename
                .and_then(|name| module.strings.iter().position(|v| v.bytewise_eq(&name, &module.region)))
                .unwrap_or(0);
            entry.extend_from_slice(&(filename_index as i32).to_le_bytes());
        });
    }

    out.write_all(&buffer)
}

fn write_user_types(module: &Module, buffer: &mut Vec<u8>) {
    for index in SIMPLE_TYPE_COUNT..module.types.len() as TypeIndex {
        let info: TypeInfo = match module.types.lookup(index) {
            Some(info) => info,
            None => continue,
        };
        write_entry(buffer, |entry| {
            entry.extend_from_slice(&(info.kind as i32).to_le_bytes());
            let fields = module
                .types
                .pack_fields(index)
                .or_else(|| module.types.comp_fields(&module.region, index))
                .unwrap_or_default();
            entry.extend_from_slice(&(fields.len() as i32).to_le_bytes());
            entry.extend_from_slice(&(info.word_count as i32).to_le_bytes());
            for field in fields {
                entry.extend_from_slice(&field.to_le_bytes());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bude_asm::{Opcode, SimpleType};

    fn minimal_v5_header() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BudeBWFv5\n");
        bytes
    }

    #[test]
    fn round_trips_an_empty_module() {
        let module = Module::init();
        let mut buffer = Vec::new();
        write_module(&module, &mut buffer).unwrap();
        let read_back = read_module(&buffer).unwrap();
        assert_eq!(read_back.functions().len(), 0);
        assert_eq!(read_back.strings.len(), 0);
    }

    #[test]
    fn round_trips_strings_and_function_code() {
        let mut module = Module::init();
        module.strings.intern(&mut module.region, b"hello").unwrap();
        let mut function = Function::new(Signature::default());
        function.w_code.write_i8(Opcode::PushInt8, 42);
        function.w_code.write_simple(Opcode::Exit);
        module.add_function(function);

        let mut buffer = Vec::new();
        write_module(&module, &mut buffer).unwrap();
        let read_back = read_module(&buffer).unwrap();

        assert_eq!(read_back.strings.len(), 1);
        assert_eq!(read_back.strings.get(0).unwrap().as_bytes(&read_back.region), b"hello");
        assert_eq!(read_back.functions().len(), 1);
        assert_eq!(read_back.functions()[0].w_code.code(), module.functions()[0].w_code.code());
    }

    #[test]
    fn round_trips_a_pack_type() {
        let mut module = Module::init();
        module.types.register_pack(&[SimpleType::Int.index(), SimpleType::Byte.index()], 2);
        let mut buffer = Vec::new();
        write_module(&module, &mut buffer).unwrap();
        let read_back = read_module(&buffer).unwrap();
        let idx = SIMPLE_TYPE_COUNT;
        assert_eq!(
            read_back.types.pack_fields(idx).unwrap(),
            vec![SimpleType::Int.index(), SimpleType::Byte.index()]
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NotBWFv5\n".to_vec();
        assert!(matches!(read_module(&bytes), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let bytes = b"BudeBWFv99\n\x02\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00".to_vec();
        assert!(matches!(
            read_module(&bytes),
            Err(ContainerError::UnsupportedVersion { found: 99, supported: CURRENT_VERSION })
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let mut bytes = minimal_v5_header();
        bytes.extend_from_slice(&3i32.to_le_bytes()); // field_count, but no fields follow
        assert!(matches!(read_module(&bytes), Err(ContainerError::Truncated { .. })));
    }

    #[test]
    fn rejects_data_info_field_count_below_two() {
        let mut bytes = minimal_v5_header();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        assert!(matches!(read_module(&bytes), Err(ContainerError::MalformedSectionLength(_))));
    }

    #[test]
    fn skips_unknown_trailing_data_info_fields() {
        let mut bytes = minimal_v5_header();
        // field_count=6 declares one extra field this reader's version-5
        // path does not know about; it must be skipped, not rejected.
        bytes.extend_from_slice(&6i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes()); // string_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // function_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ud_type_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ext_function_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ext_library_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // unknown extra field
        let module = read_module(&bytes).unwrap();
        assert_eq!(module.functions().len(), 0);
    }

    #[test]
    fn reads_a_v1_file_without_eating_the_first_string() {
        // v1 has no `data_info_field_count` word at all: just string_count
        // and function_count, then straight into the string table.
        let mut bytes = b"BudeBWFv1\n".to_vec();
        bytes.extend_from_slice(&1i32.to_le_bytes()); // string_count
        bytes.extend_from_slice(&1i32.to_le_bytes()); // function_count
        bytes.extend_from_slice(&2u32.to_le_bytes()); // string 0: size
        bytes.extend_from_slice(b"hi"); // string 0: bytes
        bytes.extend_from_slice(&1i32.to_le_bytes()); // function 0: code_size
        bytes.extend_from_slice(&[Opcode::Exit as u8]); // function 0: code

        let module = read_module(&bytes).unwrap();
        assert_eq!(module.strings.len(), 1);
        assert_eq!(module.strings.get(0).unwrap().as_bytes(&module.region), b"hi");
        assert_eq!(module.functions().len(), 1);
        assert_eq!(module.functions()[0].w_code.code(), &[Opcode::Exit as u8]);
    }

    #[test]
    fn reads_a_v2_file_with_the_leading_field_count_word() {
        // v2 adds the `data_info_field_count` word (still only string_count
        // and function_count behind it) and function entries gain no
        // `entry_size` field yet (that's v3+), so this also doubles as
        // coverage for the pre-entry_size function layout.
        let mut bytes = b"BudeBWFv2\n".to_vec();
        bytes.extend_from_slice(&2i32.to_le_bytes()); // data_info_field_count
        bytes.extend_from_slice(&1i32.to_le_bytes()); // string_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // function_count
        bytes.extend_from_slice(&3u32.to_le_bytes()); // string 0: size
        bytes.extend_from_slice(b"bye"); // string 0: bytes

        let module = read_module(&bytes).unwrap();
        assert_eq!(module.strings.len(), 1);
        assert_eq!(module.strings.get(0).unwrap().as_bytes(&module.region), b"bye");
        assert_eq!(module.functions().len(), 0);
    }

    #[test]
    fn reads_a_v3_file_with_entry_size_prefixed_functions() {
        // v3 adds an `entry_size` word in front of each function's
        // `code_size`, letting a reader skip a function it doesn't fully
        // understand; here entry_size covers exactly `code_size` field +
        // code bytes, the same as the writer produces for later versions.
        let mut bytes = b"BudeBWFv3\n".to_vec();
        bytes.extend_from_slice(&2i32.to_le_bytes()); // data_info_field_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // string_count
        bytes.extend_from_slice(&1i32.to_le_bytes()); // function_count
        bytes.extend_from_slice(&5i32.to_le_bytes()); // function 0: entry_size (4 + 1)
        bytes.extend_from_slice(&1i32.to_le_bytes()); // function 0: code_size
        bytes.extend_from_slice(&[Opcode::Exit as u8]); // function 0: code

        let module = read_module(&bytes).unwrap();
        assert_eq!(module.functions().len(), 1);
        assert_eq!(module.functions()[0].w_code.code(), &[Opcode::Exit as u8]);
    }

    #[test]
    fn rejects_a_function_with_an_invalid_opcode_byte_instead_of_panicking() {
        let mut bytes = minimal_v5_header();
        bytes.extend_from_slice(&5i32.to_le_bytes()); // data_info_field_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // string_count
        bytes.extend_from_slice(&1i32.to_le_bytes()); // function_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ud_type_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ext_function_count
        bytes.extend_from_slice(&0i32.to_le_bytes()); // ext_library_count
        bytes.extend_from_slice(&17i32.to_le_bytes()); // entry_size (4 + 1 + 4 + 4 + 4)
        bytes.extend_from_slice(&1i32.to_le_bytes()); // code_size
        bytes.extend_from_slice(&[0xff]); // not a valid opcode
        bytes.extend_from_slice(&0i32.to_le_bytes()); // max_for_loop_level
        bytes.extend_from_slice(&0i32.to_le_bytes()); // locals_size
        bytes.extend_from_slice(&0i32.to_le_bytes()); // local_count

        assert!(matches!(
            read_module(&bytes),
            Err(ContainerError::InvalidOpcode { offset: 0, byte: 0xff })
        ));
    }
}
