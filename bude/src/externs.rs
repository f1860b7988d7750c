//! External function/library tables (spec §4.3, §4.4: `EXT_FUNCTION` and
//! `EXT_LIBRARY` sections), linked both ways so an external library knows
//! which externs it provides and an extern knows its declared signature and
//! calling convention.

use bude_asm::{CallingConvention, TypeIndex};

use crate::strings::StringView;

/// Parameter and return type lists for a function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Parameter type indices, in declaration order.
    pub params: Vec<TypeIndex>,
    /// Return type indices, in declaration order.
    pub rets: Vec<TypeIndex>,
}

/// A function declared `extern`, resolved against a named library at link
/// time (spec §4.3).
#[derive(Debug, Clone)]
pub struct ExternalFunction {
    /// Declared parameter/return types.
    pub signature: Signature,
    /// The symbol name to import.
    pub name: StringView,
    /// Calling convention the emitter must honor for calls to this symbol.
    pub calling_convention: CallingConvention,
}

/// A DLL (or other import library) and the externs sourced from it.
#[derive(Debug, Clone, Default)]
pub struct ExternalLibrary {
    /// Library file name, e.g. `msvcrt.dll`.
    pub filename: Option<StringView>,
    /// Indices into the module's external-function table, in declaration
    /// order.
    pub externals: Vec<usize>,
}

/// Paired tables of external functions and the libraries they come from,
/// with the fan-out between them kept consistent (spec §9: "adding an
/// extern updates both sides").
#[derive(Default)]
pub struct ExternTable {
    functions: Vec<ExternalFunction>,
    libraries: Vec<ExternalLibrary>,
}

impl ExternTable {
    /// An empty pair of tables.
    pub fn new() -> Self {
        ExternTable::default()
    }

    /// Declares a new library, returning its index.
    pub fn add_library(&mut self, filename: StringView) -> usize {
        self.libraries.push(ExternalLibrary { filename: Some(filename), externals: Vec::new() });
        self.libraries.len() - 1
    }

    /// Declares an extern sourced from `library`, linking it into that
    /// library's `externals` list. Panics if `library` is out of range.
    pub fn add_external(&mut self, library: usize, function: ExternalFunction) -> usize {
        self.functions.push(function);
        let index = self.functions.len() - 1;
        self.libraries[library].externals.push(index);
        index
    }

    /// Replaces the external-function table outright, preserving whatever
    /// index order the caller supplies. Used by the container reader, which
    /// parses the flat external-function table before it knows which
    /// library each entry belongs to (spec §4.4: functions are listed
    /// before the libraries that reference them by index).
    pub fn load_functions(&mut self, functions: Vec<ExternalFunction>) {
        self.functions = functions;
    }

    /// Appends an already-built library record (its `externals` indices
    /// already resolved against a table loaded via [`Self::load_functions`]),
    /// returning its index.
    pub fn load_library(&mut self, library: ExternalLibrary) -> usize {
        self.libraries.push(library);
        self.libraries.len() - 1
    }

    /// The external-function table, in declaration order.
    pub fn functions(&self) -> &[ExternalFunction] {
        &self.functions
    }

    /// The external-library table, in declaration order.
    pub fn libraries(&self) -> &[ExternalLibrary] {
        &self.libraries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::strings::StringTable;
    use bude_asm::SimpleType;

    #[test]
    fn add_external_links_back_to_its_library() {
        let mut region = Region::new(64);
        let mut strings = StringTable::new();
        let lib_name_id = strings.intern(&mut region, b"msvcrt.dll").unwrap();
        let lib_name = strings.get(lib_name_id).unwrap();
        let fn_name_id = strings.intern(&mut region, b"printf").unwrap();
        let fn_name = strings.get(fn_name_id).unwrap();

        let mut externs = ExternTable::new();
        let lib = externs.add_library(lib_name);
        let func = externs.add_external(
            lib,
            ExternalFunction {
                signature: Signature { params: vec![SimpleType::Ptr.index()], rets: vec![] },
                name: fn_name,
                calling_convention: CallingConvention::MsX64,
            },
        );

        assert_eq!(externs.libraries()[lib].externals, vec![func]);
        assert_eq!(externs.functions()[func].calling_convention, CallingConvention::MsX64);
    }
}
