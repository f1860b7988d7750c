//! Seed of compiler-builtin field symbols — the `.start`/`.length`
//! accessors on the built-in string type (spec supplement, grounded on
//! `original_source/src/symbol.c` and `src/builtins.c`). A small
//! linear-scan table, not a hash table: symbol-table hashing utilities are
//! explicitly out of scope.

use bude_asm::{SimpleType, TypeIndex};

/// A named field of a compiler-builtin aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinField {
    /// Field name as written in source, e.g. `start`.
    pub name: &'static str,
    /// Position within the aggregate.
    pub index: usize,
    /// The field's type.
    pub ty: TypeIndex,
}

/// Field layout of the built-in `string` type: `{ start: ptr, length: int }`.
pub const STRING_FIELDS: [BuiltinField; 2] = [
    BuiltinField { name: "start", index: 0, ty: SimpleType::Ptr.index() },
    BuiltinField { name: "length", index: 1, ty: SimpleType::Int.index() },
];

/// Storage footprint of the built-in string type, in 8-byte words.
pub const STRING_WORD_COUNT: u32 = 2;

/// Looks up a field of the built-in string type by name.
pub fn lookup_string_field(name: &str) -> Option<&'static BuiltinField> {
    STRING_FIELDS.iter().find(|field| field.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_resolves_to_a_pointer_at_index_zero() {
        let field = lookup_string_field("start").unwrap();
        assert_eq!(field.index, 0);
        assert_eq!(field.ty, SimpleType::Ptr.index());
    }

    #[test]
    fn length_resolves_to_an_int_at_index_one() {
        let field = lookup_string_field("length").unwrap();
        assert_eq!(field.index, 1);
        assert_eq!(field.ty, SimpleType::Int.index());
    }

    #[test]
    fn unknown_field_names_resolve_to_nothing() {
        assert!(lookup_string_field("capacity").is_none());
    }
}
