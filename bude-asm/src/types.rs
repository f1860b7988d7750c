/// A type index: either a built-in simple type (`< SIMPLE_TYPE_COUNT`) or a
/// user-defined type (`>= SIMPLE_TYPE_COUNT`), stored contiguously in the
/// same index space.
pub type TypeIndex = i32;

/// Number of built-in types, including the `ERROR` sentinel. User-defined
/// types occupy indices `SIMPLE_TYPE_COUNT..`.
pub const SIMPLE_TYPE_COUNT: i32 = 11;

/// Maximum number of fields a [`TypeKind::Pack`] may hold inline.
pub const MAX_PACK_FIELDS: usize = 8;

/// The built-in simple types, in the order their `TypeIndex` is assigned.
/// `Error` is always index `0` and never denotes a valid operand type; it is
/// only ever produced as the checker's recovery placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(i32)]
pub enum SimpleType {
    /// Sentinel for "no valid type"; never a real operand type.
    Error = 0,
    /// Generic 64-bit unsigned machine word.
    Word = 1,
    /// Single byte.
    Byte = 2,
    /// Raw pointer: `(data, length)` pairs decay to this when the length is
    /// discarded.
    Ptr = 3,
    /// Generic signed 64-bit integer.
    Int = 4,
    /// Unsigned 8-bit integer.
    U8 = 5,
    /// Unsigned 16-bit integer.
    U16 = 6,
    /// Unsigned 32-bit integer.
    U32 = 7,
    /// Signed 8-bit integer.
    S8 = 8,
    /// Signed 16-bit integer.
    S16 = 9,
    /// Signed 32-bit integer.
    S32 = 10,
}

impl SimpleType {
    /// The `TypeIndex` this built-in occupies.
    pub const fn index(self) -> TypeIndex {
        self as TypeIndex
    }

    /// Recovers a [`SimpleType`] from a `TypeIndex`, if it denotes one.
    pub const fn from_index(index: TypeIndex) -> Option<Self> {
        use SimpleType::*;
        Some(match index {
            0 => Error,
            1 => Word,
            2 => Byte,
            3 => Ptr,
            4 => Int,
            5 => U8,
            6 => U16,
            7 => U32,
            8 => S8,
            9 => S16,
            10 => S32,
            _ => return None,
        })
    }

    /// Storage footprint in bytes.
    pub const fn size(self) -> usize {
        use SimpleType::*;
        match self {
            Error => 0,
            Word | Ptr | Int => 8,
            Byte | U8 | S8 => 1,
            U16 | S16 => 2,
            U32 | S32 => 4,
        }
    }

    /// Mnemonic used in diagnostics and disassembly.
    pub const fn name(self) -> &'static str {
        use SimpleType::*;
        match self {
            Error => "<error>",
            Word => "word",
            Byte => "byte",
            Ptr => "ptr",
            Int => "int",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            S8 => "s8",
            S16 => "s16",
            S32 => "s32",
        }
    }
}

/// Whether a `TypeIndex` falls in the built-in range.
pub const fn is_simple(index: TypeIndex) -> bool {
    0 <= index && index < SIMPLE_TYPE_COUNT
}

/// Discriminant for a user-defined [`TypeInfo`], mirroring the on-disk
/// `kind` field of the BudeBWF user-defined-type table (spec §4.4). `Uninit`
/// exists only so a freshly-grown type-table slot has a representable value
/// before a type is registered into it; it is never a type a valid `TypeIndex`
/// should resolve to once the module is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
    /// Slot not yet populated.
    Uninit = 0,
    /// No payload; reserved for future built-in-like user types.
    Simple = 1,
    /// Inline aggregate, at most [`MAX_PACK_FIELDS`] fields.
    Pack = 2,
    /// Aggregate of arbitrary field count, fields owned by a region.
    Comp = 3,
}

impl TryFrom<i32> for TypeKind {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TypeKind::Uninit,
            1 => TypeKind::Simple,
            2 => TypeKind::Pack,
            3 => TypeKind::Comp,
            _ => return Err(()),
        })
    }
}

/// Metadata for a user-defined type. The owning side (`bude::types::TypeTable`)
/// pairs this with a region-allocated field-type slice for the `Comp` case;
/// `Pack` keeps its (small, fixed-capacity) fields inline so no allocation is
/// needed for the common case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    /// Which variant this info describes.
    pub kind: TypeKind,
    /// Number of fields (`0` for `Simple`/`Uninit`).
    pub field_count: u32,
    /// Storage footprint, in 8-byte words.
    pub word_count: u32,
    /// Inline field-type storage, valid only for `kind == Pack`; unused
    /// slots are `SimpleType::Error`.
    pub inline_fields: [TypeIndex; MAX_PACK_FIELDS],
}

impl TypeInfo {
    /// The zero-valued `Simple`/no-payload info used for every built-in.
    pub const SIMPLE: TypeInfo = TypeInfo {
        kind: TypeKind::Simple,
        field_count: 0,
        word_count: 0,
        inline_fields: [0; MAX_PACK_FIELDS],
    };

    /// Builds a `Pack` info, panicking if `fields.len() > MAX_PACK_FIELDS`
    /// (spec invariant: `PACK.field_count <= 8`).
    pub fn pack(fields: &[TypeIndex], word_count: u32) -> Self {
        assert!(fields.len() <= MAX_PACK_FIELDS, "pack has too many fields");
        let mut inline_fields = [SimpleType::Error.index(); MAX_PACK_FIELDS];
        inline_fields[..fields.len()].copy_from_slice(fields);
        TypeInfo {
            kind: TypeKind::Pack,
            field_count: fields.len() as u32,
            word_count,
            inline_fields,
        }
    }

    /// Builds a `Comp` header; the field list itself lives in the owner's
    /// region and is not represented here.
    pub const fn comp(field_count: u32, word_count: u32) -> Self {
        TypeInfo {
            kind: TypeKind::Comp,
            field_count,
            word_count,
            inline_fields: [0; MAX_PACK_FIELDS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_type_count_matches_last_variant_plus_one() {
        assert_eq!(SimpleType::S32.index() + 1, SIMPLE_TYPE_COUNT);
        assert_eq!(SimpleType::Error.index(), 0);
    }

    #[test]
    fn is_simple_respects_the_threshold() {
        assert!(is_simple(0));
        assert!(is_simple(SIMPLE_TYPE_COUNT - 1));
        assert!(!is_simple(SIMPLE_TYPE_COUNT));
        assert!(!is_simple(-1));
    }

    #[test]
    fn pack_rejects_more_than_eight_fields() {
        let result = std::panic::catch_unwind(|| TypeInfo::pack(&[0; 9], 9));
        assert!(result.is_err());
    }
}
