//! Module-level type table (spec §4.3). Built-in types are implicit —
//! `SimpleType` already enumerates them — so this table only ever stores
//! user-defined types, indexed starting at [`SIMPLE_TYPE_COUNT`].

use bude_asm::{SimpleType, TypeIndex, TypeInfo, TypeKind, SIMPLE_TYPE_COUNT};

use crate::error::RegionError;
use crate::region::{Region, RegionSlice};

/// Growable table of user-defined types, mirroring `type.c`'s `new_type`/
/// `lookup_type` pair but keyed by a contiguous `Vec` instead of a manually
/// resized C array.
#[derive(Default)]
pub struct TypeTable {
    infos: Vec<TypeInfo>,
    /// Field-type list for each `Comp` entry, `None` for `Pack`/`Simple`
    /// entries. Parallel to `infos`.
    comp_fields: Vec<Option<RegionSlice>>,
}

impl TypeTable {
    /// An empty table; only built-ins resolve until types are registered.
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Total number of types visible through this table, built-ins included.
    pub fn len(&self) -> usize {
        SIMPLE_TYPE_COUNT as usize + self.infos.len()
    }

    /// Resolves a type index to its info, whether built-in or user-defined.
    pub fn lookup(&self, index: TypeIndex) -> Option<TypeInfo> {
        if bude_asm::is_simple(index) {
            return Some(TypeInfo::SIMPLE);
        }
        let offset = usize::try_from(index - SIMPLE_TYPE_COUNT).ok()?;
        self.infos.get(offset).copied()
    }

    /// Registers an inline-field `Pack` type, returning its new index.
    pub fn register_pack(&mut self, fields: &[TypeIndex], word_count: u32) -> TypeIndex {
        let info = TypeInfo::pack(fields, word_count);
        self.infos.push(info);
        self.comp_fields.push(None);
        self.last_index()
    }

    /// Registers an arbitrary-arity `Comp` type, copying `fields` into
    /// `region` (spec §4.3: "fields stored in the region" once a pack would
    /// overflow its inline capacity).
    pub fn register_comp(
        &mut self,
        region: &mut Region,
        fields: &[TypeIndex],
        word_count: u32,
    ) -> Result<TypeIndex, RegionError> {
        let slice = region.calloc(fields.len(), std::mem::size_of::<TypeIndex>())?;
        {
            let bytes = region.get_mut(slice);
            for (chunk, value) in bytes.chunks_exact_mut(4).zip(fields) {
                chunk.copy_from_slice(&value.to_le_bytes());
            }
        }
        let info = TypeInfo::comp(fields.len() as u32, word_count);
        self.infos.push(info);
        self.comp_fields.push(Some(slice));
        Ok(self.last_index())
    }

    fn last_index(&self) -> TypeIndex {
        SIMPLE_TYPE_COUNT + (self.infos.len() - 1) as TypeIndex
    }

    /// Reads back a `Comp` type's field list. Returns `None` for any other
    /// kind, or an index this table never registered.
    pub fn comp_fields(&self, region: &Region, index: TypeIndex) -> Option<Vec<TypeIndex>> {
        let offset = usize::try_from(index - SIMPLE_TYPE_COUNT).ok()?;
        let slice = (*self.comp_fields.get(offset)?)?;
        let bytes = region.get(slice);
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| TypeIndex::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    /// Storage footprint in bytes: built-ins use [`SimpleType::size`], user
    /// types use `word_count * 8`.
    pub fn size_of(&self, index: TypeIndex) -> usize {
        if let Some(simple) = SimpleType::from_index(index) {
            return simple.size();
        }
        match self.lookup(index) {
            Some(info) => info.word_count as usize * 8,
            None => 0,
        }
    }

    /// The fixed field count for `Pack`-kind types, read out of the inline
    /// array; `None` for anything else.
    pub fn pack_fields(&self, index: TypeIndex) -> Option<Vec<TypeIndex>> {
        let info = self.lookup(index)?;
        if info.kind != TypeKind::Pack {
            return None;
        }
        Some(info.inline_fields[..info.field_count as usize].to_vec())
    }
}
