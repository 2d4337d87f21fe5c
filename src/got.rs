//! The synthesized global offset table.
//!
//! The source linker builds this table for symbols that need an
//! indirection slot, then appends [`crate::layout::GOT_PAD`] zero bytes
//! after it (`outelf_putgot`). None of the relocation kinds this linker
//! implements (`R_386_NONE`/`16`/`32`/`PC32`/`PLT32`) are GOT-relative, so
//! in practice no entry is ever added and the emitted table is always just
//! the trailing pad — but the table itself, and the machinery to resolve
//! and emit its entries, is kept wired up as the source linker leaves it,
//! for a future relocation kind that would need it.

use crate::bss::BssTable;
use crate::error::Result;
use crate::layout::SectionMapping;
use crate::object::Object;
use crate::resolve::{symval, SymRef};

/// Entries destined for the GOT, plus the pad appended after them
#[derive(Debug, Default)]
pub struct GotTable {
    entries: Vec<SymRef>,
}

impl GotTable {
    /// An empty GOT
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol's GOT slot, if it isn't already present. Returns its
    /// index within the table.
    pub fn entry(&mut self, sym: SymRef) -> usize {
        if let Some(i) = self.entries.iter().position(|&e| e == sym) {
            return i;
        }
        self.entries.push(sym);
        self.entries.len() - 1
    }

    /// Number of GOT entries (excluding the trailing pad)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no symbol has been given a GOT slot
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every entry to its virtual address, in table order,
    /// followed by [`crate::layout::GOT_PAD`] zero bytes
    pub fn serialize(
        &self,
        objects: &[Object],
        mappings: &[SectionMapping],
        bss: &BssTable,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.entries.len() * 4 + crate::layout::GOT_PAD as usize);
        for &(object, symbol) in &self.entries {
            let addr = symval(objects, mappings, bss, object, symbol)?;
            out.extend_from_slice(&addr.to_le_bytes());
        }
        out.extend(std::iter::repeat(0u8).take(crate::layout::GOT_PAD as usize));
        Ok(out)
    }
}
