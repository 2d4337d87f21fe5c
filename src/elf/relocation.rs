//! The ELF32 `Elf32_Rel` relocation entry and the i386 relocation types
//! this linker implements.

use super::primitive::{Elf32Addr, Elf32Word};
use crate::error::Result;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Size in bytes of an `Elf32_Rel` entry
pub const REL_SIZE: usize = 8;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `R_386_*`: the i386 relocation types this linker applies. Any other
/// value parses successfully as a raw `r_info` but fails to apply with
/// [`crate::error::Error::UnsupportedReloc`].
pub enum RelocationType {
    /// No relocation
    None = 0,
    /// `S + A`, stored in 32 bits
    Abs32 = 1,
    /// `S + A - P`, stored in 32 bits
    Pc32 = 2,
    /// `S + A - P`, resolved via the PLT, stored in 32 bits
    Plt32 = 4,
    /// `S + A`, stored in the low 16 bits
    Abs16 = 20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A parsed relocation entry, with the symbol index and type split out of
/// `r_info`
pub struct RelEntry {
    /// Offset within the target section's contents to patch
    pub offset: u32,
    /// Index into the associated symbol table
    pub symbol: u32,
    /// The raw relocation type, looked up against [`RelocationType`] when
    /// the relocation is applied
    pub ty_raw: u32,
}

impl RelEntry {
    /// Parses one `Elf32_Rel` entry at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let offset = Elf32Addr::from_bytes(&bytes[0..4])?.0;
        let info = Elf32Word::from_bytes(&bytes[4..8])?.0;
        Ok(Self {
            offset,
            symbol: info >> 8,
            ty_raw: info & 0xff,
        })
    }

    /// Looks up the recognized [`RelocationType`] for this entry, if any
    pub fn ty(&self) -> Option<RelocationType> {
        RelocationType::from_u32(self.ty_raw)
    }
}
