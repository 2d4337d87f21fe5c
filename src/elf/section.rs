//! The ELF32 section header (`Elf32_Shdr`) and its flags.

use super::primitive::{Elf32Addr, Elf32Off, Elf32Word};
use crate::error::{Error, Result};
use bitflags::bitflags;

/// Size in bytes of an `Elf32_Shdr` entry
pub const SHDR_SIZE: usize = 40;

/// `SHN_UNDEF`: the undefined section index
pub const SHN_UNDEF: u16 = 0;
/// `SHN_COMMON`: reserved index for common symbols not yet allocated
pub const SHN_COMMON: u16 = 0xfff2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `sh_flags`: attributes of a section. Only the low three bits
    /// (`WRITE`, `ALLOC`, `EXECINSTR`) matter to this linker; everything
    /// else is preserved but ignored, mirroring the teacher crate's use of
    /// `bitflags` for ELF attribute sets.
    pub struct SectionFlags: u32 {
        /// Section contains writable data during process execution
        const WRITE = 0x1;
        /// Section occupies memory during process execution
        const ALLOC = 0x2;
        /// Section contains executable machine instructions
        const EXECINSTR = 0x4;
    }
}

impl SectionFlags {
    /// True if any of `WRITE | ALLOC | EXECINSTR` is set — the predicate
    /// this linker uses to decide whether a section is allocatable and thus
    /// gets a [`crate::layout::SectionMapping`]
    pub fn is_allocatable(self) -> bool {
        self.intersects(Self::WRITE | Self::ALLOC | Self::EXECINSTR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
/// `sh_type`: a section's contents and semantics
pub enum SectionType {
    /// `SHT_NULL`
    Null,
    /// `SHT_PROGBITS`
    ProgBits,
    /// `SHT_SYMTAB`
    SymTab,
    /// `SHT_STRTAB`
    StrTab,
    /// `SHT_RELA`
    Rela,
    /// `SHT_NOBITS`
    NoBits,
    /// `SHT_REL`
    Rel,
    /// Any other section type, preserved as the raw value
    Other(u32),
}

impl SectionType {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::ProgBits,
            2 => Self::SymTab,
            3 => Self::StrTab,
            4 => Self::Rela,
            8 => Self::NoBits,
            9 => Self::Rel,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A parsed ELF32 section header
pub struct SectionHeader {
    /// Offset of this section's name in the section header string table
    pub name: u32,
    /// The section's type
    pub ty: SectionType,
    /// The section's attribute flags
    pub flags: SectionFlags,
    /// The virtual address of this section's first byte, if it is loaded
    pub addr: u32,
    /// The byte offset of this section's contents in the file
    pub offset: u32,
    /// The section's size in bytes
    pub size: u32,
    /// Interpretation depends on section type (e.g. the string table for a
    /// symbol table, or the section a relocation section applies to)
    pub link: u32,
    /// Interpretation depends on section type (e.g. the target section
    /// index for a relocation section)
    pub info: u32,
    /// Required alignment of this section, or 0/1 if unconstrained
    pub addralign: u32,
    /// Size in bytes of each entry for sections holding a fixed-size-entry
    /// table
    pub entsize: u32,
}

impl SectionHeader {
    /// Parses one section header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let field = |off: usize| {
            bytes.get(off..).ok_or_else(|| Error::MalformedElf {
                reason: format!("section header field at offset {off} out of range"),
            })
        };

        let name = Elf32Word::from_bytes(field(0)?)?.0;
        let ty_raw = Elf32Word::from_bytes(field(4)?)?.0;
        let flags_raw = Elf32Word::from_bytes(field(8)?)?.0;
        let addr = Elf32Addr::from_bytes(field(12)?)?.0;
        let offset = Elf32Off::from_bytes(field(16)?)?.0;
        let size = Elf32Word::from_bytes(field(20)?)?.0;
        let link = Elf32Word::from_bytes(field(24)?)?.0;
        let info = Elf32Word::from_bytes(field(28)?)?.0;
        let addralign = Elf32Word::from_bytes(field(32)?)?.0;
        let entsize = Elf32Word::from_bytes(field(36)?)?.0;

        Ok(Self {
            name,
            ty: SectionType::from_raw(ty_raw),
            flags: SectionFlags::from_bits_truncate(flags_raw),
            addr,
            offset,
            size,
            link,
            info,
            addralign,
            entsize,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocatable_predicate() {
        assert!(SectionFlags::ALLOC.is_allocatable());
        assert!(SectionFlags::WRITE.is_allocatable());
        assert!(SectionFlags::EXECINSTR.is_allocatable());
        assert!(!SectionFlags::empty().is_allocatable());
    }

    #[test]
    fn unknown_section_type_is_preserved() {
        assert_eq!(SectionType::from_raw(0x7000_0001), SectionType::Other(0x7000_0001));
    }
}
