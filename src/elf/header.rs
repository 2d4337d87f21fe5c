//! The ELF32 file header (`Elf32_Ehdr`).

use super::ident::ElfIdentifier;
use super::primitive::{Elf32Addr, Elf32Half, Elf32Off, Elf32Word};
use crate::error::{Error, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use std::io::Write;
use typed_builder::TypedBuilder;

/// i386, the only machine this linker accepts for input objects and the only
/// one it emits for the output executable
pub const EM_386: u16 = 3;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The object file type, `e_type`
pub enum ElfType {
    /// No file type
    None = 0,
    /// Relocatable file
    Relocatable = 1,
    /// Executable file
    Executable = 2,
    /// Shared object file
    Dynamic = 3,
    /// Core file
    Core = 4,
}

/// Size in bytes of the ELF32 file header, excluding no trailing padding
/// (this linker never writes extra header bytes beyond the fixed fields)
pub const EHDR_SIZE: usize = 52;

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
/// A parsed (or to-be-emitted) ELF32 file header
pub struct ElfHeader {
    /// The file's identification bytes
    pub identifier: ElfIdentifier,
    /// The object file type
    pub ty: ElfType,
    /// The required machine architecture, checked against [`EM_386`] by the
    /// object parser
    pub machine: u16,
    /// The object file version, always 1 (`EV_CURRENT`)
    #[builder(default = 1)]
    pub version: u32,
    /// The virtual address to which control is transferred once loaded
    #[builder(default = 0)]
    pub entry: u32,
    /// File offset of the program header table
    #[builder(default = 0)]
    pub program_header_offset: u32,
    /// File offset of the section header table
    #[builder(default = 0)]
    pub section_header_offset: u32,
    /// Processor-specific flags, unused by i386
    #[builder(default = 0)]
    pub flags: u32,
    /// Size in bytes of the program header table entry
    #[builder(default = 0)]
    pub program_header_entry_size: u16,
    /// Number of program header table entries
    #[builder(default = 0)]
    pub program_header_count: u16,
    /// Size in bytes of a section header table entry
    #[builder(default = 0)]
    pub section_header_entry_size: u16,
    /// Number of section header table entries
    #[builder(default = 0)]
    pub section_header_count: u16,
    /// Section header table index of the section name string table, or
    /// `SHN_UNDEF` if there is none (this linker never emits one)
    #[builder(default = 0)]
    pub section_name_string_table_index: u16,
}

impl ElfHeader {
    /// Parses a 32-bit little-endian ELF header from the start of `bytes`.
    /// Fails with [`Error::WrongKind`] if `e_type != ET_REL` is required by
    /// the caller but not found, and with [`Error::UnsupportedArch`] if
    /// `e_machine != EM_386`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let identifier = ElfIdentifier::parse(bytes)?;

        let field = |off: usize| {
            bytes.get(off..).ok_or_else(|| Error::MalformedElf {
                reason: format!("header field at offset {off} out of range"),
            })
        };

        let ty_raw = Elf32Half::from_bytes(field(16)?)?.0;
        let ty = ElfType::from_u16(ty_raw).ok_or_else(|| Error::MalformedElf {
            reason: format!("invalid e_type {ty_raw}"),
        })?;
        let machine = Elf32Half::from_bytes(field(18)?)?.0;
        let version = Elf32Word::from_bytes(field(20)?)?.0;
        let entry = Elf32Addr::from_bytes(field(24)?)?.0;
        let program_header_offset = Elf32Off::from_bytes(field(28)?)?.0;
        let section_header_offset = Elf32Off::from_bytes(field(32)?)?.0;
        let flags = Elf32Word::from_bytes(field(36)?)?.0;
        let _ehsize = Elf32Half::from_bytes(field(40)?)?.0;
        let program_header_entry_size = Elf32Half::from_bytes(field(42)?)?.0;
        let program_header_count = Elf32Half::from_bytes(field(44)?)?.0;
        let section_header_entry_size = Elf32Half::from_bytes(field(46)?)?.0;
        let section_header_count = Elf32Half::from_bytes(field(48)?)?.0;
        let section_name_string_table_index = Elf32Half::from_bytes(field(50)?)?.0;

        Ok(Self {
            identifier,
            ty,
            machine,
            version,
            entry,
            program_header_offset,
            section_header_offset,
            flags,
            program_header_entry_size,
            program_header_count,
            section_header_entry_size,
            section_header_count,
            section_name_string_table_index,
        })
    }

    /// Writes this header out in the fixed 52-byte ELF32 layout
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        let mut ident = [0u8; super::ident::EI_NIDENT];
        ident[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        ident[4] = self.identifier.class as u8;
        ident[5] = self.identifier.data_encoding as u8;
        ident[6] = 1;
        ident[7] = self.identifier.os_abi;
        writer.write_all(&ident)?;

        Elf32Half(self.ty as u16).write(writer)?;
        Elf32Half(self.machine).write(writer)?;
        Elf32Word(self.version).write(writer)?;
        Elf32Addr(self.entry).write(writer)?;
        Elf32Off(self.program_header_offset).write(writer)?;
        Elf32Off(self.section_header_offset).write(writer)?;
        Elf32Word(self.flags).write(writer)?;
        Elf32Half(EHDR_SIZE as u16).write(writer)?;
        Elf32Half(self.program_header_entry_size).write(writer)?;
        Elf32Half(self.program_header_count).write(writer)?;
        Elf32Half(self.section_header_entry_size).write(writer)?;
        Elf32Half(self.section_header_count).write(writer)?;
        Elf32Half(self.section_name_string_table_index).write(writer)?;
        Ok(())
    }
}
