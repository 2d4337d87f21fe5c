//! The ELF32 program header (`Elf32_Phdr`), describing one loadable segment.

use super::primitive::{Elf32Addr, Elf32Off, Elf32Word};
use crate::error::Result;
use bitflags::bitflags;
use std::io::Write;

/// Size in bytes of an `Elf32_Phdr` entry
pub const PHDR_SIZE: usize = 32;

/// `PT_LOAD`: a loadable segment
pub const PT_LOAD: u32 = 1;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// `p_flags`: a segment's access permissions
    pub struct SegmentFlags: u32 {
        /// Executable
        const X = 0x1;
        /// Writable
        const W = 0x2;
        /// Readable
        const R = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// A program header describing one `PT_LOAD` segment, or an all-zero
/// reserved slot
pub struct ProgramHeader {
    /// Segment type; 0 (`PT_NULL`) for the reserved fourth slot this linker
    /// always leaves unused
    pub ty: u32,
    /// Offset in the file at which the segment begins
    pub offset: u32,
    /// Virtual address at which the segment's first byte should reside
    pub vaddr: u32,
    /// Physical address, equal to `vaddr` for this linker's targets
    pub paddr: u32,
    /// Number of bytes in the file image of the segment
    pub filesz: u32,
    /// Number of bytes in the memory image of the segment
    pub memsz: u32,
    /// Segment permissions
    pub flags: SegmentFlags,
    /// Required alignment; segments produced by this linker are always
    /// page-aligned
    pub align: u32,
}

impl ProgramHeader {
    /// Writes this header in the fixed 32-byte ELF32 layout
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        Elf32Word(self.ty).write(writer)?;
        Elf32Off(self.offset).write(writer)?;
        Elf32Addr(self.vaddr).write(writer)?;
        Elf32Addr(self.paddr).write(writer)?;
        Elf32Word(self.filesz).write(writer)?;
        Elf32Word(self.memsz).write(writer)?;
        Elf32Word(self.flags.bits()).write(writer)?;
        Elf32Word(self.align).write(writer)?;
        Ok(())
    }
}
