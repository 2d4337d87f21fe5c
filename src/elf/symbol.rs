//! The ELF32 symbol table entry (`Elf32_Sym`).

use super::primitive::{Elf32Addr, Elf32Half, Elf32Word};
use super::section::SHN_UNDEF;
use crate::error::{Error, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Size in bytes of an `Elf32_Sym` entry
pub const SYM_SIZE: usize = 16;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `STB_*`: a symbol's binding, i.e. its linkage/visibility
pub enum SymbolBinding {
    /// Not visible outside the object file containing its definition
    Local = 0,
    /// Visible to all object files being combined
    Global = 1,
    /// Global but with lower precedence than [`SymbolBinding::Global`]
    /// definitions
    Weak = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// `STT_*`: a symbol's type
pub enum SymbolType {
    /// The symbol's type is not specified
    NoType = 0,
    /// Associated with a data object
    Object = 1,
    /// Associated with a function or other executable code
    Func = 2,
    /// Associated with a section; exists primarily for relocation and
    /// normally has [`SymbolBinding::Local`] binding
    Section = 3,
    /// Gives the name of the source file associated with the object file
    File = 4,
    /// An uninitialized common block not yet assigned a section
    Common = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A parsed ELF32 symbol table entry
pub struct Symbol {
    /// Offset of this symbol's name in the associated string table
    pub name: u32,
    /// The symbol's value: an absolute value, an address, or (for
    /// `SHN_COMMON`) the requested alignment
    pub value: u32,
    /// The symbol's size, or (for `SHN_COMMON`) the number of bytes
    /// requested
    pub size: u32,
    /// The symbol's binding, if recognized
    pub binding: Option<SymbolBinding>,
    /// The symbol's type, if recognized
    pub ty: Option<SymbolType>,
    /// The section this symbol is defined relative to, or one of the
    /// reserved `SHN_*` indices
    pub shndx: u16,
}

impl Symbol {
    /// Parses one symbol table entry at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let field = |off: usize| {
            bytes.get(off..).ok_or_else(|| Error::MalformedElf {
                reason: format!("symbol field at offset {off} out of range"),
            })
        };

        let name = Elf32Word::from_bytes(field(0)?)?.0;
        let value = Elf32Addr::from_bytes(field(4)?)?.0;
        let size = Elf32Word::from_bytes(field(8)?)?.0;
        let info = *field(12)?.first().ok_or_else(|| Error::MalformedElf {
            reason: "truncated symbol st_info".into(),
        })?;
        let shndx = Elf32Half::from_bytes(field(14)?)?.0;

        Ok(Self {
            name,
            value,
            size,
            binding: SymbolBinding::from_u8(info >> 4),
            ty: SymbolType::from_u8(info & 0xf),
            shndx,
        })
    }

    /// True if this symbol has no definition anywhere: `SHN_UNDEF` and not
    /// local. Used by [`crate::archive`] and [`crate::resolve`] to decide
    /// whether a reference is still outstanding.
    pub fn is_undefined_reference(&self) -> bool {
        self.shndx == SHN_UNDEF && self.binding != Some(SymbolBinding::Local)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sym_bytes(name: u32, value: u32, size: u32, info: u8, shndx: u16) -> [u8; SYM_SIZE] {
        let mut b = [0u8; SYM_SIZE];
        b[0..4].copy_from_slice(&name.to_le_bytes());
        b[4..8].copy_from_slice(&value.to_le_bytes());
        b[8..12].copy_from_slice(&size.to_le_bytes());
        b[12] = info;
        b[14..16].copy_from_slice(&shndx.to_le_bytes());
        b
    }

    #[test]
    fn parses_global_function() {
        let info = (1u8 << 4) | 2; // GLOBAL, FUNC
        let bytes = sym_bytes(4, 0x1000, 0, info, 1);
        let sym = Symbol::parse(&bytes).unwrap();
        assert_eq!(sym.binding, Some(SymbolBinding::Global));
        assert_eq!(sym.ty, Some(SymbolType::Func));
        assert!(!sym.is_undefined_reference());
    }

    #[test]
    fn undefined_global_reference() {
        let info = (1u8 << 4) | 1; // GLOBAL, OBJECT
        let bytes = sym_bytes(4, 0, 0, info, SHN_UNDEF);
        let sym = Symbol::parse(&bytes).unwrap();
        assert!(sym.is_undefined_reference());
    }

    #[test]
    fn local_undefined_is_not_a_reference() {
        let info = 0u8; // LOCAL, NOTYPE
        let bytes = sym_bytes(0, 0, 0, info, SHN_UNDEF);
        let sym = Symbol::parse(&bytes).unwrap();
        assert!(!sym.is_undefined_reference());
    }
}
