//! The `e_ident` array at the start of every ELF file.
//!
//! This linker accepts only the single combination `e_ident` can encode that
//! it knows how to act on: 32-bit, little-endian. [`ElfIdentifier::parse`]
//! enforces that and reports [`Error::MalformedElf`] for anything else; the
//! fuller `ElfClass`/`ElfDataEncoding` enumerations are kept (mirroring the
//! teacher crate's `header/elf/identification.rs`) so a rejected file's
//! `e_ident` can still be described precisely in diagnostics.

use crate::error::{Error, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

/// Number of bytes in `e_ident`
pub const EI_NIDENT: usize = 16;

const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The file's class, i.e. whether it is 32-bit or 64-bit
pub enum ElfClass {
    /// Invalid class
    None = 0,
    /// 32-bit objects
    Elf32 = 1,
    /// 64-bit objects
    Elf64 = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The file's data encoding, i.e. its byte order
pub enum ElfDataEncoding {
    /// Invalid data encoding
    None = 0,
    /// Little-endian
    LittleEndian = 1,
    /// Big-endian
    BigEndian = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The parsed `e_ident` array, checked for the class/encoding this linker
/// supports (ELF32, little-endian)
pub struct ElfIdentifier {
    /// The file's class (always [`ElfClass::Elf32`] once parsed)
    pub class: ElfClass,
    /// The file's data encoding (always [`ElfDataEncoding::LittleEndian`]
    /// once parsed)
    pub data_encoding: ElfDataEncoding,
    /// The OS/ABI byte (`EI_OSABI`), not otherwise interpreted by this
    /// linker
    pub os_abi: u8,
}

impl ElfIdentifier {
    /// Parses and validates the 16-byte `e_ident` array at the start of
    /// `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let ident = bytes.get(..EI_NIDENT).ok_or_else(|| Error::MalformedElf {
            reason: "file shorter than e_ident".into(),
        })?;

        if ident[..4] != MAGIC {
            return Err(Error::MalformedElf {
                reason: "bad ELF magic".into(),
            });
        }

        let class = ElfClass::from_u8(ident[4]).ok_or_else(|| Error::MalformedElf {
            reason: format!("invalid EI_CLASS {}", ident[4]),
        })?;
        if class != ElfClass::Elf32 {
            return Err(Error::MalformedElf {
                reason: "only ELFCLASS32 is supported".into(),
            });
        }

        let data_encoding =
            ElfDataEncoding::from_u8(ident[5]).ok_or_else(|| Error::MalformedElf {
                reason: format!("invalid EI_DATA {}", ident[5]),
            })?;
        if data_encoding != ElfDataEncoding::LittleEndian {
            return Err(Error::MalformedElf {
                reason: "only little-endian objects are supported".into(),
            });
        }

        Ok(Self {
            class,
            data_encoding,
            os_abi: ident[7],
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ident_bytes(class: u8, data: u8) -> [u8; EI_NIDENT] {
        let mut id = [0u8; EI_NIDENT];
        id[..4].copy_from_slice(&MAGIC);
        id[4] = class;
        id[5] = data;
        id[6] = 1;
        id
    }

    #[test]
    fn accepts_elf32_le() {
        let id = ident_bytes(1, 1);
        let parsed = ElfIdentifier::parse(&id).unwrap();
        assert_eq!(parsed.class, ElfClass::Elf32);
        assert_eq!(parsed.data_encoding, ElfDataEncoding::LittleEndian);
    }

    #[test]
    fn rejects_elf64() {
        let id = ident_bytes(2, 1);
        assert!(ElfIdentifier::parse(&id).is_err());
    }

    #[test]
    fn rejects_big_endian() {
        let id = ident_bytes(1, 2);
        assert!(ElfIdentifier::parse(&id).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut id = ident_bytes(1, 1);
        id[0] = 0;
        assert!(ElfIdentifier::parse(&id).is_err());
    }
}
