//! Little-endian ELF32 primitive field types.
//!
//! The teacher crate this linker is grounded on models each ELF field as a
//! newtype generic over ELF class and data encoding (`ElfWord<EC, ED>`,
//! `ElfAddress<EC, ED>`, ...) so a single definition covers ELF32/ELF64 and
//! both endiannesses. This linker only ever reads and writes ELF32
//! little-endian i386 objects, so the const-generic parameters are dropped
//! and each newtype is hardwired to `u32`/`u16` little-endian encoding.

use crate::error::{Error, Result};
use std::io::Write;

macro_rules! elf32_primitive {
    ($name:ident, $repr:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[doc = concat!("A little-endian ELF32 `", stringify!($repr), "` field")]
        pub struct $name(pub $repr);

        impl $name {
            /// Size in bytes of this field as it appears on disk
            pub const SIZE: usize = std::mem::size_of::<$repr>();

            /// Reads a value from the start of `bytes`, which must contain
            /// at least [`Self::SIZE`] bytes
            pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
                let arr = bytes
                    .get(..Self::SIZE)
                    .ok_or_else(|| Error::MalformedElf {
                        reason: format!("truncated {} field", stringify!($name)),
                    })?
                    .try_into()
                    .expect("slice length checked above");
                Ok(Self(<$repr>::from_le_bytes(arr)))
            }

            /// Encodes this value as little-endian bytes
            pub fn to_le_bytes(self) -> [u8; std::mem::size_of::<$repr>()] {
                self.0.to_le_bytes()
            }

            /// Writes this value to `writer` in little-endian order
            pub fn write(self, writer: &mut impl Write) -> Result<()> {
                writer.write_all(&self.to_le_bytes())?;
                Ok(())
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

elf32_primitive!(Elf32Half, u16);
elf32_primitive!(Elf32Word, u32);
elf32_primitive!(Elf32Addr, u32);
elf32_primitive!(Elf32Off, u32);
elf32_primitive!(Elf32Sword, i32);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_word() {
        let w = Elf32Word::from_bytes(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(w.0, 0x0403_0201);
        let mut out = Vec::new();
        w.write(&mut out).unwrap();
        assert_eq!(out, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn rejects_truncated_field() {
        assert!(Elf32Word::from_bytes(&[0x01, 0x02]).is_err());
    }
}
