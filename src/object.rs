//! Parsing a single relocatable ELF32 i386 object file.
//!
//! An [`Object`] borrows the entire input buffer and holds zero-copy views
//! into it: the parsed header, the section header table, the symbol table,
//! and the string tables needed to resolve section and symbol names. The
//! buffer itself is owned by the driver (or, in tests, a `Vec<u8>` kept
//! alive alongside the [`crate::image::Linker`]) and must outlive every
//! [`Object`] built from it.

use crate::elf::header::{ElfHeader, ElfType, EM_386};
use crate::elf::section::{SectionHeader, SectionType, SHDR_SIZE};
use crate::elf::symbol::{Symbol, SYM_SIZE};
use crate::error::{Error, Result};

/// A parsed relocatable object file
#[derive(Debug)]
pub struct Object<'a> {
    /// The entire input file, borrowed for the lifetime of the object
    pub bytes: &'a [u8],
    /// The parsed file header
    pub header: ElfHeader,
    /// Every section header, in file order
    pub sections: Vec<SectionHeader>,
    /// Every symbol table entry, in file order (there is exactly one
    /// symbol table per object; see the `Object` invariant in SPEC_FULL.md)
    pub symbols: Vec<Symbol>,
    strtab_index: usize,
}

impl<'a> Object<'a> {
    /// Parses `bytes` as a 32-bit little-endian i386 relocatable ELF
    /// object.
    ///
    /// Fails with [`Error::MalformedElf`] if any header offset falls
    /// outside the buffer, [`Error::WrongKind`] if `e_type != ET_REL`, and
    /// [`Error::UnsupportedArch`] if `e_machine != EM_386`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let header = ElfHeader::parse(bytes)?;

        if header.ty != ElfType::Relocatable {
            return Err(Error::WrongKind {
                found: header.ty as u16,
            });
        }
        if header.machine != EM_386 {
            return Err(Error::UnsupportedArch {
                machine: header.machine,
            });
        }

        let mut sections = Vec::with_capacity(header.section_header_count as usize);
        for i in 0..header.section_header_count as usize {
            let off = header.section_header_offset as usize + i * SHDR_SIZE;
            let raw = bytes.get(off..off + SHDR_SIZE).ok_or_else(|| Error::MalformedElf {
                reason: format!("section header {i} out of range"),
            })?;
            sections.push(SectionHeader::parse(raw)?);
        }

        let symtab_section = sections
            .iter()
            .find(|s| s.ty == SectionType::SymTab);

        let (symbols, strtab_index) = match symtab_section {
            Some(symtab) => {
                let strtab_index = symtab.link as usize;
                let count = (symtab.size as usize) / SYM_SIZE;
                let mut symbols = Vec::with_capacity(count);
                for i in 0..count {
                    let off = symtab.offset as usize + i * SYM_SIZE;
                    let raw = bytes.get(off..off + SYM_SIZE).ok_or_else(|| Error::MalformedElf {
                        reason: format!("symbol {i} out of range"),
                    })?;
                    symbols.push(Symbol::parse(raw)?);
                }
                (symbols, strtab_index)
            }
            None => (Vec::new(), 0),
        };

        Ok(Self {
            bytes,
            header,
            sections,
            symbols,
            strtab_index,
        })
    }

    /// Reads a NUL-terminated string starting at `offset` within the string
    /// table section `section_index`
    fn string_at(&self, section_index: usize, offset: u32) -> Result<&'a str> {
        let section = self.sections.get(section_index).ok_or_else(|| Error::MalformedElf {
            reason: format!("string table section index {section_index} out of range"),
        })?;
        let base = section.offset as usize + offset as usize;
        let table_end = section.offset as usize + section.size as usize;
        let slice = self
            .bytes
            .get(base..table_end)
            .ok_or_else(|| Error::MalformedElf {
                reason: "string table offset out of range".into(),
            })?;
        let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
        std::str::from_utf8(&slice[..end]).map_err(|_| Error::MalformedElf {
            reason: "string table entry is not valid UTF-8".into(),
        })
    }

    /// Resolves a symbol's name via this object's symbol string table
    pub fn symbol_name(&self, sym: &Symbol) -> Result<&'a str> {
        self.string_at(self.strtab_index, sym.name)
    }

    /// Returns the index, within [`Object::symbols`], of the first
    /// non-`STB_LOCAL`, non-`SHN_UNDEF` symbol named `name`, in
    /// symbol-table order.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|sym| {
            sym.binding != Some(crate::elf::symbol::SymbolBinding::Local)
                && sym.shndx != crate::elf::section::SHN_UNDEF
                && self.symbol_name(sym).map(|n| n == name).unwrap_or(false)
        })
    }

    /// Returns the first non-`STB_LOCAL`, non-`SHN_UNDEF` symbol named
    /// `name`, in symbol-table order. Used both for direct lookups and by
    /// the archive walker's undefined-reference scan.
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.find_index(name).map(|i| &self.symbols[i])
    }

    /// The raw file contents of section `index`. `SHT_NOBITS` sections
    /// occupy no file bytes and yield an empty slice regardless of
    /// `sh_size`.
    pub fn section_payload(&self, index: usize) -> Result<&'a [u8]> {
        let section = self.sections.get(index).ok_or_else(|| Error::MalformedElf {
            reason: format!("section index {index} out of range"),
        })?;
        if section.ty == SectionType::NoBits {
            return Ok(&[]);
        }
        self.bytes
            .get(section.offset as usize..(section.offset + section.size) as usize)
            .ok_or_else(|| Error::MalformedElf {
                reason: format!("section {index} payload out of range"),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::builder::ObjectBuilder;

    #[test]
    fn rejects_non_relocatable() {
        let bytes = ObjectBuilder::new().executable().build();
        assert!(matches!(Object::parse(&bytes), Err(Error::WrongKind { .. })));
    }

    #[test]
    fn rejects_wrong_machine() {
        let bytes = ObjectBuilder::new().machine(62).build();
        assert!(matches!(
            Object::parse(&bytes),
            Err(Error::UnsupportedArch { .. })
        ));
    }

    #[test]
    fn finds_global_symbol_by_name() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90, 0x90]);
        b.add_global_symbol("_start", 1, 0, 0);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let sym = obj.find("_start").unwrap();
        assert_eq!(obj.symbol_name(sym).unwrap(), "_start");
    }

    #[test]
    fn ignores_local_symbols_in_find() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90]);
        b.add_local_symbol("helper", 1, 0);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        assert!(obj.find("helper").is_none());
    }
}
