//! Writing the final ELF32 executable image: file header, the three
//! `PT_LOAD` program headers, every non-bss section's relocated payload at
//! its assigned file offset, and the synthesized GOT.
//!
//! This mirrors `outelf_write`: the file is built with seeks rather than
//! sequential writes, since the program header table reserves more room
//! than it uses ([`crate::layout::PHDR_SLOTS`] vs. the 3 headers actually
//! written) and sections are placed at whatever offset the layout pass
//! assigned them, not necessarily contiguous with what came before.

use crate::elf::header::{ElfHeader, ElfType, EM_386};
use crate::elf::ident::{ElfClass, ElfDataEncoding, ElfIdentifier};
use crate::elf::section::SectionType;
use crate::elf::program::PHDR_SIZE;
use crate::error::{Error, Result};
use crate::got::GotTable;
use crate::layout::Layout;
use crate::object::Object;
use crate::resolve::addr;
use std::io::{Seek, SeekFrom, Write};

/// Serializes the linked image into `writer`: header, program headers,
/// every mapped section's relocated payload, and the GOT. `writer` must
/// support seeking (a `std::fs::File` or `std::io::Cursor`).
pub fn write_image(
    objects: &[Object],
    layout: &Layout,
    got: &GotTable,
    writer: &mut (impl Write + Seek),
) -> Result<()> {
    let entry = addr(objects, &layout.mappings, &layout.bss, "_start").map_err(|_| {
        Error::MissingEntry {
            symbol: "_start".to_string(),
        }
    })?;

    let header = ElfHeader::builder()
        .identifier(ElfIdentifier {
            class: ElfClass::Elf32,
            data_encoding: ElfDataEncoding::LittleEndian,
            os_abi: 0,
        })
        .ty(ElfType::Executable)
        .machine(EM_386)
        .entry(entry)
        .program_header_offset(crate::elf::header::EHDR_SIZE as u32)
        .program_header_entry_size(PHDR_SIZE as u16)
        .program_header_count(layout.program_headers.len() as u16)
        .build();

    writer.seek(SeekFrom::Start(0))?;
    header.write(writer)?;
    for phdr in &layout.program_headers {
        phdr.write(writer)?;
    }

    for mapping in &layout.mappings {
        let section = &objects[mapping.object].sections[mapping.section];
        if section.ty == SectionType::NoBits {
            continue;
        }
        writer.seek(SeekFrom::Start(mapping.faddr as u64))?;
        writer.write_all(&mapping.payload)?;
    }

    let got_bytes = got.serialize(objects, &layout.mappings, &layout.bss)?;
    writer.seek(SeekFrom::Start(layout.got_faddr as u64))?;
    writer.write_all(&got_bytes)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::{layout, LayoutConfig};
    use crate::testutil::builder::ObjectBuilder;
    use std::io::Cursor;

    #[test]
    fn emits_a_valid_elf32_executable_header() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90, 0x90]);
        b.add_global_symbol("_start", 1, 0, 0);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let objects = vec![obj];

        let config = LayoutConfig::default();
        let mut result = layout(&objects, &config);
        crate::relocate::apply_all(&objects, &mut result.mappings, &result.bss).unwrap();
        let got = GotTable::new();

        let mut out = Cursor::new(Vec::new());
        write_image(&objects, &result, &got, &mut out).unwrap();
        let bytes = out.into_inner();

        assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);
        assert_eq!(bytes[4], ElfClass::Elf32 as u8);
        let e_type = u16::from_le_bytes([bytes[16], bytes[17]]);
        assert_eq!(e_type, ElfType::Executable as u16);
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90]);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let objects = vec![obj];

        let config = LayoutConfig::default();
        let result = layout(&objects, &config);
        let got = GotTable::new();
        let mut out = Cursor::new(Vec::new());
        assert!(matches!(
            write_image(&objects, &result, &got, &mut out),
            Err(Error::MissingEntry { .. })
        ));
    }
}
