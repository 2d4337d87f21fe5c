//! The linker driver: ingests objects and archives, then runs bss
//! allocation, layout, relocation, and emission in that fixed order.
//!
//! This is `struct outelf` and its `outelf_add`/`outelf_ar_link`/
//! `outelf_link`/`outelf_write` methods from the source linker, reshaped
//! into a borrow-checked `Linker<'a>` that holds parsed [`Object`]s rather
//! than raw `mem` pointers into files the caller keeps alive.

use crate::archive::Archive;
use crate::elf::program::ProgramHeader;
use crate::error::Result;
use crate::got::GotTable;
use crate::layout::{self, Layout, LayoutConfig};
use crate::object::Object;
use crate::relocate;
use crate::resolve::sym_undef;
use std::io::{Seek, Write};

/// Accumulates objects (direct or pulled from archives) and links them
/// into an [`Layout`] + [`GotTable`] pair ready for [`crate::emit`].
///
/// Every object borrows from a buffer the caller owns for the duration of
/// the link (`'a`); archive members borrow from the archive's own buffer,
/// which must outlive the `Linker` the same way.
#[derive(Default)]
pub struct Linker<'a> {
    objects: Vec<Object<'a>>,
}

impl<'a> Linker<'a> {
    /// A linker with no objects loaded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Every object loaded so far, in load order
    pub fn objects(&self) -> &[Object<'a>] {
        &self.objects
    }

    /// Parses `bytes` as a relocatable object and adds it. A file whose
    /// `e_type` is not `ET_REL` is silently skipped rather than rejected —
    /// `outelf_add` does the same, since the driver never knowingly passes
    /// it one but archives may contain members this loose about their
    /// type.
    pub fn add_object(&mut self, bytes: &'a [u8]) -> Result<()> {
        match Object::parse(bytes) {
            Ok(obj) => {
                self.objects.push(obj);
                Ok(())
            }
            Err(crate::error::Error::WrongKind { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Parses `bytes` as an `ar` archive and pulls in every member that
    /// defines a symbol some already-loaded object still references as
    /// undefined, repeating full passes over the symbol index until one
    /// pass adds nothing — the fixpoint in `outelf_ar_link`'s
    /// `while (outelf_ar_link(...)) ;` loop. An archive with no symbol
    /// index contributes nothing, per spec.md §7.
    pub fn add_archive(&mut self, bytes: &'a [u8]) -> Result<()> {
        let archive = Archive::parse(bytes)?;
        let Some(index) = archive.symbol_index()? else {
            return Ok(());
        };

        loop {
            let mut added_any = false;
            for entry in &index {
                if sym_undef(&self.objects, &entry.name) {
                    let payload = archive.member_payload(entry.header_offset)?;
                    self.add_object(payload)?;
                    added_any = true;
                }
            }
            if !added_any {
                break;
            }
        }
        Ok(())
    }

    /// Runs bss allocation, layout, and relocation against every object
    /// loaded so far. No GOT entries are ever populated by this linker's
    /// relocation set (see [`crate::got`]), so the returned table always
    /// serializes to just the trailing pad.
    pub fn link(&self, config: &LayoutConfig) -> Result<(Layout, GotTable)> {
        let mut layout = layout::layout(&self.objects, config);
        relocate::apply_all(&self.objects, &mut layout.mappings, &layout.bss)?;
        Ok((layout, GotTable::new()))
    }

    /// Serializes a linked image to `writer`
    pub fn write_to(
        &self,
        layout: &Layout,
        got: &GotTable,
        writer: &mut (impl Write + Seek),
    ) -> Result<()> {
        crate::emit::write_image(&self.objects, layout, got, writer)
    }
}

/// Convenience re-export so callers don't need to reach into
/// [`crate::layout`] just to name the program header type in their own
/// signatures
pub type Segments = [ProgramHeader; 3];

#[cfg(test)]
mod test {
    use super::*;
    use crate::elf::relocation::RelocationType;
    use crate::layout::mapping_for;
    use crate::testutil::builder::ObjectBuilder;
    use std::io::Cursor;

    #[test]
    fn common_symbol_reference_resolves_through_its_own_bss_allocation() {
        // a.o declares `COMMON x size=16 align=8` but never references it.
        let mut a = ObjectBuilder::new();
        a.add_common_symbol("x", 16, 8);
        let a_bytes = a.build();

        // b.o declares the same `COMMON x` and defines `_start`, which
        // references `x` via an R_386_32 relocation.
        let mut b = ObjectBuilder::new();
        let text = b.add_text_section(".text", &[0, 0, 0, 0]);
        let x = b.add_common_symbol("x", 16, 8);
        b.add_global_symbol("_start", text, 0, 0);
        b.add_relocation(text, 0, x, RelocationType::Abs32 as u32);
        let b_bytes = b.build();

        let mut linker = Linker::new();
        linker.add_object(&a_bytes).unwrap();
        linker.add_object(&b_bytes).unwrap();
        let (layout, got) = linker.link(&LayoutConfig::default()).unwrap();

        // outelf_bss allocates one slot per COMMON occurrence with no
        // cross-object dedup, so a.o's x and b.o's x each get their own
        // slot; b.o's relocation names its own (already-defined) x symbol
        // directly, so it resolves to b.o's own allocation without any
        // cross-object lookup.
        let expected = layout.bss.address_of(1, x).unwrap();
        let mapping = mapping_for(&layout.mappings, 1, text).unwrap();
        let patched = u32::from_le_bytes(mapping.payload[0..4].try_into().unwrap());
        assert_eq!(patched, expected);

        let mut out = Cursor::new(Vec::new());
        linker.write_to(&layout, &got, &mut out).unwrap();
        assert_eq!(&out.into_inner()[0..4], &[0x7f, b'E', b'L', b'F']);
    }

    #[test]
    fn links_a_single_object_to_a_valid_executable() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90, 0x90]);
        b.add_global_symbol("_start", 1, 0, 0);
        let bytes = b.build();

        let mut linker = Linker::new();
        linker.add_object(&bytes).unwrap();
        let (layout, got) = linker.link(&LayoutConfig::default()).unwrap();

        let mut out = Cursor::new(Vec::new());
        linker.write_to(&layout, &got, &mut out).unwrap();
        assert_eq!(&out.into_inner()[0..4], &[0x7f, b'E', b'L', b'F']);
    }

    #[test]
    fn pulls_archive_member_that_defines_an_outstanding_reference() {
        let mut main = ObjectBuilder::new();
        main.add_text_section(".text", &[0x90, 0x90]);
        main.add_global_symbol("_start", 1, 0, 0);
        main.add_undefined_symbol("helper");
        let main_bytes = main.build();

        let mut lib = ObjectBuilder::new();
        lib.add_text_section(".text", &[0x90]);
        lib.add_global_symbol("helper", 1, 0, 0);
        let lib_bytes = lib.build();

        let magic = b"!<arch>\n";
        let mut header = vec![b' '; 60];
        header[0] = b'a';
        let size_str = lib_bytes.len().to_string();
        header[48..48 + size_str.len()].copy_from_slice(size_str.as_bytes());
        header[58] = b'`';
        header[59] = b'\n';

        let member_offset = magic.len(); // offset of the "a" member's own header
        let mut index_payload = 1u32.to_be_bytes().to_vec();
        index_payload.extend_from_slice(&(member_offset as u32).to_be_bytes());
        index_payload.extend_from_slice(b"helper\0");

        let mut index_header = vec![b' '; 60];
        index_header[0] = b'/';
        let idx_size_str = index_payload.len().to_string();
        index_header[48..48 + idx_size_str.len()].copy_from_slice(idx_size_str.as_bytes());
        index_header[58] = b'`';
        index_header[59] = b'\n';

        let mut archive_bytes = magic.to_vec();
        archive_bytes.extend_from_slice(&header);
        archive_bytes.extend_from_slice(&lib_bytes);
        if lib_bytes.len() % 2 != 0 {
            archive_bytes.push(0);
        }
        archive_bytes.extend_from_slice(&index_header);
        archive_bytes.extend_from_slice(&index_payload);

        let mut linker = Linker::new();
        linker.add_object(&main_bytes).unwrap();
        linker.add_archive(&archive_bytes).unwrap();

        assert_eq!(linker.objects().len(), 2);
        let (layout, _got) = linker.link(&LayoutConfig::default()).unwrap();
        assert!(crate::resolve::addr(linker.objects(), &layout.mappings, &layout.bss, "helper").is_ok());
    }
}
