//! Symbol resolution: turning a name or a symbol table entry into a
//! virtual address.
//!
//! A symbol is identified by `(object_index, symbol_index)` — a pair of
//! indices into the linker's object list and that object's symbol table —
//! rather than by reference. The C original keeps a raw `Elf32_Sym *` and
//! compares pointers for identity (see `bss_addr` and `outelf_putgot` in
//! `ld.c`); Rust has no stable equivalent once borrows are involved, so the
//! index pair stands in for pointer identity everywhere a bss slot or GOT
//! entry needs to recognize "the same symbol" across calls.

use crate::bss::BssTable;
use crate::elf::section::{SHN_COMMON, SHN_UNDEF};
use crate::elf::symbol::{SymbolBinding, SymbolType};
use crate::error::{Error, Result};
use crate::layout::{mapping_for, SectionMapping};
use crate::object::Object;

/// Identifies a symbol table entry by its position: the index of the
/// defining object within the linker's object list, and the index of the
/// entry within that object's symbol table
pub type SymRef = (usize, usize);

/// Finds the first non-`STB_LOCAL`, non-`SHN_UNDEF` symbol named `name`,
/// searching objects in load order
pub fn find_symbol(objects: &[Object], name: &str) -> Option<SymRef> {
    objects
        .iter()
        .enumerate()
        .find_map(|(object, obj)| obj.find_index(name).map(|symbol| (object, symbol)))
}

/// True if `name` has at least one non-local reference across all loaded
/// objects and every such reference is still `SHN_UNDEF` — i.e. the name is
/// wanted but nothing loaded so far defines it. Drives the archive member
/// worklist in [`crate::image`].
pub fn sym_undef(objects: &[Object], name: &str) -> bool {
    let mut undef = false;
    for obj in objects {
        for sym in &obj.symbols {
            if sym.binding == Some(SymbolBinding::Local) {
                continue;
            }
            if obj.symbol_name(sym).map(|n| n == name).unwrap_or(false) {
                if sym.shndx != SHN_UNDEF {
                    return false;
                }
                undef = true;
            }
        }
    }
    undef
}

/// Resolves the virtual address denoted by symbol table entry
/// `(object_index, symbol_index)`.
///
/// `STT_SECTION` symbols resolve to the mapped address of the section they
/// name directly, without following any reference. `STT_NOTYPE`,
/// `STT_OBJECT`, and `STT_FUNC` symbols that are themselves `SHN_UNDEF`
/// are first resolved by name against every loaded object (this is where a
/// reference defined in one object is satisfied by a definition in
/// another); the resulting definition is then resolved as a common symbol,
/// or as `section base + st_value`. Any other symbol type resolves to 0,
/// matching the C original's fallthrough.
pub fn symval(
    objects: &[Object],
    mappings: &[SectionMapping],
    bss: &BssTable,
    object_index: usize,
    symbol_index: usize,
) -> Result<u32> {
    let sym = objects[object_index].symbols[symbol_index];

    match sym.ty {
        Some(SymbolType::Section) => Ok(mapping_for(mappings, object_index, sym.shndx as usize)
            .map(|m| m.vaddr)
            .unwrap_or(0)),

        Some(SymbolType::NoType) | Some(SymbolType::Object) | Some(SymbolType::Func) => {
            let (mut object_index, mut symbol_index) = (object_index, symbol_index);
            let name = objects[object_index].symbol_name(&sym)?;
            if !name.is_empty() && sym.shndx == SHN_UNDEF {
                match find_symbol(objects, name) {
                    Some(found) => (object_index, symbol_index) = found,
                    None => {
                        return Err(Error::UndefinedSymbol {
                            name: name.to_string(),
                        })
                    }
                }
            }

            let sym = objects[object_index].symbols[symbol_index];
            if sym.shndx == SHN_COMMON {
                return Ok(bss.address_of(object_index, symbol_index).unwrap_or(0));
            }
            Ok(mapping_for(mappings, object_index, sym.shndx as usize)
                .map(|m| m.vaddr + sym.value)
                .unwrap_or(0))
        }

        _ => Ok(0),
    }
}

/// Looks `name` up across every loaded object and resolves it to a virtual
/// address. Fails with [`Error::UndefinedSymbol`] if no loaded object
/// defines it at all.
pub fn addr(
    objects: &[Object],
    mappings: &[SectionMapping],
    bss: &BssTable,
    name: &str,
) -> Result<u32> {
    let (object_index, symbol_index) = find_symbol(objects, name).ok_or_else(|| Error::UndefinedSymbol {
        name: name.to_string(),
    })?;
    symval(objects, mappings, bss, object_index, symbol_index)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::SectionMapping;
    use crate::testutil::builder::ObjectBuilder;

    #[test]
    fn sym_undef_true_when_only_reference_is_unresolved() {
        let mut b = ObjectBuilder::new();
        b.add_undefined_symbol("helper");
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        assert!(sym_undef(&[obj], "helper"));
    }

    #[test]
    fn sym_undef_false_once_defined() {
        let mut b = ObjectBuilder::new();
        b.add_text_section(".text", &[0x90]);
        b.add_global_symbol("helper", 1, 0, 0);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        assert!(!sym_undef(&[obj], "helper"));
    }

    #[test]
    fn resolves_reference_across_objects() {
        let mut def = ObjectBuilder::new();
        def.add_text_section(".text", &[0x90, 0x90]);
        def.add_global_symbol("target", 1, 4, 0);
        let def_bytes = def.build();
        let def_obj = Object::parse(&def_bytes).unwrap();

        let mut refr = ObjectBuilder::new();
        refr.add_undefined_symbol("target");
        let ref_bytes = refr.build();
        let ref_obj = Object::parse(&ref_bytes).unwrap();

        let objects = vec![ref_obj, def_obj];
        let mappings = vec![SectionMapping {
            object: 1,
            section: 1,
            vaddr: 0x0400_0000,
            faddr: 0,
            payload: vec![0x90, 0x90],
        }];
        let bss = BssTable::new();

        let symbol_index = objects[0].find_index("target");
        assert!(symbol_index.is_none(), "reference itself is SHN_UNDEF, not findable via find_index");

        let addr = addr(&objects, &mappings, &bss, "target").unwrap();
        assert_eq!(addr, 0x0400_0004);
    }

    #[test]
    fn undefined_symbol_is_an_error() {
        let objects: Vec<Object> = vec![];
        let mappings = vec![];
        let bss = BssTable::new();
        assert!(matches!(
            addr(&objects, &mappings, &bss, "missing"),
            Err(Error::UndefinedSymbol { .. })
        ));
    }
}
