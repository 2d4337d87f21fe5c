//! Applying relocations to the laid-out section payloads.
//!
//! Every `SHT_REL` section in every object is walked and applied against
//! the target section's owned, mutable payload (see
//! [`crate::layout::SectionMapping`]). This is `outelf_reloc`/
//! `outelf_reloc_sec` in the source linker: relocation entries carry an
//! implicit addend already stored in the target bytes, so each case reads
//! the existing value, combines it with the resolved symbol address, and
//! writes the result back — it does not simply overwrite.

use crate::bss::BssTable;
use crate::elf::relocation::{RelEntry, RelocationType, REL_SIZE};
use crate::elf::section::SectionType;
use crate::error::{Error, Result};
use crate::layout::{mapping_for, mapping_for_mut, SectionMapping};
use crate::object::Object;
use crate::resolve::symval;

/// Applies every `SHT_REL` section's relocations across all objects,
/// patching `mappings` in place
pub fn apply_all(objects: &[Object], mappings: &mut [SectionMapping], bss: &BssTable) -> Result<()> {
    for (object_index, obj) in objects.iter().enumerate() {
        for (section_index, section) in obj.sections.iter().enumerate() {
            if section.ty != SectionType::Rel {
                continue;
            }
            let target_section = section.info as usize;
            apply_section(objects, mappings, bss, object_index, section_index, target_section)?;
        }
    }
    Ok(())
}

fn apply_section(
    objects: &[Object],
    mappings: &mut [SectionMapping],
    bss: &BssTable,
    object_index: usize,
    rel_section: usize,
    target_section: usize,
) -> Result<()> {
    let obj = &objects[object_index];
    let raw = obj.section_payload(rel_section)?;
    let target_vaddr = mapping_for(mappings, object_index, target_section)
        .map(|m| m.vaddr)
        .unwrap_or(0);

    for chunk in raw.chunks_exact(REL_SIZE) {
        let rel = RelEntry::parse(chunk)?;
        if obj.symbols.get(rel.symbol as usize).is_none() {
            return Err(Error::MalformedElf {
                reason: format!("relocation references out-of-range symbol {}", rel.symbol),
            });
        }
        let val = symval(objects, mappings, bss, object_index, rel.symbol as usize)?;

        let mapping = mapping_for_mut(mappings, object_index, target_section).ok_or_else(|| {
            Error::MalformedElf {
                reason: "relocation targets a section with no layout mapping".into(),
            }
        })?;
        let off = rel.offset as usize;

        match rel.ty() {
            Some(RelocationType::None) => {}
            Some(RelocationType::Abs16) => {
                let dst = mapping
                    .payload
                    .get_mut(off..off + 2)
                    .ok_or_else(|| Error::MalformedElf {
                        reason: "relocation offset out of range".into(),
                    })?;
                let addend = u16::from_le_bytes(dst.try_into().expect("checked len"));
                let patched = (addend as u32).wrapping_add(val) as u16;
                dst.copy_from_slice(&patched.to_le_bytes());
            }
            Some(RelocationType::Abs32) => {
                let dst = mapping
                    .payload
                    .get_mut(off..off + 4)
                    .ok_or_else(|| Error::MalformedElf {
                        reason: "relocation offset out of range".into(),
                    })?;
                let addend = u32::from_le_bytes(dst.try_into().expect("checked len"));
                let patched = addend.wrapping_add(val);
                dst.copy_from_slice(&patched.to_le_bytes());
            }
            Some(RelocationType::Pc32) | Some(RelocationType::Plt32) => {
                let dst = mapping
                    .payload
                    .get_mut(off..off + 4)
                    .ok_or_else(|| Error::MalformedElf {
                        reason: "relocation offset out of range".into(),
                    })?;
                let addend = u32::from_le_bytes(dst.try_into().expect("checked len"));
                let pc = target_vaddr.wrapping_add(rel.offset);
                let patched = addend.wrapping_add(val).wrapping_sub(pc);
                dst.copy_from_slice(&patched.to_le_bytes());
            }
            None => {
                return Err(Error::UnsupportedReloc { kind: rel.ty_raw });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::builder::ObjectBuilder;

    #[test]
    fn applies_abs32_relocation() {
        let mut b = ObjectBuilder::new();
        let text = b.add_text_section(".text", &[0, 0, 0, 0]);
        let sym = b.add_global_symbol("target", text, 0x10, 0);
        b.add_relocation(text, 0, sym, RelocationType::Abs32 as u32);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let objects = vec![obj];

        let config = crate::layout::LayoutConfig::default();
        let mut result = crate::layout::layout(&objects, &config);
        apply_all(&objects, &mut result.mappings, &result.bss).unwrap();

        let mapping = mapping_for(&result.mappings, 0, text).unwrap();
        let patched = u32::from_le_bytes(mapping.payload[0..4].try_into().unwrap());
        assert_eq!(patched, mapping.vaddr + 0x10);
    }

    #[test]
    fn applies_pc32_relocation_relative_to_patch_site() {
        let mut b = ObjectBuilder::new();
        let text = b.add_text_section(".text", &[0, 0, 0, 0, 0x90, 0x90, 0x90, 0x90]);
        let sym = b.add_global_symbol("callee", text, 4, 0);
        b.add_relocation(text, 0, sym, RelocationType::Pc32 as u32);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let objects = vec![obj];

        let config = crate::layout::LayoutConfig::default();
        let mut result = crate::layout::layout(&objects, &config);
        apply_all(&objects, &mut result.mappings, &result.bss).unwrap();

        let mapping = mapping_for(&result.mappings, 0, text).unwrap();
        let patched = u32::from_le_bytes(mapping.payload[0..4].try_into().unwrap());
        // callee is at vaddr+4, patch site is at vaddr+0: displacement is 4
        assert_eq!(patched, 4);
    }

    #[test]
    fn unsupported_relocation_type_is_an_error() {
        let mut b = ObjectBuilder::new();
        let text = b.add_text_section(".text", &[0, 0, 0, 0]);
        let sym = b.add_global_symbol("target", text, 0, 0);
        b.add_relocation(text, 0, sym, 99);
        let bytes = b.build();
        let obj = Object::parse(&bytes).unwrap();
        let objects = vec![obj];
        let config = crate::layout::LayoutConfig::default();
        let mut result = crate::layout::layout(&objects, &config);
        assert!(matches!(
            apply_all(&objects, &mut result.mappings, &result.bss),
            Err(Error::UnsupportedReloc { .. })
        ));
    }
}
