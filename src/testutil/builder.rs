//! Synthesizes minimal-but-valid ELF32 LE i386 relocatable object byte
//! buffers for unit and integration tests.

use crate::elf::header::EM_386;

const ET_REL: u16 = 1;
const ET_EXEC: u16 = 2;
const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_REL: u32 = 9;
const SHT_NOBITS: u32 = 8;

struct SectionSpec {
    name: String,
    sh_type: u32,
    flags: u32,
    data: Vec<u8>,
    nobits_size: u32,
    addralign: u32,
}

struct SymSpec {
    name: String,
    value: u32,
    size: u32,
    info: u8,
    shndx: u16,
}

struct RelSpec {
    target_section: usize,
    offset: u32,
    symbol: usize,
    reloc_type: u32,
}

/// Incrementally builds a relocatable object file byte-for-byte, then
/// serializes it with [`ObjectBuilder::build`].
pub struct ObjectBuilder {
    ty: u16,
    machine: u16,
    sections: Vec<SectionSpec>,
    symbols: Vec<SymSpec>,
    relocations: Vec<RelSpec>,
}

fn st_info(binding: u8, ty: u8) -> u8 {
    (binding << 4) | ty
}

/// `STB_GLOBAL`
pub const STB_GLOBAL: u8 = 1;
/// `STB_LOCAL`
pub const STB_LOCAL: u8 = 0;
/// `STT_OBJECT`
pub const STT_OBJECT: u8 = 1;
/// `STT_FUNC`
pub const STT_FUNC: u8 = 2;
/// `SHN_UNDEF`
pub const SHN_UNDEF: u16 = 0;
/// `SHN_COMMON`
pub const SHN_COMMON: u16 = 0xfff2;

impl ObjectBuilder {
    /// A fresh builder with no sections or symbols, `ET_REL`/`EM_386`
    pub fn new() -> Self {
        Self {
            ty: ET_REL,
            machine: EM_386,
            sections: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    /// Sets `e_type` to `ET_EXEC`, for negative parser tests
    pub fn executable(mut self) -> Self {
        self.ty = ET_EXEC;
        self
    }

    /// Overrides `e_machine`, for negative parser tests
    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Adds an executable, allocatable `PROGBITS` section. Returns the
    /// section's 1-based index (`st_shndx`/`sh_info` value).
    pub fn add_text_section(&mut self, name: &str, code: &[u8]) -> usize {
        self.sections.push(SectionSpec {
            name: name.into(),
            sh_type: SHT_PROGBITS,
            flags: 0x2 | 0x4, // ALLOC | EXECINSTR
            data: code.to_vec(),
            nobits_size: 0,
            addralign: 4,
        });
        self.sections.len()
    }

    /// Adds a writable, allocatable `PROGBITS` section
    pub fn add_data_section(&mut self, name: &str, data: &[u8]) -> usize {
        self.sections.push(SectionSpec {
            name: name.into(),
            sh_type: SHT_PROGBITS,
            flags: 0x1 | 0x2, // WRITE | ALLOC
            data: data.to_vec(),
            nobits_size: 0,
            addralign: 4,
        });
        self.sections.len()
    }

    /// Adds a writable, allocatable `NOBITS` section of `size` zero bytes
    pub fn add_bss_section(&mut self, name: &str, size: u32) -> usize {
        self.sections.push(SectionSpec {
            name: name.into(),
            sh_type: SHT_NOBITS,
            flags: 0x1 | 0x2,
            data: Vec::new(),
            nobits_size: size,
            addralign: 4,
        });
        self.sections.len()
    }

    /// Adds a defined global symbol at `value` within section `shndx`
    pub fn add_global_symbol(&mut self, name: &str, shndx: usize, value: u32, size: u32) -> usize {
        self.symbols.push(SymSpec {
            name: name.into(),
            value,
            size,
            info: st_info(STB_GLOBAL, STT_FUNC),
            shndx: shndx as u16,
        });
        self.symbols.len()
    }

    /// Adds a local (file-scope) symbol
    pub fn add_local_symbol(&mut self, name: &str, shndx: usize, value: u32) -> usize {
        self.symbols.push(SymSpec {
            name: name.into(),
            value,
            size: 0,
            info: st_info(STB_LOCAL, STT_OBJECT),
            shndx: shndx as u16,
        });
        self.symbols.len()
    }

    /// Adds an undefined global reference (`SHN_UNDEF`)
    pub fn add_undefined_symbol(&mut self, name: &str) -> usize {
        self.symbols.push(SymSpec {
            name: name.into(),
            value: 0,
            size: 0,
            info: st_info(STB_GLOBAL, STT_FUNC),
            shndx: SHN_UNDEF,
        });
        self.symbols.len()
    }

    /// Adds a `SHN_COMMON` symbol with the given size and (via `st_value`)
    /// requested alignment
    pub fn add_common_symbol(&mut self, name: &str, size: u32, align: u32) -> usize {
        self.symbols.push(SymSpec {
            name: name.into(),
            value: align,
            size,
            info: st_info(STB_GLOBAL, STT_OBJECT),
            shndx: SHN_COMMON,
        });
        self.symbols.len()
    }

    /// Adds a `SHT_SECTION` symbol pointing at section `shndx`
    pub fn add_section_symbol(&mut self, shndx: usize) -> usize {
        self.symbols.push(SymSpec {
            name: String::new(),
            value: 0,
            size: 0,
            info: st_info(STB_LOCAL, 3), // STT_SECTION
            shndx: shndx as u16,
        });
        self.symbols.len()
    }

    /// Records a relocation against `target_section` (a value previously
    /// returned by `add_text_section`/`add_data_section`) at byte `offset`,
    /// referencing the symbol at `symbol` (a value previously returned by
    /// one of the `add_*_symbol` methods)
    pub fn add_relocation(&mut self, target_section: usize, offset: u32, symbol: usize, reloc_type: u32) {
        self.relocations.push(RelSpec {
            target_section,
            offset,
            symbol,
            reloc_type,
        });
    }

    /// Serializes the accumulated sections, symbols, and relocations into a
    /// complete ELF32 LE relocatable object file
    pub fn build(self) -> Vec<u8> {
        // Section layout: [0]=null, [1..=n]=user sections, then one REL
        // section per distinct relocation target (in first-seen order),
        // then SYMTAB, STRTAB, SHSTRTAB.
        let mut rel_targets: Vec<usize> = Vec::new();
        for r in &self.relocations {
            if !rel_targets.contains(&r.target_section) {
                rel_targets.push(r.target_section);
            }
        }

        let n_user = self.sections.len();
        let symtab_index = n_user + 1 + rel_targets.len();
        let strtab_index = symtab_index + 1;
        let shstrtab_index = strtab_index + 1;
        let total_sections = shstrtab_index + 1;

        // String tables
        let mut strtab: Vec<u8> = vec![0];
        let mut sym_name_off = Vec::with_capacity(self.symbols.len());
        for sym in &self.symbols {
            sym_name_off.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }

        let mut shstrtab: Vec<u8> = vec![0];
        let mut section_name_off = vec![0u32]; // null section
        for sec in &self.sections {
            section_name_off.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(sec.name.as_bytes());
            shstrtab.push(0);
        }
        for &target in &rel_targets {
            let name = format!(".rel{}", self.sections[target - 1].name);
            section_name_off.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
        }
        section_name_off.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(b".symtab");
        shstrtab.push(0);
        section_name_off.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(b".strtab");
        shstrtab.push(0);
        section_name_off.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(b".shstrtab");
        shstrtab.push(0);

        // Symbol table bytes (entry 0 is the reserved null symbol)
        let mut symtab_bytes = vec![0u8; 16];
        for (i, sym) in self.symbols.iter().enumerate() {
            symtab_bytes.extend_from_slice(&sym_name_off[i].to_le_bytes());
            symtab_bytes.extend_from_slice(&sym.value.to_le_bytes());
            symtab_bytes.extend_from_slice(&sym.size.to_le_bytes());
            symtab_bytes.push(sym.info);
            symtab_bytes.push(0); // st_other
            symtab_bytes.extend_from_slice(&sym.shndx.to_le_bytes());
        }

        // Relocation section bytes, one Vec per rel_targets entry
        let rel_bytes: Vec<Vec<u8>> = rel_targets
            .iter()
            .map(|&target| {
                let mut bytes = Vec::new();
                for r in self.relocations.iter().filter(|r| r.target_section == target) {
                    let info = ((r.symbol as u32) << 8) | r.reloc_type;
                    bytes.extend_from_slice(&r.offset.to_le_bytes());
                    bytes.extend_from_slice(&info.to_le_bytes());
                }
                bytes
            })
            .collect();

        // Lay out file offsets: header, then each section's payload in
        // section-table order (skipping NOBITS), then the section header
        // table itself.
        const EHDR_SIZE: usize = 52;
        const SHDR_SIZE: usize = 40;

        let mut offsets = vec![0u32; total_sections];
        let mut pos = EHDR_SIZE;

        for (i, sec) in self.sections.iter().enumerate() {
            let idx = i + 1;
            if sec.sh_type == SHT_NOBITS {
                offsets[idx] = pos as u32;
            } else {
                offsets[idx] = pos as u32;
                pos += sec.data.len();
            }
        }
        for (i, bytes) in rel_bytes.iter().enumerate() {
            offsets[n_user + 1 + i] = pos as u32;
            pos += bytes.len();
        }
        offsets[symtab_index] = pos as u32;
        pos += symtab_bytes.len();
        offsets[strtab_index] = pos as u32;
        pos += strtab.len();
        offsets[shstrtab_index] = pos as u32;
        pos += shstrtab.len();

        let shoff = pos;

        let mut out = Vec::new();
        // --- ELF header ---
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&self.ty.to_le_bytes());
        out.extend_from_slice(&self.machine.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // e_version
        out.extend_from_slice(&0u32.to_le_bytes()); // e_entry
        out.extend_from_slice(&0u32.to_le_bytes()); // e_phoff
        out.extend_from_slice(&(shoff as u32).to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes()); // e_shentsize
        out.extend_from_slice(&(total_sections as u16).to_le_bytes()); // e_shnum
        out.extend_from_slice(&(shstrtab_index as u16).to_le_bytes()); // e_shstrndx
        assert_eq!(out.len(), EHDR_SIZE);

        // --- section payloads ---
        for sec in &self.sections {
            if sec.sh_type != SHT_NOBITS {
                out.extend_from_slice(&sec.data);
            }
        }
        for bytes in &rel_bytes {
            out.extend_from_slice(bytes);
        }
        out.extend_from_slice(&symtab_bytes);
        out.extend_from_slice(&strtab);
        out.extend_from_slice(&shstrtab);
        assert_eq!(out.len(), shoff);

        // --- section header table ---
        let write_shdr = |out: &mut Vec<u8>,
                           name: u32,
                           ty: u32,
                           flags: u32,
                           addr: u32,
                           offset: u32,
                           size: u32,
                           link: u32,
                           info: u32,
                           addralign: u32,
                           entsize: u32| {
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&flags.to_le_bytes());
            out.extend_from_slice(&addr.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&link.to_le_bytes());
            out.extend_from_slice(&info.to_le_bytes());
            out.extend_from_slice(&addralign.to_le_bytes());
            out.extend_from_slice(&entsize.to_le_bytes());
        };

        write_shdr(&mut out, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0); // null section

        for (i, sec) in self.sections.iter().enumerate() {
            let idx = i + 1;
            let size = if sec.sh_type == SHT_NOBITS {
                sec.nobits_size
            } else {
                sec.data.len() as u32
            };
            write_shdr(
                &mut out,
                section_name_off[idx],
                sec.sh_type,
                sec.flags,
                0,
                offsets[idx],
                size,
                0,
                0,
                sec.addralign,
                0,
            );
        }

        for (i, &target) in rel_targets.iter().enumerate() {
            let idx = n_user + 1 + i;
            write_shdr(
                &mut out,
                section_name_off[idx],
                SHT_REL,
                0,
                0,
                offsets[idx],
                rel_bytes[i].len() as u32,
                symtab_index as u32,
                target as u32,
                4,
                8,
            );
        }

        write_shdr(
            &mut out,
            section_name_off[symtab_index],
            SHT_SYMTAB,
            0,
            0,
            offsets[symtab_index],
            symtab_bytes.len() as u32,
            strtab_index as u32,
            1,
            4,
            16,
        );
        write_shdr(
            &mut out,
            section_name_off[strtab_index],
            SHT_STRTAB,
            0,
            0,
            offsets[strtab_index],
            strtab.len() as u32,
            0,
            0,
            1,
            0,
        );
        write_shdr(
            &mut out,
            section_name_off[shstrtab_index],
            SHT_STRTAB,
            0,
            0,
            offsets[shstrtab_index],
            shstrtab.len() as u32,
            0,
            0,
            1,
            0,
        );

        out
    }
}

impl Default for ObjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}
