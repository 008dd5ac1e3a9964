//! Common test utilities: an in-memory builder for small PE32/PE32+ images.
//!
//! Layout of every built image:
//! - headers in the first 0x400 bytes (`e_lfanew` = 0x80),
//! - `.text` at RVA 0x1000, file offset 0x400,
//! - `.rdata` at RVA 0x2000 holding, in order, the import address tables,
//!   the import descriptors, the lookup tables, hint/name records, module
//!   names, then the export directory and its tables.
//!
//! The first import address table therefore always starts at RVA 0x2000.

#![allow(dead_code)]

pub const IMAGE_BASE_32: u64 = 0x40_0000;
pub const IMAGE_BASE_64: u64 = 0x1_4000_0000;
pub const TEXT_RVA: u32 = 0x1000;
pub const RDATA_RVA: u32 = 0x2000;

pub const E_LFANEW: usize = 0x80;
pub const OPTIONAL_HEADER_OFFSET: usize = E_LFANEW + 24;
const HEADERS_SIZE: usize = 0x400;
const FILE_ALIGNMENT: usize = 0x200;

const SCN_TEXT: u32 = 0x6000_0020;
const SCN_RDATA: u32 = 0x4000_0040;

#[derive(Debug, Clone)]
pub enum ImportEntry {
    Name(String),
    Ordinal(u16),
}

#[derive(Debug, Clone)]
struct ImportSpec {
    dll: String,
    entries: Vec<ImportEntry>,
}

/// Raw export directory contents. `names` pairs a name with an index into
/// `functions` (the name-ordinal table entry).
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub dll: String,
    pub base: u32,
    pub functions: Vec<u32>,
    pub names: Vec<(String, u16)>,
}

#[derive(Debug, Clone)]
pub struct PeBuilder {
    pe32plus: bool,
    machine: u16,
    entry_point: u32,
    code: Vec<u8>,
    export: Option<ExportSpec>,
    imports: Vec<ImportSpec>,
}

/// A built image plus the addresses tests need to poke at it.
#[derive(Debug, Clone)]
pub struct BuiltPe {
    pub bytes: Vec<u8>,
    pub image_base: u64,
    pub pe32plus: bool,
    /// FirstThunk RVA of each import, in declaration order
    pub iat_rvas: Vec<u32>,
    pub import_dir_rva: u32,
    pub export_dir_rva: u32,
    rdata_file_offset: usize,
}

impl PeBuilder {
    pub fn pe32() -> Self {
        Self {
            pe32plus: false,
            machine: 0x014C,
            entry_point: TEXT_RVA,
            code: vec![0xC3],
            export: None,
            imports: Vec::new(),
        }
    }

    pub fn pe32plus() -> Self {
        Self {
            pe32plus: true,
            machine: 0x8664,
            ..Self::pe32()
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn entry_point(mut self, rva: u32) -> Self {
        self.entry_point = rva;
        self
    }

    pub fn code(mut self, code: &[u8]) -> Self {
        self.code = code.to_vec();
        self
    }

    /// Named exports with an identity name-ordinal table, ordinal base 1.
    pub fn export(self, dll: &str, functions: &[(&str, u32)]) -> Self {
        let spec = ExportSpec {
            dll: dll.to_string(),
            base: 1,
            functions: functions.iter().map(|&(_, rva)| rva).collect(),
            names: functions
                .iter()
                .enumerate()
                .map(|(i, &(name, _))| (name.to_string(), i as u16))
                .collect(),
        };
        self.export_spec(spec)
    }

    pub fn export_spec(mut self, spec: ExportSpec) -> Self {
        self.export = Some(spec);
        self
    }

    /// By-name imports from one module.
    pub fn import(self, dll: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|n| ImportEntry::Name(n.to_string()))
            .collect();
        self.import_entries(dll, entries)
    }

    pub fn import_entries(mut self, dll: &str, entries: Vec<ImportEntry>) -> Self {
        self.imports.push(ImportSpec {
            dll: dll.to_string(),
            entries,
        });
        self
    }

    fn thunk_size(&self) -> usize {
        if self.pe32plus {
            8
        } else {
            4
        }
    }

    pub fn build(&self) -> BuiltPe {
        let thunk = self.thunk_size();
        let mut rdata: Vec<u8> = Vec::new();

        // Import address tables first, so the first one sits at RDATA_RVA.
        let mut iat_offsets = Vec::new();
        for imp in &self.imports {
            iat_offsets.push(rdata.len());
            rdata.resize(rdata.len() + (imp.entries.len() + 1) * thunk, 0);
        }

        let mut import_dir_rva = 0;
        let mut import_dir_size = 0;
        let descriptors_offset = rdata.len();
        if !self.imports.is_empty() {
            import_dir_rva = RDATA_RVA + descriptors_offset as u32;
            import_dir_size = ((self.imports.len() + 1) * 20) as u32;
            rdata.resize(rdata.len() + import_dir_size as usize, 0);
        }

        let mut lookup_offsets = Vec::new();
        for imp in &self.imports {
            lookup_offsets.push(rdata.len());
            rdata.resize(rdata.len() + (imp.entries.len() + 1) * thunk, 0);
        }

        for (i, imp) in self.imports.iter().enumerate() {
            for (j, entry) in imp.entries.iter().enumerate() {
                let value: u64 = match entry {
                    ImportEntry::Ordinal(ordinal) => {
                        let flag = if self.pe32plus { 1u64 << 63 } else { 1u64 << 31 };
                        flag | *ordinal as u64
                    }
                    ImportEntry::Name(name) => {
                        let rva = RDATA_RVA + rdata.len() as u32;
                        rdata.extend_from_slice(&[0, 0]);
                        rdata.extend_from_slice(name.as_bytes());
                        rdata.push(0);
                        if rdata.len() % 2 == 1 {
                            rdata.push(0);
                        }
                        rva as u64
                    }
                };
                put_thunk(&mut rdata, lookup_offsets[i] + j * thunk, value, thunk);
                put_thunk(&mut rdata, iat_offsets[i] + j * thunk, value, thunk);
            }

            let name_rva = push_cstr(&mut rdata, &imp.dll);
            let d = descriptors_offset + i * 20;
            put_u32(&mut rdata, d, RDATA_RVA + lookup_offsets[i] as u32);
            put_u32(&mut rdata, d + 12, name_rva);
            put_u32(&mut rdata, d + 16, RDATA_RVA + iat_offsets[i] as u32);
        }

        let mut export_dir_rva = 0;
        let mut export_dir_size = 0;
        if let Some(exp) = &self.export {
            while rdata.len() % 4 != 0 {
                rdata.push(0);
            }
            let dir = rdata.len();
            rdata.resize(dir + 40, 0);

            let functions = rdata.len();
            rdata.resize(functions + exp.functions.len() * 4, 0);
            for (k, rva) in exp.functions.iter().enumerate() {
                put_u32(&mut rdata, functions + k * 4, *rva);
            }

            let names = rdata.len();
            rdata.resize(names + exp.names.len() * 4, 0);
            let ordinals = rdata.len();
            rdata.resize(ordinals + exp.names.len() * 2, 0);
            for (k, (name, ordinal)) in exp.names.iter().enumerate() {
                let rva = push_cstr(&mut rdata, name);
                put_u32(&mut rdata, names + k * 4, rva);
                put_u16(&mut rdata, ordinals + k * 2, *ordinal);
            }
            let dll_rva = push_cstr(&mut rdata, &exp.dll);

            put_u32(&mut rdata, dir + 12, dll_rva);
            put_u32(&mut rdata, dir + 16, exp.base);
            put_u32(&mut rdata, dir + 20, exp.functions.len() as u32);
            put_u32(&mut rdata, dir + 24, exp.names.len() as u32);
            put_u32(&mut rdata, dir + 28, RDATA_RVA + functions as u32);
            put_u32(&mut rdata, dir + 32, RDATA_RVA + names as u32);
            put_u32(&mut rdata, dir + 36, RDATA_RVA + ordinals as u32);

            export_dir_rva = RDATA_RVA + dir as u32;
            export_dir_size = (rdata.len() - dir) as u32;
        }

        let text_raw = align(self.code.len().max(1), FILE_ALIGNMENT);
        let rdata_raw = align(rdata.len().max(1), FILE_ALIGNMENT);
        let rdata_file_offset = HEADERS_SIZE + text_raw;
        let mut bytes = vec![0u8; rdata_file_offset + rdata_raw];

        // DOS header
        bytes[0..2].copy_from_slice(b"MZ");
        put_u32(&mut bytes, 0x3C, E_LFANEW as u32);

        // NT signature + COFF header
        bytes[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");
        let coff = E_LFANEW + 4;
        let optional_size: u16 = if self.pe32plus { 0xF0 } else { 0xE0 };
        put_u16(&mut bytes, coff, self.machine);
        put_u16(&mut bytes, coff + 2, 2);
        put_u16(&mut bytes, coff + 16, optional_size);
        put_u16(&mut bytes, coff + 18, if self.pe32plus { 0x0022 } else { 0x0102 });

        // Optional header
        let opt = OPTIONAL_HEADER_OFFSET;
        let image_base = if self.pe32plus {
            IMAGE_BASE_64
        } else {
            IMAGE_BASE_32
        };
        put_u16(&mut bytes, opt, if self.pe32plus { 0x20B } else { 0x10B });
        put_u32(&mut bytes, opt + 16, self.entry_point);
        put_u32(&mut bytes, opt + 20, TEXT_RVA);
        if self.pe32plus {
            bytes[opt + 24..opt + 32].copy_from_slice(&image_base.to_le_bytes());
        } else {
            put_u32(&mut bytes, opt + 28, image_base as u32);
        }
        put_u32(&mut bytes, opt + 32, 0x1000);
        put_u32(&mut bytes, opt + 36, FILE_ALIGNMENT as u32);
        put_u32(&mut bytes, opt + 56, RDATA_RVA + align(rdata.len().max(1), 0x1000) as u32);
        put_u32(&mut bytes, opt + 60, HEADERS_SIZE as u32);
        put_u16(&mut bytes, opt + 68, 3);
        let (rva_count, dirs) = if self.pe32plus {
            (opt + 108, opt + 112)
        } else {
            (opt + 92, opt + 96)
        };
        put_u32(&mut bytes, rva_count, 16);
        put_u32(&mut bytes, dirs, export_dir_rva);
        put_u32(&mut bytes, dirs + 4, export_dir_size);
        put_u32(&mut bytes, dirs + 8, import_dir_rva);
        put_u32(&mut bytes, dirs + 12, import_dir_size);

        // Section table
        let sections = opt + optional_size as usize;
        write_section(
            &mut bytes,
            sections,
            b".text",
            self.code.len() as u32,
            TEXT_RVA,
            text_raw as u32,
            HEADERS_SIZE as u32,
            SCN_TEXT,
        );
        write_section(
            &mut bytes,
            sections + 40,
            b".rdata",
            rdata.len() as u32,
            RDATA_RVA,
            rdata_raw as u32,
            rdata_file_offset as u32,
            SCN_RDATA,
        );

        bytes[HEADERS_SIZE..HEADERS_SIZE + self.code.len()].copy_from_slice(&self.code);
        bytes[rdata_file_offset..rdata_file_offset + rdata.len()].copy_from_slice(&rdata);

        BuiltPe {
            bytes,
            image_base,
            pe32plus: self.pe32plus,
            iat_rvas: iat_offsets.iter().map(|&o| RDATA_RVA + o as u32).collect(),
            import_dir_rva,
            export_dir_rva,
            rdata_file_offset,
        }
    }
}

impl BuiltPe {
    /// File offset of an RVA inside `.text` or `.rdata`.
    pub fn file_offset(&self, rva: u32) -> usize {
        if rva >= RDATA_RVA {
            self.rdata_file_offset + (rva - RDATA_RVA) as usize
        } else {
            HEADERS_SIZE + (rva - TEXT_RVA) as usize
        }
    }

    pub fn data_directory_offset(&self, index: usize) -> usize {
        let fixed = if self.pe32plus { 112 } else { 96 };
        OPTIONAL_HEADER_OFFSET + fixed + index * 8
    }

    pub fn set_data_directory(&mut self, index: usize, rva: u32, size: u32) {
        let offset = self.data_directory_offset(index);
        put_u32(&mut self.bytes, offset, rva);
        put_u32(&mut self.bytes, offset + 4, size);
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) {
        put_u32(&mut self.bytes, offset, value);
    }

    pub fn put_u16(&mut self, offset: usize, value: u16) {
        put_u16(&mut self.bytes, offset, value);
    }

    /// File offset of the `index`-th import descriptor.
    pub fn import_descriptor_offset(&self, index: usize) -> usize {
        self.file_offset(self.import_dir_rva) + index * 20
    }
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_thunk(buf: &mut [u8], offset: usize, value: u64, size: usize) {
    if size == 8 {
        buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    } else {
        put_u32(buf, offset, value as u32);
    }
}

fn push_cstr(buf: &mut Vec<u8>, s: &str) -> u32 {
    let rva = RDATA_RVA + buf.len() as u32;
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    rva
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[allow(clippy::too_many_arguments)]
fn write_section(
    buf: &mut [u8],
    offset: usize,
    name: &[u8],
    virtual_size: u32,
    virtual_address: u32,
    raw_size: u32,
    raw_pointer: u32,
    characteristics: u32,
) {
    buf[offset..offset + name.len()].copy_from_slice(name);
    put_u32(buf, offset + 8, virtual_size);
    put_u32(buf, offset + 12, virtual_address);
    put_u32(buf, offset + 16, raw_size);
    put_u32(buf, offset + 20, raw_pointer);
    put_u32(buf, offset + 36, characteristics);
}
