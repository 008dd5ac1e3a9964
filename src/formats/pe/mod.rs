//! PE image accessor: validated header chain and RVA translation over a borrowed buffer

pub mod directories;
pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use headers::*;
use sections::*;
pub use headers::validate;
pub use types::*;
use utils::*;

/// A validated PE image. Borrows the caller's buffer and never mutates it.
#[derive(Debug, Clone)]
pub struct PeImage<'data> {
    data: &'data [u8],
    dos_header: DosHeader,
    nt_headers: NtHeaders,
    data_directories: Vec<DataDirectory>,
    section_table: SectionTable,
}

impl<'data> PeImage<'data> {
    /// Validate the signatures and materialize the header chain
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let dos_header = parse_dos_header(data)?;
        let (nt_headers, data_directories) = parse_nt_headers(data, dos_header.e_lfanew as usize)?;

        // Section table sits right after the optional header.
        let section_offset = (dos_header.e_lfanew as usize)
            .checked_add(4 + COFF_HEADER_SIZE + nt_headers.file_header.size_of_optional_header as usize)
            .ok_or(PeError::OutOfBounds {
                offset: dos_header.e_lfanew as usize,
                len: data.len(),
            })?;
        let section_headers = parse_section_headers(
            data,
            section_offset,
            nt_headers.file_header.number_of_sections,
        )?;
        let section_table =
            SectionTable::new(section_headers, nt_headers.optional_header.file_alignment());

        tracing::debug!(
            kind = ?nt_headers.optional_header.kind(),
            machine = ?nt_headers.file_header.machine,
            sections = section_table.sections().len(),
            "parsed PE headers"
        );

        Ok(Self {
            data,
            dos_header,
            nt_headers,
            data_directories,
            section_table,
        })
    }

    /// The underlying buffer
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    pub fn nt_headers(&self) -> &NtHeaders {
        &self.nt_headers
    }

    pub fn optional_header(&self) -> &OptionalHeader {
        &self.nt_headers.optional_header
    }

    /// PE32 or PE32+
    pub fn kind(&self) -> ImageKind {
        self.nt_headers.optional_header.kind()
    }

    pub fn is_64bit(&self) -> bool {
        self.kind().is_64bit()
    }

    pub fn machine(&self) -> Machine {
        self.nt_headers.file_header.machine
    }

    pub fn image_base(&self) -> u64 {
        self.nt_headers.optional_header.image_base()
    }

    /// Entry point RVA
    pub fn entry_point(&self) -> u32 {
        self.nt_headers.optional_header.entry_point()
    }

    pub fn file_alignment(&self) -> u32 {
        self.nt_headers.optional_header.file_alignment()
    }

    /// Sections in declaration order
    pub fn sections(&self) -> &[SectionHeader] {
        self.section_table.sections()
    }

    /// Sections flagged IMAGE_SCN_CNT_CODE, in table order
    pub fn code_sections(&self) -> impl Iterator<Item = &SectionHeader> {
        self.section_table.code_sections()
    }

    /// First section whose aligned extent covers `rva`; `None` means unmapped.
    pub fn section_for_rva(&self, rva: u64) -> Option<&SectionHeader> {
        self.section_table.section_for_rva(rva)
    }

    /// Translate an RVA to a buffer offset.
    ///
    /// Returns `None` when no section covers the RVA or the translated offset
    /// lies past the end of the buffer.
    pub fn rva_to_offset(&self, rva: u64) -> Option<usize> {
        self.section_table
            .rva_to_offset(rva)
            .filter(|&offset| offset < self.data.len())
    }

    /// Like `rva_to_offset`, but reports the failure
    pub fn resolve_rva(&self, rva: u64) -> Result<usize> {
        let offset = self
            .section_table
            .rva_to_offset(rva)
            .ok_or(PeError::UnresolvedRva { rva })?;
        check_bounds(offset, 1, self.data.len())?;
        Ok(offset)
    }

    /// Data directory by index; absent entries (past NumberOfRvaAndSizes) read as zero.
    pub fn data_directory(&self, index: usize) -> DataDirectory {
        self.data_directories
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    /// Read a NUL-terminated string at an RVA, cut at `max_len` bytes
    pub fn read_cstring_at_rva(&self, rva: u64, max_len: usize) -> Result<String> {
        let offset = self.resolve_rva(rva)?;
        read_cstring(self.data, offset, max_len)
    }
}
