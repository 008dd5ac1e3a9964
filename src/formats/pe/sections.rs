//! Section management for PE files

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// Section table in declaration order, with the file alignment used to size
/// each section's mapped extent.
#[derive(Debug, Clone)]
pub struct SectionTable {
    sections: Vec<SectionHeader>,
    file_alignment: u32,
}

impl SectionTable {
    pub fn new(sections: Vec<SectionHeader>, file_alignment: u32) -> Self {
        Self {
            sections,
            file_alignment,
        }
    }

    /// Get all sections
    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn file_alignment(&self) -> u32 {
        self.file_alignment
    }

    /// First section, in table order, whose aligned extent contains `rva`.
    ///
    /// Overlapping sections are not re-validated; the earlier entry wins.
    pub fn section_for_rva(&self, rva: u64) -> Option<&SectionHeader> {
        self.sections
            .iter()
            .find(|s| s.contains_rva(rva, self.file_alignment))
    }

    /// Convert RVA to file offset. Not checked against any buffer length.
    pub fn rva_to_offset(&self, rva: u64) -> Option<usize> {
        let section = self.section_for_rva(rva)?;
        let delta = rva - section.virtual_address as u64;
        usize::try_from(section.pointer_to_raw_data as u64 + delta).ok()
    }

    /// Sections flagged as containing code
    pub fn code_sections(&self) -> impl Iterator<Item = &SectionHeader> {
        self.sections.iter().filter(|s| s.contains_code())
    }
}

/// Parse section headers from data
pub fn parse_section_headers(data: &[u8], offset: usize, count: u16) -> Result<Vec<SectionHeader>> {
    let mut sections = Vec::with_capacity(count as usize);

    for i in 0..count as usize {
        let section_offset = offset + i * SECTION_HEADER_SIZE;
        let raw = data
            .read_slice_at(section_offset, SECTION_HEADER_SIZE)
            .ok_or(PeError::TruncatedHeader {
                expected: section_offset + SECTION_HEADER_SIZE,
                actual: data.len(),
            })?;

        let mut name = [0u8; 8];
        name.copy_from_slice(&raw[..8]);
        let u32_at = |o: usize| raw.read_u32_le_at(o).unwrap_or_default();

        sections.push(SectionHeader {
            name,
            virtual_size: u32_at(8),
            virtual_address: u32_at(12),
            size_of_raw_data: u32_at(16),
            pointer_to_raw_data: u32_at(20),
            characteristics: u32_at(36),
        });
    }

    Ok(sections)
}
