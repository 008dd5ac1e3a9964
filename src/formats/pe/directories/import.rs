//! Import descriptor and thunk records

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

pub const IMPORT_DESCRIPTOR_SIZE: usize = 20;

/// One IMAGE_IMPORT_DESCRIPTOR
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// Lookup table RVA (the `Characteristics` union member when zero ends the list).
    pub original_first_thunk: u32,
    pub name_rva: u32,
    pub first_thunk: u32,
}

impl ImportDescriptor {
    /// The descriptor list ends at the first entry without a lookup table.
    pub fn is_terminator(&self) -> bool {
        self.original_first_thunk == 0
    }
}

/// A decoded import lookup table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Thunk {
    /// Zero entry terminating the array
    End,
    Ordinal(u16),
    /// RVA of the hint/name record
    ByName(u32),
}

impl Thunk {
    pub fn decode(value: u64, kind: ImageKind) -> Self {
        if value == 0 {
            Thunk::End
        } else if value & kind.ordinal_flag() != 0 {
            Thunk::Ordinal((value & 0xFFFF) as u16)
        } else {
            Thunk::ByName((value & 0x7FFF_FFFF) as u32)
        }
    }
}

/// Read one import descriptor at a file offset
pub fn read_import_descriptor(data: &[u8], offset: usize) -> Result<ImportDescriptor> {
    let raw = data
        .read_slice_at(offset, IMPORT_DESCRIPTOR_SIZE)
        .ok_or(PeError::OutOfBounds {
            offset,
            len: data.len(),
        })?;
    let u32_at = |o: usize| raw.read_u32_le_at(o).unwrap_or_default();

    Ok(ImportDescriptor {
        original_first_thunk: u32_at(0),
        name_rva: u32_at(12),
        first_thunk: u32_at(16),
    })
}

/// Read and decode one thunk slot at a file offset
pub fn read_thunk(data: &[u8], offset: usize, kind: ImageKind) -> Result<Thunk> {
    let value = match kind {
        ImageKind::Pe32 => data.read_u32_le_at(offset).map(u64::from),
        ImageKind::Pe32Plus => data.read_u64_le_at(offset),
    }
    .ok_or(PeError::OutOfBounds {
        offset,
        len: data.len(),
    })?;
    Ok(Thunk::decode(value, kind))
}
