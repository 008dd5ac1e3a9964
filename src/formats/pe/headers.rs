//! PE header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// Fixed part of the PE32 optional header, before the data directories.
const PE32_FIXED_SIZE: usize = 96;
/// Fixed part of the PE32+ optional header, before the data directories.
const PE32PLUS_FIXED_SIZE: usize = 112;

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> Result<DosHeader> {
    let e_magic = data
        .read_u16_le_at(0)
        .ok_or(PeError::InvalidDosSignature)?;
    if e_magic != DOS_SIGNATURE {
        return Err(PeError::InvalidDosSignature);
    }

    let e_lfanew = data
        .read_u32_le_at(0x3C)
        .ok_or(PeError::TruncatedHeader {
            expected: DOS_HEADER_SIZE,
            actual: data.len(),
        })?;

    Ok(DosHeader { e_magic, e_lfanew })
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    let raw = data
        .read_slice_at(offset, COFF_HEADER_SIZE)
        .ok_or(PeError::TruncatedHeader {
            expected: offset.saturating_add(COFF_HEADER_SIZE),
            actual: data.len(),
        })?;

    // The slice is exactly COFF_HEADER_SIZE bytes, so the fixed reads below cannot miss.
    let u16_at = |o: usize| u16::from_le_bytes([raw[o], raw[o + 1]]);
    let u32_at = |o: usize| u32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);

    Ok(CoffHeader {
        machine: Machine::try_from(u16_at(0))?,
        number_of_sections: u16_at(2),
        size_of_optional_header: u16_at(16),
    })
}

/// Parse optional header from data at offset
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    let magic = data
        .read_u16_le_at(offset)
        .ok_or(PeError::TruncatedHeader {
            expected: offset.saturating_add(2),
            actual: data.len(),
        })?;
    let kind = ImageKind::from_magic(magic)?;

    let fixed = match kind {
        ImageKind::Pe32 => PE32_FIXED_SIZE,
        ImageKind::Pe32Plus => PE32PLUS_FIXED_SIZE,
    };
    if (size as usize) < fixed {
        return Err(PeError::TruncatedHeader {
            expected: fixed,
            actual: size as usize,
        });
    }
    let raw = data
        .read_slice_at(offset, fixed)
        .ok_or(PeError::TruncatedHeader {
            expected: offset.saturating_add(fixed),
            actual: data.len(),
        })?;

    let u32_at = |o: usize| raw.read_u32_le_at(o).unwrap_or_default();

    let number_of_rva_and_sizes = match kind {
        ImageKind::Pe32 => u32_at(92),
        ImageKind::Pe32Plus => u32_at(108),
    };

    let common = OptionalHeaderCommon {
        address_of_entry_point: u32_at(16),
        file_alignment: u32_at(36),
        number_of_rva_and_sizes,
    };

    Ok(match kind {
        ImageKind::Pe32 => OptionalHeader::Pe32 {
            common,
            image_base: u32_at(28),
        },
        ImageKind::Pe32Plus => OptionalHeader::Pe32Plus {
            common,
            image_base: raw.read_u64_le_at(24).unwrap_or_default(),
        },
    })
}

/// Parse data directories that follow the fixed optional header.
///
/// The count is bounded by `NumberOfRvaAndSizes`, by the declared optional
/// header size and by 16; missing entries are returned as empty directories.
pub fn parse_data_directories(
    data: &[u8],
    optional_offset: usize,
    optional_header: &OptionalHeader,
    size_of_optional_header: u16,
) -> Vec<DataDirectory> {
    let fixed = match optional_header.kind() {
        ImageKind::Pe32 => PE32_FIXED_SIZE,
        ImageKind::Pe32Plus => PE32PLUS_FIXED_SIZE,
    };
    let room = (size_of_optional_header as usize).saturating_sub(fixed) / DATA_DIRECTORY_SIZE;
    let count = (optional_header.common().number_of_rva_and_sizes as usize)
        .min(MAX_DATA_DIRECTORIES)
        .min(room);

    let base = optional_offset + fixed;
    let mut directories = Vec::with_capacity(MAX_DATA_DIRECTORIES);
    for i in 0..count {
        let dir_offset = base + i * DATA_DIRECTORY_SIZE;
        match (
            data.read_u32_le_at(dir_offset),
            data.read_u32_le_at(dir_offset + 4),
        ) {
            (Some(virtual_address), Some(size)) => directories.push(DataDirectory {
                virtual_address,
                size,
            }),
            _ => break,
        }
    }

    directories.resize(MAX_DATA_DIRECTORIES, DataDirectory::default());
    directories
}

/// Parse NT headers (PE signature + COFF + Optional)
pub fn parse_nt_headers(data: &[u8], offset: usize) -> Result<(NtHeaders, Vec<DataDirectory>)> {
    let signature = data
        .read_u32_le_at(offset)
        .ok_or(PeError::InvalidNtSignature)?;
    if signature != NT_SIGNATURE {
        return Err(PeError::InvalidNtSignature);
    }

    let file_header = parse_coff_header(data, offset + 4)?;

    let opt_offset = offset + 4 + COFF_HEADER_SIZE;
    let optional_header =
        parse_optional_header(data, opt_offset, file_header.size_of_optional_header)?;
    let directories = parse_data_directories(
        data,
        opt_offset,
        &optional_header,
        file_header.size_of_optional_header,
    );

    Ok((
        NtHeaders {
            file_header,
            optional_header,
        },
        directories,
    ))
}

/// Check the signature chain and return the field layout of the image.
///
/// Order of checks: DOS signature, NT signature, machine, optional-header magic.
pub fn validate(data: &[u8]) -> Result<ImageKind> {
    let dos = parse_dos_header(data)?;
    let (nt, _) = parse_nt_headers(data, dos.e_lfanew as usize)?;
    Ok(nt.optional_header.kind())
}
