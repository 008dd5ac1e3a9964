//! Export directory records

use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

pub const EXPORT_DIRECTORY_SIZE: usize = 40;

/// The fixed export directory table (IMAGE_EXPORT_DIRECTORY)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportDirectory {
    pub name_rva: u32,
    pub ordinal_base: u32,
    pub number_of_functions: u32,
    pub number_of_names: u32,
    pub address_of_functions: u32,
    pub address_of_names: u32,
    pub address_of_name_ordinals: u32,
}

/// Read the export directory table at a file offset
pub fn read_export_directory(data: &[u8], offset: usize) -> Result<ExportDirectory> {
    let raw = data
        .read_slice_at(offset, EXPORT_DIRECTORY_SIZE)
        .ok_or(PeError::OutOfBounds {
            offset,
            len: data.len(),
        })?;
    let u32_at = |o: usize| raw.read_u32_le_at(o).unwrap_or_default();

    Ok(ExportDirectory {
        name_rva: u32_at(12),
        ordinal_base: u32_at(16),
        number_of_functions: u32_at(20),
        number_of_names: u32_at(24),
        address_of_functions: u32_at(28),
        address_of_names: u32_at(32),
        address_of_name_ordinals: u32_at(36),
    })
}

/// Read the `index`-th u32 of a table that starts at `table_offset`
pub fn read_table_u32(data: &[u8], table_offset: usize, index: usize) -> Result<u32> {
    let offset = index
        .checked_mul(4)
        .and_then(|o| o.checked_add(table_offset))
        .ok_or(PeError::OutOfBounds {
            offset: table_offset,
            len: data.len(),
        })?;
    data.read_u32_le_at(offset).ok_or(PeError::OutOfBounds {
        offset,
        len: data.len(),
    })
}

/// Read the `index`-th u16 of a table that starts at `table_offset`
pub fn read_table_u16(data: &[u8], table_offset: usize, index: usize) -> Result<u16> {
    let offset = index
        .checked_mul(2)
        .and_then(|o| o.checked_add(table_offset))
        .ok_or(PeError::OutOfBounds {
            offset: table_offset,
            len: data.len(),
        })?;
    data.read_u16_le_at(offset).ok_or(PeError::OutOfBounds {
        offset,
        len: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_export_directory() {
        let mut data = vec![0u8; 48];
        let fields: [u32; 7] = [0x3100, 1, 3, 2, 0x3200, 0x3300, 0x3400];
        for (i, v) in fields.iter().enumerate() {
            let o = 12 + i * 4;
            data[o..o + 4].copy_from_slice(&v.to_le_bytes());
        }

        let dir = read_export_directory(&data, 0).unwrap();
        assert_eq!(dir.name_rva, 0x3100);
        assert_eq!(dir.ordinal_base, 1);
        assert_eq!(dir.number_of_functions, 3);
        assert_eq!(dir.number_of_names, 2);
        assert_eq!(dir.address_of_functions, 0x3200);
        assert_eq!(dir.address_of_names, 0x3300);
        assert_eq!(dir.address_of_name_ordinals, 0x3400);

        assert!(matches!(
            read_export_directory(&data, 10),
            Err(PeError::OutOfBounds { offset: 10, len: 48 })
        ));
    }

    #[test]
    fn test_read_tables() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
        assert_eq!(read_table_u32(&data, 0, 0).unwrap(), 0x0002_0001);
        assert_eq!(read_table_u32(&data, 0, 1).unwrap(), 3);
        assert!(read_table_u32(&data, 0, 2).is_err());
        assert!(read_table_u32(&data, 0, usize::MAX).is_err());

        assert_eq!(read_table_u16(&data, 2, 0).unwrap(), 2);
        assert!(read_table_u16(&data, 6, 1).is_err());
    }
}
