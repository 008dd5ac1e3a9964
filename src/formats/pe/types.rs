//! Core PE data types and structures

use std::ops::Range;

use thiserror::Error;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const NT_SIGNATURE: u32 = 0x0000_4550; // PE\0\0
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

pub const DOS_HEADER_SIZE: usize = 64;
pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const DATA_DIRECTORY_SIZE: usize = 8;
pub const MAX_DATA_DIRECTORIES: usize = 16;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;
pub const IMAGE_DIRECTORY_ENTRY_IMPORT: usize = 1;

// Machine types
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014C;
pub const IMAGE_FILE_MACHINE_IA64: u16 = 0x0200;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;

// Section characteristics
pub const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;

pub const IMAGE_ORDINAL_FLAG32: u64 = 0x8000_0000;
pub const IMAGE_ORDINAL_FLAG64: u64 = 0x8000_0000_0000_0000;

/// PE parsing error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeError {
    #[error("Invalid file signature (DOS header)")]
    InvalidDosSignature,
    #[error("Invalid file signature (NT headers)")]
    InvalidNtSignature,
    #[error("Unsupported architecture: {field} 0x{value:04x}")]
    UnsupportedArchitecture { field: &'static str, value: u16 },
    #[error("Truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },
    #[error("RVA 0x{rva:08x} is not mapped by any section")]
    UnresolvedRva { rva: u64 },
    #[error("Offset 0x{offset:x} is outside the {len}-byte image")]
    OutOfBounds { offset: usize, len: usize },
    #[error("Address 0x{address:08x} already holds a symbol")]
    SymbolCollision { address: u64 },
}

impl PeError {
    /// True for errors raised while walking directories rather than validating headers.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedRva { .. } | Self::OutOfBounds { .. } | Self::SymbolCollision { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PeError>;

/// Machine types accepted by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    I386,
    Amd64,
    /// Accepted by the validator, never decoded.
    Ia64,
}

impl TryFrom<u16> for Machine {
    type Error = PeError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            IMAGE_FILE_MACHINE_I386 => Ok(Self::I386),
            IMAGE_FILE_MACHINE_AMD64 => Ok(Self::Amd64),
            IMAGE_FILE_MACHINE_IA64 => Ok(Self::Ia64),
            other => Err(PeError::UnsupportedArchitecture {
                field: "machine",
                value: other,
            }),
        }
    }
}

/// Field layout selected by the optional-header magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Pe32,
    Pe32Plus,
}

impl ImageKind {
    pub fn from_magic(magic: u16) -> Result<Self> {
        match magic {
            PE32_MAGIC => Ok(Self::Pe32),
            PE32PLUS_MAGIC => Ok(Self::Pe32Plus),
            other => Err(PeError::UnsupportedArchitecture {
                field: "optional header magic",
                value: other,
            }),
        }
    }

    pub fn is_64bit(&self) -> bool {
        matches!(self, Self::Pe32Plus)
    }

    /// Width of one import thunk slot in bytes.
    pub fn thunk_size(&self) -> usize {
        match self {
            Self::Pe32 => 4,
            Self::Pe32Plus => 8,
        }
    }

    pub fn ordinal_flag(&self) -> u64 {
        match self {
            Self::Pe32 => IMAGE_ORDINAL_FLAG32,
            Self::Pe32Plus => IMAGE_ORDINAL_FLAG64,
        }
    }

    /// Hex digits used to print a runtime address.
    pub fn address_width(&self) -> usize {
        match self {
            Self::Pe32 => 8,
            Self::Pe32Plus => 16,
        }
    }
}

/// DOS header; only the fields the loader chain needs.
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_lfanew: u32,
}

/// COFF header (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub size_of_optional_header: u16,
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0
    }
}

/// Optional header fields shared by PE32 and PE32+
#[derive(Debug, Clone)]
pub struct OptionalHeaderCommon {
    pub address_of_entry_point: u32,
    pub file_alignment: u32,
    pub number_of_rva_and_sizes: u32,
}

/// Optional header, one variant per field layout
#[derive(Debug, Clone)]
pub enum OptionalHeader {
    Pe32 {
        common: OptionalHeaderCommon,
        image_base: u32,
    },
    Pe32Plus {
        common: OptionalHeaderCommon,
        image_base: u64,
    },
}

impl OptionalHeader {
    pub fn common(&self) -> &OptionalHeaderCommon {
        match self {
            Self::Pe32 { common, .. } | Self::Pe32Plus { common, .. } => common,
        }
    }

    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Pe32 { .. } => ImageKind::Pe32,
            Self::Pe32Plus { .. } => ImageKind::Pe32Plus,
        }
    }

    pub fn image_base(&self) -> u64 {
        match self {
            Self::Pe32 { image_base, .. } => *image_base as u64,
            Self::Pe32Plus { image_base, .. } => *image_base,
        }
    }

    pub fn entry_point(&self) -> u32 {
        self.common().address_of_entry_point
    }

    pub fn file_alignment(&self) -> u32 {
        self.common().file_alignment
    }
}

/// NT headers (PE signature + COFF + Optional)
#[derive(Debug, Clone)]
pub struct NtHeaders {
    pub file_header: CoffHeader,
    pub optional_header: OptionalHeader,
}

/// Section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Fixed eight bytes, not necessarily NUL-terminated.
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    /// Mapped extent used for RVA lookups: raw size capped by the virtual size
    /// (when one is declared), rounded up to the file alignment.
    pub fn effective_size(&self, file_alignment: u32) -> u64 {
        let mut size = self.size_of_raw_data;
        if self.virtual_size > 0 {
            size = size.min(self.virtual_size);
        }
        crate::formats::pe::utils::align_up(size as u64, file_alignment as u64)
    }

    pub fn contains_rva(&self, rva: u64, file_alignment: u32) -> bool {
        let start = self.virtual_address as u64;
        rva >= start && rva < start + self.effective_size(file_alignment)
    }

    /// Number of bytes worth decoding: the raw data, trimmed to the virtual size
    /// so alignment padding is not disassembled.
    pub fn code_size(&self) -> u32 {
        if self.virtual_size > 0 {
            self.size_of_raw_data.min(self.virtual_size)
        } else {
            self.size_of_raw_data
        }
    }

    /// File range holding the `code_size()` bytes of the section.
    pub fn raw_range(&self) -> Range<usize> {
        let start = self.pointer_to_raw_data as usize;
        start..start.saturating_add(self.code_size() as usize)
    }

    pub fn contains_code(&self) -> bool {
        (self.characteristics & IMAGE_SCN_CNT_CODE) != 0
    }
}
