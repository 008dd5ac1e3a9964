//! Data directory records

pub mod export;
pub mod import;

pub use export::{read_export_directory, read_table_u16, read_table_u32, ExportDirectory};
pub use import::{read_import_descriptor, read_thunk, ImportDescriptor, Thunk, IMPORT_DESCRIPTOR_SIZE};
