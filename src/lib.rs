//! PE symbol resolution and annotated x86 disassembly.
//!
//! A buffer is validated and its header chain materialized by
//! [`formats::pe::PeImage`]; [`symbols::build_symbol_table`] turns the export
//! directory and import descriptors into an address-ordered table; and
//! [`disasm::Listing`] sweeps the code sections, naming operand addresses and
//! labelling symbol starts through [`symbols::AddressResolver`].

pub mod config;
pub mod disasm;
pub mod error;
pub mod formats;
pub mod io;
pub mod logging;
pub mod symbols;

pub use config::{IoConfig, ListingConfig, PeDisasmConfig, SymbolConfig, UnresolvedPolicy};
pub use error::{Error, ErrorKind, Result};
pub use formats::pe::{validate, ImageKind, Machine, PeError, PeImage};
pub use symbols::{build_symbol_table, resolve, AddressResolver, Symbol, SymbolNamer, SymbolTable};
