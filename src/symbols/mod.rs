//! # Symbols Module
//!
//! Builds the address-ordered table of exported and imported names of a PE
//! image and answers exact-match address queries against it.

pub mod builder;
pub mod resolver;
pub mod table;
pub mod types;

pub use builder::build_symbol_table;
pub use resolver::{resolve, AddressResolver, FallbackNamer, SymbolNamer};
pub use table::SymbolTable;
pub use types::{Symbol, ENTRY_POINT_NAME};
