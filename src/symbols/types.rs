//! Symbol record

use serde::{Deserialize, Serialize};

/// Name of the pseudo-symbol placed at AddressOfEntryPoint.
pub const ENTRY_POINT_NAME: &str = "EntryPoint";

/// One named address. `address` is an RVA, never an absolute runtime address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub address: u64,
    /// Module name with its extension stripped, stored in its original case.
    pub module_name: String,
    pub symbol_name: String,
}

impl Symbol {
    pub fn new(address: u64, module_name: impl Into<String>, symbol_name: impl Into<String>) -> Self {
        Self {
            address,
            module_name: module_name.into(),
            symbol_name: symbol_name.into(),
        }
    }

    /// `module.symbol`, module lowercased
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            self.module_name.to_ascii_lowercase(),
            self.symbol_name
        )
    }

    /// Placeholder name for an entry known only by ordinal.
    pub fn ordinal_name(ordinal: u32) -> String {
        format!("#{ordinal}")
    }
}
