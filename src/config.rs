//! Configuration for loading, symbol table construction, and the listing.
//!
//! Every section has sensible defaults; a JSON file only needs the fields it
//! wants to change.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeDisasmConfig {
    /// File loading limits.
    pub io: IoConfig,
    /// Symbol table construction.
    pub symbols: SymbolConfig,
    /// Listing output.
    pub listing: ListingConfig,
}

impl PeDisasmConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

/// I/O configuration for file loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Maximum file size to map (default: 268435456 = 256MB).
    pub max_file_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,
        }
    }
}

/// What to do with an export or import entry whose RVA cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Fail the whole table with the first error.
    #[default]
    Abort,
    /// Drop the entry, count it, and keep walking.
    Skip,
}

/// Symbol table construction limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    /// Maximum export address table entries walked (default: 65536).
    pub max_exports: u32,
    /// Maximum import thunks walked across all descriptors (default: 65536).
    pub max_imports: u32,
    /// Maximum bytes read for a single name string (default: 512).
    pub max_name_length: usize,
    pub unresolved: UnresolvedPolicy,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            max_exports: 65536,
            max_imports: 65536,
            max_name_length: 512,
            unresolved: UnresolvedPolicy::Abort,
        }
    }
}

/// Listing output options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Emit `name:` lines before instructions that start a symbol.
    pub show_labels: bool,
    /// Replace operand addresses with `module.symbol` when known.
    pub annotate_addresses: bool,
    pub uppercase_mnemonics: bool,
    pub hex_prefix: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            show_labels: true,
            annotate_addresses: true,
            uppercase_mnemonics: false,
            hex_prefix: "0x".to_string(),
        }
    }
}
