//! Address-ordered symbol table

use serde::Serialize;

use crate::symbols::types::Symbol;

/// Symbols kept sorted by address at all times.
///
/// Equal addresses keep their insertion order. The table owns every name, so
/// it can outlive the image buffer and be shared across threads behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    skipped: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every symbol at or below `symbol.address` and return the rank.
    pub fn insert(&mut self, symbol: Symbol) -> usize {
        let rank = self.upper_bound(symbol.address);
        self.symbols.insert(rank, symbol);
        rank
    }

    /// Index of the first symbol with an address greater than `address`
    pub fn upper_bound(&self, address: u64) -> usize {
        self.symbols.partition_point(|s| s.address <= address)
    }

    /// Index of the first symbol with an address not less than `address`
    pub fn lower_bound(&self, address: u64) -> usize {
        self.symbols.partition_point(|s| s.address < address)
    }

    /// Exact-match lookup; with duplicates, the earliest inserted wins.
    pub fn find(&self, address: u64) -> Option<&Symbol> {
        self.symbols
            .get(self.lower_bound(address))
            .filter(|s| s.address == address)
    }

    pub fn contains_address(&self, address: u64) -> bool {
        self.find(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Entries dropped under the skip policy
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub(crate) fn record_skip(&mut self) {
        self.skipped += 1;
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
