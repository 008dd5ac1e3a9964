//! Address-to-symbol lookup and the formatter symbol hook.

use std::sync::Arc;

use iced_x86::{Instruction, SymbolResolver, SymbolResult};

use crate::symbols::table::SymbolTable;
use crate::symbols::types::Symbol;

/// Exact-match lookup of an absolute address.
///
/// Addresses below `image_base` have no RVA and never match.
pub fn resolve(table: &SymbolTable, absolute: u64, image_base: u64) -> Option<&Symbol> {
    let rva = absolute.checked_sub(image_base)?;
    table.find(rva)
}

/// A shared symbol table bound to the image base it was built for.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    table: Arc<SymbolTable>,
    image_base: u64,
}

impl AddressResolver {
    pub fn new(table: Arc<SymbolTable>, image_base: u64) -> Self {
        Self { table, image_base }
    }

    pub fn resolve(&self, absolute: u64) -> Option<&Symbol> {
        resolve(&self.table, absolute, self.image_base)
    }

    pub fn table(&self) -> &Arc<SymbolTable> {
        &self.table
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }
}

/// Caller-supplied naming used when the table has nothing for an address.
pub type FallbackNamer = Box<dyn Fn(u64) -> Option<String> + Send + Sync>;

/// Names operand addresses for `iced_x86` formatters.
///
/// Table hits render as `module.symbol`; misses go to the fallback, and when
/// that also declines the formatter prints the number.
pub struct SymbolNamer {
    resolver: AddressResolver,
    fallback: Option<FallbackNamer>,
}

impl SymbolNamer {
    pub fn new(resolver: AddressResolver) -> Self {
        Self {
            resolver,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackNamer) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn name_for(&self, address: u64) -> Option<String> {
        self.resolver
            .resolve(address)
            .map(Symbol::qualified_name)
            .or_else(|| self.fallback.as_ref().and_then(|f| f(address)))
    }
}

impl SymbolResolver for SymbolNamer {
    fn symbol(
        &mut self,
        _instruction: &Instruction,
        _operand: u32,
        _instruction_operand: Option<u32>,
        address: u64,
        _address_size: u32,
    ) -> Option<SymbolResult<'_>> {
        self.name_for(address)
            .map(|name| SymbolResult::with_string(address, name))
    }
}
