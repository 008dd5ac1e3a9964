//! Symbol table construction from the export directory and import descriptors.

use tracing::{debug, trace, warn};

use crate::config::{SymbolConfig, UnresolvedPolicy};
use crate::formats::pe::directories::*;
use crate::formats::pe::utils::strip_extension;
use crate::formats::pe::{
    DataDirectory, PeError, PeImage, Result, IMAGE_DIRECTORY_ENTRY_EXPORT,
    IMAGE_DIRECTORY_ENTRY_IMPORT,
};
use crate::symbols::table::SymbolTable;
use crate::symbols::types::{Symbol, ENTRY_POINT_NAME};

/// Build the address-ordered symbol table of a parsed image.
///
/// Exports come first (preceded by the `EntryPoint` pseudo-symbol), then one
/// symbol per import thunk slot at `FirstThunk + index * thunk_size`. A phase
/// whose directory RVA is zero is skipped.
pub fn build_symbol_table(image: &PeImage<'_>, config: &SymbolConfig) -> Result<SymbolTable> {
    let mut builder = TableBuilder::new(image, config);

    let export_dir = image.data_directory(IMAGE_DIRECTORY_ENTRY_EXPORT);
    if export_dir.is_present() {
        let walked = builder.walk_exports(export_dir);
        builder.recover(walked, "export directory")?;
    } else {
        debug!("no export directory");
    }

    let import_dir = image.data_directory(IMAGE_DIRECTORY_ENTRY_IMPORT);
    if import_dir.is_present() {
        let walked = builder.walk_imports(import_dir);
        builder.recover(walked, "import directory")?;
    } else {
        debug!("no import directory");
    }

    debug!(
        symbols = builder.table.len(),
        skipped = builder.table.skipped(),
        "symbol table built"
    );
    Ok(builder.table)
}

struct TableBuilder<'a, 'data> {
    image: &'a PeImage<'data>,
    config: &'a SymbolConfig,
    table: SymbolTable,
    imports_walked: u32,
}

impl<'a, 'data> TableBuilder<'a, 'data> {
    fn new(image: &'a PeImage<'data>, config: &'a SymbolConfig) -> Self {
        Self {
            image,
            config,
            table: SymbolTable::new(),
            imports_walked: 0,
        }
    }

    /// Apply the unresolved-entry policy to a resolution failure.
    ///
    /// Under `Skip`, resolution errors are counted and swallowed; header
    /// errors and every error under `Abort` propagate.
    fn recover<T>(&mut self, result: Result<T>, what: &str) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_resolution() && self.config.unresolved == UnresolvedPolicy::Skip => {
                warn!(error = %err, "skipping {}", what);
                self.table.record_skip();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn read_name(&self, rva: u64) -> Result<String> {
        self.image.read_cstring_at_rva(rva, self.config.max_name_length)
    }

    fn read_module_name(&self, rva: u32) -> Result<String> {
        let name = self.read_name(rva as u64)?;
        Ok(strip_extension(&name).to_string())
    }

    fn insert(&mut self, symbol: Symbol) {
        trace!(
            address = format_args!("0x{:x}", symbol.address),
            module = %symbol.module_name,
            name = %symbol.symbol_name,
            "insert symbol"
        );
        self.table.insert(symbol);
    }

    fn walk_exports(&mut self, dir: DataDirectory) -> Result<()> {
        let data = self.image.data();
        let dir_offset = self.image.resolve_rva(dir.virtual_address as u64)?;
        let export = read_export_directory(data, dir_offset)?;
        let module = self.read_module_name(export.name_rva)?;

        self.insert(Symbol::new(
            self.image.entry_point() as u64,
            module.as_str(),
            ENTRY_POINT_NAME,
        ));

        let mut function_count = export.number_of_functions;
        if function_count > self.config.max_exports {
            warn!(
                declared = function_count,
                limit = self.config.max_exports,
                "export count clamped"
            );
            function_count = self.config.max_exports;
        }
        if function_count == 0 {
            debug!(module = %module, "export directory has no functions");
            return Ok(());
        }
        let name_count = export.number_of_names.min(self.config.max_exports);

        let names = self.export_names(&export, function_count, name_count)?;
        let functions_offset = self.image.resolve_rva(export.address_of_functions as u64)?;

        let mut inserted = 0usize;
        for (index, name) in names.into_iter().enumerate() {
            let slot = read_table_u32(data, functions_offset, index);
            let Some(rva) = self.recover(slot, "export address slot")? else {
                continue;
            };
            // Unused ordinal
            if rva == 0 {
                continue;
            }
            let name = name.unwrap_or_else(|| {
                Symbol::ordinal_name(export.ordinal_base.wrapping_add(index as u32))
            });
            self.insert(Symbol::new(rva as u64, module.as_str(), name));
            inserted += 1;
        }

        debug!(module = %module, exports = inserted, "exports walked");
        Ok(())
    }

    /// Names indexed by export address table slot, paired through the
    /// name-ordinal table. Slots nobody names stay `None`.
    fn export_names(
        &mut self,
        export: &ExportDirectory,
        function_count: u32,
        name_count: u32,
    ) -> Result<Vec<Option<String>>> {
        let mut names = vec![None; function_count as usize];
        if name_count == 0 {
            return Ok(names);
        }

        let data = self.image.data();
        let names_offset = self.image.resolve_rva(export.address_of_names as u64)?;
        let ordinals_offset = self
            .image
            .resolve_rva(export.address_of_name_ordinals as u64)?;

        for i in 0..name_count as usize {
            let ordinal = read_table_u16(data, ordinals_offset, i);
            let Some(ordinal) = self.recover(ordinal, "export name ordinal")? else {
                continue;
            };
            let Some(slot) = names.get(ordinal as usize) else {
                warn!(index = i, ordinal, "export name ordinal out of range");
                continue;
            };
            // Aliases: the first name for a slot is kept.
            if slot.is_some() {
                continue;
            }

            let name = read_table_u32(data, names_offset, i).and_then(|rva| self.read_name(rva as u64));
            if let Some(name) = self.recover(name, "export name")? {
                names[ordinal as usize] = Some(name);
            }
        }

        Ok(names)
    }

    fn walk_imports(&mut self, dir: DataDirectory) -> Result<()> {
        let data = self.image.data();
        let mut offset = self.image.resolve_rva(dir.virtual_address as u64)?;
        let mut modules = 0usize;

        loop {
            let descriptor = read_import_descriptor(data, offset)?;
            if descriptor.is_terminator() {
                break;
            }

            let walked = self.walk_descriptor(&descriptor);
            self.recover(walked, "import descriptor")?;
            modules += 1;

            if self.imports_walked >= self.config.max_imports {
                warn!(limit = self.config.max_imports, "import limit reached, stopping walk");
                break;
            }
            offset = offset
                .checked_add(IMPORT_DESCRIPTOR_SIZE)
                .ok_or(PeError::OutOfBounds {
                    offset,
                    len: data.len(),
                })?;
        }

        debug!(modules, imports = self.imports_walked, "imports walked");
        Ok(())
    }

    fn walk_descriptor(&mut self, descriptor: &ImportDescriptor) -> Result<()> {
        let data = self.image.data();
        let kind = self.image.kind();
        let thunk_size = kind.thunk_size();

        let module = self.read_module_name(descriptor.name_rva)?;
        let lookup_offset = self
            .image
            .resolve_rva(descriptor.original_first_thunk as u64)?;

        let mut index = 0usize;
        loop {
            if self.imports_walked >= self.config.max_imports {
                break;
            }

            let thunk_offset = index
                .checked_mul(thunk_size)
                .and_then(|o| o.checked_add(lookup_offset))
                .ok_or(PeError::OutOfBounds {
                    offset: lookup_offset,
                    len: data.len(),
                })?;
            let name = match read_thunk(data, thunk_offset, kind)? {
                Thunk::End => break,
                Thunk::Ordinal(ordinal) => Ok(Symbol::ordinal_name(ordinal as u32)),
                // Skip the two-byte hint
                Thunk::ByName(rva) => self.read_name(rva as u64 + 2),
            };
            self.imports_walked += 1;

            let address = descriptor.first_thunk as u64 + (index * thunk_size) as u64;
            index += 1;

            let entry = if self.table.contains_address(address) {
                Err(PeError::SymbolCollision { address })
            } else {
                name.map(|name| Symbol::new(address, module.as_str(), name))
            };
            if let Some(symbol) = self.recover(entry, "import thunk")? {
                self.insert(symbol);
            }
        }

        debug!(module = %module, thunks = index, "import descriptor walked");
        Ok(())
    }
}
