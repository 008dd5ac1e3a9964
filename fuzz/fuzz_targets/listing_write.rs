#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use pedisasm::config::{ListingConfig, SymbolConfig, UnresolvedPolicy};
use pedisasm::disasm::Listing;
use pedisasm::{build_symbol_table, PeImage};

fuzz_target!(|data: &[u8]| {
    let Ok(image) = PeImage::parse(data) else {
        return;
    };
    let config = SymbolConfig {
        unresolved: UnresolvedPolicy::Skip,
        ..SymbolConfig::default()
    };
    let table = build_symbol_table(&image, &config).unwrap_or_default();
    let _ = Listing::new(&image, Arc::new(table), &ListingConfig::default()).write_to(&mut std::io::sink());
});
