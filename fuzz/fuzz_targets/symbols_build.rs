#![no_main]
use libfuzzer_sys::fuzz_target;

use pedisasm::config::{SymbolConfig, UnresolvedPolicy};
use pedisasm::{build_symbol_table, PeImage};

fuzz_target!(|data: &[u8]| {
    let Ok(image) = PeImage::parse(data) else {
        return;
    };
    let _ = build_symbol_table(&image, &SymbolConfig::default());
    let skip = SymbolConfig {
        unresolved: UnresolvedPolicy::Skip,
        ..SymbolConfig::default()
    };
    if let Ok(table) = build_symbol_table(&image, &skip) {
        let addrs: Vec<u64> = table.iter().map(|s| s.address).collect();
        assert!(addrs.windows(2).all(|w| w[0] <= w[1]));
    }
});
