//! iced-x86 decoder and formatter setup.

use iced_x86::{Formatter, IntelFormatter, MemorySizeOptions, SymbolResolver};
use thiserror::Error;

use crate::config::ListingConfig;
use crate::formats::pe::Machine;
use crate::symbols::SymbolNamer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisasmError {
    #[error("Machine {0:?} cannot be decoded")]
    UndecodableMachine(Machine),
    #[error("Decoder error: {0}")]
    Decoder(String),
    #[error("Formatter error: {0}")]
    Formatter(String),
}

impl From<iced_x86::IcedError> for DisasmError {
    fn from(err: iced_x86::IcedError) -> Self {
        DisasmError::Decoder(err.to_string())
    }
}

impl From<std::fmt::Error> for DisasmError {
    fn from(err: std::fmt::Error) -> Self {
        DisasmError::Formatter(err.to_string())
    }
}

/// Decoder bitness for a machine. IA-64 validates but has no x86 decoding.
pub fn decoder_bitness(machine: Machine) -> Result<u32, DisasmError> {
    match machine {
        Machine::I386 => Ok(32),
        Machine::Amd64 => Ok(64),
        Machine::Ia64 => Err(DisasmError::UndecodableMachine(machine)),
    }
}

/// Intel-syntax formatter with segment registers and memory sizes always
/// shown. Operand addresses are named through `namer` when one is given.
pub fn build_formatter(config: &ListingConfig, namer: Option<SymbolNamer>) -> IntelFormatter {
    let resolver = namer.map(|n| Box::new(n) as Box<dyn SymbolResolver>);
    let mut formatter = IntelFormatter::with_options(resolver, None);

    let options = formatter.options_mut();
    options.set_always_show_segment_register(true);
    options.set_memory_size_options(MemorySizeOptions::Always);
    options.set_hex_prefix_string(config.hex_prefix.clone());
    options.set_hex_suffix("");
    options.set_uppercase_mnemonics(config.uppercase_mnemonics);
    options.set_space_after_operand_separator(true);

    formatter
}
