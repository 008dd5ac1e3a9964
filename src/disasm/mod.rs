//! Disassembly services (iced-x86) and the code-section listing.

pub mod iced;
pub mod listing;

pub use self::iced::{build_formatter, decoder_bitness, DisasmError};
pub use self::listing::{Listing, ListingStats};
