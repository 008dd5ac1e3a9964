//! Linear-sweep listing of every code section, with symbol labels.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ListingConfig;
use crate::disasm::iced::{build_formatter, decoder_bitness, DisasmError};
use crate::error::Result;
use crate::formats::pe::{ImageKind, PeImage, SectionHeader};
use crate::symbols::{AddressResolver, SymbolNamer, SymbolTable};

/// Width of the raw byte column, in bytes.
pub const BYTE_COLUMN: usize = 15;

/// Counts gathered while writing a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListingStats {
    pub instructions: usize,
    /// Bytes printed as `db` after a decode failure
    pub invalid_bytes: usize,
    pub labels: usize,
}

pub struct Listing<'a, 'data> {
    image: &'a PeImage<'data>,
    resolver: AddressResolver,
    config: &'a ListingConfig,
}

impl<'a, 'data> Listing<'a, 'data> {
    pub fn new(image: &'a PeImage<'data>, table: Arc<SymbolTable>, config: &'a ListingConfig) -> Self {
        Self {
            image,
            resolver: AddressResolver::new(table, image.image_base()),
            config,
        }
    }

    /// Decode and print every section flagged as code, in table order.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<ListingStats> {
        let bitness = decoder_bitness(self.image.machine())?;
        let namer = self
            .config
            .annotate_addresses
            .then(|| SymbolNamer::new(self.resolver.clone()));
        let mut formatter = build_formatter(self.config, namer);

        let mut stats = ListingStats::default();
        for section in self.image.code_sections() {
            self.write_section(section, bitness, &mut formatter, out, &mut stats)?;
        }
        out.flush()?;
        Ok(stats)
    }

    fn write_section<W: Write>(
        &self,
        section: &SectionHeader,
        bitness: u32,
        formatter: &mut IntelFormatter,
        out: &mut W,
        stats: &mut ListingStats,
    ) -> Result<()> {
        let data = self.image.data();
        let range = section.raw_range();
        let start = range.start;
        if start >= data.len() {
            warn!(section = %section.name(), offset = start, "section data lies outside the file");
            return Ok(());
        }
        let end = if range.end > data.len() {
            warn!(
                section = %section.name(),
                declared = section.code_size(),
                available = data.len() - start,
                "section data clamped to file end"
            );
            data.len()
        } else {
            range.end
        };
        let code = &data[start..end];
        // Header values are untrusted; addresses wrap like the decoder's IP does.
        let base_ip = self
            .image
            .image_base()
            .wrapping_add(section.virtual_address as u64);
        let kind = self.image.kind();
        let width = kind.address_width();

        debug!(
            section = %section.name(),
            address = format_args!("0x{:x}", base_ip),
            len = code.len(),
            "disassembling section"
        );

        let mut decoder = Decoder::with_ip(bitness, code, base_ip, DecoderOptions::NONE);
        let mut instruction = Instruction::default();
        let mut text = String::new();
        let mut line = String::new();

        while decoder.can_decode() {
            let position = decoder.position();
            let ip = base_ip.wrapping_add(position as u64);
            decoder.decode_out(&mut instruction);

            if self.config.show_labels {
                if let Some(symbol) = self.resolver.resolve(ip) {
                    writeln!(out)?;
                    writeln!(out, "{}:", symbol.symbol_name)?;
                    stats.labels += 1;
                }
            }

            text.clear();
            let bytes = if instruction.is_invalid() {
                // One raw byte, then resync on the next one.
                let byte = &code[position..position + 1];
                write!(text, "db {:02x}", byte[0]).map_err(DisasmError::from)?;
                decoder.set_position(position + 1).map_err(DisasmError::from)?;
                decoder.set_ip(ip.wrapping_add(1));
                stats.invalid_bytes += 1;
                byte
            } else {
                formatter.format(&instruction, &mut text);
                stats.instructions += 1;
                &code[position..position + instruction.len()]
            };

            format_line(&mut line, display_address(ip, kind), width, bytes, &text)?;
            writeln!(out, "{line}")?;
        }

        Ok(())
    }
}

/// PE32 addresses are printed as 32-bit values.
fn display_address(address: u64, kind: ImageKind) -> u64 {
    match kind {
        ImageKind::Pe32 => address & 0xFFFF_FFFF,
        ImageKind::Pe32Plus => address,
    }
}

/// `ADDR  BB BB ..  text`, the byte column padded to `BYTE_COLUMN` bytes.
pub fn format_line(
    line: &mut String,
    address: u64,
    width: usize,
    bytes: &[u8],
    text: &str,
) -> std::result::Result<(), DisasmError> {
    line.clear();
    write!(line, "{address:0width$X}  ")?;
    for byte in bytes {
        write!(line, "{byte:02X} ")?;
    }
    for _ in bytes.len()..BYTE_COLUMN {
        line.push_str("   ");
    }
    line.push(' ');
    line.push_str(text);
    Ok(())
}
