use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pedisasm::disasm::Listing;
use pedisasm::io::SafeReader;
use pedisasm::logging::{init_tracing, init_tracing_json};
use pedisasm::{build_symbol_table, Error, PeDisasmConfig, PeImage, SymbolTable, UnresolvedPolicy};

#[derive(Parser)]
#[command(name = "pedisasm")]
#[command(about = "Disassemble the code sections of a PE image with export and import names")]
struct Cli {
    /// PE file to disassemble
    file: PathBuf,
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Skip export/import entries whose RVA does not resolve instead of failing
    #[arg(long)]
    skip_unresolved: bool,
    /// Print the symbol table instead of the listing
    #[arg(long)]
    symbols: bool,
    /// With --symbols, print JSON
    #[arg(long, requires = "symbols")]
    json: bool,
    /// Do not print symbol labels before instructions
    #[arg(long)]
    no_labels: bool,
    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
    /// Log as JSON lines on stderr
    #[arg(long)]
    log_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.log_json {
        init_tracing_json(&cli.log_level);
    } else {
        init_tracing(&cli.log_level);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<Error>()
                .map(Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => PeDisasmConfig::from_json_file(path)?,
        None => PeDisasmConfig::default(),
    };
    if cli.skip_unresolved {
        config.symbols.unresolved = UnresolvedPolicy::Skip;
    }
    if cli.no_labels {
        config.listing.show_labels = false;
    }

    let reader = SafeReader::open(&cli.file, &config.io)
        .map_err(Error::from)
        .with_context(|| format!("cannot load {}", cli.file.display()))?;
    let image = PeImage::parse(reader.as_bytes()).map_err(Error::from)?;
    let table = build_symbol_table(&image, &config.symbols).map_err(Error::from)?;
    if table.skipped() > 0 {
        eprintln!("warning: {} unresolved entries skipped", table.skipped());
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.symbols {
        write_symbols(&table, cli.json, &mut out)?;
    } else {
        let stats = Listing::new(&image, Arc::new(table), &config.listing).write_to(&mut out)?;
        tracing::info!(
            instructions = stats.instructions,
            invalid_bytes = stats.invalid_bytes,
            labels = stats.labels,
            "listing written"
        );
    }
    Ok(())
}

fn write_symbols<W: Write>(table: &SymbolTable, json: bool, out: &mut W) -> pedisasm::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(table).map_err(|e| Error::Config(e.to_string()))?;
        writeln!(out, "{text}")?;
    } else {
        for symbol in table {
            writeln!(out, "{:08X}  {}", symbol.address, symbol.qualified_name())?;
        }
    }
    out.flush()?;
    Ok(())
}
