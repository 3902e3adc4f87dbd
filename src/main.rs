use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use salvage::carving::{
    self, CarveMode, CarveReport, CarverConfig, DEFAULT_MAX_EXTENT_BYTES, TruncatedPolicy,
};
use salvage::extraction::DirectorySink;
use salvage::io::{BlockSource, ByteSource, DEFAULT_BLOCK_SIZE, MemorySource};
use salvage::types::Signature;

#[derive(Parser)]
#[command(name = "salvage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Carve JPEG images out of raw disk images and block devices")]
struct Cli {
    /// Disk image or block device to scan
    #[arg(short, long)]
    device: PathBuf,

    /// Directory for recovered files
    #[arg(short, long, default_value = "./recovered")]
    output: PathBuf,

    /// Load the whole source into memory instead of reading block-aligned
    #[arg(long)]
    buffered: bool,

    /// Read granularity in bytes for the block-addressable source
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Drop any candidate that grows past this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_EXTENT_BYTES)]
    max_size: u64,

    /// Drop unterminated candidates instead of emitting them truncated
    #[arg(long)]
    discard_truncated: bool,

    /// Triage mode: take exactly this many bytes after each start marker
    /// instead of searching for an end marker
    #[arg(long, value_name = "BYTES", num_args = 0..=1, default_missing_value = "1024")]
    prefix: Option<u64>,

    /// Override the start marker (hex, e.g. ffd8ffe0)
    #[arg(long, value_name = "HEX")]
    start_sig: Option<String>,

    /// Override the end marker (hex, e.g. ffd9)
    #[arg(long, value_name = "HEX")]
    end_sig: Option<String>,
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let mut sink = DirectorySink::create(&cli.output)
        .with_context(|| format!("Failed to prepare output directory {:?}", cli.output))?;

    let report = if cli.buffered {
        let mut source = MemorySource::load(&cli.device)
            .with_context(|| format!("Failed to open source: {:?}", cli.device))?;
        run_carve(&mut source, &mut sink, &config)?
    } else {
        let mut source = BlockSource::open(&cli.device, cli.block_size)
            .with_context(|| format!("Failed to open source: {:?}", cli.device))?;
        run_carve(&mut source, &mut sink, &config)?
    };

    print_summary(&report, &cli.output);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> Result<CarverConfig> {
    if cli.block_size == 0 {
        bail!("--block-size must be non-zero");
    }
    if cli.prefix == Some(0) {
        bail!("--prefix must be non-zero");
    }

    let mut config = CarverConfig {
        block_size: cli.block_size,
        max_extent_bytes: cli.max_size,
        ..CarverConfig::default()
    };

    if let Some(text) = &cli.start_sig {
        config.start = parse_signature(text).context("invalid --start-sig")?;
    }
    if let Some(text) = &cli.end_sig {
        config.end = parse_signature(text).context("invalid --end-sig")?;
    }
    if cli.discard_truncated {
        config.truncated = TruncatedPolicy::Discard;
    }
    if let Some(len) = cli.prefix {
        config.mode = CarveMode::Prefix(len);
    }

    Ok(config)
}

fn parse_signature(text: &str) -> Result<Signature> {
    let bytes = hex::decode(text.trim()).context("signature must be hex bytes")?;
    if bytes.is_empty() {
        bail!("signature must not be empty");
    }
    Ok(Signature::new(bytes))
}

fn run_carve<S: ByteSource>(
    source: &mut S,
    sink: &mut DirectorySink,
    config: &CarverConfig,
) -> Result<CarveReport> {
    let total = source.size();
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
            .progress_chars("=>-"),
    );

    let progress = |cursor: u64| -> bool {
        pb.set_position(cursor.min(total));
        true
    };

    let report = carving::carve(source, sink, config, Some(&progress));

    pb.finish_with_message(format!(
        "Scan complete! {} extents recovered",
        style(report.stats.emitted).green().bold()
    ));

    Ok(report)
}

fn print_summary(report: &CarveReport, output: &Path) {
    let stats = &report.stats;

    println!();
    println!("{}", style("Recovery Complete!").green().bold());
    println!();
    println!("Extents recovered:  {}", style(stats.emitted).green());
    println!("  complete:         {}", stats.complete);
    println!("  truncated:        {}", stats.truncated);

    if stats.discarded > 0 {
        println!("  discarded:        {}", style(stats.discarded).yellow());
    }
    if stats.over_size > 0 {
        println!("  over size limit:  {}", style(stats.over_size).yellow());
    }
    if stats.sink_failures > 0 {
        println!("  write failures:   {}", style(stats.sink_failures).yellow());
    }
    if report.read_failures() > 0 {
        println!(
            "\n[!] {} reads failed and were skipped",
            style(report.read_failures()).yellow()
        );
    }
    if !report.diagnostics.is_empty() {
        println!();
        for diagnostic in &report.diagnostics {
            println!("    {diagnostic}");
        }
    }

    println!("Output folder:      {:?}", output);
    println!();
}
