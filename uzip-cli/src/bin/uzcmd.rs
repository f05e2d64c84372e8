use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{self, Context};
use clap::{Args, Parser, Subcommand};
use uzip::container::Container;

#[derive(Parser, Debug)]
struct Cli {
    /// The uzip container to operate on
    container: PathBuf,

    /// The command to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print header and block index details
    Info(InfoArgs),
    /// Write decompressed image contents to stdout
    Cat(CatArgs),
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Also list every block's compressed extent
    #[arg(long)]
    blocks: bool,
}

#[derive(Args, Debug)]
struct CatArgs {
    /// Byte offset into the decompressed image to start at
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Maximum number of bytes to write
    #[arg(long)]
    length: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let container = Container::open(&cli.container)
        .with_context(|| format!("Failed to open {}", cli.container.display()))?;
    let mut stdout = io::stdout().lock();
    match &cli.command {
        Command::Info(args) => cmd_info(&container, args, &mut stdout),
        Command::Cat(args) => cmd_cat(&container, args, &mut stdout),
    }
}

fn cmd_info<S, W>(container: &Container<S>, args: &InfoArgs, out: &mut W) -> anyhow::Result<()>
where S: uzip::container::ReadAt, W: Write
{
    let header = container.header();
    let index = container.index();
    let logical = container.logical_size();
    let compressed = index.compressed_size();

    writeln!(out, "codec:           {}", header.codec)?;
    writeln!(out, "format version:  {}{}", header.version, if header.is_legacy() { " (legacy)" } else { "" })?;
    writeln!(out, "block size:      {}", header.block_size)?;
    writeln!(out, "blocks:          {}", header.block_count)?;
    writeln!(out, "sparse blocks:   {}", index.sparse_count())?;
    writeln!(out, "image size:      {logical}")?;
    writeln!(out, "compressed size: {compressed}")?;
    if compressed > 0 {
        writeln!(out, "ratio:           {:.2}", logical as f64 / compressed as f64)?;
    }

    if args.blocks {
        writeln!(out)?;
        for i in 0..u64::from(header.block_count) {
            let b = index.bounds_of(i)?;
            if b.is_sparse() {
                writeln!(out, "{i:>10}  sparse")?;
            } else {
                writeln!(out, "{i:>10}  {:#014x}  {:>10}", b.start, b.len)?;
            }
        }
    }
    Ok(())
}

fn cmd_cat<S, W>(container: &Container<S>, args: &CatArgs, out: &mut W) -> anyhow::Result<()>
where S: uzip::container::ReadAt, W: Write
{
    let mut reader = container.reader();
    reader.seek(SeekFrom::Start(args.offset))?;
    let mut reader = reader.take(args.length.unwrap_or(u64::MAX));
    io::copy(&mut reader, out)
        .with_context(|| format!("Failed to read image at offset {}", reader.get_ref().position()))?;
    out.flush()?;
    Ok(())
}
