//! OxiLZMA CLI
//!
//! Compress, decompress, verify and inspect raw `.lzma` streams.

mod commands;
mod utils;

use clap::{ArgAction, Parser, Subcommand};
use commands::{MatchFinderArg, cmd_compress, cmd_decompress, cmd_info, cmd_test};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxilzma")]
#[command(author, version, about = "Pure Rust LZMA compressor")]
#[command(long_about = "
OxiLZMA reads and writes raw LZMA streams (the .lzma format).

Examples:
  oxilzma compress notes.txt
  oxilzma compress -l 9 --progress dump.sql
  oxilzma compress --stream -o out.lzma data.bin
  oxilzma decompress notes.txt.lzma
  oxilzma test notes.txt.lzma
  oxilzma info --json notes.txt.lzma
")]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file
    #[command(alias = "c")]
    Compress {
        /// File to compress
        input: PathBuf,

        /// Output file (default: input with .lzma appended)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression level (1-9)
        #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=9))]
        level: u8,

        /// Write an unknown-size header and an end marker
        #[arg(long)]
        stream: bool,

        /// Override the dictionary size in bytes
        #[arg(long)]
        dict_size: Option<u32>,

        /// Override the fast-bytes setting (5-273)
        #[arg(long)]
        fast_bytes: Option<u32>,

        /// Override the match finder
        #[arg(long, value_enum)]
        match_finder: Option<MatchFinderArg>,

        /// Show a progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Decompress a file
    #[command(alias = "d")]
    Decompress {
        /// File to decompress
        input: PathBuf,

        /// Output file (default: input without .lzma)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show a progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Decode a file without writing output and report its checksum
    #[command(alias = "t")]
    Test {
        /// File to test
        input: PathBuf,
    },

    /// Show header information
    #[command(alias = "i")]
    Info {
        /// File to inspect
        input: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            level,
            stream,
            dict_size,
            fast_bytes,
            match_finder,
            progress,
        } => cmd_compress(
            &input,
            output.as_deref(),
            commands::CompressOptions {
                level,
                stream,
                dict_size,
                fast_bytes,
                match_finder,
                progress,
            },
        ),
        Commands::Decompress {
            input,
            output,
            progress,
        } => cmd_decompress(&input, output.as_deref(), progress),
        Commands::Test { input } => cmd_test(&input),
        Commands::Info { input, json } => cmd_info(&input, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
