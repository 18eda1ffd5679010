//! hoardkv CLI
//!
//! Command-line interface for a directory-backed hoardkv store, plus the
//! word-index sample.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hoardkv::{BytewiseComparator, Config, HoardError, InsertFlags, Result, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// hoardkv CLI
#[derive(Parser, Debug)]
#[command(name = "hoardkv-cli")]
#[command(about = "CLI for the hoardkv ordered key/value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./hoardkv_data")]
    data_dir: PathBuf,

    /// Allow several records per key
    #[arg(long)]
    duplicates: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every word read from stdin with its line numbers, then list
    /// the words in order (in memory, nothing is written to disk)
    Words,

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run against the store in `--data-dir`
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Store a record under a key
    Put {
        key: String,
        value: String,

        /// Replace the existing record
        #[arg(long, conflicts_with = "duplicate")]
        overwrite: bool,

        /// Append another record to the key
        #[arg(long)]
        duplicate: bool,
    },

    /// Print every record of a key
    Get { key: String },

    /// Delete a key with all its records
    Del { key: String },

    /// Print all entries in order
    Dump,

    /// Verify index integrity
    Check,

    /// Write a snapshot and truncate the journal
    Checkpoint,
}

fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,hoardkv=info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Words => words(io::stdin().lock(), &mut io::stdout().lock()),
        Commands::Store(command) => {
            let config = Config::builder()
                .data_dir(&args.data_dir)
                .enable_duplicates(args.duplicates)
                .build();
            let store = Store::open(config)?;
            execute(&store, command)?;
            store.close()
        }
    }
}

fn execute(store: &Store, command: StoreCommand) -> Result<()> {
    let mut out = io::stdout().lock();

    match command {
        StoreCommand::Put {
            key,
            value,
            overwrite,
            duplicate,
        } => {
            let flags = if overwrite {
                InsertFlags::OVERWRITE
            } else if duplicate {
                InsertFlags::DUPLICATE
            } else {
                InsertFlags::NONE
            };
            store.insert_with(key.as_bytes(), value.as_bytes(), flags)?;
        }
        StoreCommand::Get { key } => {
            for record in store.records(key.as_bytes())? {
                writeln!(out, "{}", String::from_utf8_lossy(&record))?;
            }
        }
        StoreCommand::Del { key } => store.erase(key.as_bytes())?,
        StoreCommand::Dump => {
            let mut cursor = store.cursor();
            loop {
                match cursor.move_next() {
                    Ok(()) => {}
                    Err(HoardError::KeyNotFound) => break,
                    Err(e) => return Err(e),
                }
                let (key, record) = cursor.current()?;
                writeln!(
                    out,
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&record)
                )?;
            }
        }
        StoreCommand::Check => {
            store.verify()?;
            writeln!(out, "ok: {} keys, index depth {}", store.len(), store.depth())?;
        }
        StoreCommand::Checkpoint => {
            if let Some(snapshot) = store.checkpoint()? {
                writeln!(
                    out,
                    "{} keys, {} records, {} bytes",
                    snapshot.entry_count, snapshot.record_count, snapshot.file_size
                )?;
            }
        }
    }
    Ok(())
}

/// List every word of the input in order, once per line it appeared in
fn words(input: impl BufRead, out: &mut impl Write) -> Result<()> {
    let config = Config::builder()
        .enable_duplicates(true)
        .comparator(Arc::new(BytewiseComparator))
        .build();
    let store = Store::open(config)?;

    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        let lineno = (lineno + 1) as u32;
        for word in line.split_whitespace() {
            store.insert_with(word.as_bytes(), &lineno.to_le_bytes(), InsertFlags::DUPLICATE)?;
        }
    }

    let mut cursor = store.cursor();
    while cursor.move_next().is_ok() {
        let (key, record) = cursor.current()?;
        let lineno = <[u8; 4]>::try_from(&record[..])
            .map(u32::from_le_bytes)
            .map_err(|_| HoardError::Storage("line number record is not 4 bytes".to_string()))?;
        writeln!(out, "{}: appeared in line {}", String::from_utf8_lossy(&key), lineno)?;
    }
    Ok(())
}
