use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use heapstore::{HeapFile, PageStore, Rid, StoreConfig};

#[derive(Debug, Parser)]
#[command(name = "heapstore", about = "Inspect and edit heap files")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty heap file
    Create {
        path: PathBuf,
        #[arg(long)]
        record_size: usize,
    },
    /// Delete a heap file
    Destroy { path: PathBuf },
    /// Print the file header as JSON
    Info { path: PathBuf },
    /// Insert a record; text is zero-padded (or cut) to the record size
    Insert { path: PathBuf, text: String },
    /// Delete the record at (page, slot)
    Delete { path: PathBuf, page: usize, slot: usize },
    /// Print the record at (page, slot)
    Get { path: PathBuf, page: usize, slot: usize },
    /// Print every record in scan order
    Scan { path: PathBuf },
    /// Append text to the log file
    LogAppend { text: String },
    /// Read from the log file
    LogRead {
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 4096)]
        size: usize,
    },
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    let store = Arc::new(PageStore::with_config(&config));

    match cli.command {
        Command::Create { path, record_size } => {
            HeapFile::create(&store, &path, record_size)?;
            println!("created {}", path.display());
        }
        Command::Destroy { path } => {
            store.destroy_file(&path)?;
            println!("destroyed {}", path.display());
        }
        Command::Info { path } => {
            let file = HeapFile::open(Arc::clone(&store), &path)?;
            println!("{}", serde_json::to_string_pretty(file.header())?);
            file.close()?;
        }
        Command::Insert { path, text } => {
            let mut file = HeapFile::open(Arc::clone(&store), &path)?;
            let mut data = text.into_bytes();
            data.resize(file.record_size(), 0);
            let rid = file.insert_record(&data)?;
            file.close()?;
            println!("{rid}");
        }
        Command::Delete { path, page, slot } => {
            let mut file = HeapFile::open(Arc::clone(&store), &path)?;
            file.delete_record(Rid::new(page, slot))?;
            file.close()?;
        }
        Command::Get { path, page, slot } => {
            let file = HeapFile::open(Arc::clone(&store), &path)?;
            let data = file.get_record(Rid::new(page, slot))?;
            println!("{}", display_record(&data));
            file.close()?;
        }
        Command::Scan { path } => {
            let file = HeapFile::open(Arc::clone(&store), &path)?;
            let mut count = 0;
            for rid in file.scan()?.rids() {
                let rid = rid?;
                println!("{rid} {}", display_record(&file.get_record(rid)?));
                count += 1;
            }
            tracing::info!(count, "scan complete");
            file.close()?;
        }
        Command::LogAppend { text } => {
            store.append_log(text.as_bytes())?;
        }
        Command::LogRead { offset, size } => {
            let mut buffer = vec![0u8; size];
            match store.read_log(&mut buffer, offset)? {
                Some(n) => println!("{}", String::from_utf8_lossy(&buffer[..n])),
                None => println!("offset {offset} is past the end of the log"),
            }
        }
    }

    Ok(())
}

/// Record bytes as text, without the zero padding added on insert
fn display_record(data: &[u8]) -> String {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}
