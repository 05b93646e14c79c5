//! Decode a JSON dossier cache export and print it as JSON.
//!
//! Run with:
//! `cargo run --example dump -- <schema dir> <cache.json> [key table.json] [reader config.json]`
//!
//! The key table is a JSON object mapping composite keys to display names. Without one, records
//! are keyed by their composite key. Set `RUST_LOG=debug` to see every record.

use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use dossier_pack::{CacheReader, KeyBy, KeyTable, ReaderConfig, Registry};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (schema_dir, cache_path) = match (args.first(), args.get(1)) {
        (Some(dir), Some(cache)) => (dir, cache),
        _ => {
            eprintln!("usage: dump <schema dir> <cache.json> [key table.json] [reader config.json]");
            std::process::exit(2);
        }
    };

    let mut registry = Registry::from_schema_dir(schema_dir)?;
    let mut config: ReaderConfig = match args.get(3) {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => ReaderConfig::default(),
    };
    match args.get(2) {
        Some(path) => {
            let table: KeyTable = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            tracing::info!(names = table.len(), "loaded key table");
            registry = registry.with_key_table(table);
        }
        None => config = config.key_by(KeyBy::Composite),
    }

    let dossier = CacheReader::with_config(&registry, config).read_path(cache_path)?;
    if let Some(owner) = &dossier.owner {
        tracing::info!(server = %owner.server, nick = %owner.nick, "cache owner");
    }
    println!("{}", serde_json::to_string_pretty(&dossier)?);
    Ok(())
}
