//! AtlasRDB Admin Tool
//!
//! Offline inspection and maintenance of a store directory.

use std::path::PathBuf;

use atlasrdb::codec::{decode_key, KeyKind, KeyObject};
use atlasrdb::{Config, Context, KeyValueEngine, OrderedEngine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasRDB admin tool
#[derive(Parser, Debug)]
#[command(name = "atlasrdb-tool")]
#[command(about = "Inspect and maintain an AtlasRDB store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./atlasrdb_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every key in comparator order
    Dump {
        /// Stop after this many keys
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print engine statistics
    Stats,

    /// Compact the whole keyspace and write a checkpoint
    Compact,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasrdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("AtlasRDB tool v{}", atlasrdb::VERSION);

    let config = Config::builder().data_dir(&args.data_dir).build();
    let engine: OrderedEngine = match OrderedEngine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Commands::Dump { limit } => dump(&engine, limit),
        Commands::Stats => {
            println!("{}", engine.stats());
            Ok(())
        }
        Commands::Compact => engine.compact_range(None, None),
    };

    if let Err(e) = result.and_then(|()| engine.close()) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn dump(engine: &OrderedEngine, limit: Option<usize>) -> atlasrdb::Result<()> {
    let mut ctx = Context::new();
    let mut iter = engine.find(&mut ctx, &[], false)?;
    iter.seek_to_first();

    let mut printed = 0usize;
    while iter.valid() && limit.map_or(true, |l| printed < l) {
        match decode_key(iter.key(), None) {
            Some(key) => println!("{}  ({} value bytes)", describe(&key), iter.value().len()),
            None => println!("<undecodable> {:02x?}", iter.key()),
        }
        printed += 1;
        iter.next();
    }
    tracing::info!(printed, "Dump complete");
    Ok(())
}

/// `db/type/key/payload`
fn describe(key: &KeyObject) -> String {
    let payload = match &key.kind {
        KeyKind::HashField { field } => field.as_string(),
        KeyKind::ListElement { score } => score.as_string(),
        KeyKind::SetElement { member } => member.as_string(),
        KeyKind::ZSetElement { score, member } => {
            format!("{}:{}", score.as_string(), member.as_string())
        }
        KeyKind::ZSetElementNode { member } => member.as_string(),
        KeyKind::BitSetElement { index } => index.to_string(),
        KeyKind::KeyExpiration { expireat } => expireat.to_string(),
        _ => String::new(),
    };
    format!(
        "{}/{}/{}/{}",
        key.db,
        key.key_type().name(),
        String::from_utf8_lossy(&key.key),
        payload
    )
}
