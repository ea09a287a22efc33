#![doc = include_str!("../README.md")]

mod cli;

use std::io::{BufWriter, Write};

use clap::Parser;
use cli::config::{CliArgs, CliConfig, StoreConfig};
use cli::telemetry::init_telemetry;
use rangeid::{FileStore, IdGenerator, OptimisticStore};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    match &config.store {
        StoreConfig::File { dir } => {
            let store = FileStore::open(dir)?;
            issue(&IdGenerator::with_config(store, config.generator), &config)
        }
        #[cfg(feature = "s3")]
        StoreConfig::S3 {
            bucket,
            endpoint,
            region,
        } => {
            let store = match endpoint {
                Some(endpoint) => rangeid::S3Store::with_endpoint(bucket, endpoint, region)?,
                None => rangeid::S3Store::from_env(bucket)?,
            };
            store.init()?;
            issue(&IdGenerator::with_config(store, config.generator), &config)
        }
        #[cfg(not(feature = "s3"))]
        StoreConfig::S3 { .. } => {
            anyhow::bail!("the s3 backend is not available; rebuild with `--features s3`")
        }
    }
}

fn issue<S>(generator: &IdGenerator<S>, config: &CliConfig) -> anyhow::Result<()>
where
    S: OptimisticStore,
{
    let mut out = BufWriter::new(std::io::stdout().lock());
    for _ in 0..config.count {
        let id = generator.next_id(&config.scope)?;
        writeln!(out, "{id}")?;
    }
    out.flush()?;

    tracing::debug!(
        scope = %config.scope,
        window = ?generator.window(&config.scope)?,
        "issued {} ids",
        config.count
    );
    Ok(())
}

fn log_startup_info(config: &CliConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Issuing IDs with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Issuing {} IDs for scope `{}` (range size {})",
            config.count,
            config.scope,
            config.generator.range_size
        );
    }
}
