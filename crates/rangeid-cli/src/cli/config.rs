use core::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use rangeid::{DEFAULT_MAX_WRITE_ATTEMPTS, DEFAULT_RANGE_SIZE, GeneratorConfig};

/// Where the shared counters live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// One file per scope in a local or shared directory.
    File,
    /// One object per scope in an S3 bucket (requires the `s3` feature).
    S3,
}

/// Runtime configuration for the `rangeid` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is honoured), with defaults matching
/// the library's.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rangeid",
    version,
    about = "Issue scoped, monotonic IDs from a shared counter store"
)]
pub struct CliArgs {
    /// Scope (sequence name) to issue IDs for.
    pub scope: String,

    /// Number of IDs to issue, printed one per line.
    ///
    /// Environment variable: `RANGEID_COUNT`
    #[arg(short = 'n', long, env = "RANGEID_COUNT", default_value_t = 1)]
    pub count: usize,

    /// Storage backend holding the counters.
    ///
    /// Environment variable: `RANGEID_BACKEND`
    #[arg(long, env = "RANGEID_BACKEND", value_enum, default_value_t = Backend::File)]
    pub backend: Backend,

    /// Directory holding counter files (file backend).
    ///
    /// Environment variable: `RANGEID_STORE_DIR`
    #[arg(long, env = "RANGEID_STORE_DIR", default_value = "./rangeid-data")]
    pub store_dir: PathBuf,

    /// Bucket holding counter objects (s3 backend).
    ///
    /// Environment variable: `RANGEID_BUCKET`
    #[arg(long, env = "RANGEID_BUCKET")]
    pub bucket: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO or LocalStack URL (s3 backend).
    ///
    /// Environment variable: `RANGEID_ENDPOINT`
    #[arg(long, env = "RANGEID_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Region used with a custom endpoint (s3 backend).
    ///
    /// Environment variable: `RANGEID_REGION`
    #[arg(long, env = "RANGEID_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Number of IDs claimed from the store per refill.
    ///
    /// Larger ranges mean fewer store round trips, but every unused ID of a
    /// range is lost when the process exits.
    ///
    /// Environment variable: `RANGEID_RANGE_SIZE`
    #[arg(long, env = "RANGEID_RANGE_SIZE", default_value_t = DEFAULT_RANGE_SIZE.get())]
    pub range_size: u32,

    /// Conditional writes attempted per refill before giving up.
    ///
    /// Environment variable: `RANGEID_MAX_WRITE_ATTEMPTS`
    #[arg(long, env = "RANGEID_MAX_WRITE_ATTEMPTS", default_value_t = DEFAULT_MAX_WRITE_ATTEMPTS)]
    pub max_write_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    File {
        dir: PathBuf,
    },
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: String,
    },
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub scope: String,
    pub count: usize,
    pub store: StoreConfig,
    pub generator: GeneratorConfig,
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.scope.is_empty() {
            bail!("SCOPE must not be empty");
        }

        if args.count == 0 {
            bail!("RANGEID_COUNT must be greater than 0");
        }

        let Some(range_size) = NonZeroU32::new(args.range_size) else {
            bail!("RANGEID_RANGE_SIZE must be greater than 0");
        };

        if args.max_write_attempts == 0 {
            bail!("RANGEID_MAX_WRITE_ATTEMPTS must be greater than 0");
        }

        let store = match args.backend {
            Backend::File => StoreConfig::File {
                dir: args.store_dir,
            },
            Backend::S3 => {
                if cfg!(not(feature = "s3")) {
                    bail!("the s3 backend is not available; rebuild with `--features s3`");
                }
                let Some(bucket) = args.bucket.filter(|b| !b.is_empty()) else {
                    bail!("RANGEID_BUCKET is required for the s3 backend");
                };
                StoreConfig::S3 {
                    bucket,
                    endpoint: args.endpoint,
                    region: args.region,
                }
            }
        };

        Ok(Self {
            scope: args.scope,
            count: args.count,
            store,
            generator: GeneratorConfig::default()
                .with_range_size(range_size)
                .with_max_write_attempts(args.max_write_attempts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<CliConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("rangeid").chain(args.iter().copied()))?;
        CliConfig::try_from(args)
    }

    #[test]
    fn defaults_match_library() {
        let config = parse(&["orders"]).unwrap();
        assert_eq!(config.scope, "orders");
        assert_eq!(config.count, 1);
        assert_eq!(config.generator, GeneratorConfig::default());
        assert_eq!(
            config.store,
            StoreConfig::File {
                dir: PathBuf::from("./rangeid-data")
            }
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse(&[
            "orders",
            "-n",
            "5",
            "--store-dir",
            "/tmp/ids",
            "--range-size",
            "1000",
            "--max-write-attempts",
            "3",
        ])
        .unwrap();
        assert_eq!(config.count, 5);
        assert_eq!(config.generator.range_size.get(), 1000);
        assert_eq!(config.generator.max_write_attempts, 3);
        assert_eq!(
            config.store,
            StoreConfig::File {
                dir: PathBuf::from("/tmp/ids")
            }
        );
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(parse(&["orders", "--range-size", "0"]).is_err());
        assert!(parse(&["orders", "--max-write-attempts", "0"]).is_err());
        assert!(parse(&["orders", "-n", "0"]).is_err());
        assert!(parse(&[""]).is_err());
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let err = parse(&["orders", "--backend", "s3"]).unwrap_err();
        if cfg!(feature = "s3") {
            assert!(err.to_string().contains("RANGEID_BUCKET"));
        } else {
            assert!(err.to_string().contains("--features s3"));
        }
    }
}
