use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

/// Where an object store lives. Picks the backend at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A local directory; buckets are its subdirectories.
    Filesystem { root: PathBuf },
    /// An S3-compatible service. `None` fields defer to the AWS environment.
    Remote {
        region: Option<String>,
        endpoint: Option<String>,
    },
}

impl FromStr for StoreLocation {
    type Err = String;

    /// Accepts `s3://`, `s3://{region}`, `file://{path}` or a bare path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(region) = s.strip_prefix("s3://") {
            let region = region.trim_end_matches('/');
            return Ok(StoreLocation::Remote {
                region: (!region.is_empty()).then(|| region.to_string()),
                endpoint: None,
            });
        }
        let path = s.strip_prefix("file://").unwrap_or(s);
        if path.is_empty() {
            return Err("store location needs a directory path".into());
        }
        Ok(StoreLocation::Filesystem {
            root: PathBuf::from(path),
        })
    }
}

/// Gateway configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub root_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Serve a local directory as an S3-style object store")]
pub struct Args {
    /// Host to bind to (overrides BUCKETFS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKETFS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one subdirectory per bucket (overrides BUCKETFS_ROOT)
    #[arg(long)]
    pub root_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse())
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("BUCKETFS_HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let env_port = match env::var("BUCKETFS_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing BUCKETFS_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 9000,
            Err(err) => return Err(err).context("reading BUCKETFS_PORT"),
        };
        let env_root = env::var_os("BUCKETFS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/buckets"));

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            root_dir: args.root_dir.unwrap_or(env_root),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_locations_parse() {
        assert_eq!(
            "s3://eu-west-1".parse::<StoreLocation>(),
            Ok(StoreLocation::Remote {
                region: Some("eu-west-1".into()),
                endpoint: None,
            })
        );
        assert_eq!(
            "s3://".parse::<StoreLocation>(),
            Ok(StoreLocation::Remote {
                region: None,
                endpoint: None,
            })
        );
        assert_eq!(
            "file:///srv/objects".parse::<StoreLocation>(),
            Ok(StoreLocation::Filesystem {
                root: PathBuf::from("/srv/objects"),
            })
        );
        assert_eq!(
            "relative/dir".parse::<StoreLocation>(),
            Ok(StoreLocation::Filesystem {
                root: PathBuf::from("relative/dir"),
            })
        );
        assert!("file://".parse::<StoreLocation>().is_err());
    }

    #[test]
    fn cli_arguments_override_defaults() {
        let args = Args::parse_from([
            "bucketfs",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--root-dir",
            "/tmp/buckets",
        ]);
        let cfg = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.root_dir, PathBuf::from("/tmp/buckets"));
    }
}
