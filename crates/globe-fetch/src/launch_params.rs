//! Launch parameter parsing for the tile fetcher.
//!
//! Servers come from, in increasing priority: the built-in defaults, the
//! `--config` file, then `--server` flags.

use std::path::PathBuf;

use clap::Parser;
use globe_stream::{Error, LayerConfig, Result};

/// Servers used when neither a config file nor `--server` names any.
pub const DEFAULT_SERVERS: [&str; 4] = [
    "http://mt0.google.com",
    "http://mt1.google.com",
    "http://mt2.google.com",
    "http://mt3.google.com",
];

/// Default output directory.
const DEFAULT_OUT: &str = "tiles";

/// Default in-memory cache budget in MiB.
const DEFAULT_CACHE_MB: usize = 64;

#[derive(Parser, Debug)]
#[command(about = "Download imagery tiles by quadcode")]
pub struct CliArgs {
    /// Tile server base URL. Repeat to build a rotation pool.
    #[arg(long = "server", value_name = "URL")]
    servers: Vec<String>,

    /// JSON layer configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory tiles are written to.
    #[arg(long, default_value = DEFAULT_OUT)]
    out: PathBuf,

    /// In-memory cache size in MiB. Zero disables caching.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    cache_mb: usize,

    /// Extra attempts for transient network failures.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Quadcodes of the tiles to fetch. An empty string is the root tile.
    #[arg(required = true)]
    quadcodes: Vec<String>,
}

/// Resolved launch parameters.
#[derive(Debug)]
pub struct LaunchParams {
    /// Layer configuration with the final server list.
    pub layer: LayerConfig,
    /// Output directory.
    pub out: PathBuf,
    /// Cache budget in bytes, if caching is enabled.
    pub cache_bytes: Option<usize>,
    /// Retry budget per tile.
    pub retries: u32,
    /// Tiles to fetch, in order.
    pub quadcodes: Vec<String>,
}

impl CliArgs {
    /// Merge the arguments with the config file they name, if any.
    pub fn resolve(self) -> Result<LaunchParams> {
        let file = match &self.config {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| Error::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };
        self.resolve_with(file.as_deref())
    }

    fn resolve_with(self, config_json: Option<&str>) -> Result<LaunchParams> {
        let mut layer = match config_json {
            Some(json) => LayerConfig::from_json(json)?,
            None => LayerConfig::default(),
        };
        if !self.servers.is_empty() {
            layer.servers = self.servers;
        }
        if layer.servers.is_empty() {
            layer.servers = DEFAULT_SERVERS.iter().map(ToString::to_string).collect();
        }

        Ok(LaunchParams {
            layer,
            out: self.out,
            cache_bytes: (self.cache_mb > 0).then(|| self.cache_mb << 20),
            retries: self.retries,
            quadcodes: self.quadcodes,
        })
    }
}

/// Parse launch parameters from the command line.
pub fn parse() -> Result<LaunchParams> {
    CliArgs::parse().resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("globe-fetch").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = args(&["0123"]).resolve_with(None).unwrap();
        assert_eq!(params.layer.servers.len(), 4);
        assert_eq!(params.layer.servers[0], "http://mt0.google.com");
        assert_eq!(params.out, PathBuf::from("tiles"));
        assert_eq!(params.cache_bytes, Some(64 << 20));
        assert_eq!(params.retries, 0);
        assert_eq!(params.quadcodes, vec!["0123".to_string()]);
    }

    #[test]
    fn test_repeated_server_flags() {
        let params = args(&["--server", "http://a", "--server", "http://b", "0", "1"])
            .resolve_with(None)
            .unwrap();
        assert_eq!(params.layer.servers, vec!["http://a", "http://b"]);
        assert_eq!(params.quadcodes, vec!["0", "1"]);
    }

    #[test]
    fn test_config_file_servers() {
        let params = args(&["0"])
            .resolve_with(Some(r#"{ "servers": ["http://x", "http://y", "http://z"] }"#))
            .unwrap();
        assert_eq!(params.layer.servers.len(), 3);
    }

    #[test]
    fn test_server_flags_override_config() {
        let params = args(&["--server", "http://cli", "0"])
            .resolve_with(Some(r#"{ "servers": ["http://file"] }"#))
            .unwrap();
        assert_eq!(params.layer.servers, vec!["http://cli"]);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let err = args(&["0"]).resolve_with(Some("{ not json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_zero_cache_disables_caching() {
        let params = args(&["--cache-mb", "0", "--retries", "2", "0"])
            .resolve_with(None)
            .unwrap();
        assert_eq!(params.cache_bytes, None);
        assert_eq!(params.retries, 2);
    }

    #[test]
    fn test_quadcodes_required() {
        assert!(CliArgs::try_parse_from(["globe-fetch"]).is_err());
    }
}
