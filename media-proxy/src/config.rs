//! Command line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it, so the proxy can run unchanged from a shell or a
//! container.

use bridge_traits::time::LogLevel;
use clap::Parser;
use core_runtime::logging::{LogFormat, LoggingConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProxyError, Result};

pub const DEFAULT_UPSTREAM: &str = "https://dfbf9976-22e3-4bb2-ae02-286dfd0d7c42.mock.pstmn.io";
pub const DEFAULT_PRAVATAR_BASE: &str = "https://i.pravatar.cc";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "media-proxy",
    version,
    about = "Caching reverse proxy for feed and reels media"
)]
pub struct ProxyConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Base URL of the upstream feed API
    #[arg(long = "upstream", env = "MOCK_API_BASE", default_value = DEFAULT_UPSTREAM)]
    pub upstream_base: String,

    /// Base URL of the avatar generator behind `/pravatar/:id`
    #[arg(long, env = "PRAVATAR_BASE", default_value = DEFAULT_PRAVATAR_BASE)]
    pub pravatar_base: String,

    /// Directory holding cached media files
    #[arg(long, env = "CACHE_DIR", default_value = "./cache/images")]
    pub cache_dir: PathBuf,

    /// Timeout for every upstream and media request, in seconds
    #[arg(long = "timeout-secs", env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Verify upstream TLS certificates
    #[arg(long, env = "STRICT_TLS")]
    pub strict_tls: bool,

    /// Also cache `reel_video` files
    #[arg(long, env = "CACHE_VIDEOS")]
    pub cache_videos: bool,

    /// trace, debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// pretty, json or compact
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl ProxyConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upstream_base(&self) -> &str {
        self.upstream_base.trim_end_matches('/')
    }

    pub fn pravatar_base(&self) -> &str {
        self.pravatar_base.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("upstream base URL", &self.upstream_base),
            ("pravatar base URL", &self.pravatar_base),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| ProxyError::Config(format!("Invalid {}: {}", name, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ProxyError::Config(format!(
                    "{} must use http or https, got {}",
                    name,
                    parsed.scheme()
                )));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ProxyError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn logging_config(&self) -> Result<LoggingConfig> {
        let level: LogLevel = self
            .log_level
            .parse()
            .map_err(|e| ProxyError::Config(format!("{}", e)))?;
        let mut config = LoggingConfig::default().with_level(level);

        if let Some(format) = &self.log_format {
            let format: LogFormat = format
                .parse()
                .map_err(|e| ProxyError::Config(format!("{}", e)))?;
            config = config.with_format(format);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ProxyConfig {
        let mut argv = vec!["media-proxy"];
        argv.extend_from_slice(args);
        ProxyConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--upstream",
            "http://localhost:9000/",
            "--cache-dir",
            "/tmp/media",
            "--timeout-secs",
            "5",
            "--strict-tls",
            "--cache-videos",
        ]);

        assert_eq!(config.listen_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.upstream_base(), "http://localhost:9000");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/media"));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.strict_tls);
        assert!(config.cache_videos);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = parse(&["--upstream", "ftp://example.com"]);
        assert!(matches!(config.validate(), Err(ProxyError::Config(_))));

        let config = parse(&["--upstream", "http://localhost:9000", "--timeout-secs", "0"]);
        assert!(matches!(config.validate(), Err(ProxyError::Config(_))));
    }

    #[test]
    fn test_logging_config() {
        let config = parse(&["--log-level", "debug", "--log-format", "json"]);
        let logging = config.logging_config().unwrap();
        assert_eq!(logging.level, LogLevel::Debug);
        assert_eq!(logging.format, LogFormat::Json);

        let config = parse(&["--log-level", "loud"]);
        assert!(config.logging_config().is_err());
    }
}
