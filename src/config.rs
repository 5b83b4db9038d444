//! Server configuration
//!
//! Command-line flags, each backed by a `PAIRCHAT_*` environment variable.
//! An explicit flag beats the environment, which beats the default.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Channel buffer size for server commands
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Channel buffer size for each client's outbound frames
pub const DEFAULT_CLIENT_BUFFER: usize = 32;

/// Log filter used when RUST_LOG is unset
pub const DEFAULT_LOG: &str = "pairchat_server=info";

/// Interest-matched 1:1 chat server
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pairchat_server")]
#[command(about = "Anonymous interest-matched 1:1 chat server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(env = "PAIRCHAT_ADDR", default_value = DEFAULT_ADDR)]
    pub bind_addr: String,

    /// Command queue size of the server actor
    #[arg(
        long,
        env = "PAIRCHAT_CHANNEL_BUFFER",
        default_value_t = DEFAULT_CHANNEL_BUFFER,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub channel_buffer: usize,

    /// Outbound frame queue size of each client
    #[arg(
        long,
        env = "PAIRCHAT_CLIENT_BUFFER",
        default_value_t = DEFAULT_CLIENT_BUFFER,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub client_buffer: usize,

    /// Snapshot directory; persistence is off when unset
    #[arg(long, env = "PAIRCHAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log", env = "PAIRCHAT_LOG", default_value = DEFAULT_LOG)]
    pub log_filter: String,
}

impl ServerConfig {
    /// Read the process arguments and environment, exiting on bad input
    pub fn from_env() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["pairchat_server"]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_ADDR);
        assert_eq!(config.channel_buffer, DEFAULT_CHANNEL_BUFFER);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_positional_addr_and_flags() {
        let config = ServerConfig::try_parse_from([
            "pairchat_server",
            "0.0.0.0:5000",
            "--channel-buffer",
            "64",
            "--data-dir",
            "/tmp/pairchat",
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.channel_buffer, 64);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/pairchat")));
    }

    #[test]
    fn test_env_then_flag_precedence() {
        // Only this test touches these two variables
        std::env::set_var("PAIRCHAT_CLIENT_BUFFER", "64");
        std::env::set_var("PAIRCHAT_LOG", "debug");

        let from_env = ServerConfig::try_parse_from(["pairchat_server"]).unwrap();
        let from_flag =
            ServerConfig::try_parse_from(["pairchat_server", "--client-buffer", "8"]).unwrap();

        std::env::remove_var("PAIRCHAT_CLIENT_BUFFER");
        std::env::remove_var("PAIRCHAT_LOG");

        assert_eq!(from_env.client_buffer, 64);
        assert_eq!(from_env.log_filter, "debug");
        assert_eq!(from_flag.client_buffer, 8);
        assert_eq!(from_flag.log_filter, "debug");
    }

    #[test]
    fn test_invalid_buffer() {
        assert!(ServerConfig::try_parse_from(["pairchat_server", "--channel-buffer", "0"]).is_err());
        assert!(
            ServerConfig::try_parse_from(["pairchat_server", "--channel-buffer", "zero"]).is_err()
        );
    }
}
