use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;

/// Runtime configuration for the `numera-server` binary.
///
/// Every value is parsed from CLI arguments or environment variables, with
/// defaults suitable for a local deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "numera-server",
    version,
    about = "A RESP service dispensing identifiers from named dispensers"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `NUMERA_ADDR`
    #[arg(long, env = "NUMERA_ADDR", default_value_t = String::from("127.0.0.1:6380"))]
    pub addr: String,

    /// Directory holding the `dispensers.json` snapshot. Created if absent.
    ///
    /// Environment variable: `NUMERA_DATA_DIR`
    #[arg(long, env = "NUMERA_DATA_DIR", default_value_t = String::from("./data"))]
    pub data_dir: String,

    /// Idle read timeout per connection, in seconds.
    ///
    /// Environment variable: `NUMERA_READ_TIMEOUT_SECS`
    #[arg(long, env = "NUMERA_READ_TIMEOUT_SECS", default_value_t = 60)]
    pub read_timeout_secs: u64,

    /// How long shutdown waits for in-flight connections to drain, in
    /// seconds.
    ///
    /// Environment variable: `NUMERA_SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "NUMERA_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub data_dir: PathBuf,
    pub read_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.addr.is_empty() {
            bail!("NUMERA_ADDR must not be empty");
        }
        if args.data_dir.is_empty() {
            bail!("NUMERA_DATA_DIR must not be empty");
        }
        if args.read_timeout_secs == 0 {
            bail!("NUMERA_READ_TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            addr: args.addr,
            data_dir: PathBuf::from(args.data_dir),
            read_timeout: Duration::from_secs(args.read_timeout_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}
