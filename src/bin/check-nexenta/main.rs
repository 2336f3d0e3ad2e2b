//! Check the health and performance of a Nexenta storage appliance
//!
//! Talks to the appliance's NMS API and SNMP agent, using the credentials
//! and thresholds configured for the host in the config file. Prints one
//! line of Nagios plugin output and exits with the matching status.

mod args;

use std::io;

use tracing_subscriber::EnvFilter;

use nexenta_plugins::api::Retry;
use nexenta_plugins::checks::{self, resolve_address, CheckError, Live, Outcome};
use nexenta_plugins::config::{resolve_path, Config};
use nexenta_plugins::Status;

use crate::args::Args;

/// Where the log filter comes from, e.g. `CHECK_NEXENTA_LOG=debug`
const LOG_ENV: &str = "CHECK_NEXENTA_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn check(args: &Args) -> Result<Outcome, CheckError> {
    let ip = resolve_address(&args.hostname)?;
    let config = Config::load(&resolve_path(args.config.as_deref()))?;
    let host = config.host(&args.hostname)?;
    let mut connector = Live::new(host.clone(), ip);
    checks::run(
        &host,
        &config,
        &args.kinds(),
        &mut connector,
        Retry::default(),
    )
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    init_logging();
    let args = Args::parse();
    match check(&args) {
        Ok(outcome) => {
            println!("{}", outcome.output);
            outcome.status.exit();
        }
        Err(e) => {
            println!("CRITICAL: {}", e);
            Status::Critical.exit();
        }
    }
}
