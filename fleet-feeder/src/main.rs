//! fleet-feeder: forwards a local dump1090 aircraft list to a fleet server.

use std::time::Duration;

use clap::Parser;
use fleet_core::runtime::{init_logging, shutdown_signal};

mod collect;

use collect::{Collector, FeederConfig};

#[derive(Parser, Debug)]
#[command(
    name = "fleet-feeder",
    version,
    about = "Poll dump1090 and feed aircraft to a fleet server"
)]
struct Cli {
    /// dump1090 aircraft JSON URL
    #[arg(long, env = "FLEET_FEEDER_SOURCE", default_value = "http://127.0.0.1:8080/data.json")]
    source: String,

    /// Fleet server ingest URL
    #[arg(long, env = "FLEET_FEEDER_TARGET", default_value = "http://127.0.0.1:5000/api/aircraft")]
    target: String,

    /// Seconds between polls
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Fetch attempts per poll
    #[arg(long, default_value = "3")]
    retries: u32,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn feeder_config(&self) -> FeederConfig {
        FeederConfig {
            source: self.source.clone(),
            target: self.target.clone(),
            interval: Duration::from_secs(self.interval_secs),
            retries: self.retries,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let collector = match Collector::new(cli.feeder_config()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        source = %cli.source,
        target = %cli.target,
        interval_secs = cli.interval_secs,
        "feeder started"
    );
    collector.run(shutdown_signal()).await;
}
