//! fleet: live aircraft fleet server + CLI.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};

use fleet_core::config::{self, Config};
use fleet_core::{now_millis, AircraftRecord, HeadingPolicy};

mod broadcast;
mod sweeper;
mod web;

#[derive(Parser)]
#[command(name = "fleet", version, about = "Live aircraft fleet tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest API, WebSocket feed and staleness sweeper
    Serve(ServeArgs),

    /// Print the live fleet of a running server
    Show {
        /// Base URL of the fleet server
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Bind address
    #[arg(long, env = "FLEET_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(long, env = "HTTP_PORT")]
    port: Option<u16>,

    /// Milliseconds between staleness sweeps
    #[arg(long, env = "FLEET_SWEEP_INTERVAL_MS", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_ms: Option<u64>,

    /// Idle milliseconds after which an aircraft is dropped
    #[arg(long, env = "FLEET_IDLE_THRESHOLD_MS", value_parser = clap::value_parser!(u64).range(1..))]
    idle_threshold_ms: Option<u64>,

    /// Heading source that wins when both exist: derived | reported | moving
    #[arg(long, env = "FLEET_HEADING_POLICY")]
    heading_policy: Option<HeadingPolicy>,

    /// Config file (default ~/.fleet/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Config file path (default ~/.fleet/config.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the effective config
    Show {
        /// Config file path (default ~/.fleet/config.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => cmd_serve(args).await,
        Commands::Show { url } => cmd_show(&url).await,
        Commands::Config { action } => match action {
            ConfigAction::Init { force, path } => cmd_config_init(path, force),
            ConfigAction::Show { path } => cmd_config_show(path),
        },
    }
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

fn load(path: Option<&Path>) -> Result<Config, fleet_core::FleetError> {
    match path {
        Some(p) => config::load_config_from(p),
        None => config::load_config(),
    }
}

/// Layer CLI/env overrides on top of the file config.
fn apply_overrides(mut config: Config, args: &ServeArgs) -> Config {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ms) = args.sweep_interval_ms {
        config.fleet.sweep_interval_ms = ms;
    }
    if let Some(ms) = args.idle_threshold_ms {
        config.fleet.idle_threshold_ms = ms;
    }
    if let Some(policy) = args.heading_policy {
        config.fleet.heading_policy = policy;
    }
    config
}

async fn cmd_serve(args: ServeArgs) {
    fleet_core::runtime::init_logging(args.verbose);

    let config = match load(args.config.as_deref()) {
        Ok(c) => apply_overrides(c, &args),
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = web::serve(config).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

async fn fetch_fleet(url: &str) -> Result<Vec<AircraftRecord>, reqwest::Error> {
    let endpoint = format!("{}/api/aircraft", url.trim_end_matches('/'));
    reqwest::get(endpoint)
        .await?
        .error_for_status()?
        .json::<Vec<AircraftRecord>>()
        .await
}

fn fleet_table(aircraft: &[AircraftRecord], now: u64) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Identity", "Callsign", "Alt (ft)", "Speed", "Hdg", "Lat", "Lon", "Age (s)",
    ]);

    for ac in aircraft {
        table.add_row(vec![
            Cell::new(&ac.identity),
            Cell::new(&ac.callsign),
            Cell::new(format!("{:.0}", ac.altitude)),
            Cell::new(format!("{:.0}", ac.ground_speed)),
            Cell::new(format!("{:.1}", ac.heading)),
            Cell::new(format!("{:.4}", ac.position.latitude)),
            Cell::new(format!("{:.4}", ac.position.longitude)),
            Cell::new(format!("{:.1}", ac.idle_for(now) as f64 / 1000.0)),
        ]);
    }
    table
}

async fn cmd_show(url: &str) {
    let aircraft = match fetch_fleet(url).await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error fetching fleet from {url}: {e}");
            std::process::exit(1);
        }
    };

    if aircraft.is_empty() {
        println!("No aircraft tracked.");
        return;
    }

    println!("{}", fleet_table(&aircraft, now_millis()));
    println!("{} aircraft", aircraft.len());
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init(path: Option<PathBuf>, force: bool) {
    let path = path.unwrap_or_else(config::config_file);
    if path.exists() && !force {
        eprintln!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
        std::process::exit(1);
    }

    match config::save_config_to(&Config::default(), &path) {
        Ok(()) => println!("Wrote {}", path.display()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config_show(path: Option<PathBuf>) {
    match load(path.as_deref()) {
        Ok(c) => print!("{}", config::serialize_config(&c)),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Position;

    #[test]
    fn test_cli_parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "fleet",
            "serve",
            "--port",
            "8080",
            "--idle-threshold-ms",
            "30000",
            "--heading-policy",
            "reported",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.idle_threshold_ms, Some(30_000));
        assert_eq!(args.heading_policy, Some(HeadingPolicy::PreferReported));
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        let parsed = Cli::try_parse_from(["fleet", "serve", "--sweep-interval-ms", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        let parsed = Cli::try_parse_from(["fleet", "serve", "--heading-policy", "sideways"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = ServeArgs {
            host: Some("0.0.0.0".into()),
            sweep_interval_ms: Some(1_000),
            ..Default::default()
        };
        let config = apply_overrides(Config::default(), &args);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, Config::default().server.port);
        assert_eq!(config.fleet.sweep_interval_ms, 1_000);
        assert_eq!(
            config.fleet.idle_threshold_ms,
            Config::default().fleet.idle_threshold_ms
        );
    }

    #[test]
    fn test_apply_overrides_empty_keeps_file_config() {
        let mut file = Config::default();
        file.server.port = 9000;
        file.fleet.heading_policy = HeadingPolicy::PreferReported;

        let config = apply_overrides(file.clone(), &ServeArgs::default());
        assert_eq!(config, file);
    }

    #[test]
    fn test_fleet_table() {
        let rec = AircraftRecord {
            identity: "ABC123".into(),
            callsign: "UAL1".into(),
            position: Position::new(44.5, -91.25),
            altitude: 31000.0,
            ground_speed: 450.0,
            heading: 270.0,
            last_seen: 1_000,
            previous_position: None,
        };
        let rendered = fleet_table(&[rec], 3_500).to_string();
        assert!(rendered.contains("ABC123"));
        assert!(rendered.contains("UAL1"));
        assert!(rendered.contains("44.5000"));
        assert!(rendered.contains("2.5"));
    }
}
