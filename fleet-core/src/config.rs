//! Configuration file management for the fleet server.
//!
//! Reads/writes `~/.fleet/config.yaml` with the listen address, the sweep
//! timing parameters, the heading policy and the subscriber buffer size.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reconcile::HeadingPolicy;
use crate::types::{FleetError, Millis};

/// Sweep and idle defaults, in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: Millis = 15_000;
pub const DEFAULT_IDLE_THRESHOLD_MS: Millis = 15_000;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub fleet: FleetConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    /// How often the sweeper runs.
    pub sweep_interval_ms: Millis,
    /// How long an aircraft may go unseen before eviction.
    pub idle_threshold_ms: Millis,
    pub heading_policy: HeadingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5000,
            },
            fleet: FleetConfig::default(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            heading_policy: HeadingPolicy::default(),
        }
    }
}

impl FleetConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Get the config directory path (`~/.fleet/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".fleet")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.fleet/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Result<Config, FleetError> {
    load_config_from(&config_file())
}

/// Load config from an explicit path; a missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, FleetError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| FleetError::Config(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), FleetError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| FleetError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| FleetError::Config(e.to_string()))
}

/// Parse simple YAML-like config text.
///
/// Unknown sections and keys are ignored; malformed values are errors.
pub fn parse_config(text: &str) -> Result<Config, FleetError> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (lineno, line) in text.lines().enumerate() {
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        let bad = |what: &str| FleetError::Config(format!("line {}: invalid {what}: {val}", lineno + 1));

        match (current_section.as_deref(), key) {
            (Some("server"), "host") => {
                if let Some(v) = parse_string_value(val) {
                    config.server.host = v;
                }
            }
            (Some("server"), "port") => {
                config.server.port = val.parse().map_err(|_| bad("port"))?;
            }
            (Some("fleet"), "sweep_interval_ms") => {
                config.fleet.sweep_interval_ms = parse_millis(val).ok_or_else(|| bad(key))?;
            }
            (Some("fleet"), "idle_threshold_ms") => {
                config.fleet.idle_threshold_ms = parse_millis(val).ok_or_else(|| bad(key))?;
            }
            (Some("fleet"), "heading_policy") => {
                let v = parse_string_value(val).ok_or_else(|| bad(key))?;
                config.fleet.heading_policy = v.parse()?;
            }
            _ => {}
        }
    }

    Ok(config)
}

fn strip_comment(line: &str) -> &str {
    // Only whole-line or ` #` trailing comments; quoted values may contain '#'
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(i) if !line[..i].contains('"') => &line[..i],
        _ => line,
    }
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_millis(val: &str) -> Option<Millis> {
    val.replace('_', "").parse::<Millis>().ok().filter(|ms| *ms > 0)
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# fleet server configuration".to_string(), String::new()];

    lines.push("server:".into());
    lines.push(format!("  host: \"{}\"", config.server.host));
    lines.push(format!("  port: {}", config.server.port));
    lines.push(String::new());

    lines.push("fleet:".into());
    lines.push(format!("  sweep_interval_ms: {}", config.fleet.sweep_interval_ms));
    lines.push(format!("  idle_threshold_ms: {}", config.fleet.idle_threshold_ms));
    lines.push(format!("  heading_policy: {}", config.fleet.heading_policy));
    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.fleet.sweep_interval_ms, 15_000);
        assert_eq!(config.fleet.idle_threshold_ms, 15_000);
        assert_eq!(config.fleet.heading_policy, HeadingPolicy::PreferDerived);
        assert_eq!(config.fleet.sweep_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
# local overrides
server:
  host: "0.0.0.0"
  port: 8080

fleet:
  sweep_interval_ms: 5000
  idle_threshold_ms: 30_000   # half a minute
  heading_policy: reported

broadcast:
  subscriber_buffer: 2   # unknown section, ignored
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.fleet.sweep_interval_ms, 5000);
        assert_eq!(config.fleet.idle_threshold_ms, 30_000);
        assert_eq!(config.fleet.heading_policy, HeadingPolicy::PreferReported);
    }

    #[test]
    fn test_parse_config_partial_keeps_defaults() {
        let config = parse_config("fleet:\n  idle_threshold_ms: 60000\n").unwrap();
        assert_eq!(config.fleet.idle_threshold_ms, 60_000);
        assert_eq!(config.fleet.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_parse_config_rejects_bad_values() {
        assert!(parse_config("server:\n  port: http\n").is_err());
        assert!(parse_config("fleet:\n  sweep_interval_ms: 0\n").is_err());
        assert!(parse_config("fleet:\n  heading_policy: sideways\n").is_err());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.server.host = "0.0.0.0".into();
        config.fleet.idle_threshold_ms = 20_000;
        config.fleet.heading_policy = HeadingPolicy::PreferDerivedWhenMoving;

        let parsed = parse_config(&serialize_config(&config)).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.server.port = 9090;
        save_config_to(&config, &path).unwrap();

        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
