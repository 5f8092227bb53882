use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};

/// Per-run analysis switches, threaded explicitly through the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzeConfig {
    pub strip_query_params: bool,
    pub include_gateway_services: bool,
    pub include_service_mesh: bool,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            strip_query_params: true,
            include_gateway_services: false,
            include_service_mesh: false,
        }
    }
}

/// Tool-level settings: where share snapshots live, how long they are kept,
/// and how many traces are analyzed at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub share_dir: PathBuf,
    pub share_ttl: Duration,
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_root = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(home).join(".local/share"));

        Self {
            share_dir: data_root.join("tracelens/shares"),
            share_ttl: Duration::from_secs(60 * 60 * 24),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides();
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        apply_overrides(&mut cfg, load_env_overrides(), "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    share_dir: Option<PathBuf>,
    share_ttl: Option<String>,
    workers: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACELENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracelens/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracelensError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracelensError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        share_dir: env::var("TRACELENS_SHARE_DIR").ok().map(PathBuf::from),
        share_ttl: env::var("TRACELENS_SHARE_TTL").ok(),
        workers: env::var("TRACELENS_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok()),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.share_dir {
        cfg.share_dir = v;
    }
    if let Some(v) = overrides.share_ttl {
        cfg.share_ttl = crate::time::parse_duration_str(&v)
            .map_err(|e| TracelensError::Config(format!("bad share_ttl in {source}: {e}")))?;
    }
    if let Some(v) = overrides.workers {
        if v == 0 {
            return Err(TracelensError::Config(format!(
                "workers in {source} must be at least 1"
            )));
        }
        cfg.workers = v;
    }
    Ok(())
}
