#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DB_PATH: &str = "tubeprog.db";
pub const DEFAULT_APP_ID: &str = "tube-prog-v0";
pub const DEFAULT_CHANNELS_FILE: &str = "channels.toml";
pub const DEFAULT_TUBEPROG_PORT: u16 = 3000;
pub const DEFAULT_TUBEPROG_HOST: &str = "127.0.0.1";
pub const DEFAULT_DAILY_AT: &str = "08:00";

pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_FETCH_SIZE: u32 = 15;
pub const MAX_FETCH_SIZE: u32 = 50;
pub const DEFAULT_MIN_DURATION_SECS: u64 = 180;

/// What a successful upload fetch with zero items means for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFetchPolicy {
    /// Treat it as "nothing changed" and leave stored programs alone.
    #[default]
    Keep,
    /// Treat it as authoritative and evict everything stored for the channel.
    Evict,
}

impl EmptyFetchPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" | "skip" | "noop" | "no-op" => Some(Self::Keep),
            "evict" | "clear" | "delete" => Some(Self::Evict),
            _ => None,
        }
    }
}

/// Knobs of the channel sync reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Size of the per-channel top-K window.
    pub window: usize,
    /// How many uploads to request per channel before filtering.
    pub fetch_size: u32,
    /// Uploads shorter than this are treated as short-form clips.
    pub min_duration_secs: u64,
    pub empty_fetch: EmptyFetchPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            fetch_size: DEFAULT_FETCH_SIZE,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            empty_fetch: EmptyFetchPolicy::Keep,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub app_id: String,
    pub host: String,
    pub port: u16,
    pub youtube_api_key: Option<String>,
    pub channels_file: PathBuf,
    pub daily_at: String,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub db_path: Option<PathBuf>,
    pub app_id: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub env_path: Option<PathBuf>,
    pub window: Option<usize>,
    pub min_duration_secs: Option<u64>,
    pub empty_fetch: Option<EmptyFetchPolicy>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_runtime_config(&file_vars, env_var_string, overrides)
}

fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let db_path = overrides
        .db_path
        .or_else(|| lookup("TUBEPROG_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let app_id = non_blank(overrides.app_id)
        .or_else(|| lookup("TUBEPROG_APP_ID"))
        .unwrap_or_else(|| DEFAULT_APP_ID.to_string());
    let port = overrides
        .port
        .or_else(|| lookup("TUBEPROG_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_TUBEPROG_PORT);
    let host = non_blank(overrides.host)
        .or_else(|| lookup("TUBEPROG_HOST"))
        .unwrap_or_else(|| DEFAULT_TUBEPROG_HOST.to_string());
    let youtube_api_key = lookup("YOUTUBE_API_KEY");
    let channels_file = lookup("TUBEPROG_CHANNELS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_FILE));
    let daily_at = lookup("SYNC_DAILY_AT").unwrap_or_else(|| DEFAULT_DAILY_AT.to_string());

    let window = overrides
        .window
        .or_else(|| lookup("SYNC_WINDOW").and_then(|value| value.parse::<usize>().ok()))
        .unwrap_or(DEFAULT_WINDOW);
    if window == 0 {
        return Err(anyhow!("SYNC_WINDOW must be at least 1"));
    }
    let fetch_size = lookup("SYNC_FETCH_SIZE")
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(DEFAULT_FETCH_SIZE)
        .clamp(1, MAX_FETCH_SIZE);
    let min_duration_secs = overrides
        .min_duration_secs
        .or_else(|| {
            lookup("SYNC_MIN_DURATION_SECS").and_then(|value| value.parse::<u64>().ok())
        })
        .unwrap_or(DEFAULT_MIN_DURATION_SECS);
    let empty_fetch = match overrides.empty_fetch {
        Some(policy) => policy,
        None => match lookup("SYNC_EMPTY_FETCH") {
            Some(raw) => EmptyFetchPolicy::parse(&raw)
                .ok_or_else(|| anyhow!("SYNC_EMPTY_FETCH must be `keep` or `evict`, got {raw:?}"))?,
            None => EmptyFetchPolicy::default(),
        },
    };

    Ok(RuntimeConfig {
        db_path,
        app_id,
        host,
        port,
        youtube_api_key,
        channels_file,
        daily_at,
        sync: SyncSettings {
            window,
            fetch_size,
            min_duration_secs,
            empty_fetch,
        },
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_var_string(key: &str) -> Option<String> {
    non_blank(env::var(key).ok())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| non_blank(file_vars.get(key).cloned()))
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// Channel listed in the seed file; resolved and registered on sync start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedChannel {
    /// `@handle` or a `UC...` channel id.
    pub handle: String,
    pub category: String,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default, rename = "channel")]
    channels: Vec<SeedChannel>,
}

/// Reads the `[[channel]]` entries of the seed file. A missing file means no
/// seeds.
pub fn load_seed_channels(path: &Path) -> Result<Vec<SeedChannel>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let parsed: SeedFile =
        toml::from_str(&raw).with_context(|| format!("Parsing {}", path.display()))?;
    Ok(parsed.channels)
}
