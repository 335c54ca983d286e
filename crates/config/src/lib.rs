use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEV_JWT_SECRET: &str = "vrinda-dev-secret";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub jwt: JwtSettings,
    pub redis: RedisSettings,
    pub admission: AdmissionSettings,
    pub signaling: SignalingSettings,
    pub session: SessionSettings,
    pub directory: DirectorySettings,
}

impl Settings {
    /// Loads settings from `config/default.toml`, the file named by
    /// `VRINDA_CONFIG` and `VRINDA__SECTION__KEY` environment variables,
    /// in that order of precedence (last wins).
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::with_name("config/default").required(false));

        if let Ok(path) = std::env::var("VRINDA_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }

        builder
            .add_source(
                Environment::with_prefix("VRINDA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    /// "pretty" or "json".
    pub log_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// HMAC secret shared with the account service that issues tokens.
    pub secret: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// When unset the relay keeps its state in process memory.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionSettings {
    pub minutes_before: u32,
    pub minutes_after: u32,
    /// Offset of the groups' local time from UTC. None = server local time.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            minutes_before: 15,
            minutes_after: 120,
            utc_offset_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingSettings {
    pub ttl_secs: u64,
    /// How often the in-memory store purges expired keys.
    pub sweep_interval_secs: u64,
}

impl Default for SignalingSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub default_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub tick_interval_ms: u64,
    pub event_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            max_duration_minutes: 240,
            tick_interval_ms: 1000,
            event_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub groups: Vec<GroupSeed>,
}

/// A group imported from the main application's database at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSeed {
    pub id: String,
    pub name: String,
    pub reading_time: Option<String>,
    pub admin_id: String,
}
