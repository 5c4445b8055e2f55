use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Process-wide configuration, loaded once at startup.
///
/// All other configuration (instances, platforms, rules, fixed listeners)
/// lives in the store and is mutated through the typed API, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load config: explicit path > WXBRIDGE_CONFIG env > ./wxbridge.toml,
    /// then overlay `WXBRIDGE_`-prefixed environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        let path = config_path
            .map(str::to_string)
            .or_else(|| std::env::var("WXBRIDGE_CONFIG").ok())
            .unwrap_or_else(|| "wxbridge.toml".to_string());

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("WXBRIDGE_").split("_"))
            .extract()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8788
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "wxbridge.db".to_string()
}

/// Process-wide defaults for the supervisor, ingest, and delivery loops.
/// These seed the store's `bridge_config` table on first run; the store's
/// copy is authoritative afterward (see `wxbridge-store::config_kv`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_inactivity_minutes")]
    pub inactivity_minutes: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_merge_messages")]
    pub merge_messages: bool,
    #[serde(default = "default_merge_window_secs")]
    pub merge_window_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_max_listeners_per_instance")]
    pub max_listeners_per_instance: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_serializer_queue_depth")]
    pub serializer_queue_depth: usize,
    #[serde(default = "default_platform_call_timeout_secs")]
    pub platform_call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            inactivity_minutes: default_inactivity_minutes(),
            batch_size: default_batch_size(),
            merge_messages: default_merge_messages(),
            merge_window_secs: default_merge_window_secs(),
            concurrency: default_concurrency(),
            max_listeners_per_instance: default_max_listeners_per_instance(),
            max_retries: default_max_retries(),
            serializer_queue_depth: default_serializer_queue_depth(),
            platform_call_timeout_secs: default_platform_call_timeout_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_inactivity_minutes() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    10
}

fn default_merge_messages() -> bool {
    false
}

fn default_merge_window_secs() -> u64 {
    60
}

fn default_concurrency() -> u32 {
    4
}

fn default_max_listeners_per_instance() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_serializer_queue_depth() -> usize {
    32
}

fn default_platform_call_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.poll_interval_secs, 5);
        assert_eq!(cfg.inactivity_minutes, 30);
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.serializer_queue_depth, 32);
    }
}
