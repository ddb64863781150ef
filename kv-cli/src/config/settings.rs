use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_server")]
    pub server: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

fn default_redis_server() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_max_idle() -> usize {
    kv_share::DEF_MAX_IDLE
}

fn default_max_active() -> usize {
    kv_share::DEF_MAX_ACTIVE
}

fn default_idle_timeout_secs() -> u64 {
    kv_share::DEF_IDLE_TIMEOUT.as_secs()
}

fn default_wait_timeout_secs() -> u64 {
    kv_share::DEF_WAIT_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_redis_settings")]
    pub redis: RedisSettings,
}

pub(super) fn default_redis_settings() -> RedisSettings {
    RedisSettings {
        server: default_redis_server(),
        password: None,
        max_idle: default_max_idle(),
        max_active: default_max_active(),
        idle_timeout_secs: default_idle_timeout_secs(),
        wait_timeout_secs: default_wait_timeout_secs(),
    }
}
