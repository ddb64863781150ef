mod settings;

use std::time::Duration;
use std::{fs, io, path::Path};

use anyhow::Context;
use kv_share::PoolConfig;
pub use settings::AppConfig;

use crate::cli::Cli;

impl AppConfig {
    /// 读取配置文件；文件不存在时使用默认配置
    ///
    /// 路径优先级：`--config` > 环境变量 KV_CLI_CONFIG > kv-cli/config.toml
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var("KV_CLI_CONFIG").ok())
            .unwrap_or_else(|| "kv-cli/config.toml".to_string());

        match fs::read_to_string(Path::new(&path)) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("invalid kv-cli config file: {}", path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read kv-cli config file: {}", path)),
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 环境变量覆盖：REDIS_SERVER / REDIS_PASSWORD
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup("REDIS_SERVER") {
            self.redis.server = server;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.redis.password = Some(password);
        }
    }

    /// 命令行参数覆盖，优先级最高
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(server) = &cli.server {
            self.redis.server = server.clone();
        }
        if let Some(password) = &cli.password {
            self.redis.password = Some(password.clone());
        }
        if let Some(max_idle) = cli.max_idle {
            self.redis.max_idle = max_idle;
        }
        if let Some(max_active) = cli.max_active {
            self.redis.max_active = max_active;
        }
        if let Some(secs) = cli.idle_timeout_secs {
            self.redis.idle_timeout_secs = secs;
        }
        if let Some(secs) = cli.wait_timeout_secs {
            self.redis.wait_timeout_secs = secs;
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        let redis = &self.redis;
        PoolConfig {
            server: redis.server.clone(),
            password: redis.password.clone().unwrap_or_default(),
            max_idle: redis.max_idle,
            max_active: redis.max_active,
            idle_timeout: Duration::from_secs(redis.idle_timeout_secs),
            wait_timeout: Duration::from_secs(redis.wait_timeout_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis: settings::default_redis_settings(),
        }
    }
}
