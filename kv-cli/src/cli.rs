//! 命令行参数定义（使用 clap）

use clap::{Parser, Subcommand};

/// kv-cli Redis 命令行工具
#[derive(Parser, Debug, Clone)]
#[command(name = "kv-cli")]
#[command(version)]
#[command(about = "通过连接池执行一条 Redis 命令：SET / GET / INCR / EXISTS / DEL / HMSET / HGETALL")]
#[command(long_about = None)]
pub struct Cli {
    /// 日志级别（trace, debug, info, warn, error）
    #[arg(short, long, default_value = "info", value_name = "LEVEL", help = "日志级别: trace, debug, info, warn, error")]
    pub log_level: String,

    /// 配置文件路径
    #[arg(short, long, value_name = "PATH", help = "配置文件路径。优先级：命令行 > 环境变量 KV_CLI_CONFIG > kv-cli/config.toml")]
    pub config: Option<String>,

    // ========== Redis ==========
    /// Redis 服务器地址
    #[arg(long, value_name = "HOST:PORT", help = "Redis 服务器地址，例如 127.0.0.1:6379 或 :6379")]
    pub server: Option<String>,

    /// Redis 密码（可选）
    #[arg(long, help = "Redis 密码（可选），为空时不发送 AUTH")]
    pub password: Option<String>,

    /// 最大空闲连接数
    #[arg(long, help = "连接池最大空闲连接数，默认: 3")]
    pub max_idle: Option<usize>,

    /// 最大活跃连接数
    #[arg(long, help = "连接池最大活跃连接数，0 表示不限制，默认: 1000")]
    pub max_active: Option<usize>,

    /// 空闲超时（秒）
    #[arg(long, help = "空闲连接超时（秒），0 表示永不过期，默认: 180")]
    pub idle_timeout_secs: Option<u64>,

    /// 借连接等待时长（秒）
    #[arg(long, help = "连接数已满时借连接的最长等待时间（秒），默认: 5")]
    pub wait_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// SET key value
    Set { key: String, value: String },
    /// GET key
    Get { key: String },
    /// INCR key
    Incr { key: String },
    /// EXISTS key
    Exists { key: String },
    /// DEL key [key ...]
    Del { keys: Vec<String> },
    /// HMSET key field=value [field=value ...]
    Hmset {
        key: String,
        #[arg(value_parser = parse_field, value_name = "FIELD=VALUE")]
        fields: Vec<(String, String)>,
    },
    /// HGETALL key
    Hgetall { key: String },
}

/// 解析 field=value
fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(f, v)| (f.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{}`", s))
}

impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// 获取日志过滤器字符串
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.log_level.clone())
    }
}
