//! kv-cli：通过连接池执行单条 Redis 命令
//! - 配置：config.toml + 环境变量 + 命令行
//! - 日志：tracing，RUST_LOG 或 --log-level

mod cli;
mod config;

use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use redis::aio::ConnectionLike;
use tracing::info;

use crate::cli::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    // 初始化日志，输出到 stderr，stdout 只留命令结果
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::AppConfig::load(cli.config.as_deref())?;
    cfg.apply_env();
    cfg.apply_cli(&cli);

    info!("正在连接 Redis: {}", cfg.redis.server);
    let pool = kv_share::new_pool(cfg.pool_config())
        .with_context(|| format!("Redis 连接池创建失败 ({})", cfg.redis.server))?;
    let mut conn = pool
        .get()
        .await
        .with_context(|| format!("Redis 连接失败 ({})。请检查 Redis 服务是否已启动", cfg.redis.server))?;

    let output = run(&mut conn, cli.command).await?;
    println!("{}", output);
    Ok(())
}

/// 执行一条命令并返回要打印的结果
async fn run<C>(conn: &mut C, command: Command) -> anyhow::Result<String>
where
    C: ConnectionLike + Send,
{
    let output = match command {
        Command::Set { key, value } => {
            kv_share::set(conn, &key, &value).await?;
            "OK".to_string()
        }
        Command::Get { key } => kv_share::get(conn, &key).await?,
        Command::Incr { key } => kv_share::incr(conn, &key).await?.to_string(),
        Command::Exists { key } => kv_share::exists(conn, &key).await?.to_string(),
        Command::Del { keys } => kv_share::del(conn, keys.as_slice()).await?.to_string(),
        Command::Hmset { key, fields } => {
            let m: HashMap<String, String> = fields.into_iter().collect();
            kv_share::hmset(conn, &key, &m).await?;
            "OK".to_string()
        }
        Command::Hgetall { key } => {
            // 按字段名排序输出
            let m: BTreeMap<String, String> = kv_share::hgetall(conn, &key).await?.into_iter().collect();
            m.iter()
                .map(|(f, v)| format!("{}={}", f, v))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    Ok(output)
}
