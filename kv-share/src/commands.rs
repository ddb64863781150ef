//! Redis 命令封装
//!
//! 每个函数只做三件事：校验参数、发出一条命令、把回复转换成强类型结果。
//! 连接由调用方从连接池借出并负责归还，这里不持有任何连接。

use std::collections::HashMap;

use redis::RedisError;
use redis::aio::ConnectionLike;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::validate::{validate_key, validate_keys, validate_map};

fn command_failed(cmd: &str, key: &str, err: RedisError) -> KvError {
    debug!(cmd, key = %key, error = %err, "redis 命令执行失败");
    KvError::Redis(err)
}

/// SET key value
pub async fn set<C>(conn: &mut C, key: &str, value: &str) -> KvResult<()>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;

    let result: Result<(), RedisError> = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .query_async(conn)
        .await;
    result.map_err(|e| command_failed("SET", key, e))
}

/// GET key
///
/// key 不存在时返回空字符串。
pub async fn get<C>(conn: &mut C, key: &str) -> KvResult<String>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;

    let value: Option<String> = redis::cmd("GET")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| command_failed("GET", key, e))?;
    Ok(value.unwrap_or_default())
}

/// INCR key，返回自增后的值
pub async fn incr<C>(conn: &mut C, key: &str) -> KvResult<i64>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;

    let n: i64 = redis::cmd("INCR")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| command_failed("INCR", key, e))?;
    Ok(n)
}

/// EXISTS key
pub async fn exists<C>(conn: &mut C, key: &str) -> KvResult<bool>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;

    let result: i64 = redis::cmd("EXISTS")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| command_failed("EXISTS", key, e))?;
    Ok(result > 0)
}

/// DEL key [key ...]
///
/// # Returns
/// * `Ok(n)` - 实际被删除的 key 数量，key 不存在时为 0
pub async fn del<C, K>(conn: &mut C, keys: &[K]) -> KvResult<i64>
where
    C: ConnectionLike + Send,
    K: AsRef<str>,
{
    validate_keys(keys)?;

    let mut cmd = redis::cmd("DEL");
    for key in keys {
        cmd.arg(key.as_ref());
    }

    let n: i64 = cmd.query_async(conn).await.map_err(|e| {
        let joined = keys.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        command_failed("DEL", &joined, e)
    })?;
    Ok(n)
}

/// HMSET key field value [field value ...]
///
/// # Arguments
/// * `key` - 存放 hash 的 key
/// * `m` - 字段及其对应的值，至少包含一项
pub async fn hmset<C>(conn: &mut C, key: &str, m: &HashMap<String, String>) -> KvResult<()>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;
    validate_map(m)?;

    let mut cmd = redis::cmd("HMSET");
    cmd.arg(key);
    for (field, value) in m {
        cmd.arg(field).arg(value);
    }

    let result: Result<(), RedisError> = cmd.query_async(conn).await;
    result.map_err(|e| command_failed("HMSET", key, e))
}

/// HGETALL key
///
/// key 不存在时返回空 map。
pub async fn hgetall<C>(conn: &mut C, key: &str) -> KvResult<HashMap<String, String>>
where
    C: ConnectionLike + Send,
{
    validate_key(key)?;

    let m: HashMap<String, String> = redis::cmd("HGETALL")
        .arg(key)
        .query_async(conn)
        .await
        .map_err(|e| command_failed("HGETALL", key, e))?;
    Ok(m)
}
