//! Redis 连接池
//!
//! 连接的建立、等待、空闲回收和借出前健康检查都交给 bb8，
//! 这里只负责：拨号后 AUTH、借出前 PING、把超过 max_idle 的空闲连接关掉，
//! 以及把后台建连失败的错误交还给等待中的借用方。

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bb8::{ErrorSink, ManageConnection, Pool, RunError};
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::{Client, Cmd, Pipeline, RedisError, RedisFuture, Value};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{KvError, KvResult};

/// 默认最大空闲连接数
pub const DEF_MAX_IDLE: usize = 3;
/// 默认最大活跃连接数，0 表示不限制
pub const DEF_MAX_ACTIVE: usize = 1000;
/// 默认空闲超时，空闲超过该时长的连接会被关闭
pub const DEF_IDLE_TIMEOUT: Duration = Duration::from_secs(180);
/// 默认借连接等待时长
pub const DEF_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// 连接池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 服务器地址，例如 "192.168.0.1:6379" 或 ":6379"
    pub server: String,
    /// 密码，为空时不发送 AUTH
    pub password: String,
    /// 最大空闲连接数
    pub max_idle: usize,
    /// 最大活跃连接数（空闲 + 借出），0 表示不限制
    pub max_active: usize,
    /// 空闲超时，0 表示空闲连接永不过期
    pub idle_timeout: Duration,
    /// 连接数达到上限时借连接的最长等待时间
    pub wait_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:6379".to_string(),
            password: String::new(),
            max_idle: DEF_MAX_IDLE,
            max_active: DEF_MAX_ACTIVE,
            idle_timeout: DEF_IDLE_TIMEOUT,
            wait_timeout: DEF_WAIT_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn new(server: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    fn max_size(&self) -> u32 {
        if self.max_active == 0 {
            u32::MAX
        } else {
            u32::try_from(self.max_active).unwrap_or(u32::MAX)
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout.is_zero() {
            None
        } else {
            Some(self.idle_timeout)
        }
    }

    fn max_idle(&self) -> u32 {
        u32::try_from(self.max_idle).unwrap_or(u32::MAX)
    }
}

/// 解析 "host:port"，host 为空时使用本机地址
pub fn parse_server_addr(server: &str) -> KvResult<(String, u16)> {
    let invalid = || KvError::InvalidAddress(server.to_string());

    let (host, port) = server.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { "127.0.0.1" } else { host };
    Ok((host.to_string(), port))
}

fn redis_url(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("redis://[{}]:{}", host, port)
    } else {
        format!("redis://{}:{}", host, port)
    }
}

fn is_connection_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped()
}

/// 池中的单条连接
///
/// 出现网络层错误后标记为 broken，归还时直接丢弃。
pub struct KvConnection {
    inner: MultiplexedConnection,
    broken: bool,
    discard: bool,
}

impl KvConnection {
    fn new(inner: MultiplexedConnection) -> Self {
        Self {
            inner,
            broken: false,
            discard: false,
        }
    }
}

impl ConnectionLike for KvConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        Box::pin(async move {
            let result = self.inner.req_packed_command(cmd).await;
            if let Err(e) = &result {
                if is_connection_error(e) {
                    self.broken = true;
                }
            }
            result
        })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async move {
            let result = self.inner.req_packed_commands(cmd, offset, count).await;
            if let Err(e) = &result {
                if is_connection_error(e) {
                    self.broken = true;
                }
            }
            result
        })
    }

    fn get_db(&self) -> i64 {
        self.inner.get_db()
    }
}

/// 最近一次建连失败
///
/// bb8 在后台任务里建连，失败只会交给 ErrorSink，等待中的 get() 收不到。
/// 原始错误记在这里，由 `KvPool::get` 取走。
#[derive(Default)]
struct ConnectFailures {
    last: Mutex<Option<(Instant, RedisError)>>,
    notify: Notify,
}

impl ConnectFailures {
    fn record(&self, error: RedisError) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some((Instant::now(), error));
        self.notify.notify_waiters();
    }

    /// 取走 `since` 之后记录的错误，更早的直接丢弃
    fn take_since(&self, since: Instant) -> Option<RedisError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match last.take() {
            Some((at, error)) if at >= since => Some(error),
            _ => None,
        }
    }

    async fn wait_since(&self, since: Instant) -> RedisError {
        loop {
            // 先注册再检查，避免漏掉两者之间的通知
            let notified = self.notify.notified();
            if let Some(error) = self.take_since(since) {
                return error;
            }
            notified.await;
        }
    }
}

/// bb8 连接管理器：拨号 + AUTH，借出前 PING
pub struct RedisConnectionManager {
    client: Client,
    password: String,
    failures: Arc<ConnectFailures>,
}

impl RedisConnectionManager {
    pub fn new(client: Client, password: impl Into<String>) -> Self {
        Self {
            client,
            password: password.into(),
            failures: Arc::default(),
        }
    }

    async fn dial(&self) -> Result<KvConnection, RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        if !self.password.is_empty() {
            let auth: Result<(), RedisError> = redis::cmd("AUTH")
                .arg(&self.password)
                .query_async(&mut conn)
                .await;
            // conn 在此处被丢弃，连接随之关闭
            if let Err(e) = auth {
                debug!(error = %e, "Redis AUTH 失败");
                return Err(e);
            }
        }

        debug!("Redis 连接已建立");
        Ok(KvConnection::new(conn))
    }
}

#[async_trait]
impl ManageConnection for RedisConnectionManager {
    type Connection = KvConnection;
    type Error = RedisError;

    async fn connect(&self) -> Result<KvConnection, RedisError> {
        match self.dial().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                // RedisError 不能 Clone：原始错误留给借用方，bb8 拿到的副本只用于日志
                let copy = RedisError::from((e.kind(), "Redis 建连失败", e.to_string()));
                self.failures.record(e);
                Err(copy)
            }
        }
    }

    async fn is_valid(&self, conn: &mut KvConnection) -> Result<(), RedisError> {
        let _: String = redis::cmd("PING").query_async(conn).await?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut KvConnection) -> bool {
        conn.broken || conn.discard
    }
}

/// bb8 在后台建连失败时把错误交给这里
#[derive(Debug, Clone, Copy)]
struct LogErrorSink;

impl ErrorSink<RedisError> for LogErrorSink {
    fn sink(&self, error: RedisError) {
        warn!(error = %error, "Redis 连接池错误");
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<RedisError>> {
        Box::new(*self)
    }
}

/// 连接池当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// 已建立的连接总数（空闲 + 借出）
    pub connections: u32,
    /// 空闲连接数
    pub idle_connections: u32,
}

/// Redis 连接池
#[derive(Clone)]
pub struct KvPool {
    inner: Pool<RedisConnectionManager>,
    failures: Arc<ConnectFailures>,
    max_idle: u32,
}

impl KvPool {
    /// 从池中借出一条连接，drop 时自动归还
    ///
    /// 建连或 AUTH 失败时立即返回该错误（`KvError::Redis`），
    /// 连接数已满且等待超时返回 `KvError::PoolTimeout`。
    pub async fn get(&self) -> KvResult<PooledConnection<'_>> {
        let since = Instant::now();
        let result = tokio::select! {
            biased;
            res = self.inner.get() => res.map_err(|e| match e {
                RunError::User(e) => KvError::Redis(e),
                RunError::TimedOut => match self.failures.take_since(since) {
                    Some(e) => KvError::Redis(e),
                    None => KvError::PoolTimeout,
                },
            }),
            e = self.failures.wait_since(since) => Err(KvError::Redis(e)),
        };

        let conn = result.map_err(|e| {
            debug!(error = %e, "获取 Redis 连接失败");
            e
        })?;

        Ok(PooledConnection {
            conn,
            pool: &self.inner,
            max_idle: self.max_idle,
        })
    }

    pub fn state(&self) -> PoolState {
        let state = self.inner.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

/// 借出的连接
pub struct PooledConnection<'a> {
    conn: bb8::PooledConnection<'a, RedisConnectionManager>,
    pool: &'a Pool<RedisConnectionManager>,
    max_idle: u32,
}

impl Deref for PooledConnection<'_> {
    type Target = KvConnection;

    fn deref(&self) -> &KvConnection {
        &self.conn
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut KvConnection {
        &mut self.conn
    }
}

impl ConnectionLike for PooledConnection<'_> {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let conn: &mut KvConnection = &mut self.conn;
        conn.req_packed_command(cmd)
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        let conn: &mut KvConnection = &mut self.conn;
        conn.req_packed_commands(cmd, offset, count)
    }

    fn get_db(&self) -> i64 {
        self.conn.get_db()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // 空闲连接已达上限，这条连接归还时由 has_broken 丢弃
        if self.pool.state().idle_connections >= self.max_idle {
            self.conn.discard = true;
        }
    }
}

/// 创建连接池
///
/// 连接按需建立，创建连接池本身不会访问服务器。
/// 需要在 Tokio 运行时内调用（空闲回收任务由 bb8 在运行时上启动）。
///
/// # Arguments
/// * `config` - 服务器地址、密码、max_idle / max_active / 空闲超时
///
/// # Errors
/// - 服务器地址无法解析时返回 `KvError::InvalidAddress`
/// - 不在 Tokio 运行时内调用时返回 `KvError::NoRuntime`
pub fn new_pool(config: PoolConfig) -> KvResult<KvPool> {
    let (host, port) = parse_server_addr(&config.server)?;
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(KvError::NoRuntime);
    }
    let client = Client::open(redis_url(&host, port))?;
    let manager = RedisConnectionManager::new(client, config.password.clone());
    let failures = manager.failures.clone();

    let inner = Pool::builder()
        .max_size(config.max_size())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(None)
        .test_on_check_out(true)
        .retry_connection(false)
        .connection_timeout(config.wait_timeout.max(Duration::from_millis(1)))
        .error_sink(Box::new(LogErrorSink))
        .build_unchecked(manager);

    info!(
        host = %host,
        port,
        max_idle = config.max_idle,
        max_active = config.max_active,
        idle_timeout = ?config.idle_timeout,
        "创建 Redis 连接池"
    );

    Ok(KvPool {
        inner,
        failures,
        max_idle: config.max_idle(),
    })
}

/// 使用默认参数创建连接池
pub fn new_default_pool(server: &str, password: &str) -> KvResult<KvPool> {
    new_pool(PoolConfig::new(server, password))
}
