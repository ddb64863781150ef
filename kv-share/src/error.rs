use thiserror::Error;

/// 辅助函数统一错误类型
#[derive(Debug, Error)]
pub enum KvError {
    #[error("empty key")]
    EmptyKey,

    #[error("empty map")]
    EmptyMap,

    #[error("no keys")]
    NoKeysProvided,

    /// 服务器地址无法解析为 host:port
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// 等待连接池空闲连接超时
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,

    /// 创建连接池时不在 Tokio 运行时内
    #[error("no Tokio runtime available to run the pool")]
    NoRuntime,

    /// 底层 redis 客户端返回的错误，原样透传
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

pub type KvResult<T> = std::result::Result<T, KvError>;
