pub mod commands;
pub mod error;
pub mod pool;
pub mod validate;

// Re-exports for convenience
pub use commands::{del, exists, get, hgetall, hmset, incr, set};
pub use error::{KvError, KvResult};
pub use pool::{
    DEF_IDLE_TIMEOUT, DEF_MAX_ACTIVE, DEF_MAX_IDLE, DEF_WAIT_TIMEOUT, KvConnection, KvPool,
    PoolConfig, PoolState, PooledConnection, RedisConnectionManager, new_default_pool, new_pool,
    parse_server_addr,
};
pub use validate::{validate_key, validate_keys, validate_map};
