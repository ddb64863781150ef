//! 参数校验

use std::collections::HashMap;
use tracing::debug;

use crate::error::{KvError, KvResult};

/// 检查 key 是否为空
pub fn validate_key(key: &str) -> KvResult<()> {
    if key.is_empty() {
        debug!("empty key");
        return Err(KvError::EmptyKey);
    }
    Ok(())
}

/// 检查 map 是否为空
pub fn validate_map(m: &HashMap<String, String>) -> KvResult<()> {
    if m.is_empty() {
        debug!("empty map");
        return Err(KvError::EmptyMap);
    }
    Ok(())
}

/// 检查 key 列表：至少一个，且每个都非空
pub fn validate_keys<K: AsRef<str>>(keys: &[K]) -> KvResult<()> {
    if keys.is_empty() {
        debug!("no keys");
        return Err(KvError::NoKeysProvided);
    }
    for key in keys {
        validate_key(key.as_ref())?;
    }
    Ok(())
}
