//! Redis connection pooling, shared by the dispatch queue backend
//!
//! `jobs::queue::RedisDispatchQueue` drives Redis through the `RedisPool`/
//! `RedisConnection` types here rather than owning its own client.

pub mod config;
pub mod connection;

pub use config::RedisConfig;
pub use connection::{RedisPool, RedisConnection};

/// Cache result type alias
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),
    
    #[error("Operation failed: {0}")]
    OperationError(String),
    
    #[error("Serialization error: {0}")]
    SerializationError(String),
    
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    
    #[error("Key not found: {0}")]
    NotFound(String),
    
    #[error("TTL expired for key: {0}")]
    Expired(String),
    
    #[error("Pool exhausted")]
    PoolExhausted,
    
    #[error("Timeout waiting for connection")]
    Timeout,
}

impl From<CacheError> for crate::Error {
    fn from(err: CacheError) -> Self {
        crate::Error::Cache(err.to_string())
    }
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and ready
    Connected,
    
    /// Disconnected but reconnecting
    Reconnecting,
    
    /// Failed, manual intervention needed
    Failed,
    
    /// Pool exhausted
    Exhausted,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_converts_to_crate_error() {
        let err: crate::Error = CacheError::PoolExhausted.into();
        assert_eq!(err.category(), "cache");
    }
}