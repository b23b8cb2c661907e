use thiserror::Error;

/// Errors raised while turning the environment into a [`Config`](crate::config::Config).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported cache URL `{0}`: expected memory:// or redis://")]
    UnsupportedCacheUrl(String),
    #[error("Cache URL `{0}` needs the `redis` feature")]
    RedisDisabled(String),
}
