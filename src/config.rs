use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Row cap appended as a LIMIT when the query has none
    pub max_rows: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Sampling is currently kept off; the pipeline returns full results
    pub enabled: bool,
    pub max_sample_rows: usize,
    /// Row count above which an enabled sampler kicks in
    pub row_threshold: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "postgresql://localhost:5432/datasets")?
            .set_default("database.pool_max_size", 16)?
            .set_default("query.max_rows", 10_000)?
            .set_default("query.timeout_secs", 30)?
            .set_default("cache.ttl_secs", 3600)?
            .set_default("sampling.enabled", false)?
            .set_default("sampling.max_sample_rows", 50)?
            .set_default("sampling.row_threshold", 100)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        // Load from environment variables
        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(max_rows) = env::var("QUERY_MAX_ROWS") {
            builder = builder.set_override("query.max_rows", max_rows.parse::<u64>().unwrap_or(10_000))?;
        }

        if let Ok(timeout) = env::var("QUERY_TIMEOUT_SECS") {
            builder = builder.set_override("query.timeout_secs", timeout.parse::<u64>().unwrap_or(30))?;
        }

        if let Ok(ttl) = env::var("CACHE_TTL_SECS") {
            builder = builder.set_override("cache.ttl_secs", ttl.parse::<u64>().unwrap_or(3600))?;
        }

        if let Ok(enabled) = env::var("SAMPLING_ENABLED") {
            builder = builder.set_override("sampling.enabled", enabled.parse::<bool>().unwrap_or(false))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        // Try to load from .env file
        let _ = dotenv::dotenv();

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        env::remove_var("DATABASE_URL");
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("SAMPLING_ENABLED");

        let config = Config::from_env().unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.query.max_rows, 10_000);
        assert_eq!(config.query.timeout_secs, 30);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.sampling.enabled);
        assert_eq!(config.sampling.max_sample_rows, 50);
    }
}
