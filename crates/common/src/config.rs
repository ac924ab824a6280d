use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string for the primary
    pub database_url: String,

    /// Optional read replica. Feed reads prefer it when set.
    pub database_read_url: Option<String>,

    /// Redis connection string
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections per pool (default: 20)
    pub db_max_connections: u32,

    /// Port the API server binds to (default: 3000)
    pub api_port: u16,

    /// How long cached environment stats stay valid (default: 60)
    pub stats_cache_ttl_seconds: u64,

    /// Emit logs as JSON lines instead of the human formatter
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            database_read_url: std::env::var("DATABASE_READ_URL").ok(),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            stats_cache_ttl_seconds: std::env::var("STATS_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("STATS_CACHE_TTL_SECONDS must be a valid u64"))?,
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}
