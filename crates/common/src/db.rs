use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a PostgreSQL connection pool.
///
/// `max_connections` controls the maximum number of connections in the pool.
/// Pass `AppConfig::db_max_connections` for the user-configured value (default 20).
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Where a read should be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreference {
    /// Always the primary.
    #[default]
    Primary,
    /// The replica when one is configured, else the primary.
    SecondaryPreferred,
}

/// Primary pool plus an optional read replica.
#[derive(Debug, Clone)]
pub struct DbPools {
    primary: PgPool,
    replica: Option<PgPool>,
}

impl DbPools {
    pub fn new(primary: PgPool, replica: Option<PgPool>) -> Self {
        Self { primary, replica }
    }

    /// Pools with no replica. Every read goes to `pool`.
    pub fn single(pool: PgPool) -> Self {
        Self::new(pool, None)
    }

    /// Connect the primary and, if `read_url` is set, the replica.
    pub async fn connect(
        database_url: &str,
        read_url: Option<&str>,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let primary = create_pool(database_url, max_connections).await?;
        let replica = match read_url {
            Some(url) => {
                let pool = create_pool(url, max_connections).await?;
                tracing::info!("Read replica pool created");
                Some(pool)
            }
            None => None,
        };
        Ok(Self::new(primary, replica))
    }

    /// Pool used for writes.
    pub fn primary(&self) -> &PgPool {
        &self.primary
    }

    /// Pool used for a read with the given preference.
    pub fn reader(&self, preference: ReadPreference) -> &PgPool {
        match (preference, &self.replica) {
            (ReadPreference::SecondaryPreferred, Some(replica)) => replica,
            _ => &self.primary,
        }
    }
}
