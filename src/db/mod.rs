use crate::gateway::{GatewayError, SyncGateway};
use crate::models::{Ballot, Rank, RestaurantRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row, Sqlite,
};
use std::env;
use uuid::Uuid;

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        GatewayError::Store(e.to_string())
    }
}

/// Connection settings for the SQLite-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    /// Identity stamped as the author of every record this client writes.
    pub user_id: String,
}

impl StoreConfig {
    /// Reads `DATABASE_URL` and `LUNCHVOTE_USER` from the environment,
    /// loading a `.env` file first if one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:lunchvote.db".to_string()),
            user_id: env::var("LUNCHVOTE_USER").unwrap_or_else(|_| "local-user".to_string()),
        }
    }
}

/// Reference [`SyncGateway`] backed by SQLite.
///
/// Plays the part the shared remote database plays in production: it assigns
/// record ids, stamps creation and modification times, and tags each record
/// with its author. Restaurant references in ballots are non-owning, so a
/// deleted restaurant leaves its ballots dangling rather than cascading.
pub struct SqliteStore {
    pool: SqlitePool,
    user_id: String,
}

impl SqliteStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, GatewayError> {
        if !Sqlite::database_exists(&config.database_url)
            .await
            .unwrap_or(false)
        {
            Sqlite::create_database(&config.database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self {
            pool,
            user_id: config.user_id.clone(),
        })
    }

    /// Direct pool access for maintenance work outside the gateway contract.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), GatewayError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS restaurants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id TEXT PRIMARY KEY,
                restaurant_id TEXT NOT NULL,
                priority TEXT NOT NULL,
                author TEXT NOT NULL,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, GatewayError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GatewayError::Malformed(format!("bad {} timestamp: {}", column, e)))
    }

    fn ballot_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Ballot, GatewayError> {
        let priority_str = row.get::<String, _>("priority");
        let priority = Rank::parse(&priority_str)
            .ok_or_else(|| GatewayError::Malformed(format!("unknown priority: {}", priority_str)))?;

        Ok(Ballot {
            id: row.get::<String, _>("id"),
            author: row.get::<String, _>("author"),
            restaurant_id: row.get::<String, _>("restaurant_id"),
            priority,
            created_at: Self::parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
            modified_at: Self::parse_timestamp(
                &row.get::<String, _>("modified_at"),
                "modified_at",
            )?,
        })
    }
}

#[async_trait]
impl SyncGateway for SqliteStore {
    fn caller_id(&self) -> String {
        self.user_id.clone()
    }

    async fn query_restaurants(&self) -> Result<Vec<RestaurantRecord>, GatewayError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM restaurants
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RestaurantRecord {
                    id: row.get::<String, _>("id"),
                    name: row.get::<String, _>("name"),
                    created_at: Self::parse_timestamp(
                        &row.get::<String, _>("created_at"),
                        "created_at",
                    )?,
                })
            })
            .collect()
    }

    async fn query_ballots(
        &self,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<Ballot>, GatewayError> {
        // RFC 3339 UTC strings order lexicographically, so the period window
        // is a plain string comparison.
        let rows = sqlx::query(
            r#"
            SELECT id, restaurant_id, priority, author, created_at, modified_at
            FROM votes
            WHERE created_at >= ?
            "#,
        )
        .bind(created_after.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::ballot_from_row).collect()
    }

    async fn save_restaurant(
        &self,
        name: &str,
    ) -> Result<Option<RestaurantRecord>, GatewayError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO restaurants (id, name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        // Read the row back so the caller sees the store's view of it.
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM restaurants
            WHERE id = ?
            "#,
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(RestaurantRecord {
                id: row.get::<String, _>("id"),
                name: row.get::<String, _>("name"),
                created_at: Self::parse_timestamp(
                    &row.get::<String, _>("created_at"),
                    "created_at",
                )?,
            })
        })
        .transpose()
    }

    async fn save_ballot(
        &self,
        restaurant_id: &str,
        priority: Rank,
    ) -> Result<Option<Ballot>, GatewayError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO votes (id, restaurant_id, priority, author, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(restaurant_id)
        .bind(priority.as_str())
        .bind(&self.user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id, restaurant_id, priority, author, created_at, modified_at
            FROM votes
            WHERE id = ?
            "#,
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::ballot_from_row).transpose()
    }

    async fn delete_ballot(&self, ballot_id: &str) -> Result<(), GatewayError> {
        sqlx::query(
            r#"
            DELETE FROM votes
            WHERE id = ?
            "#,
        )
        .bind(ballot_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
