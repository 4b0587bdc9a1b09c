use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use super::{CycleChanges, StateStore};
use crate::config::DatabaseConfig;
use crate::models::{ProductIdentity, ProductRecord, TransitionLogEntry};
use crate::utils::error::Result;

const UPSERT_PRODUCT: &str = r#"
    INSERT INTO products
        (identity, name, url, price, state, state_entered_at, first_seen_at, last_seen_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(identity) DO UPDATE SET
        name = excluded.name,
        url = excluded.url,
        price = excluded.price,
        state = excluded.state,
        state_entered_at = excluded.state_entered_at,
        last_seen_at = MAX(products.last_seen_at, excluded.last_seen_at)
"#;

const INSERT_TRANSITION: &str = r#"
    INSERT INTO transitions (identity, old_state, new_state, notified, timestamp, cycle_id)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

const SELECT_PRODUCT_COLUMNS: &str = r#"
    SELECT identity, name, url, price, state, state_entered_at, first_seen_at, last_seen_at
    FROM products
"#;

/// SQLite-backed store. A cycle's writes go through one transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and runs pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool_options = if is_memory_url(&config.url) {
            // Every connection to :memory: is its own database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::info!("Opened state store at {}", config.url);
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn write_record(conn: &mut SqliteConnection, record: &ProductRecord) -> Result<()> {
        sqlx::query(UPSERT_PRODUCT)
            .bind(record.identity.as_str())
            .bind(&record.name)
            .bind(&record.url)
            .bind(record.price)
            .bind(record.state)
            .bind(record.state_entered_at)
            .bind(record.first_seen_at)
            .bind(record.last_seen_at)
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn write_transition(conn: &mut SqliteConnection, entry: &TransitionLogEntry) -> Result<()> {
        sqlx::query(INSERT_TRANSITION)
            .bind(entry.identity.as_str())
            .bind(entry.old_state)
            .bind(entry.new_state)
            .bind(entry.notified)
            .bind(entry.timestamp)
            .bind(entry.cycle_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, identity: &ProductIdentity) -> Result<Option<ProductRecord>> {
        let sql = format!("{} WHERE identity = ?", SELECT_PRODUCT_COLUMNS);
        let record = sqlx::query_as::<_, ProductRecord>(&sql)
            .bind(identity.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn upsert(&self, record: &ProductRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::write_record(&mut conn, record).await
    }

    async fn append_transition(&self, entry: &TransitionLogEntry) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::write_transition(&mut conn, entry).await
    }

    async fn all_known_identities(&self) -> Result<HashSet<ProductIdentity>> {
        let identities = sqlx::query_scalar::<_, ProductIdentity>("SELECT identity FROM products")
            .fetch_all(&self.pool)
            .await?;
        Ok(identities.into_iter().collect())
    }

    async fn commit(&self, changes: &CycleChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        for change in &changes.changes {
            Self::write_record(&mut tx, &change.record).await?;
            if let Some(entry) = &change.transition {
                Self::write_transition(&mut tx, entry).await?;
            }
        }
        tx.commit().await?;

        tracing::debug!(
            "Committed {} record changes ({} transitions)",
            changes.changes.len(),
            changes.transitions().count()
        );
        Ok(())
    }

    async fn records(&self) -> Result<Vec<ProductRecord>> {
        let sql = format!("{} ORDER BY identity", SELECT_PRODUCT_COLUMNS);
        let records = sqlx::query_as::<_, ProductRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn transitions_for(&self, identity: &ProductIdentity) -> Result<Vec<TransitionLogEntry>> {
        let entries = sqlx::query_as::<_, TransitionLogEntry>(
            r#"
            SELECT identity, old_state, new_state, notified, timestamp, cycle_id
            FROM transitions
            WHERE identity = ?
            ORDER BY id
            "#,
        )
        .bind(identity.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
