//! SQLite storage for the watchlist, price observations and alert history.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use stockwatch_core::{AlertRecord, PriceObservation, Symbol};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL and run migrations.
    ///
    /// In-memory URLs get a single long-lived connection, since every
    /// SQLite connection to `:memory:` is its own database.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let in_memory = database_url.contains(":memory:");

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watchlist (
                symbol TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_prices (
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp DATETIME NOT NULL,
                weekly_change REAL NOT NULL,
                volume INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (symbol, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Migration: add previous_close column if it doesn't exist
        let _ = sqlx::query(
            "ALTER TABLE stock_prices ADD COLUMN previous_close REAL NOT NULL DEFAULT 0.0",
        )
        .execute(&self.pool)
        .await;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                change_percent REAL NOT NULL,
                price REAL NOT NULL,
                timestamp DATETIME NOT NULL,
                sent BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Load the stored watchlist in insertion order.
    pub async fn load_watchlist(&self) -> Result<Vec<Symbol>, DbError> {
        let rows = sqlx::query_scalar::<_, String>("SELECT symbol FROM watchlist ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(|s| Symbol::parse(s)).collect())
    }

    /// Replace the whole watchlist: delete everything, then insert the new set.
    pub async fn replace_watchlist(&self, symbols: &[Symbol]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM watchlist").execute(&mut *tx).await?;

        for symbol in symbols {
            sqlx::query("INSERT OR IGNORE INTO watchlist (symbol) VALUES (?)")
                .bind(symbol.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Store an observation, replacing any row with the same (symbol, timestamp).
    pub async fn save_observation(&self, observation: &PriceObservation) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO stock_prices (symbol, price, previous_close, timestamp, weekly_change, volume)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(observation.symbol.as_str())
        .bind(observation.price)
        .bind(observation.previous_close)
        .bind(observation.observed_at)
        .bind(observation.change_percent)
        .bind(observation.volume)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent observation for a symbol, if any was ever stored.
    pub async fn latest_observation(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<PriceObservation>, DbError> {
        let row = sqlx::query_as::<_, (f64, f64, f64, i64, DateTime<Utc>)>(
            r#"
            SELECT price, previous_close, weekly_change, volume, timestamp
            FROM stock_prices WHERE symbol = ?
            ORDER BY timestamp DESC LIMIT 1
            "#,
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(price, previous_close, change_percent, volume, observed_at)| PriceObservation {
                symbol: symbol.clone(),
                price,
                previous_close,
                change_percent,
                volume,
                observed_at,
            },
        ))
    }

    /// Number of stored observations for a symbol.
    pub async fn count_observations(&self, symbol: &Symbol) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM stock_prices WHERE symbol = ?",
        )
        .bind(symbol.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Record a delivered alert. Returns the new row id.
    pub async fn record_alert(
        &self,
        symbol: &Symbol,
        change_percent: f64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (symbol, change_percent, price, timestamp, sent)
            VALUES (?, ?, ?, ?, TRUE)
            "#,
        )
        .bind(symbol.as_str())
        .bind(change_percent)
        .bind(price)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent alerts, newest first.
    pub async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, f64, f64, DateTime<Utc>, bool)>(
            r#"
            SELECT id, symbol, change_percent, price, timestamp, sent
            FROM alerts ORDER BY timestamp DESC, id DESC LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let alerts = rows
            .into_iter()
            .map(
                |(id, symbol, change_percent, price, timestamp, sent)| AlertRecord {
                    id,
                    symbol,
                    change_percent,
                    price,
                    timestamp,
                    sent,
                },
            )
            .collect();

        Ok(alerts)
    }

    /// Close the pool. Later queries fail with `PoolClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Total number of stored alerts.
    pub async fn count_alerts(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
