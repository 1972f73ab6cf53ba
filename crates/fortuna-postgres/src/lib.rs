//! Postgres implementation of the [`Store`] port.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, FromRow, PgPool};
use tracing::info;

use fortuna_core::{
    config::DatabaseConfig,
    dialog::DialogState,
    domain::{NewPromotion, Promotion, PromotionId, UserId},
    errors::Error,
    store::Store,
    Result,
};

/// Create the connection pool.
pub async fn create_pool(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(cfg.min_connections)
        .max_connections(cfg.max_connections)
        .max_lifetime(cfg.max_lifetime)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        // Validate connections before use to catch stale/broken connections
        .test_before_acquire(true)
        .connect(&cfg.url)
        .await?;

    info!(
        max_connections = cfg.max_connections,
        min_connections = cfg.min_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Run embedded migrations.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

fn store_err(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

#[derive(Debug, FromRow)]
struct PromotionRow {
    id: i64,
    name: String,
    value: String,
    image_url: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        Promotion {
            id: PromotionId(row.id),
            name: row.name,
            value: row.value,
            image_url: row.image_url,
            deleted: row.deleted,
            created_at: row.created_at,
        }
    }
}

const PROMOTION_COLUMNS: &str = "id, name, value, image_url, deleted, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_user(&self, user_id: UserId) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO bot_users (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_dialog_state(&self, user_id: UserId) -> Result<Option<DialogState>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM admin_states WHERE user_id = $1")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        row.map(|(data,)| DialogState::from_json(&data)).transpose()
    }

    async fn set_dialog_state(&self, user_id: UserId, state: &DialogState) -> Result<()> {
        let data = state.to_json()?;
        sqlx::query(
            r"
            INSERT INTO admin_states (user_id, state, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET state = EXCLUDED.state, data = EXCLUDED.data, updated_at = NOW()
            ",
        )
        .bind(user_id.0)
        .bind(state.step_name())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn clear_dialog_state(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM admin_states WHERE user_id = $1")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn create_promotion(&self, new: NewPromotion) -> Result<Promotion> {
        let sql = format!(
            "INSERT INTO promotions (name, value, image_url) VALUES ($1, $2, $3) RETURNING {PROMOTION_COLUMNS}"
        );
        let row: PromotionRow = sqlx::query_as(&sql)
            .bind(new.name)
            .bind(new.value)
            .bind(new.image_url)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.into())
    }

    async fn update_promotion(&self, id: PromotionId, name: &str, value: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE promotions SET name = $1, value = $2 WHERE id = $3 AND NOT deleted",
        )
        .bind(name)
        .bind(value)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_promotion(&self, id: PromotionId) -> Result<bool> {
        let result = sqlx::query("UPDATE promotions SET deleted = TRUE WHERE id = $1 AND NOT deleted")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_promotion(&self, id: PromotionId) -> Result<Option<Promotion>> {
        let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1 AND NOT deleted");
        let row: Option<PromotionRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Into::into))
    }

    async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE NOT deleted ORDER BY id");
        let rows: Vec<PromotionRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The primary key on `user_claims` makes this the only claim guard.
    async fn insert_claim_if_absent(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO user_claims (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn random_active_promotion(&self) -> Result<Promotion> {
        let sql = format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE NOT deleted ORDER BY RANDOM() LIMIT 1"
        );
        let row: Option<PromotionRow> = sqlx::query_as(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(Into::into).ok_or(Error::NoPromotions)
    }
}
