//! Share aggregate repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use datashare_core::error::{AppError, ErrorKind};
use datashare_core::result::AppResult;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_entity::share::{ShareAggregate, ShareItem, ShareItemStatus, ShareObject};

use crate::store::ShareStore;

/// Repository for share requests and their items in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgShareRepository {
    pool: PgPool,
}

impl PgShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bring the share tables up to the latest schema.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to migrate share tables: {e}"),
                    e,
                )
            })?;
        info!("Share tables migrated");
        Ok(())
    }

    /// Find a share request row by ID.
    pub async fn find_share(&self, id: ShareObjectId) -> AppResult<Option<ShareObject>> {
        sqlx::query_as::<_, ShareObject>("SELECT * FROM share_object WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find share", e))
    }

    /// List items owned by a share request.
    pub async fn find_items(&self, share_id: ShareObjectId) -> AppResult<Vec<ShareItem>> {
        sqlx::query_as::<_, ShareItem>(
            "SELECT * FROM share_item WHERE share_id = $1 ORDER BY created_at, id",
        )
        .bind(share_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list share items", e))
    }
}

#[async_trait]
impl ShareStore for PgShareRepository {
    async fn insert(&self, aggregate: &ShareAggregate) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let share = &aggregate.share;
        sqlx::query(
            "INSERT INTO share_object (id, dataset_uri, principal_uri, status, request_purpose, \
             reject_purpose, owner, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(share.id)
        .bind(&share.dataset_uri)
        .bind(&share.principal_uri)
        .bind(share.status)
        .bind(&share.request_purpose)
        .bind(&share.reject_purpose)
        .bind(&share.owner)
        .bind(share.created_at)
        .bind(share.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create share", e))?;

        for item in &aggregate.items {
            upsert_item(&mut tx, item).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit share creation", e)
        })
    }

    async fn load(&self, share_id: ShareObjectId) -> AppResult<Option<ShareAggregate>> {
        let Some(share) = self.find_share(share_id).await? else {
            return Ok(None);
        };
        let items = self.find_items(share_id).await?;
        Ok(Some(ShareAggregate::new(share, items)))
    }

    async fn share_id_for_item(&self, item_id: ShareItemId) -> AppResult<Option<ShareObjectId>> {
        sqlx::query_scalar::<_, ShareObjectId>("SELECT share_id FROM share_item WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to resolve item owner", e)
            })
    }

    async fn commit(&self, aggregate: &ShareAggregate, removed: &[ShareItemId]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let share = &aggregate.share;
        let result = sqlx::query(
            "UPDATE share_object SET status = $2, request_purpose = $3, reject_purpose = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(share.id)
        .bind(share.status)
        .bind(&share.request_purpose)
        .bind(&share.reject_purpose)
        .bind(share.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update share", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Share request {} not found",
                share.id
            )));
        }

        for item in &aggregate.items {
            upsert_item(&mut tx, item).await?;
        }

        if !removed.is_empty() {
            let ids: Vec<Uuid> = removed.iter().map(|id| id.into_uuid()).collect();
            sqlx::query("DELETE FROM share_item WHERE share_id = $1 AND id = ANY($2)")
                .bind(share.id)
                .bind(ids)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to remove share items", e)
                })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit share transition", e)
        })
    }

    async fn find_items_by_status(
        &self,
        statuses: &[ShareItemStatus],
        updated_before: DateTime<Utc>,
    ) -> AppResult<Vec<ShareItem>> {
        let names: Vec<&str> = statuses.iter().map(ShareItemStatus::as_str).collect();
        sqlx::query_as::<_, ShareItem>(
            "SELECT * FROM share_item WHERE status::text = ANY($1) AND updated_at < $2 \
             ORDER BY updated_at",
        )
        .bind(names)
        .bind(updated_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find items by status", e)
        })
    }
}

async fn upsert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item: &ShareItem,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO share_item (id, share_id, item_type, item_uri, item_name, status, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at",
    )
    .bind(item.id)
    .bind(item.share_id)
    .bind(item.item_type)
    .bind(&item.item_uri)
    .bind(&item.item_name)
    .bind(item.status)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut **tx)
    .await
    .map(|_| ())
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write share item", e))
}
