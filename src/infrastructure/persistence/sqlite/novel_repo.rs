//! SQLite Novel Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{NovelListing, NovelRepositoryPort, RepositoryError};
use crate::domain::novel::{Novel, NovelId};

/// SQLite Novel Repository
pub struct SqliteNovelRepository {
    pool: DbPool,
}

impl SqliteNovelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

#[derive(FromRow)]
struct ListingRow {
    id: String,
    title: String,
    updated_at: String,
}

impl TryFrom<ListingRow> for NovelListing {
    type Error = RepositoryError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(NovelListing {
            id: NovelId::from_uuid(
                Uuid::parse_str(&row.id)
                    .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            ),
            title: row.title,
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl NovelRepositoryPort for SqliteNovelRepository {
    async fn save(&self, novel: &Novel) -> Result<NovelId, RepositoryError> {
        let document = serde_json::to_string(novel)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO novels (id, title, document, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(novel.id().to_string())
        .bind(novel.title())
        .bind(document)
        .bind(novel.created_at().to_rfc3339())
        .bind(novel.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        tracing::debug!(novel_id = %novel.id(), chapters = novel.chapters().len(), "Novel saved");
        Ok(novel.id())
    }

    async fn load(&self, id: NovelId) -> Result<Option<Novel>, RepositoryError> {
        let document: Option<(String,)> = sqlx::query_as("SELECT document FROM novels WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        document
            .map(|(json,)| {
                serde_json::from_str(&json)
                    .map_err(|e| RepositoryError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    async fn list(&self) -> Result<Vec<NovelListing>, RepositoryError> {
        let rows: Vec<ListingRow> =
            sqlx::query_as("SELECT id, title, updated_at FROM novels ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        rows.into_iter().map(NovelListing::try_from).collect()
    }

    async fn delete(&self, id: NovelId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM novels WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        tracing::info!(novel_id = %id, "Novel deleted");
        Ok(())
    }
}
