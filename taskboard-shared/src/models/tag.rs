/// Tag model and task-tag associations
///
/// Tags are owned by a user; name and color are each unique per owner.
/// Tasks and tags are linked many-to-many through `task_tags`.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub async fn create(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
        name: &str,
        color: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (owner_id, name, color)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, name, color, created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .bind(color)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id_and_owner(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, owner_id, name, color, created_at, updated_at
            FROM tags
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn list_by_owner(conn: impl PgExecutor<'_>, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, owner_id, name, color, created_at, updated_at
            FROM tags
            WHERE owner_id = $1
            ORDER BY name
            "#,
        )
        .bind(owner_id)
        .fetch_all(conn)
        .await
    }

    /// Tags attached to a task, in attachment order
    pub async fn list_for_task(conn: impl PgExecutor<'_>, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            SELECT g.id, g.owner_id, g.name, g.color, g.created_at, g.updated_at
            FROM tags g
            JOIN task_tags tt ON tt.tag_id = g.id
            WHERE tt.task_id = $1
            ORDER BY tt.attached_at, g.name
            "#,
        )
        .bind(task_id)
        .fetch_all(conn)
        .await
    }

    pub async fn update(
        conn: impl PgExecutor<'_>,
        id: Uuid,
        name: &str,
        color: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            r#"
            UPDATE tags
            SET name = $2, color = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, name, color, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(color)
        .fetch_one(conn)
        .await
    }

    /// Deletes a tag; its task associations cascade
    pub async fn delete(conn: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fails with `NotFound` unless every id is a tag of `owner_id`
    pub async fn ensure_owned(
        conn: impl PgExecutor<'_>,
        owner_id: Uuid,
        tag_ids: &[Uuid],
    ) -> CoreResult<()> {
        let unique: HashSet<Uuid> = tag_ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = unique.iter().copied().collect();
        let owned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE owner_id = $1 AND id = ANY($2)")
                .bind(owner_id)
                .bind(&ids)
                .fetch_one(conn)
                .await?;

        if owned as usize != unique.len() {
            return Err(CoreError::not_found("Tag"));
        }
        Ok(())
    }

    /// Attaches a tag to a task
    ///
    /// # Errors
    ///
    /// `Conflict` if the tag is already attached.
    pub async fn attach(conn: impl PgExecutor<'_>, task_id: Uuid, tag_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO task_tags (task_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(tag_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(
                "Tag is already attached to this task".to_string(),
            ));
        }

        info!(task_id = %task_id, tag_id = %tag_id, "Tag attached");
        Ok(())
    }

    /// Detaches a tag from a task
    ///
    /// # Errors
    ///
    /// `Conflict` if the tag was not attached.
    pub async fn detach(conn: impl PgExecutor<'_>, task_id: Uuid, tag_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM task_tags WHERE task_id = $1 AND tag_id = $2")
            .bind(task_id)
            .bind(tag_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(
                "Tag is not attached to this task".to_string(),
            ));
        }

        info!(task_id = %task_id, tag_id = %tag_id, "Tag detached");
        Ok(())
    }

    /// Replaces a task's tag set with exactly `tag_ids`
    pub async fn sync_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let ids: Vec<Uuid> = tag_ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let removed = sqlx::query("DELETE FROM task_tags WHERE task_id = $1 AND NOT (tag_id = ANY($2))")
            .bind(task_id)
            .bind(&ids)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let added = sqlx::query(
            r#"
            INSERT INTO task_tags (task_id, tag_id)
            SELECT $1, UNNEST($2::UUID[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(task_id)
        .bind(&ids)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        debug!(task_id = %task_id, added, removed, "Task tags synced");
        Ok(())
    }
}
