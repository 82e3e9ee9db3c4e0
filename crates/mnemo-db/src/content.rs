//! Todos and memories: the authoritative records.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use mnemo_core::{ContentStore, Error, Memory, Result, Todo};

pub(crate) const TODO_COLUMNS: &str =
    "id, user_id, title, description, status, priority, due_date, tags, created_at";

pub(crate) const MEMORY_COLUMNS: &str = "id, user_id, title, content, category, tags, created_at";

pub(crate) fn todo_from_row(row: &PgRow) -> Todo {
    Todo {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        priority: row.get("priority"),
        due_date: row.get("due_date"),
        tags: row.get("tags"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn memory_from_row(row: &PgRow) -> Memory {
    Memory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        tags: row.get("tags"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL access to todos and memories.
#[derive(Clone)]
pub struct PgContentStore {
    pool: Pool<Postgres>,
}

impl PgContentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert_todo(&self, todo: &Todo) -> Result<()> {
        sqlx::query(
            "INSERT INTO todo (id, user_id, title, description, status, priority, due_date, tags, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 description = EXCLUDED.description,
                 status = EXCLUDED.status,
                 priority = EXCLUDED.priority,
                 due_date = EXCLUDED.due_date,
                 tags = EXCLUDED.tags",
        )
        .bind(todo.id)
        .bind(todo.user_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(&todo.status)
        .bind(&todo.priority)
        .bind(todo.due_date)
        .bind(&todo.tags)
        .bind(todo.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub async fn insert_memory(&self, memory: &Memory) -> Result<()> {
        sqlx::query(
            "INSERT INTO memory (id, user_id, title, content, category, tags, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 content = EXCLUDED.content,
                 category = EXCLUDED.category,
                 tags = EXCLUDED.tags",
        )
        .bind(memory.id)
        .bind(memory.user_id)
        .bind(&memory.title)
        .bind(&memory.content)
        .bind(&memory.category)
        .bind(&memory.tags)
        .bind(memory.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    /// Delete every todo and memory of a user in one transaction.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let todos = sqlx::query("DELETE FROM todo WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        let memories = sqlx::query("DELETE FROM memory WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "content_store",
            op = "delete_user",
            %user_id,
            todos,
            memories,
            "Deleted user records"
        );
        Ok(todos + memories)
    }

    /// Users owning at least one record.
    pub async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT user_id FROM todo UNION SELECT user_id FROM memory ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn get_todo_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Todo>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM todo WHERE id = $1 AND user_id = $2",
            TODO_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(todo_from_row))
    }

    async fn get_memory_by_id(&self, user_id: Uuid, id: Uuid) -> Result<Option<Memory>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memory WHERE id = $1 AND user_id = $2",
            MEMORY_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(memory_from_row))
    }

    async fn list_todos(&self, user_id: Uuid) -> Result<Vec<Todo>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM todo WHERE user_id = $1 ORDER BY created_at, id",
            TODO_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(todo_from_row).collect())
    }

    async fn list_memories(&self, user_id: Uuid) -> Result<Vec<Memory>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM memory WHERE user_id = $1 ORDER BY created_at, id",
            MEMORY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(memory_from_row).collect())
    }
}
