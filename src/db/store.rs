use uuid::Uuid;

use crate::config::UPDATE_LOCK_ID;
use crate::db::models::{ItemRow, LockRow};
use crate::error::Result;
use crate::types::{format_timestamp, now_naive, RunLock, WatchedItem};

/// Persistent store for watched items and the singleton run-lock row.
/// The lock shares the items keyspace under a reserved id; every item-facing
/// query filters it out.
#[derive(Clone)]
pub struct ItemStore {
    pool: sqlx::SqlitePool,
}

impl ItemStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Item CRUD
    // -----------------------------------------------------------------------

    pub async fn list_items(&self) -> Result<Vec<WatchedItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, url, description, current_price, points, has_sale,
                   last_notification, updated_at
            FROM items
            WHERE id != ?
            ORDER BY id
            "#,
        )
        .bind(UPDATE_LOCK_ID)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(to_item).collect())
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<WatchedItem>> {
        if id == UPDATE_LOCK_ID {
            return Ok(None);
        }
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, url, description, current_price, points, has_sale,
                   last_notification, updated_at
            FROM items
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(to_item))
    }

    pub async fn create_item(&self, url: &str, description: &str) -> Result<WatchedItem> {
        let item = WatchedItem {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            description: description.to_string(),
            current_price: None,
            points: None,
            has_sale: false,
            last_notification: None,
            updated_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO items (id, url, description, has_sale)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(&item.id)
        .bind(&item.url)
        .bind(&item.description)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Delete an item and return the old record, or None if absent.
    pub async fn delete_item(&self, id: &str) -> Result<Option<WatchedItem>> {
        let Some(item) = self.get_item(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(Some(item))
    }

    /// Write back the fields a scan refreshes. `last_notification` is only
    /// overwritten when the cycle actually notified — COALESCE keeps the
    /// previous value otherwise.
    pub async fn update_scan_fields(&self, item: &WatchedItem) -> Result<()> {
        if item.id == UPDATE_LOCK_ID {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE items
            SET current_price = ?,
                description = ?,
                has_sale = ?,
                points = ?,
                updated_at = ?,
                last_notification = COALESCE(?, last_notification)
            WHERE id = ?
            "#,
        )
        .bind(item.current_price)
        .bind(&item.description)
        .bind(i64::from(item.has_sale))
        .bind(item.points)
        .bind(format_timestamp(now_naive()))
        .bind(&item.last_notification)
        .bind(&item.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run lock
    // -----------------------------------------------------------------------

    pub async fn get_lock(&self) -> Result<Option<RunLock>> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT status, started_at, expires_at, function_name
            FROM items
            WHERE id = ?
            "#,
        )
        .bind(UPDATE_LOCK_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| RunLock {
            status: r.status.unwrap_or_default(),
            started_at: r.started_at.unwrap_or_default(),
            expires_at: r.expires_at.unwrap_or_default(),
            function_name: r.function_name.unwrap_or_default(),
        }))
    }

    pub async fn put_lock(&self, lock: &RunLock) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, description, status, started_at, expires_at, function_name)
            VALUES (?, 'scraper update lock', ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                started_at = excluded.started_at,
                expires_at = excluded.expires_at,
                function_name = excluded.function_name
            "#,
        )
        .bind(UPDATE_LOCK_ID)
        .bind(&lock.status)
        .bind(&lock.started_at)
        .bind(&lock.expires_at)
        .bind(&lock.function_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the lock row. A no-op when absent — release is idempotent.
    pub async fn delete_lock(&self) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(UPDATE_LOCK_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn to_item(r: ItemRow) -> WatchedItem {
    WatchedItem {
        id: r.id,
        url: r.url.unwrap_or_default(),
        description: r.description,
        current_price: r.current_price,
        points: r.points,
        has_sale: r.has_sale != 0,
        last_notification: r.last_notification,
        updated_at: r.updated_at,
    }
}

#[cfg(test)]
pub async fn memory_store() -> ItemStore {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    ItemStore::new(pool)
}
