//! `SQLite` local store.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::{FolderType, LocalFolder, LocalStore, StorageError, SyncClass};

/// Folder storage backed by `SQLite`.
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folders (
                account_uuid TEXT NOT NULL,
                internal_id TEXT NOT NULL,
                name TEXT NOT NULL,
                folder_type TEXT NOT NULL,
                in_top_group INTEGER NOT NULL DEFAULT 0,
                sync_class TEXT NOT NULL DEFAULT 'inherited',
                PRIMARY KEY (account_uuid, internal_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of folders stored for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn folder_count(&self, account_uuid: &str) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE account_uuid = ?")
            .bind(account_uuid)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl LocalStore for SqliteLocalStore {
    async fn folder_exists(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM folders WHERE account_uuid = ? AND internal_id = ?")
            .bind(account_uuid)
            .bind(internal_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
        folder_type: FolderType,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO folders (account_uuid, internal_id, name, folder_type)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_uuid, internal_id) DO NOTHING
            ",
        )
        .bind(account_uuid)
        .bind(internal_id)
        .bind(internal_id)
        .bind(folder_type.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::FolderExists(internal_id.to_string()));
        }
        debug!("Created local folder {}", internal_id);
        Ok(())
    }

    async fn set_folder_name(
        &self,
        account_uuid: &str,
        internal_id: &str,
        name: &str,
    ) -> Result<(), StorageError> {
        let result =
            sqlx::query("UPDATE folders SET name = ? WHERE account_uuid = ? AND internal_id = ?")
                .bind(name)
                .bind(account_uuid)
                .bind(internal_id)
                .execute(&self.pool)
                .await?;
        updated_one(result.rows_affected(), internal_id)
    }

    async fn set_in_top_group(
        &self,
        account_uuid: &str,
        internal_id: &str,
        in_top_group: bool,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE folders SET in_top_group = ? WHERE account_uuid = ? AND internal_id = ?",
        )
        .bind(in_top_group)
        .bind(account_uuid)
        .bind(internal_id)
        .execute(&self.pool)
        .await?;
        updated_one(result.rows_affected(), internal_id)
    }

    async fn set_sync_class(
        &self,
        account_uuid: &str,
        internal_id: &str,
        sync_class: SyncClass,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE folders SET sync_class = ? WHERE account_uuid = ? AND internal_id = ?",
        )
        .bind(sync_class.as_str())
        .bind(account_uuid)
        .bind(internal_id)
        .execute(&self.pool)
        .await?;
        updated_one(result.rows_affected(), internal_id)
    }

    async fn folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> Result<Option<LocalFolder>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT internal_id, name, folder_type, in_top_group, sync_class
            FROM folders
            WHERE account_uuid = ? AND internal_id = ?
            ",
        )
        .bind(account_uuid)
        .bind(internal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_folder))
    }
}

/// Fails with [`StorageError::FolderNotFound`] when an UPDATE matched nothing.
fn updated_one(rows_affected: u64, internal_id: &str) -> Result<(), StorageError> {
    if rows_affected == 0 {
        Err(StorageError::FolderNotFound(internal_id.to_string()))
    } else {
        Ok(())
    }
}

/// Convert a database row to a `LocalFolder`.
fn row_to_folder(row: &sqlx::sqlite::SqliteRow) -> LocalFolder {
    LocalFolder {
        internal_id: row.get("internal_id"),
        name: row.get("name"),
        folder_type: FolderType::parse(row.get("folder_type")),
        in_top_group: row.get::<i64, _>("in_top_group") != 0,
        sync_class: SyncClass::parse(row.get("sync_class")),
    }
}
