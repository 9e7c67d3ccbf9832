//! Local mailbox storage.
//!
//! The verifier only needs a handful of folder operations, expressed by
//! [`LocalStore`]. [`SqliteLocalStore`] is the on-disk implementation.

mod provision;
mod sqlite;

use std::future::Future;

use thiserror::Error;

pub use provision::{
    DRAFTS_FOLDER_ID, OUTBOX_FOLDER_ID, SENT_FOLDER_ID, SpecialFolder, TRASH_FOLDER_ID,
    ensure_folder, provision_special_folders,
};
pub use sqlite::SqliteLocalStore;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A folder with this id already exists.
    #[error("Folder already exists: {0}")]
    FolderExists(String),

    /// No folder with this id.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
}

/// What a folder may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderType {
    /// Holds messages.
    #[default]
    HoldsMessages,
    /// Holds only subfolders.
    HoldsFolders,
}

impl FolderType {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "folders" => Self::HoldsFolders,
            _ => Self::HoldsMessages,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HoldsMessages => "messages",
            Self::HoldsFolders => "folders",
        }
    }
}

/// How eagerly a folder is synchronized with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncClass {
    /// Never synchronized.
    None,
    /// Synchronized with every check.
    FirstClass,
    /// Synchronized on the slower schedule.
    SecondClass,
    /// Follows the parent setting.
    #[default]
    Inherited,
}

impl SyncClass {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "none" => Self::None,
            "first" => Self::FirstClass,
            "second" => Self::SecondClass,
            _ => Self::Inherited,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FirstClass => "first",
            Self::SecondClass => "second",
            Self::Inherited => "inherited",
        }
    }
}

/// A local folder as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFolder {
    /// Stable internal id ("Drafts", "`INTERNAL_OUTBOX`", ...).
    pub internal_id: String,
    /// Display name.
    pub name: String,
    /// Folder capability.
    pub folder_type: FolderType,
    /// Always shown at the top of the folder list.
    pub in_top_group: bool,
    /// Synchronization class.
    pub sync_class: SyncClass,
}

/// Folder operations on an account's local mailbox.
///
/// Folders are addressed by account uuid and internal id.
pub trait LocalStore: Send + Sync {
    /// Returns true if the folder exists.
    fn folder_exists(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Creates a folder named after its id.
    ///
    /// Fails with [`StorageError::FolderExists`] if it already exists.
    fn create_folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
        folder_type: FolderType,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Sets the display name.
    fn set_folder_name(
        &self,
        account_uuid: &str,
        internal_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Sets the top-group flag.
    fn set_in_top_group(
        &self,
        account_uuid: &str,
        internal_id: &str,
        in_top_group: bool,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Sets the sync class.
    fn set_sync_class(
        &self,
        account_uuid: &str,
        internal_id: &str,
        sync_class: SyncClass,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Loads a folder.
    fn folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> impl Future<Output = Result<Option<LocalFolder>, StorageError>> + Send;
}
