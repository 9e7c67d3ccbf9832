//! Special folder provisioning.

use tracing::{debug, info};

use super::{FolderType, LocalStore, StorageError, SyncClass};
use crate::account::AccountRecord;
use crate::verify::MessageCatalog;

/// Internal id of the outbox.
pub const OUTBOX_FOLDER_ID: &str = "INTERNAL_OUTBOX";
/// Internal id of the local drafts folder.
pub const DRAFTS_FOLDER_ID: &str = "Drafts";
/// Internal id of the local sent folder.
pub const SENT_FOLDER_ID: &str = "Sent";
/// Internal id of the local trash folder.
pub const TRASH_FOLDER_ID: &str = "Trash";

/// Well-known local folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFolder {
    /// Messages waiting to be sent.
    Outbox,
    /// Unfinished messages.
    Drafts,
    /// Sent messages.
    Sent,
    /// Deleted messages.
    Trash,
}

impl SpecialFolder {
    /// Internal id used in the local store.
    #[must_use]
    pub const fn internal_id(self) -> &'static str {
        match self {
            Self::Outbox => OUTBOX_FOLDER_ID,
            Self::Drafts => DRAFTS_FOLDER_ID,
            Self::Sent => SENT_FOLDER_ID,
            Self::Trash => TRASH_FOLDER_ID,
        }
    }
}

/// Makes sure a local folder exists and is configured as a special folder.
///
/// Creates the folder if missing, then always sets its name, puts it in
/// the top group and disables synchronization. Running it again changes
/// nothing but those settings.
///
/// # Errors
///
/// Returns an error if any store operation fails.
pub async fn ensure_folder<S: LocalStore>(
    store: &S,
    account_uuid: &str,
    internal_id: &str,
    display_name: &str,
) -> Result<(), StorageError> {
    if !store.folder_exists(account_uuid, internal_id).await? {
        store
            .create_folder(account_uuid, internal_id, FolderType::HoldsMessages)
            .await?;
    }
    store
        .set_folder_name(account_uuid, internal_id, display_name)
        .await?;
    store.set_in_top_group(account_uuid, internal_id, true).await?;
    store
        .set_sync_class(account_uuid, internal_id, SyncClass::None)
        .await?;
    debug!("Ensured folder {} as {:?}", internal_id, display_name);
    Ok(())
}

/// Provisions the account's special folders.
///
/// The outbox always exists locally. POP3 has no server-side drafts, sent
/// or trash folders, so POP3 accounts get local ones and their ids are
/// recorded on the account.
///
/// # Errors
///
/// Returns an error if any folder cannot be ensured.
pub async fn provision_special_folders<S, C>(
    store: &S,
    account: &mut AccountRecord,
    catalog: &C,
) -> Result<(), StorageError>
where
    S: LocalStore,
    C: MessageCatalog + ?Sized,
{
    let uuid = account.uuid().to_string();

    ensure(store, &uuid, SpecialFolder::Outbox, catalog).await?;
    account.special_folders_mut().outbox = Some(OUTBOX_FOLDER_ID.to_string());

    if !account.store().protocol().is_pop3_like() {
        return Ok(());
    }

    for folder in [SpecialFolder::Drafts, SpecialFolder::Sent, SpecialFolder::Trash] {
        ensure(store, &uuid, folder, catalog).await?;
    }
    let folders = account.special_folders_mut();
    folders.drafts = Some(DRAFTS_FOLDER_ID.to_string());
    folders.sent = Some(SENT_FOLDER_ID.to_string());
    folders.trash = Some(TRASH_FOLDER_ID.to_string());

    info!("Provisioned local POP3 folders for {}", account.email());
    Ok(())
}

async fn ensure<S, C>(
    store: &S,
    account_uuid: &str,
    folder: SpecialFolder,
    catalog: &C,
) -> Result<(), StorageError>
where
    S: LocalStore,
    C: MessageCatalog + ?Sized,
{
    let name = catalog.special_folder_name(folder);
    ensure_folder(store, account_uuid, folder.internal_id(), &name).await
}
