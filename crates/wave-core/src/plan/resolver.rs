//! Library item resolution by natural key (name, owner).

use anyhow::{Context, Result};
use tracing::debug;

use wave_db::models::{LibraryItem, PlanKind};

use super::item::LibraryItemSpec;
use super::store::PlanTransaction;

/// Outcome of [`resolve_or_create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// An item with the same natural key already existed and was reused.
    Existing(LibraryItem),
    /// The item was created by this transaction.
    Created(LibraryItem),
}

impl Resolution {
    pub fn item(&self) -> &LibraryItem {
        match self {
            Self::Existing(item) | Self::Created(item) => item,
        }
    }

    pub fn into_item(self) -> LibraryItem {
        match self {
            Self::Existing(item) | Self::Created(item) => item,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Look an item up within the transaction's view of the store.
///
/// `Ok(None)` means the item must be created; any `Err` is a storage fault.
pub async fn find_by_name_and_owner(
    tx: &mut dyn PlanTransaction,
    kind: PlanKind,
    name: &str,
    health_specialist_id: &str,
) -> Result<Option<LibraryItem>> {
    tx.find_item(kind, name, health_specialist_id).await
}

/// Reuse the stored item with `spec`'s natural key, or create it.
///
/// An existing item is reused as-is; its other fields are not compared with
/// `spec`. If the insert loses a race against a concurrent transaction that
/// committed the same key first, the winner's row is returned.
pub async fn resolve_or_create<I: LibraryItemSpec>(
    tx: &mut dyn PlanTransaction,
    spec: &I,
) -> Result<Resolution> {
    let (name, owner) = (spec.name(), spec.health_specialist_id());

    if let Some(existing) = find_by_name_and_owner(tx, I::KIND, name, owner).await? {
        debug!(kind = %I::KIND, item = name, owner, id = %existing.id(), "reusing library item");
        return Ok(Resolution::Existing(existing));
    }

    match tx.insert_item_if_absent(&spec.as_new_item()).await? {
        Some(created) => {
            debug!(kind = %I::KIND, item = name, owner, id = %created.id(), "created library item");
            Ok(Resolution::Created(created))
        }
        None => {
            let winner = find_by_name_and_owner(tx, I::KIND, name, owner)
                .await?
                .with_context(|| {
                    format!("{} {name:?} of {owner:?} conflicted but cannot be read", I::KIND)
                })?;
            debug!(
                kind = %I::KIND,
                item = name,
                owner,
                id = %winner.id(),
                "library item created concurrently, reusing"
            );
            Ok(Resolution::Existing(winner))
        }
    }
}
