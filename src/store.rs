//! Record store seam and the deduplicating upsert.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::db::{self, Database};
use crate::model::{PostRecord, Source, StoredPost};

/// Persistence for imported posts.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a stored post by its composite key.
    async fn find_one(&self, source: Source, source_id: &str) -> Result<Option<StoredPost>>;

    /// Create or update a post. Posts with an `id` are updated in place.
    async fn save(&self, post: &StoredPost) -> Result<bool>;
}

#[async_trait]
impl RecordStore for Database {
    async fn find_one(&self, source: Source, source_id: &str) -> Result<Option<StoredPost>> {
        db::get_item(self.pool(), source, source_id)
            .await?
            .map(db::SocialStreamItem::into_stored)
            .transpose()
    }

    async fn save(&self, post: &StoredPost) -> Result<bool> {
        match post.id {
            Some(id) => db::update_item(self.pool(), id, &post.record, post.active).await,
            None => {
                db::insert_item(self.pool(), &post.record, post.active).await?;
                Ok(true)
            }
        }
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Store a record keyed by `(source, source_id)`.
///
/// An existing record is updated in place; otherwise a new one is created.
/// `active` is always overwritten with `active_default`, whatever the stored
/// value was.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub async fn upsert(
    store: &dyn RecordStore,
    record: PostRecord,
    active_default: bool,
) -> Result<Upserted> {
    let existing = store.find_one(record.source, &record.source_id).await?;
    let (id, outcome) = match existing {
        Some(stored) => (stored.id, Upserted::Updated),
        None => (None, Upserted::Created),
    };

    debug!(
        source = %record.source,
        source_id = %record.source_id,
        outcome = ?outcome,
        "Upserting post"
    );

    store
        .save(&StoredPost {
            id,
            record,
            active: active_default,
        })
        .await?;

    Ok(outcome)
}
