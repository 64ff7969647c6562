//! Storage backend abstraction
//!
//! The relation engine never talks to a storage engine directly; it goes
//! through the [`DocumentStore`] trait so any backend with Mongo-style
//! find/update/delete semantics can sit underneath a [`crate::Collection`].

pub mod memory;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::RelationResult;

pub use memory::MemoryStore;

/// Outcome of an update/replace/upsert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateReport {
    /// Documents matched by the condition before the mutation.
    pub matched_count: u64,
    /// Documents actually changed by the mutation.
    pub modified_count: u64,
}

/// Outcome of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteReport {
    pub deleted_count: u64,
}

/// Mongo-style document storage seam.
///
/// Conditions, projections and modifiers are `serde_json::Value` objects with
/// dotted keys for nested paths. Implementations report failures as
/// [`crate::RelationError::Storage`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Vec<Document>>;

    async fn find_one(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Option<Document>>;

    async fn insert_one(&self, document: Document) -> RelationResult<()>;

    async fn update_one(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport>;

    async fn update_many(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport>;

    async fn replace_one(
        &self,
        condition: &Document,
        replacement: &Document,
    ) -> RelationResult<UpdateReport>;

    /// Update the first matching document, or insert a new one synthesized
    /// from the condition's equality fields when nothing matches.
    async fn upsert_one(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport>;

    async fn delete_one(&self, condition: &Document) -> RelationResult<DeleteReport>;

    async fn delete_many(&self, condition: &Document) -> RelationResult<DeleteReport>;
}
