//! # doc-relations
//!
//! Referential integrity between two document collections related by a
//! foreign-key-like field, without a shared transactional store. An owner
//! collection holds canonical documents identified by a key field; a related
//! collection embeds that key. Declared policies decide, per relation, what an
//! owner update or delete does to the related collection: cascade the change,
//! block the delete, unset or pull the embedded reference, or ignore it.
//!
//! The engine registers paired before/after hooks around every mutating
//! operation on the owner collection. Before-hooks snapshot the affected
//! identifiers while the pre-mutation state is still queryable (and enforce
//! `restrict` deletes); after-hooks propagate against that snapshot once the
//! mutation has committed. There is no multi-document atomicity across the
//! owner mutation and its cascaded writes: a crash between phases leaves the
//! related collection stale until the operation is retried by the caller.

pub mod collection;
pub mod document;
pub mod error;
pub mod events;
pub mod relation;
pub mod store;

pub use collection::Collection;
pub use document::{field_doc, top_level_field, Document, MutationSpec};
pub use error::{RelationError, RelationResult};
pub use events::{Hook, HookEvent, HookParams, HookRegistry, LifecycleHook, OperationContext};
pub use relation::{
    setup, DeletePolicy, Embedder, Relation, RelationPaths, UpdatePolicy,
};
pub use store::{DeleteReport, DocumentStore, MemoryStore, UpdateReport};
