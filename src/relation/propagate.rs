//! Cascade propagation
//!
//! Writes against the related collection once the owner mutation has
//! committed. Cascade updates fan out per identifier and run concurrently;
//! there is no atomicity across identifiers, so a failure can leave the
//! related collection partially updated. That outcome is reported as
//! [`RelationError::CascadePartial`] rather than hidden.

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::document::field_doc;
use crate::error::{RelationError, RelationResult};
use crate::relation::{DeletePolicy, Relation};

/// Update-path cascade: for each snapshotted identifier, set the relation's
/// modifier path on every related document referencing it to the embedder's
/// output. Each identifier is an independent unit of work.
pub async fn cascade_update(relation: &Relation, identifiers: &[Value]) -> RelationResult<()> {
    if identifiers.is_empty() {
        return Ok(());
    }
    debug!(
        key = %relation.key,
        related = %relation.related.name(),
        count = identifiers.len(),
        "cascading update into related collection"
    );

    let updates = identifiers.iter().map(|identifier| async move {
        let embedded = (relation.embedder)(identifier.clone()).await?;
        let condition = field_doc(&relation.paths.identifier, identifier.clone());
        let modifier = field_doc("$set", field_doc(relation.paths.modifier_path(), embedded));
        relation.related.update_many(condition, modifier).await?;
        Ok::<(), RelationError>(())
    });

    let results = join_all(updates).await;
    let total = results.len();
    let mut applied = 0;
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(()) => applied += 1,
            Err(error) => {
                let _ = first_failure.get_or_insert(error);
            }
        }
    }

    match first_failure {
        None => Ok(()),
        Some(error) if applied == 0 => Err(error),
        Some(error) => {
            warn!(
                related = %relation.related.name(),
                applied,
                total,
                "cascade partially applied, related collection may be stale"
            );
            Err(RelationError::CascadePartial {
                applied,
                total,
                message: error.to_string(),
            })
        }
    }
}

/// Delete-path propagation, dispatched on the relation's delete policy.
/// `restrict` was already enforced before the delete; here it is a no-op,
/// as is `ignore`.
pub async fn propagate_delete(relation: &Relation, identifiers: &[Value]) -> RelationResult<()> {
    if identifiers.is_empty() {
        return Ok(());
    }
    let condition = field_doc(&relation.paths.identifier, json!({"$in": identifiers}));

    match relation.on_delete {
        DeletePolicy::Cascade => {
            debug!(related = %relation.related.name(), "cascade-deleting related documents");
            relation.related.delete_many(condition).await?;
        }
        DeletePolicy::Unset => {
            let modifier = field_doc("$unset", field_doc(&relation.paths.field, Value::Bool(true)));
            relation.related.update_many(condition, modifier).await?;
        }
        DeletePolicy::Pull => {
            let element = field_doc(&relation.key, json!({"$in": identifiers}));
            let modifier = field_doc("$pull", field_doc(&relation.paths.field, element));
            relation.related.update_many(condition, modifier).await?;
        }
        DeletePolicy::Restrict | DeletePolicy::Ignore => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::relation::{Embedder, RelationPaths, UpdatePolicy};
    use crate::store::{DocumentStore, MemoryStore};
    use std::sync::Arc;

    fn relation_with_embedder(embedder: Embedder) -> (Relation, Arc<MemoryStore>) {
        let authors = Collection::new("authors", Arc::new(MemoryStore::new()));
        let books_store = Arc::new(MemoryStore::new());
        let books = Collection::new("books", books_store.clone());
        let relation = Relation::new(
            "_id",
            authors,
            books,
            RelationPaths::new("author._id", "author"),
            vec!["name".to_string()],
            embedder,
        )
        .on_update(UpdatePolicy::Cascade);
        (relation, books_store)
    }

    #[tokio::test]
    async fn cascade_update_rewrites_each_referencing_document() {
        let embedder: Embedder =
            Arc::new(|id| Box::pin(async move { Ok(json!({"_id": id, "name": "fresh"})) }));
        let (relation, books) = relation_with_embedder(embedder);
        books
            .insert_one(json!({"_id": 1, "author": {"_id": 5, "name": "stale"}}))
            .await
            .unwrap();
        books
            .insert_one(json!({"_id": 2, "author": {"_id": 6, "name": "other"}}))
            .await
            .unwrap();

        cascade_update(&relation, &[json!(5)]).await.unwrap();

        let dump = books.dump().await;
        assert_eq!(dump[0]["author"], json!({"_id": 5, "name": "fresh"}));
        assert_eq!(dump[1]["author"]["name"], json!("other"));
    }

    #[tokio::test]
    async fn partial_failure_is_reported_distinctly() {
        let embedder: Embedder = Arc::new(|id| {
            Box::pin(async move {
                if id == json!(6) {
                    Err(RelationError::storage("embedder exploded"))
                } else {
                    Ok(json!({"_id": id}))
                }
            })
        });
        let (relation, books) = relation_with_embedder(embedder);
        books
            .insert_one(json!({"_id": 1, "author": {"_id": 5}}))
            .await
            .unwrap();

        let err = cascade_update(&relation, &[json!(5), json!(6)])
            .await
            .unwrap_err();
        match err {
            RelationError::CascadePartial { applied, total, .. } => {
                assert_eq!(applied, 1);
                assert_eq!(total, 2);
            }
            other => panic!("expected CascadePartial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_failures_surface_as_a_clean_error() {
        let embedder: Embedder =
            Arc::new(|_| Box::pin(async move { Err(RelationError::storage("down")) }));
        let (relation, _books) = relation_with_embedder(embedder);

        let err = cascade_update(&relation, &[json!(5)]).await.unwrap_err();
        assert!(!err.is_partial());
    }

    #[tokio::test]
    async fn empty_snapshot_is_a_no_op() {
        let embedder: Embedder = Arc::new(|id| Box::pin(async move { Ok(id) }));
        let (relation, books) = relation_with_embedder(embedder);
        cascade_update(&relation, &[]).await.unwrap();
        propagate_delete(&relation, &[]).await.unwrap();
        assert!(books.dump().await.is_empty());
    }
}
