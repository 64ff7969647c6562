//! Identifier resolution
//!
//! Snapshots the owner-key values a condition matches, read before the
//! mutation is applied. Cascades always propagate against this snapshot,
//! never a post-mutation re-query: after the mutation the condition may no
//! longer match the changed documents.

use serde_json::Value;

use crate::collection::Collection;
use crate::document::{field_doc, Document};
use crate::error::RelationResult;

/// Key values of every owner document matching `condition`, in storage result
/// order. Read-only; a failed query propagates with no partial result.
pub async fn resolve_identifiers(
    owner: &Collection,
    condition: &Document,
    key: &str,
) -> RelationResult<Vec<Document>> {
    let projection = field_doc(key, Value::Bool(true));
    let documents = owner.find(condition, Some(&projection)).await?;
    Ok(documents
        .into_iter()
        .filter_map(|doc| doc.get(key).cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn resolves_matching_key_values_in_order() {
        let store = Arc::new(MemoryStore::new());
        store.insert_one(json!({"_id": 3, "name": "c"})).await.unwrap();
        store.insert_one(json!({"_id": 1, "name": "a"})).await.unwrap();
        store.insert_one(json!({"_id": 2, "name": "a"})).await.unwrap();
        let owner = Collection::new("authors", store);

        let identifiers = resolve_identifiers(&owner, &json!({"name": "a"}), "_id")
            .await
            .unwrap();
        assert_eq!(identifiers, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn no_match_yields_empty_snapshot() {
        let owner = Collection::new("authors", Arc::new(MemoryStore::new()));
        let identifiers = resolve_identifiers(&owner, &json!({"name": "zzz"}), "_id")
            .await
            .unwrap();
        assert!(identifiers.is_empty());
    }
}
