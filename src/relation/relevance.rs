//! Change relevance analysis
//!
//! Decides whether a proposed mutation touches any field a relation embeds,
//! so cascade machinery only runs when an embedded field can actually change.
//! Relevance is evaluated at top-level-field granularity: dotted paths reduce
//! to their first segment.

use std::collections::HashSet;

use serde_json::Value;

use crate::document::{top_level_field, MutationSpec};
use crate::relation::Relation;

/// Top-level field names a mutation touches. For a replacement document that
/// is every field present; for an operator modifier it is the union of field
/// names across all operators.
pub fn modified_fields(mutation: &MutationSpec) -> HashSet<&str> {
    let mut fields = HashSet::new();
    match mutation {
        MutationSpec::Replacement(doc) => {
            if let Some(entries) = doc.as_object() {
                fields.extend(entries.keys().map(|key| top_level_field(key)));
            }
        }
        MutationSpec::Modifier(doc) => {
            if let Some(operators) = doc.as_object() {
                for operand in operators.values() {
                    if let Value::Object(entries) = operand {
                        fields.extend(entries.keys().map(|key| top_level_field(key)));
                    }
                }
            }
        }
    }
    fields
}

/// True iff the mutation touches a projected field other than the relation
/// key itself.
pub fn is_relevant(mutation: &MutationSpec, relation: &Relation) -> bool {
    let touched = modified_fields(mutation);
    relation
        .projection
        .iter()
        .filter(|field| *field != &relation.key)
        .any(|field| touched.contains(field.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::relation::{Embedder, RelationPaths};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn relation() -> Relation {
        let embedder: Embedder = Arc::new(|id| Box::pin(async move { Ok(id) }));
        Relation::new(
            "_id",
            Collection::new("authors", Arc::new(MemoryStore::new())),
            Collection::new("books", Arc::new(MemoryStore::new())),
            RelationPaths::new("author._id", "author"),
            vec!["name".to_string()],
            embedder,
        )
    }

    #[test]
    fn modifier_fields_flatten_across_operators() {
        let spec = MutationSpec::Modifier(json!({
            "$set": {"name": "B", "meta.rating": 3},
            "$unset": {"bio": true},
        }));
        let fields = modified_fields(&spec);
        assert_eq!(fields, HashSet::from(["name", "meta", "bio"]));
    }

    #[test]
    fn replacement_fields_are_top_level_keys() {
        let spec = MutationSpec::Replacement(json!({"_id": 1, "name": "B", "extra.x": 1}));
        let fields = modified_fields(&spec);
        assert_eq!(fields, HashSet::from(["_id", "name", "extra"]));
    }

    #[test]
    fn touching_a_projected_field_is_relevant() {
        let relation = relation();
        let spec = MutationSpec::Modifier(json!({"$set": {"name": "B"}}));
        assert!(is_relevant(&spec, &relation));
    }

    #[test]
    fn touching_only_unprojected_fields_is_not_relevant() {
        let relation = relation();
        let spec = MutationSpec::Modifier(json!({"$set": {"bio": "..."}}));
        assert!(!is_relevant(&spec, &relation));
    }

    #[test]
    fn touching_only_the_key_is_not_relevant() {
        // the key is always projected but excluded from the comparison
        let relation = relation();
        let spec = MutationSpec::Modifier(json!({"$set": {"_id": 9}}));
        assert!(!is_relevant(&spec, &relation));
    }

    #[test]
    fn dotted_paths_count_as_their_top_level_field() {
        let relation = relation();
        let spec = MutationSpec::Modifier(json!({"$set": {"name.first": "B"}}));
        assert!(is_relevant(&spec, &relation));
    }
}
