//! Delete restriction checking
//!
//! Under a `restrict` policy a delete is blocked while any related document
//! still references one of the about-to-be-deleted identifiers. The probe
//! fetches only the related document's `_id`, enough for an actionable
//! diagnostic naming exactly which document blocks the delete.

use serde_json::{json, Value};

use crate::document::field_doc;
use crate::error::{RelationError, RelationResult};
use crate::relation::Relation;

pub async fn check_delete_restrictions(
    relation: &Relation,
    identifiers: &[Value],
) -> RelationResult<()> {
    if identifiers.is_empty() {
        return Ok(());
    }

    let condition = field_doc(&relation.paths.identifier, json!({"$in": identifiers}));
    let probe = relation
        .related
        .find_one(&condition, Some(&json!({"_id": 1})))
        .await?;

    match probe {
        Some(doc) => Err(RelationError::Restricted {
            owner: relation.owner.name().to_string(),
            related: relation.related.name().to_string(),
            field: relation.paths.field.clone(),
            identifier: doc.get("_id").cloned().unwrap_or(Value::Null),
        }),
        None => Ok(()),
    }
}
