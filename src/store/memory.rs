//! In-memory document store
//!
//! A small Mongo-flavoured backend over a `Vec` of JSON documents: dotted-path
//! lookup with array fan-out, `$eq`/`$in` condition matching, and
//! `$set`/`$unset`/`$pull` modifier application. Used by the test suite and
//! handy as a zero-setup backend; it is not a query engine.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::document::{top_level_field, Document};
use crate::error::{RelationError, RelationResult};
use crate::store::{DeleteReport, DocumentStore, UpdateReport};

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the full contents, in insertion order.
    pub async fn dump(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| matches(doc, condition))
            .map(|doc| project(doc, projection))
            .collect())
    }

    async fn find_one(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .find(|doc| matches(doc, condition))
            .map(|doc| project(doc, projection)))
    }

    async fn insert_one(&self, document: Document) -> RelationResult<()> {
        self.documents.write().await.push(document);
        Ok(())
    }

    async fn update_one(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport> {
        let mut documents = self.documents.write().await;
        let mut report = UpdateReport::default();
        for doc in documents.iter_mut() {
            if matches(doc, condition) {
                report.matched_count = 1;
                if apply_modifier(doc, modifier)? {
                    report.modified_count = 1;
                }
                break;
            }
        }
        Ok(report)
    }

    async fn update_many(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport> {
        let mut documents = self.documents.write().await;
        let mut report = UpdateReport::default();
        for doc in documents.iter_mut() {
            if matches(doc, condition) {
                report.matched_count += 1;
                if apply_modifier(doc, modifier)? {
                    report.modified_count += 1;
                }
            }
        }
        Ok(report)
    }

    async fn replace_one(
        &self,
        condition: &Document,
        replacement: &Document,
    ) -> RelationResult<UpdateReport> {
        let mut documents = self.documents.write().await;
        let mut report = UpdateReport::default();
        for doc in documents.iter_mut() {
            if matches(doc, condition) {
                report.matched_count = 1;
                let mut next = replacement.clone();
                // Replacement keeps the stored _id unless it names its own.
                if next.get("_id").is_none() {
                    if let (Some(fields), Some(id)) = (next.as_object_mut(), doc.get("_id")) {
                        fields.insert("_id".to_string(), id.clone());
                    }
                }
                if *doc != next {
                    *doc = next;
                    report.modified_count = 1;
                }
                break;
            }
        }
        Ok(report)
    }

    async fn upsert_one(
        &self,
        condition: &Document,
        modifier: &Document,
    ) -> RelationResult<UpdateReport> {
        let mut documents = self.documents.write().await;
        let mut report = UpdateReport::default();
        for doc in documents.iter_mut() {
            if matches(doc, condition) {
                report.matched_count = 1;
                if apply_modifier(doc, modifier)? {
                    report.modified_count = 1;
                }
                return Ok(report);
            }
        }

        let mut fresh = seed_from_condition(condition);
        apply_modifier(&mut fresh, modifier)?;
        documents.push(fresh);
        Ok(report)
    }

    async fn delete_one(&self, condition: &Document) -> RelationResult<DeleteReport> {
        let mut documents = self.documents.write().await;
        match documents.iter().position(|doc| matches(doc, condition)) {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteReport { deleted_count: 1 })
            }
            None => Ok(DeleteReport::default()),
        }
    }

    async fn delete_many(&self, condition: &Document) -> RelationResult<DeleteReport> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| !matches(doc, condition));
        Ok(DeleteReport {
            deleted_count: (before - documents.len()) as u64,
        })
    }
}

/// True when every condition entry matches the document. Dotted paths fan out
/// through arrays, so `{"authors._id": 2}` matches a document whose `authors`
/// array holds an element with `_id == 2`.
fn matches(doc: &Value, condition: &Value) -> bool {
    let Some(entries) = condition.as_object() else {
        return false;
    };
    entries.iter().all(|(path, expected)| {
        let mut actuals = Vec::new();
        let segments: Vec<&str> = path.split('.').collect();
        lookup(doc, &segments, &mut actuals);
        value_matches(&actuals, expected)
    })
}

fn lookup<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(fields) => {
            if let Some(next) = fields.get(*first) {
                lookup(next, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                lookup(item, segments, out);
            }
        }
        _ => {}
    }
}

fn value_matches(actuals: &[&Value], expected: &Value) -> bool {
    if let Some(operators) = expected.as_object() {
        if operators.keys().any(|key| key.starts_with('$')) {
            return operators.iter().all(|(op, operand)| match op.as_str() {
                "$eq" => actuals.iter().any(|actual| equals(actual, operand)),
                "$in" => match operand.as_array() {
                    Some(candidates) => actuals
                        .iter()
                        .any(|actual| candidates.iter().any(|c| equals(actual, c))),
                    None => false,
                },
                _ => false,
            });
        }
    }
    actuals.iter().any(|actual| equals(actual, expected))
}

/// Direct equality, plus Mongo's scalar-in-array containment.
fn equals(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

/// Applies an operator modifier in place. Returns whether anything changed.
fn apply_modifier(doc: &mut Value, modifier: &Value) -> RelationResult<bool> {
    let Some(operators) = modifier.as_object() else {
        return Err(RelationError::storage("modifier must be an object"));
    };
    let before = doc.clone();
    for (operator, spec) in operators {
        let Some(fields) = spec.as_object() else {
            return Err(RelationError::storage(format!(
                "operator `{operator}` expects an object operand"
            )));
        };
        for (path, operand) in fields {
            let segments: Vec<&str> = path.split('.').collect();
            match operator.as_str() {
                "$set" => set_path(doc, &segments, operand.clone()),
                "$unset" => unset_path(doc, &segments),
                "$pull" => pull_path(doc, &segments, operand),
                other => {
                    return Err(RelationError::storage(format!(
                        "unsupported update operator `{other}`"
                    )));
                }
            }
        }
    }
    Ok(*doc != before)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(fields) => fields,
        _ => unreachable!("value was just made an object"),
    }
}

fn set_path(value: &mut Value, segments: &[&str], new: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let fields = ensure_object(value);
    if rest.is_empty() {
        fields.insert((*first).to_string(), new);
    } else {
        let next = fields.entry((*first).to_string()).or_insert(Value::Null);
        set_path(next, rest, new);
    }
}

fn unset_path(value: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(fields) = value.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        fields.remove(*first);
    } else if let Some(next) = fields.get_mut(*first) {
        unset_path(next, rest);
    }
}

fn pull_path(value: &mut Value, segments: &[&str], predicate: &Value) {
    match segments.split_first() {
        None => {
            if let Value::Array(items) = value {
                items.retain(|item| !pull_matches(item, predicate));
            }
        }
        Some((first, rest)) => {
            if let Some(next) = value.get_mut(*first) {
                pull_path(next, rest, predicate);
            }
        }
    }
}

fn pull_matches(item: &Value, predicate: &Value) -> bool {
    match predicate.as_object() {
        Some(fields) if fields.keys().any(|key| key.starts_with('$')) => {
            value_matches(&[item], predicate)
        }
        Some(_) => matches(item, predicate),
        None => equals(item, predicate),
    }
}

/// A fresh upsert document starts from the condition's equality fields;
/// operator-valued entries carry no seed value.
fn seed_from_condition(condition: &Value) -> Document {
    let mut seed = Map::new();
    if let Some(entries) = condition.as_object() {
        for (path, expected) in entries {
            let is_operator_value = expected
                .as_object()
                .is_some_and(|fields| fields.keys().any(|key| key.starts_with('$')));
            if !is_operator_value && !path.contains('.') {
                seed.insert(path.clone(), expected.clone());
            }
        }
    }
    Value::Object(seed)
}

fn project(doc: &Value, projection: Option<&Document>) -> Document {
    let Some(fields) = projection.and_then(Value::as_object) else {
        return doc.clone();
    };
    if fields.is_empty() {
        return doc.clone();
    }
    let Some(source) = doc.as_object() else {
        return doc.clone();
    };

    let mut out = Map::new();
    if let Some(id) = source.get("_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for (path, include) in fields {
        if included(include) {
            let top = top_level_field(path);
            if let Some(value) = source.get(top) {
                out.insert(top.to_string(), value.clone());
            }
        }
    }
    Value::Object(out)
}

fn included(flag: &Value) -> bool {
    flag == &Value::Bool(true) || flag.as_i64() == Some(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_one(json!({"_id": 1, "title": "Dune", "author": {"_id": 10, "name": "FH"}}))
            .await
            .unwrap();
        store
            .insert_one(json!({"_id": 2, "title": "Emma", "author": {"_id": 11, "name": "JA"}}))
            .await
            .unwrap();
        store
            .insert_one(json!({"_id": 3, "authors": [{"_id": 10}, {"_id": 12}]}))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn finds_by_dotted_path() {
        let store = seeded().await;
        let found = store.find(&json!({"author._id": 10}), None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], json!(1));
    }

    #[tokio::test]
    async fn dotted_path_fans_out_through_arrays() {
        let store = seeded().await;
        let found = store
            .find(&json!({"authors._id": {"$in": [12]}}), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], json!(3));
    }

    #[tokio::test]
    async fn projection_keeps_id_and_listed_fields() {
        let store = seeded().await;
        let found = store
            .find(&json!({"_id": 1}), Some(&json!({"title": true})))
            .await
            .unwrap();
        assert_eq!(found[0], json!({"_id": 1, "title": "Dune"}));
    }

    #[tokio::test]
    async fn set_creates_nested_objects() {
        let store = seeded().await;
        let report = store
            .update_one(&json!({"_id": 2}), &json!({"$set": {"meta.rating": 5}}))
            .await
            .unwrap();
        assert_eq!(report.modified_count, 1);

        let doc = store.find_one(&json!({"_id": 2}), None).await.unwrap().unwrap();
        assert_eq!(doc["meta"]["rating"], json!(5));
    }

    #[tokio::test]
    async fn unset_removes_the_field() {
        let store = seeded().await;
        store
            .update_many(&json!({"_id": 1}), &json!({"$unset": {"author": true}}))
            .await
            .unwrap();
        let doc = store.find_one(&json!({"_id": 1}), None).await.unwrap().unwrap();
        assert!(doc.get("author").is_none());
    }

    #[tokio::test]
    async fn pull_removes_matching_array_elements_only() {
        let store = seeded().await;
        store
            .update_many(
                &json!({"_id": 3}),
                &json!({"$pull": {"authors": {"_id": {"$in": [10]}}}}),
            )
            .await
            .unwrap();
        let doc = store.find_one(&json!({"_id": 3}), None).await.unwrap().unwrap();
        assert_eq!(doc["authors"], json!([{"_id": 12}]));
    }

    #[tokio::test]
    async fn upsert_inserts_when_nothing_matches() {
        let store = seeded().await;
        let report = store
            .upsert_one(&json!({"_id": 9}), &json!({"$set": {"title": "New"}}))
            .await
            .unwrap();
        assert_eq!(report.matched_count, 0);

        let doc = store.find_one(&json!({"_id": 9}), None).await.unwrap().unwrap();
        assert_eq!(doc["title"], json!("New"));
    }

    #[tokio::test]
    async fn unknown_operator_is_a_storage_error() {
        let store = seeded().await;
        let err = store
            .update_one(&json!({"_id": 1}), &json!({"$rename": {"title": "name"}}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("$rename"));
    }

    #[tokio::test]
    async fn delete_many_reports_count() {
        let store = seeded().await;
        let report = store
            .delete_many(&json!({"_id": {"$in": [1, 2]}}))
            .await
            .unwrap();
        assert_eq!(report.deleted_count, 2);
        assert_eq!(store.dump().await.len(), 1);
    }
}
