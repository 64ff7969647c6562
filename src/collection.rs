//! Collection handle
//!
//! A [`Collection`] names a [`DocumentStore`] and owns the hook registry for
//! its mutation lifecycle. Mutating operations sequence strictly:
//! before-hooks, then the storage mutation, then after-hooks, all sharing one
//! [`HookParams`] value. A failure at any stage aborts the call and skips the
//! remaining stages.

use std::sync::Arc;

use tracing::debug;

use crate::document::{Document, MutationSpec};
use crate::error::RelationResult;
use crate::events::{HookEvent, HookParams, HookRegistry};
use crate::store::{DeleteReport, DocumentStore, UpdateReport};

pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
    hooks: HookRegistry,
}

impl Collection {
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            store,
            hooks: HookRegistry::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub async fn find(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Vec<Document>> {
        self.store.find(condition, projection).await
    }

    pub async fn find_one(
        &self,
        condition: &Document,
        projection: Option<&Document>,
    ) -> RelationResult<Option<Document>> {
        self.store.find_one(condition, projection).await
    }

    pub async fn insert_one(&self, document: Document) -> RelationResult<()> {
        self.store.insert_one(document).await
    }

    pub async fn update_one(
        &self,
        condition: Document,
        modifier: Document,
    ) -> RelationResult<UpdateReport> {
        debug!(collection = %self.name, "update_one");
        let mut params =
            HookParams::for_mutation(condition.clone(), MutationSpec::Modifier(modifier.clone()));
        self.hooks.run(HookEvent::BeforeUpdateOne, &mut params).await?;
        let report = self.store.update_one(&condition, &modifier).await?;
        self.hooks.run(HookEvent::AfterUpdateOne, &mut params).await?;
        Ok(report)
    }

    pub async fn update_many(
        &self,
        condition: Document,
        modifier: Document,
    ) -> RelationResult<UpdateReport> {
        debug!(collection = %self.name, "update_many");
        let mut params =
            HookParams::for_mutation(condition.clone(), MutationSpec::Modifier(modifier.clone()));
        self.hooks.run(HookEvent::BeforeUpdateMany, &mut params).await?;
        let report = self.store.update_many(&condition, &modifier).await?;
        self.hooks.run(HookEvent::AfterUpdateMany, &mut params).await?;
        Ok(report)
    }

    pub async fn replace_one(
        &self,
        condition: Document,
        replacement: Document,
    ) -> RelationResult<UpdateReport> {
        debug!(collection = %self.name, "replace_one");
        let mut params = HookParams::for_mutation(
            condition.clone(),
            MutationSpec::Replacement(replacement.clone()),
        );
        self.hooks.run(HookEvent::BeforeReplaceOne, &mut params).await?;
        let report = self.store.replace_one(&condition, &replacement).await?;
        self.hooks.run(HookEvent::AfterReplaceOne, &mut params).await?;
        Ok(report)
    }

    pub async fn upsert_one(
        &self,
        condition: Document,
        modifier: Document,
    ) -> RelationResult<UpdateReport> {
        debug!(collection = %self.name, "upsert_one");
        let mut params =
            HookParams::for_mutation(condition.clone(), MutationSpec::Modifier(modifier.clone()));
        self.hooks.run(HookEvent::BeforeUpsertOne, &mut params).await?;
        let report = self.store.upsert_one(&condition, &modifier).await?;
        // a fresh insert has no prior references to refresh
        params.is_updated = report.matched_count > 0;
        self.hooks.run(HookEvent::AfterUpsertOne, &mut params).await?;
        Ok(report)
    }

    pub async fn delete_one(&self, condition: Document) -> RelationResult<DeleteReport> {
        debug!(collection = %self.name, "delete_one");
        let mut params = HookParams::for_delete(condition.clone());
        self.hooks.run(HookEvent::BeforeDeleteOne, &mut params).await?;
        let report = self.store.delete_one(&condition).await?;
        self.hooks.run(HookEvent::AfterDeleteOne, &mut params).await?;
        Ok(report)
    }

    pub async fn delete_many(&self, condition: Document) -> RelationResult<DeleteReport> {
        debug!(collection = %self.name, "delete_many");
        let mut params = HookParams::for_delete(condition.clone());
        self.hooks.run(HookEvent::BeforeDeleteMany, &mut params).await?;
        let report = self.store.delete_many(&condition).await?;
        self.hooks.run(HookEvent::AfterDeleteMany, &mut params).await?;
        Ok(report)
    }
}
