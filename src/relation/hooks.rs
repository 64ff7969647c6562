//! Relation hook engine
//!
//! Wires paired before/after hooks for each declared relation onto the owner
//! collection's mutation lifecycle. The before phase snapshots affected
//! identifiers (and enforces delete restrictions) ahead of the storage
//! mutation; the after phase propagates into the related collection using the
//! snapshot handed over through the operation context.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::collection::Collection;
use crate::document::MutationSpec;
use crate::error::RelationResult;
use crate::events::{HookEvent, HookParams, LifecycleHook};
use crate::relation::{
    propagate, relevance, resolver, restrict, DeletePolicy, Relation, UpdatePolicy,
};

/// Wires hooks for every declared relation onto the owner collection.
///
/// The map is keyed by the relation's field name on the related collection;
/// the key is diagnostic only. Each descriptor must name `owner` as the
/// collection passed here.
pub fn setup(owner: &Arc<Collection>, relations: HashMap<String, Relation>) {
    for (field, relation) in relations {
        debug!(
            field = %field,
            key = %relation.key,
            owner = %owner.name(),
            related = %relation.related.name(),
            "wiring relation hooks"
        );
        wire(owner, Arc::new(relation));
    }
}

fn wire(owner: &Arc<Collection>, relation: Arc<Relation>) {
    debug_assert!(
        Arc::ptr_eq(owner, &relation.owner),
        "relation owner must be the collection its hooks attach to"
    );
    let hooks = owner.hooks();

    let before_update = Arc::new(BeforeUpdate {
        relation: relation.clone(),
    });
    for event in [
        HookEvent::BeforeUpdateOne,
        HookEvent::BeforeReplaceOne,
        HookEvent::BeforeUpsertOne,
        HookEvent::BeforeUpdateMany,
    ] {
        hooks.on(event, before_update.clone());
    }

    let after_update = Arc::new(AfterUpdate {
        relation: relation.clone(),
    });
    for event in [
        HookEvent::AfterUpdateOne,
        HookEvent::AfterReplaceOne,
        HookEvent::AfterUpdateMany,
    ] {
        hooks.on(event, after_update.clone());
    }
    hooks.on(
        HookEvent::AfterUpsertOne,
        Arc::new(AfterUpsert {
            relation: relation.clone(),
        }),
    );

    let before_delete = Arc::new(BeforeDelete {
        relation: relation.clone(),
    });
    let after_delete = Arc::new(AfterDelete { relation });
    for event in [HookEvent::BeforeDeleteOne, HookEvent::BeforeDeleteMany] {
        hooks.on(event, before_delete.clone());
    }
    for event in [HookEvent::AfterDeleteOne, HookEvent::AfterDeleteMany] {
        hooks.on(event, after_delete.clone());
    }
}

struct BeforeUpdate {
    relation: Arc<Relation>,
}

#[async_trait]
impl LifecycleHook for BeforeUpdate {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()> {
        let relation = &self.relation;
        let policy = match &params.mutation {
            Some(MutationSpec::Replacement(_)) => relation.on_replace,
            Some(MutationSpec::Modifier(_)) => relation.on_update,
            None => return Ok(()),
        };
        // Snapshot only when the policy cascades, the key's slot is still
        // empty (another relation sharing the key may already have resolved),
        // and the mutation touches an embedded field at all.
        if policy != UpdatePolicy::Cascade
            || params.meta.modified_identifiers.contains_key(&relation.key)
        {
            return Ok(());
        }
        let relevant = params
            .mutation
            .as_ref()
            .is_some_and(|mutation| relevance::is_relevant(mutation, relation));
        if !relevant {
            return Ok(());
        }

        let identifiers =
            resolver::resolve_identifiers(&relation.owner, &params.condition, &relation.key)
                .await?;
        debug!(
            key = %relation.key,
            count = identifiers.len(),
            "snapshotted pre-mutation identifiers"
        );
        params
            .meta
            .modified_identifiers
            .insert(relation.key.clone(), identifiers);
        Ok(())
    }
}

struct AfterUpdate {
    relation: Arc<Relation>,
}

impl AfterUpdate {
    async fn propagate(&self, params: &HookParams) -> RelationResult<()> {
        let relation = &self.relation;
        let identifiers = match params.meta.modified_identifiers.get(&relation.key) {
            Some(identifiers) if !identifiers.is_empty() => identifiers,
            _ => return Ok(()),
        };
        let relevant = params
            .mutation
            .as_ref()
            .is_some_and(|mutation| relevance::is_relevant(mutation, relation));
        if !relevant {
            return Ok(());
        }
        if relation.on_update == UpdatePolicy::Cascade
            || relation.on_replace == UpdatePolicy::Cascade
        {
            propagate::cascade_update(relation, identifiers).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleHook for AfterUpdate {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()> {
        self.propagate(params).await
    }
}

struct AfterUpsert {
    relation: Arc<Relation>,
}

#[async_trait]
impl LifecycleHook for AfterUpsert {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()> {
        // a fresh insert has no prior embedded references to refresh
        if !params.is_updated {
            return Ok(());
        }
        AfterUpdate {
            relation: self.relation.clone(),
        }
        .propagate(params)
        .await
    }
}

struct BeforeDelete {
    relation: Arc<Relation>,
}

#[async_trait]
impl LifecycleHook for BeforeDelete {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()> {
        let relation = &self.relation;
        match relation.on_delete {
            // Delete snapshots are never filtered by field relevance: the
            // whole document goes away.
            DeletePolicy::Restrict
            | DeletePolicy::Cascade
            | DeletePolicy::Unset
            | DeletePolicy::Pull => {
                let identifiers = resolver::resolve_identifiers(
                    &relation.owner,
                    &params.condition,
                    &relation.key,
                )
                .await?;
                params.meta.delete_identifiers = identifiers;
                if relation.on_delete == DeletePolicy::Restrict {
                    restrict::check_delete_restrictions(relation, &params.meta.delete_identifiers)
                        .await?;
                }
                Ok(())
            }
            DeletePolicy::Ignore => Ok(()),
        }
    }
}

struct AfterDelete {
    relation: Arc<Relation>,
}

#[async_trait]
impl LifecycleHook for AfterDelete {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()> {
        propagate::propagate_delete(&self.relation, &params.meta.delete_identifiers).await
    }
}
