//! Mutation lifecycle events and hook registry
//!
//! Every mutating call on a [`crate::Collection`] creates one
//! [`OperationContext`], runs the registered before-hooks, performs the
//! storage mutation, then runs the after-hooks. The context is the only state
//! shared between the two phases and is discarded when the call completes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::document::{Document, MutationSpec};
use crate::error::RelationResult;

/// The twelve mutation lifecycle events a collection emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeUpdateOne,
    AfterUpdateOne,
    BeforeUpdateMany,
    AfterUpdateMany,
    BeforeReplaceOne,
    AfterReplaceOne,
    BeforeUpsertOne,
    AfterUpsertOne,
    BeforeDeleteOne,
    AfterDeleteOne,
    BeforeDeleteMany,
    AfterDeleteMany,
}

/// Per-operation context bridging the before and after phases.
///
/// `modified_identifiers` is keyed by relation key so relations sharing an
/// owner collection never clobber each other's snapshots; delete snapshots are
/// a bare list, taken unconditionally for the whole operation.
#[derive(Debug, Default)]
pub struct OperationContext {
    pub modified_identifiers: HashMap<String, Vec<Document>>,
    pub delete_identifiers: Vec<Document>,
}

/// Mutable parameter object handed to every hook of one logical operation.
#[derive(Debug)]
pub struct HookParams {
    /// The match condition of the mutating call.
    pub condition: Document,
    /// The modifier or replacement document; absent for deletes.
    pub mutation: Option<MutationSpec>,
    /// Upsert only: true iff an existing document was matched rather than
    /// inserted. Set between the storage mutation and the after-phase.
    pub is_updated: bool,
    /// Cross-phase state handoff.
    pub meta: OperationContext,
}

impl HookParams {
    pub fn for_mutation(condition: Document, mutation: MutationSpec) -> Self {
        Self {
            condition,
            mutation: Some(mutation),
            is_updated: false,
            meta: OperationContext::default(),
        }
    }

    pub fn for_delete(condition: Document) -> Self {
        Self {
            condition,
            mutation: None,
            is_updated: false,
            meta: OperationContext::default(),
        }
    }
}

/// A before/after callback around a mutating operation.
///
/// Hooks for one event run sequentially in registration order; an error aborts
/// the operation and skips every later stage.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn call(&self, params: &mut HookParams) -> RelationResult<()>;
}

pub type Hook = Arc<dyn LifecycleHook>;

/// Registry of hooks per lifecycle event, owned by a collection.
#[derive(Default)]
pub struct HookRegistry {
    handlers: RwLock<HashMap<HookEvent, Vec<Hook>>>,
}

impl HookRegistry {
    pub fn on(&self, event: HookEvent, hook: Hook) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers.entry(event).or_default().push(hook);
    }

    pub async fn run(&self, event: HookEvent, params: &mut HookParams) -> RelationResult<()> {
        let hooks = {
            let handlers = self
                .handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            handlers.get(&event).cloned().unwrap_or_default()
        };
        for hook in hooks {
            hook.call(params).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelationError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LifecycleHook for Counting {
        async fn call(&self, _params: &mut HookParams) -> RelationResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl LifecycleHook for Failing {
        async fn call(&self, _params: &mut HookParams) -> RelationResult<()> {
            Err(RelationError::storage("hook failed"))
        }
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_per_event() {
        let registry = HookRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.on(
            HookEvent::BeforeDeleteOne,
            Arc::new(Counting { calls: calls.clone() }),
        );
        registry.on(
            HookEvent::BeforeDeleteOne,
            Arc::new(Counting { calls: calls.clone() }),
        );

        let mut params = HookParams::for_delete(json!({"_id": 1}));
        registry
            .run(HookEvent::BeforeDeleteOne, &mut params)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // other events are untouched
        registry
            .run(HookEvent::AfterDeleteOne, &mut params)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_hook_stops_the_chain() {
        let registry = HookRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.on(HookEvent::BeforeDeleteOne, Arc::new(Failing));
        registry.on(
            HookEvent::BeforeDeleteOne,
            Arc::new(Counting { calls: calls.clone() }),
        );

        let mut params = HookParams::for_delete(json!({"_id": 1}));
        let result = registry.run(HookEvent::BeforeDeleteOne, &mut params).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
