//! Relation descriptors and policies
//!
//! A [`Relation`] is a single edge between an owner collection (canonical
//! documents identified by `key`) and a related collection that embeds that
//! key. Policies declare what happens to the related collection when owner
//! documents change or disappear; cascades never traverse further relations.

pub mod hooks;
pub mod propagate;
pub mod relevance;
pub mod resolver;
pub mod restrict;

use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::document::Document;
use crate::error::RelationResult;

pub use hooks::setup;
pub use relevance::is_relevant;

/// Maps an owner identifier to the value embedded into related documents on
/// cascade update, typically a denormalized snapshot of the owner document.
pub type Embedder =
    Arc<dyn Fn(Document) -> BoxFuture<'static, RelationResult<Document>> + Send + Sync>;

/// What an owner update or replace does to embedded references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    Cascade,
    Ignore,
}

/// What an owner delete does to embedded references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    Cascade,
    Restrict,
    Unset,
    Pull,
    Ignore,
}

impl std::fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cascade => write!(f, "cascade"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cascade" => Ok(Self::Cascade),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown update policy: {other}")),
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cascade => write!(f, "cascade"),
            Self::Restrict => write!(f, "restrict"),
            Self::Unset => write!(f, "unset"),
            Self::Pull => write!(f, "pull"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cascade" => Ok(Self::Cascade),
            "restrict" => Ok(Self::Restrict),
            "unset" => Ok(Self::Unset),
            "pull" => Ok(Self::Pull),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!("unknown delete policy: {other}")),
        }
    }
}

/// Field paths on the related collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPaths {
    /// Path holding the embedded owner key, e.g. `author._id`.
    pub identifier: String,
    /// Path mutated on delete-time unset/pull, e.g. `author`.
    pub field: String,
    /// Path written by cascade updates; defaults to `field`.
    #[serde(default)]
    pub modifier: Option<String>,
}

impl RelationPaths {
    pub fn new(identifier: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
            modifier: None,
        }
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    pub fn modifier_path(&self) -> &str {
        self.modifier.as_deref().unwrap_or(&self.field)
    }
}

/// One declared relation, immutable after setup. Lives as long as the owner
/// collection it is registered on.
#[derive(Clone)]
pub struct Relation {
    /// Identifying field on owner documents.
    pub key: String,
    /// Source of truth for identifiers.
    pub owner: Arc<Collection>,
    /// Target of every cascade; never the owner.
    pub related: Arc<Collection>,
    pub paths: RelationPaths,
    /// Owner fields whose change triggers cascade evaluation. Always contains
    /// `key`.
    pub projection: Vec<String>,
    pub on_update: UpdatePolicy,
    pub on_replace: UpdatePolicy,
    pub on_delete: DeletePolicy,
    pub embedder: Embedder,
}

impl Relation {
    pub fn new(
        key: impl Into<String>,
        owner: Arc<Collection>,
        related: Arc<Collection>,
        paths: RelationPaths,
        projection: Vec<String>,
        embedder: Embedder,
    ) -> Self {
        let key = key.into();
        let mut projection = projection;
        if !projection.iter().any(|field| field == &key) {
            projection.push(key.clone());
        }
        Self {
            key,
            owner,
            related,
            paths,
            projection,
            on_update: UpdatePolicy::Ignore,
            on_replace: UpdatePolicy::Ignore,
            on_delete: DeletePolicy::Ignore,
            embedder,
        }
    }

    pub fn on_update(mut self, policy: UpdatePolicy) -> Self {
        self.on_update = policy;
        self
    }

    pub fn on_replace(mut self, policy: UpdatePolicy) -> Self {
        self.on_replace = policy;
        self
    }

    pub fn on_delete(mut self, policy: DeletePolicy) -> Self {
        self.on_delete = policy;
        self
    }
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("key", &self.key)
            .field("owner", &self.owner.name())
            .field("related", &self.related.name())
            .field("paths", &self.paths)
            .field("projection", &self.projection)
            .field("on_update", &self.on_update)
            .field("on_replace", &self.on_replace)
            .field("on_delete", &self.on_delete)
            .finish_non_exhaustive()
    }
}
