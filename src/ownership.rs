//! Ownership Resolver.
//!
//! Every mutation is authorized by walking the parent chain — material →
//! task → quote → owning user — with an independent point read at each hop.
//! A missing link anywhere in the chain is `NotFound`; a chain that resolves
//! to a different owner is `Forbidden`. The two verdicts stay distinct here
//! for auditability even if an outer boundary presents them identically.
//!
//! The resolver runs against the `OwnershipStore` trait rather than the
//! database directly, so the chain-of-custody check is testable without a
//! live store.

use crate::errors::AppResult;

/// Point reads the resolver needs. Implementations must re-fetch per call;
/// the resolver never trusts a cached parent reference.
pub trait OwnershipStore {
    fn quote_owner(&self, quote_id: &str) -> AppResult<Option<String>>;
    /// Returns the parent quote id of a task.
    fn task_parent(&self, task_id: &str) -> AppResult<Option<String>>;
    /// Returns the parent task id of a material.
    fn material_parent(&self, material_id: &str) -> AppResult<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedEntity {
    Quote(String),
    Task(String),
    Material(String),
}

impl OwnedEntity {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Quote(_) => "quote",
            Self::Task(_) => "task",
            Self::Material(_) => "material",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Quote(id) | Self::Task(id) | Self::Material(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Carries the owning quote id so callers can refresh aggregation
    /// without another lookup.
    Authorized { quote_id: String },
    Forbidden,
    NotFound,
}

/// Walks the ownership chain for `entity` and returns the verdict. Must be
/// called to completion before any mutating statement executes.
pub fn authorize(
    store: &dyn OwnershipStore,
    acting_user_id: &str,
    entity: &OwnedEntity,
) -> AppResult<Access> {
    let quote_id = match entity {
        OwnedEntity::Quote(quote_id) => quote_id.clone(),
        OwnedEntity::Task(task_id) => match store.task_parent(task_id)? {
            Some(quote_id) => quote_id,
            None => return Ok(Access::NotFound),
        },
        OwnedEntity::Material(material_id) => {
            let task_id = match store.material_parent(material_id)? {
                Some(task_id) => task_id,
                None => return Ok(Access::NotFound),
            };
            match store.task_parent(&task_id)? {
                Some(quote_id) => quote_id,
                None => return Ok(Access::NotFound),
            }
        }
    };

    match store.quote_owner(&quote_id)? {
        Some(owner_id) if owner_id == acting_user_id => Ok(Access::Authorized { quote_id }),
        Some(_) => {
            tracing::debug!(
                kind = entity.kind(),
                entity_id = entity.id(),
                user_id = acting_user_id,
                "ownership check refused"
            );
            Ok(Access::Forbidden)
        }
        None => Ok(Access::NotFound),
    }
}
