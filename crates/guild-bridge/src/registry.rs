//! Operation registry
//!
//! Maps the id of every long-running operation still in flight to the
//! correlation token of the tool call waiting on it. Entries are inserted
//! by the gateway before the worker is asked to do anything and removed
//! exactly once: by the dispatcher when the completion arrives, or by the
//! gateway when the dispatch itself fails.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use guild_core::{
    ActionKind, CorrelationToken, GuildError, GuildResult, InvocationMode, OperationId,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Lifecycle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Completed,
    Error,
    /// Still pending when the dispatcher stopped; never delivered.
    Orphaned,
}

/// A dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub operation_id: OperationId,
    pub correlation_token: CorrelationToken,
    pub action: ActionKind,
    pub kind: InvocationMode,
    pub status: OperationStatus,
    pub registered_at: DateTime<Utc>,
}

impl Operation {
    pub fn new(
        operation_id: OperationId,
        correlation_token: CorrelationToken,
        action: ActionKind,
    ) -> Self {
        Self {
            operation_id,
            correlation_token,
            action,
            kind: action.mode(),
            status: OperationStatus::Pending,
            registered_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::Pending
    }
}

/// Pending long-running operations keyed by operation id.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    entries: DashMap<OperationId, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `operation_id` will resolve the call behind `token`.
    ///
    /// Never overwrites: a second registration of a pending id fails with
    /// `DuplicateOperation` and leaves the first entry untouched.
    pub fn register(
        &self,
        operation_id: OperationId,
        token: CorrelationToken,
        action: ActionKind,
    ) -> GuildResult<()> {
        match self.entries.entry(operation_id.clone()) {
            Entry::Occupied(_) => Err(GuildError::DuplicateOperation(operation_id)),
            Entry::Vacant(slot) => {
                debug!(
                    operation_id = %operation_id,
                    token = %token,
                    action = %action,
                    "Registered operation"
                );
                slot.insert(Operation::new(operation_id, token, action));
                Ok(())
            }
        }
    }

    /// Remove and return the operation for `operation_id`.
    pub fn resolve(&self, operation_id: &OperationId) -> GuildResult<Operation> {
        self.entries
            .remove(operation_id)
            .map(|(_, operation)| operation)
            .ok_or_else(|| GuildError::OperationNotFound(operation_id.clone()))
    }

    /// Undo a registration whose dispatch failed.
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn rollback(&self, operation_id: &OperationId) -> bool {
        let removed = self.entries.remove(operation_id).is_some();
        if removed {
            debug!(operation_id = %operation_id, "Rolled back operation");
        } else {
            warn!(operation_id = %operation_id, "Rollback of unknown operation");
        }
        removed
    }

    pub fn contains(&self, operation_id: &OperationId) -> bool {
        self.entries.contains_key(operation_id)
    }

    pub fn get(&self, operation_id: &OperationId) -> Option<Operation> {
        self.entries.get(operation_id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every entry, oldest first.
    pub fn pending(&self) -> Vec<Operation> {
        let mut operations: Vec<Operation> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        operations.sort_by_key(|op| op.registered_at);
        operations
    }

    /// Mark every remaining entry orphaned and return them.
    ///
    /// Entries stay in the registry; a completion arriving afterwards has
    /// nobody left to deliver it.
    pub fn orphan_all(&self) -> Vec<Operation> {
        for mut entry in self.entries.iter_mut() {
            entry.status = OperationStatus::Orphaned;
        }
        self.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::{CallId, FrameId, SessionId};

    fn token(call: &str) -> CorrelationToken {
        CorrelationToken::new(
            SessionId::parse("session-1").unwrap(),
            FrameId::ROOT,
            CallId::parse(call).unwrap(),
        )
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = OperationRegistry::new();
        let op = OperationId::sequential(1);
        registry
            .register(op.clone(), token("caller-A"), ActionKind::MineBlock)
            .unwrap();
        assert_eq!(registry.len(), 1);

        let resolved = registry.resolve(&op).unwrap();
        assert_eq!(resolved.correlation_token, token("caller-A"));
        assert_eq!(resolved.kind, InvocationMode::Async);
        assert!(registry.is_empty());

        assert!(matches!(
            registry.resolve(&op),
            Err(GuildError::OperationNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_never_overwrites() {
        let registry = OperationRegistry::new();
        let op = OperationId::sequential(7);
        registry
            .register(op.clone(), token("first"), ActionKind::CraftItem)
            .unwrap();
        let err = registry
            .register(op.clone(), token("second"), ActionKind::CraftItem)
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_OPERATION");
        assert_eq!(registry.get(&op).unwrap().correlation_token, token("first"));
    }

    #[test]
    fn test_rollback() {
        let registry = OperationRegistry::new();
        let op = OperationId::sequential(2);
        registry
            .register(op.clone(), token("c"), ActionKind::PlaceBlock)
            .unwrap();
        assert!(registry.rollback(&op));
        assert!(!registry.rollback(&op));
        assert!(!registry.contains(&op));
    }

    #[test]
    fn test_orphan_all_keeps_entries() {
        let registry = OperationRegistry::new();
        registry
            .register(OperationId::sequential(1), token("a"), ActionKind::MineBlock)
            .unwrap();
        registry
            .register(OperationId::sequential(2), token("b"), ActionKind::MineBlock)
            .unwrap();

        let orphaned = registry.orphan_all();
        assert_eq!(orphaned.len(), 2);
        assert!(orphaned.iter().all(|op| op.status == OperationStatus::Orphaned));
        assert_eq!(registry.len(), 2);
    }
}
