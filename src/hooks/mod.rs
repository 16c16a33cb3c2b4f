//! Post-commit hook registry
//!
//! Hooks are bound per (collection, operation) and run synchronously, in bind
//! order, after the triggering write has been committed. The first hook error
//! aborts the remaining hooks and is returned to the request.
//!
//! Hooks receive a `&dyn RecordStore`, never the request pipeline, so any
//! write they make is a plain store write and cannot raise another event.

pub mod reconcile;

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::db::models::{Collection, Record};
use crate::error::RosterError;
use crate::store::RecordStore;

pub use reconcile::register_reconciliation_hooks;

/// Mutation kind that raised an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A committed mutation handed to hooks
#[derive(Debug, Clone)]
pub struct RecordEvent {
    pub operation: Operation,
    /// Record as committed (for deletes, as it was before removal)
    pub record: Record,
    /// Pre-mutation snapshot, present for updates
    pub original: Option<Record>,
}

impl RecordEvent {
    pub fn created(record: Record) -> Self {
        Self {
            operation: Operation::Create,
            record,
            original: None,
        }
    }

    pub fn updated(record: Record, original: Record) -> Self {
        Self {
            operation: Operation::Update,
            record,
            original: Some(original),
        }
    }

    pub fn deleted(record: Record) -> Self {
        Self {
            operation: Operation::Delete,
            record,
            original: None,
        }
    }

    pub fn collection(&self) -> Collection {
        self.record.collection()
    }
}

/// Hook callback
pub type Hook = Box<dyn Fn(&dyn RecordStore, &RecordEvent) -> Result<(), RosterError> + Send + Sync>;

/// Hooks keyed by (collection, operation)
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<(Collection, Operation), Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `hook` to run after every committed `operation` on `collection`
    pub fn bind<F>(&mut self, collection: Collection, operation: Operation, hook: F)
    where
        F: Fn(&dyn RecordStore, &RecordEvent) -> Result<(), RosterError> + Send + Sync + 'static,
    {
        self.hooks
            .entry((collection, operation))
            .or_default()
            .push(Box::new(hook));
    }

    /// Number of hooks bound to (collection, operation)
    pub fn hook_count(&self, collection: Collection, operation: Operation) -> usize {
        self.hooks
            .get(&(collection, operation))
            .map_or(0, |hooks| hooks.len())
    }

    /// Run every hook bound to the event's (collection, operation)
    pub fn trigger(&self, store: &dyn RecordStore, event: &RecordEvent) -> Result<(), RosterError> {
        let key = (event.collection(), event.operation);
        let Some(hooks) = self.hooks.get(&key) else {
            return Ok(());
        };

        trace!(
            collection = %key.0,
            operation = %key.1,
            id = %event.record.id(),
            hooks = hooks.len(),
            "Dispatching record event"
        );

        for hook in hooks {
            hook(store, event)?;
        }

        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = self
            .hooks
            .iter()
            .map(|((collection, operation), hooks)| {
                (format!("{}:{}", collection, operation), hooks.len())
            })
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}
