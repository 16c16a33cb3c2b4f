//! Service layer for course-roster
//!
//! Services hold the reconciliation logic the hooks dispatch to. They never
//! own a store: each call receives the `&dyn RecordStore` it should write
//! through, which may be the database itself or an open transaction.
//!
//! ## Architecture
//!
//! ```text
//! RequestPipeline (request-facing writes)
//!     ↓ post-commit event
//! HookRegistry (collection, operation) → reconcile handlers
//!     ↓
//! Service Layer (progress lifecycle, broadcast resolution)
//!     ↓
//! RecordStore (plain store writes, no events)
//! ```

pub mod events;
pub mod progress_service;
pub mod broadcast_service;

// Re-exports
pub use events::{EventBus, EventListener, RosterEvent};
pub use progress_service::ProgressService;
pub use broadcast_service::BroadcastService;

use std::sync::Arc;

/// Service container for dependency injection
pub struct Services {
    pub progress: Arc<ProgressService>,
    pub broadcast: Arc<BroadcastService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services sharing one event bus
    pub fn new(events: Arc<EventBus>) -> Self {
        let progress = Arc::new(ProgressService::new(events.clone()));
        let broadcast = Arc::new(BroadcastService::new(progress.clone(), events.clone()));

        Self {
            progress,
            broadcast,
            events,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(Arc::new(EventBus::new()))
    }
}
