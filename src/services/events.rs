//! Event system for reconciliation writes
//!
//! Every compensating write the reconciliation layer makes is announced on
//! the [`EventBus`]. Useful for:
//! - Audit logging
//! - Cache invalidation in a hosting server
//! - Real-time notifications to assignees
//!
//! These notifications are advisory. They are sent after the store call
//! returns and never feed back into reconciliation; with
//! `atomic_requests` enabled an event may describe a write that was later
//! rolled back with the rest of its request.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Reconciliation events emitted by services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    AssigneeAdded {
        course_id: String,
        user_id: String,
    },
    AssigneeRemoved {
        course_id: String,
        user_id: String,
    },
    ProgressCreated {
        id: String,
        course_id: String,
        user_id: String,
    },
    ProgressDeleted {
        id: String,
        course_id: String,
        user_id: String,
    },
    /// An attempted change to a progress record's course/assignee was undone
    ProgressReverted {
        id: String,
    },
    /// A broadcast course's assignees were reset to the full user population
    BroadcastExpanded {
        course_id: String,
        assignee_count: usize,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &RosterEvent);
}

/// Event bus for broadcasting reconciliation events
pub struct EventBus {
    sender: broadcast::Sender<RosterEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: RosterEvent) {
        trace!(event = ?event, "Emitting roster event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &RosterEvent) {
        match event {
            RosterEvent::AssigneeAdded { course_id, user_id } => {
                debug!(course = %course_id, user = %user_id, "Assignee added");
            }
            RosterEvent::AssigneeRemoved { course_id, user_id } => {
                debug!(course = %course_id, user = %user_id, "Assignee removed");
            }
            RosterEvent::BroadcastExpanded {
                course_id,
                assignee_count,
            } => {
                debug!(course = %course_id, assignees = assignee_count, "Broadcast course expanded");
            }
            _ => {
                trace!(event = ?event, "Roster event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

/// Wait for a listener task to finish. Returns false, with a warning, if the
/// task panicked or was cancelled.
pub async fn join_listener(handle: tokio::task::JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Event listener task failed");
            false
        }
    }
}
