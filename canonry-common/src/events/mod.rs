//! Curation events and the in-process event bus
//!
//! Events are handed to a [`Notifier`] only after the state change they
//! describe has committed. Delivery is best-effort: a notifier failure is
//! logged and never undoes the change.

use crate::model::{PromotionEvent, TierKind, Work};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Canonry event types
///
/// Serialized with a `type` tag; [`CurationEvent::event_name`] gives the
/// stable dotted name downstream consumers key on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CurationEvent {
    /// A contributor created a work (always in JAM)
    WorkCreated {
        work: Work,
        timestamp: DateTime<Utc>,
    },

    /// A work moved up one tier
    ///
    /// Emitted for every committed promotion, including the one into CANON.
    WorkPromoted {
        /// Snapshot after the promotion committed
        work: Work,
        from_tier: TierKind,
        to_tier: TierKind,
        justification: String,
        curator_name: String,
        promotion_event_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A work entered CANON and is now permanently locked
    WorkCanonized {
        work: Work,
        justification: String,
        curator_name: String,
        promotion_event_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl CurationEvent {
    /// Stable event name used for routing and SSE event names
    pub fn event_name(&self) -> &'static str {
        match self {
            CurationEvent::WorkCreated { .. } => "work.created",
            CurationEvent::WorkPromoted { .. } => "work.promoted",
            CurationEvent::WorkCanonized { .. } => "work.canonized",
        }
    }

    /// Work the event concerns
    pub fn work_id(&self) -> Uuid {
        match self {
            CurationEvent::WorkCreated { work, .. }
            | CurationEvent::WorkPromoted { work, .. }
            | CurationEvent::WorkCanonized { work, .. } => work.id,
        }
    }

    pub fn work_created(work: Work) -> Self {
        CurationEvent::WorkCreated {
            work,
            timestamp: Utc::now(),
        }
    }

    /// Events for one committed promotion: `work.promoted`, plus
    /// `work.canonized` when the target tier is CANON
    pub fn for_promotion(work: &Work, event: &PromotionEvent) -> Vec<Self> {
        let mut events = vec![CurationEvent::WorkPromoted {
            work: work.clone(),
            from_tier: event.from_tier,
            to_tier: event.to_tier,
            justification: event.justification.clone(),
            curator_name: event.curator_name.clone(),
            promotion_event_id: event.id,
            timestamp: event.created_at,
        }];

        if event.to_tier == TierKind::Canon {
            events.push(CurationEvent::WorkCanonized {
                work: work.clone(),
                justification: event.justification.clone(),
                curator_name: event.curator_name.clone(),
                promotion_event_id: event.id,
                timestamp: event.created_at,
            });
        }

        events
    }
}

/// Notifier failures
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Nobody is listening; the event is dropped
    #[error("No subscribers for {0}")]
    NoSubscribers(&'static str),

    /// Downstream delivery is unavailable
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget sink for curation events
///
/// Implementations must not block; retries are entirely their own concern.
pub trait Notifier: Send + Sync {
    /// Hand off one event; returns the number of receivers reached
    fn notify(&self, event: CurationEvent) -> Result<usize, NotifyError>;
}

/// Send an event and log (never propagate) a delivery failure
pub fn notify_best_effort(notifier: &dyn Notifier, event: CurationEvent) {
    let name = event.event_name();
    let work_id = event.work_id();
    match notifier.notify(event) {
        Ok(receivers) => debug!(event = name, %work_id, receivers, "Event dispatched"),
        Err(NotifyError::NoSubscribers(_)) => {
            debug!(event = name, %work_id, "Event dropped: no subscribers")
        }
        Err(e) => warn!(event = name, %work_id, error = %e, "Event notification failed"),
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`: publishing never blocks, slow subscribers lag
/// (and lose the oldest events) rather than stalling producers.
///
/// # Examples
///
/// ```
/// use canonry_common::events::{CurationEvent, EventBus};
/// use canonry_common::model::Work;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// let work = Work::new("first-light".into(), "First Light".into(), None);
/// event_bus.emit(CurationEvent::work_created(work)).ok();
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.event_name(), "work.created");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CurationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CurationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CurationEvent,
    ) -> Result<usize, broadcast::error::SendError<CurationEvent>> {
        self.tx.send(event)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Notifier for EventBus {
    fn notify(&self, event: CurationEvent) -> Result<usize, NotifyError> {
        let name = event.event_name();
        self.emit(event).map_err(|_| NotifyError::NoSubscribers(name))
    }
}
