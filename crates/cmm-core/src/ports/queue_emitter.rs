//! Queue event emitter port.
//!
//! Abstracts event delivery away from the queue, so hosts can wire the
//! streams to whatever transport they use (channels, GUI events, logs)
//! without the queue knowing. Implementations must not block: emitters
//! are invoked outside the queue lock but on the mutating call path.

use crate::download::QueueEvent;

/// Port for delivering queue events to subscribers.
pub trait QueueEventEmitterPort: Send + Sync {
    /// Deliver one event. Must not block.
    fn emit(&self, event: QueueEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn QueueEventEmitterPort>;
}

/// Emitter that discards every event; for tests and headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQueueEmitter;

impl NoopQueueEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl QueueEventEmitterPort for NoopQueueEmitter {
    fn emit(&self, _event: QueueEvent) {}

    fn clone_box(&self) -> Box<dyn QueueEventEmitterPort> {
        Box::new(*self)
    }
}
