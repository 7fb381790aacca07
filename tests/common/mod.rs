//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::{Arc, Mutex};

use cmm::{QueueEvent, QueueEventEmitterPort};

/// Queue emitter that records every event for assertions.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn queue_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                QueueEvent::QueueSizeChanged { size } => Some(size),
                _ => None,
            })
            .collect()
    }

    pub fn reorder_count(&self) -> usize {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, QueueEvent::QueueReordered))
            .count()
    }
}

impl QueueEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: QueueEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn QueueEventEmitterPort> {
        Box::new(self.clone())
    }
}
