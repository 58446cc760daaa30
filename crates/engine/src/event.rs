//! The event model.
//!
//! A [`ProcessEvent`] is an immutable named payload. Events are created by a
//! function invocation (explicitly via
//! [`StepContext::emit_event`](crate::StepContext::emit_event), or implicitly
//! as the function's return value) or by the external entry point, consumed
//! exactly once by the engine's routing pass, and never mutated after creation.

use serde::{Deserialize, Serialize};

use crate::EventId;

/// An immutable named payload passed between steps.
///
/// The payload type `P` is opaque to the engine; the engine only clones it when
/// a trigger fans out to multiple targets, so every target receives an
/// identical copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent<P> {
    id: EventId,
    data: Option<P>,
}

impl<P> ProcessEvent<P> {
    /// Creates an event carrying a payload.
    pub fn new(id: impl Into<EventId>, data: P) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    /// Creates an event with no payload.
    pub fn without_data(id: impl Into<EventId>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    /// The event's identifier within the graph's vocabulary.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// The payload, if any.
    pub fn data(&self) -> Option<&P> {
        self.data.as_ref()
    }

    /// Consumes the event, returning its identifier and payload.
    pub fn into_parts(self) -> (EventId, Option<P>) {
        (self.id, self.data)
    }
}
