//! Newtype identifiers for the process engine.
//!
//! Every graph concept that is addressed by name is represented as a distinct
//! newtype wrapping a `String`. This prevents accidentally interchanging — for
//! example — an [`EventId`] with a [`FunctionName`] even though both are plain
//! strings under the hood.
//!
//! Construction is infallible; empty names are rejected by
//! [`ProcessBuilder::build`](crate::ProcessBuilder::build), which is the single
//! point where a graph's vocabulary is validated.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new(), as_str(), is_empty(), From, Display.
// ---------------------------------------------------------------------------
macro_rules! name_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty.
            ///
            /// Empty identifiers are build-time validation errors; they never
            /// appear in a constructed [`ProcessGraph`](crate::ProcessGraph).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — graph vocabulary
// ---------------------------------------------------------------------------

name_id! {
    /// Identifies a process graph (e.g. `"DocumentationProcess"`).
    ProcessName
}

name_id! {
    /// Identifies a step within a process graph.
    ///
    /// Step names are unique per graph; duplicates fail at build time.
    StepName
}

name_id! {
    /// Identifies an invocable function exposed by a step.
    ///
    /// Function names are unique per step.
    FunctionName
}

name_id! {
    /// The declared name of a function's single input parameter.
    ///
    /// Edges may carry a parameter name; it must match the declaration of the
    /// target function or the graph fails to build.
    ParameterName
}

name_id! {
    /// Identifies an event within a graph's vocabulary.
    ///
    /// Unique per graph's event dictionary, not globally unique. Every event a
    /// step may emit is declared up front in its
    /// [`FunctionSpec`](crate::FunctionSpec); edges are resolved against this
    /// closed set at build time.
    EventId
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single process run (one invocation of
/// [`ProcessEngine::start`](crate::ProcessEngine::start)).
///
/// Generated fresh for every run; propagated through spans and observer
/// callbacks so all activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
