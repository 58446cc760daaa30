//! Error taxonomy for the process engine.
//!
//! The split follows the lifecycle of a graph:
//!
//! - [`GraphValidationError`] — raised by `build()`; the graph never exists.
//! - [`ActivationError`] — state construction failed; fatal to the run.
//! - [`FunctionError`] — an unhandled fault inside one function body; the
//!   dispatch is marked failed and routes no events, but the run drains.
//! - [`EngineError`] — run-level fatal conditions surfaced to the caller of
//!   `start()`.
//!
//! Business-level failures are deliberately *not* represented here: a step
//! that wants failure semantics catches the fault itself and emits an explicit
//! failure event, which is routed like any other event.

use thiserror::Error;

use crate::{EventId, FunctionName, ParameterName, ProcessName, StepName};

// ---------------------------------------------------------------------------
// Build-time errors
// ---------------------------------------------------------------------------

/// Errors raised by [`ProcessBuilder::build`](crate::ProcessBuilder::build).
///
/// Each variant names the offending piece of the graph so a broken wiring
/// call can be found without stepping through the builder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphValidationError {
    /// The process name is empty.
    #[error("process name must not be empty")]
    EmptyProcessName,

    /// A step definition carries an empty step, function, parameter, or event
    /// name.
    #[error("step '{step}' contains an empty identifier in its definition")]
    EmptyIdentifier {
        /// The step whose definition is malformed.
        step: StepName,
    },

    /// Two steps were added under the same name.
    #[error("step '{step}' is declared more than once")]
    DuplicateStep {
        /// The duplicated step name.
        step: StepName,
    },

    /// A step declares no functions at all.
    #[error("step '{step}' declares no functions")]
    NoFunctions {
        /// The function-less step.
        step: StepName,
    },

    /// A step declares the same function twice.
    #[error("step '{step}' declares function '{function}' more than once")]
    DuplicateFunction {
        /// The step in question.
        step: StepName,
        /// The duplicated function name.
        function: FunctionName,
    },

    /// An input-event binding uses an empty event id.
    #[error("input event id must not be empty")]
    EmptyInputEvent,

    /// An edge references a step handle that does not belong to this builder.
    #[error("edge references unknown step handle #{index}")]
    UnknownStep {
        /// The out-of-range handle index.
        index: usize,
    },

    /// An edge names a function the step does not expose.
    #[error("step '{step}' has no function named '{function}'")]
    UnknownFunction {
        /// The step in question.
        step: StepName,
        /// The function the edge asked for.
        function: FunctionName,
    },

    /// A target omitted the function name but the step exposes more than one
    /// function, so the default cannot be resolved.
    #[error("step '{step}' exposes {count} functions; the target must name one explicitly")]
    AmbiguousFunction {
        /// The step in question.
        step: StepName,
        /// How many functions the step exposes.
        count: usize,
    },

    /// A target's parameter name does not match the target function's
    /// declared parameter.
    #[error(
        "step '{step}' function '{function}' declares parameter {expected:?}, \
         but the edge supplies {supplied:?}"
    )]
    ParameterMismatch {
        /// The target step.
        step: StepName,
        /// The target function.
        function: FunctionName,
        /// The parameter the function declares (if any).
        expected: Option<ParameterName>,
        /// The parameter the edge supplied (if any).
        supplied: Option<ParameterName>,
    },

    /// An `on_event` edge names an event the source step never declares.
    ///
    /// The event vocabulary is closed at build time; routing is only resolved
    /// against declared output events.
    #[error("step '{step}' does not declare output event '{event}'")]
    UndeclaredEvent {
        /// The source step.
        step: StepName,
        /// The undeclared event id.
        event: EventId,
    },

    /// A trigger was declared but given neither targets nor a stop marker.
    #[error("trigger '{trigger}' routes nowhere (no targets and no stop)")]
    DanglingTrigger {
        /// Human-readable description of the dangling trigger.
        trigger: String,
    },
}

// ---------------------------------------------------------------------------
// Run-time errors
// ---------------------------------------------------------------------------

/// A step's one-time state initialization failed.
///
/// Produced by [`ProcessStep::activate`](crate::ProcessStep::activate); fatal
/// to the run, surfaced as [`EngineError::Activation`].
#[derive(Debug, Error)]
#[error("state activation failed: {message}")]
pub struct ActivationError {
    message: String,
}

impl ActivationError {
    /// Creates an [`ActivationError`] with a human-readable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------

/// An unhandled fault inside a function body.
///
/// The engine catches this per dispatch: the dispatch is reported failed and
/// none of its events are routed. There is no implicit retry. Collaborator
/// failures that a step wants routed must be caught inside the function and
/// emitted as explicit failure events instead.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// The step was asked to run a function it does not implement.
    ///
    /// Build-time validation makes this unreachable through graph routing; it
    /// guards against a step definition that is out of sync with its
    /// `invoke` match.
    #[error("step has no function named '{function}'")]
    UnknownFunction {
        /// The requested function.
        function: FunctionName,
    },

    /// The function requires a payload but the dispatch carried none.
    #[error("function '{function}' requires a payload but none was supplied")]
    MissingPayload {
        /// The function in question.
        function: FunctionName,
    },

    /// Step state was used before the activation phase ran.
    ///
    /// The engine activates every stateful step before its first invocation,
    /// so this indicates a step bypassing its own lifecycle.
    #[error("step state used before activation")]
    NotActivated,

    /// The payload could not be interpreted as the type the function expects.
    #[error("malformed payload: {message}")]
    MalformedPayload {
        /// Description of the decoding failure.
        message: String,
    },

    /// Any other unhandled fault raised by the function body.
    #[error("{message}")]
    Execution {
        /// Description of the fault.
        message: String,
    },
}

impl FunctionError {
    /// Convenience constructor for [`FunctionError::UnknownFunction`].
    pub fn unknown(function: FunctionName) -> Self {
        Self::UnknownFunction { function }
    }

    /// Convenience constructor for [`FunctionError::MalformedPayload`].
    pub fn malformed(message: impl std::fmt::Display) -> Self {
        Self::MalformedPayload {
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`FunctionError::Execution`].
    pub fn execution(message: impl std::fmt::Display) -> Self {
        Self::Execution {
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------

/// Run-level fatal errors returned by
/// [`ProcessEngine::start`](crate::ProcessEngine::start).
///
/// When `start` returns one of these, no [`RunResult`](crate::RunResult) is
/// produced; the distinction from a `Failed` run result is that these
/// conditions abort the control loop itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The start event has no input binding in the graph.
    ///
    /// No dispatch is performed.
    #[error("process '{process}' has no binding for start event '{event}'")]
    UnboundStartEvent {
        /// The graph that was started.
        process: ProcessName,
        /// The unbound event id.
        event: EventId,
    },

    /// A step's activation routine failed.
    #[error("activation of step '{step}' failed")]
    Activation {
        /// The step whose state could not be constructed.
        step: StepName,
        /// The underlying activation failure.
        #[source]
        source: ActivationError,
    },

    /// The run exceeded the configured dispatch limit.
    ///
    /// Graphs with human-in-the-loop cycles are legal; the limit turns a
    /// runaway cycle into an error instead of an unbounded loop.
    #[error("dispatch limit of {limit} exceeded; the graph may contain an unbounded cycle")]
    DispatchLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A dispatch task could not be joined (it panicked or was aborted).
    #[error("dispatch task failed: {message}")]
    Internal {
        /// Description of the join failure.
        message: String,
    },
}
