//! The step model: definitions, the step trait, and the emission context.
//!
//! A step is a named unit of stateful behavior exposing one or more invocable
//! functions. Its metadata ([`StepDefinition`]) is declared separately from its
//! behavior ([`ProcessStep`]) so the graph builder can validate edges before
//! any instance exists.

use async_trait::async_trait;

use crate::errors::{ActivationError, FunctionError};
use crate::event::ProcessEvent;
use crate::{EventId, FunctionName, ParameterName, StepName};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Declared metadata for one invocable function of a step.
///
/// A function declares at most one input parameter and the closed set of
/// events it may emit. Edges are validated against this declaration at build
/// time; a runtime emission outside the declared set is dropped with a
/// warning, never routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    name: FunctionName,
    parameter: Option<ParameterName>,
    output_events: Vec<EventId>,
}

impl FunctionSpec {
    /// Creates a parameter-less function spec that emits no events.
    pub fn new(name: impl Into<FunctionName>) -> Self {
        Self {
            name: name.into(),
            parameter: None,
            output_events: Vec::new(),
        }
    }

    /// Declares the function's single input parameter.
    pub fn with_parameter(mut self, name: impl Into<ParameterName>) -> Self {
        self.parameter = Some(name.into());
        self
    }

    /// Declares an event this function may emit. Chainable.
    pub fn emits(mut self, event: impl Into<EventId>) -> Self {
        self.output_events.push(event.into());
        self
    }

    /// The function's name.
    pub fn name(&self) -> &FunctionName {
        &self.name
    }

    /// The declared parameter, if any.
    pub fn parameter(&self) -> Option<&ParameterName> {
        self.parameter.as_ref()
    }

    /// The closed set of events this function may emit.
    pub fn output_events(&self) -> &[EventId] {
        &self.output_events
    }
}

// ---------------------------------------------------------------------------

/// Declared metadata for a step: its name and its functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    name: StepName,
    functions: Vec<FunctionSpec>,
}

impl StepDefinition {
    /// Creates a definition with no functions; add them with
    /// [`with_function`](Self::with_function).
    pub fn new(name: impl Into<StepName>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Adds a function to the definition. Chainable.
    pub fn with_function(mut self, spec: FunctionSpec) -> Self {
        self.functions.push(spec);
        self
    }

    /// The step's name.
    pub fn name(&self) -> &StepName {
        &self.name
    }

    /// All declared functions.
    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    /// Looks up a function by name.
    pub fn function(&self, name: &FunctionName) -> Option<&FunctionSpec> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Returns the step's only function, or `None` when the choice is
    /// ambiguous. Used to resolve targets that omit the function name.
    pub(crate) fn sole_function(&self) -> Option<&FunctionSpec> {
        match self.functions.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// Returns `true` if any function of this step declares `event` as an
    /// output.
    pub fn declares_event(&self, event: &EventId) -> bool {
        self.functions
            .iter()
            .any(|f| f.output_events().contains(event))
    }
}

// ---------------------------------------------------------------------------
// Emission context
// ---------------------------------------------------------------------------

/// Collects the events a function emits during one invocation.
///
/// Handed to [`ProcessStep::invoke`] by the engine; emissions are routed in
/// emission order after the function returns.
#[derive(Debug)]
pub struct StepContext<P> {
    emitted: Vec<ProcessEvent<P>>,
}

impl<P> StepContext<P> {
    pub(crate) fn new() -> Self {
        Self {
            emitted: Vec::new(),
        }
    }

    /// Emits a named event carrying a payload.
    pub fn emit_event(&mut self, id: impl Into<EventId>, data: P) {
        self.emitted.push(ProcessEvent::new(id, data));
    }

    /// Emits a pre-built event.
    pub fn emit(&mut self, event: ProcessEvent<P>) {
        self.emitted.push(event);
    }

    pub(crate) fn into_emitted(self) -> Vec<ProcessEvent<P>> {
        self.emitted
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// A step's behavior: one-time activation plus function dispatch.
///
/// Instances are created fresh for every run by the factory registered with
/// the builder, so state never leaks across runs. The engine guarantees that:
///
/// - [`activate`](Self::activate) runs exactly once per run per instance,
///   before the first [`invoke`](Self::invoke), no matter how many dispatches
///   target the instance;
/// - two dispatches to the same instance are never executed concurrently,
///   while dispatches to different instances may run in parallel.
///
/// Steps that own no state simply leave `activate` at its default.
#[async_trait]
pub trait ProcessStep<P>: Send {
    /// One-time state initialization, run before the first invocation.
    async fn activate(&mut self) -> Result<(), ActivationError> {
        Ok(())
    }

    /// Invokes the named function with the dispatched payload.
    ///
    /// Explicit events go through `ctx`; a returned value is treated as the
    /// implicit function-result event. Returning an error marks the dispatch
    /// failed — none of its events are routed.
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<P>,
        ctx: &mut StepContext<P>,
    ) -> Result<Option<P>, FunctionError>;
}

/// Compile-time step metadata, used by the builder to register steps by type.
pub trait StepMetadata {
    /// The step's declared name and functions.
    fn definition() -> StepDefinition;
}
