//! Graph construction: the append-only builder, the routing DSL, and
//! build-time edge resolution.
//!
//! All routing is resolved statically by [`ProcessBuilder::build`]: every edge
//! is checked against the registered steps, their function signatures, and
//! their declared event vocabularies. A graph that builds successfully cannot
//! mis-route at run time; the engine's dispatch loop only ever looks up
//! pre-resolved routes.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::GraphValidationError;
use crate::step::{ProcessStep, StepDefinition, StepMetadata};
use crate::{EventId, FunctionName, ParameterName, ProcessName, StepName};

// ---------------------------------------------------------------------------
// Handles and targets
// ---------------------------------------------------------------------------

/// Opaque handle to a step registered with a [`ProcessBuilder`].
///
/// Returned by [`ProcessBuilder::add_step`]; used to name the step in routing
/// calls. Handles are only meaningful for the builder that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHandle(pub(crate) usize);

/// A routing destination: a step, an optional function, and an optional
/// parameter name.
///
/// When the function is omitted it resolves to the step's only function;
/// a step with several functions makes the omission a build error. A supplied
/// parameter name must match the target function's declaration.
#[derive(Debug, Clone)]
pub struct FunctionTarget {
    step: StepHandle,
    function: Option<FunctionName>,
    parameter: Option<ParameterName>,
}

impl FunctionTarget {
    /// Targets a step's only function.
    pub fn step(step: StepHandle) -> Self {
        Self {
            step,
            function: None,
            parameter: None,
        }
    }

    /// Targets a named function of a step.
    pub fn function(step: StepHandle, name: impl Into<FunctionName>) -> Self {
        Self {
            step,
            function: Some(name.into()),
            parameter: None,
        }
    }

    /// Documents the parameter the payload binds to; validated against the
    /// target function's declaration at build time.
    pub fn with_parameter(mut self, name: impl Into<ParameterName>) -> Self {
        self.parameter = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Builder internals
// ---------------------------------------------------------------------------

type StepFactory<P> = Arc<dyn Fn() -> Box<dyn ProcessStep<P>> + Send + Sync>;

pub(crate) struct StepNode<P> {
    pub(crate) definition: StepDefinition,
    pub(crate) factory: StepFactory<P>,
}

impl<P> std::fmt::Debug for StepNode<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepNode")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum RawTrigger {
    InputEvent(EventId),
    FunctionResult {
        step: StepHandle,
        function: Option<FunctionName>,
    },
    Event {
        step: StepHandle,
        event: EventId,
    },
}

struct PendingRule {
    trigger: RawTrigger,
    targets: Vec<FunctionTarget>,
    stops: bool,
}

// ---------------------------------------------------------------------------
// Resolved routing tables
// ---------------------------------------------------------------------------

/// A fully resolved trigger: the key of the graph's routing table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Trigger {
    FunctionResult {
        step: usize,
        function: FunctionName,
    },
    Event {
        step: usize,
        event: EventId,
    },
}

/// One resolved destination. The parameter name is consumed by validation and
/// not retained; the payload always binds to the target function's declared
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteTarget {
    pub(crate) step: usize,
    pub(crate) function: FunctionName,
}

/// Everything one trigger routes to, plus whether it terminates the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RouteSet {
    pub(crate) targets: Vec<RouteTarget>,
    pub(crate) stops: bool,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Append-only builder for a [`ProcessGraph`].
///
/// Steps are registered first; routing rules reference them through their
/// [`StepHandle`]s. Nothing can be removed or edited once added; `build()`
/// validates the whole graph in one pass.
pub struct ProcessBuilder<P> {
    name: ProcessName,
    steps: Vec<StepNode<P>>,
    rules: Vec<PendingRule>,
}

impl<P: Send + 'static> ProcessBuilder<P> {
    /// Creates a builder for a process with the given name.
    pub fn new(name: impl Into<ProcessName>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Registers a step by type; a fresh instance is constructed per run via
    /// `Default`.
    pub fn add_step<S>(&mut self) -> StepHandle
    where
        S: ProcessStep<P> + StepMetadata + Default + 'static,
    {
        self.add_step_with(S::default)
    }

    /// Registers a step with an explicit factory, for steps whose constructor
    /// takes injected collaborators. The factory runs once per run.
    pub fn add_step_with<S, F>(&mut self, factory: F) -> StepHandle
    where
        S: ProcessStep<P> + StepMetadata + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let definition = S::definition();
        let factory: StepFactory<P> = Arc::new(move || Box::new(factory()));
        self.steps.push(StepNode {
            definition,
            factory,
        });
        StepHandle(self.steps.len() - 1)
    }

    /// Starts a routing rule for an external input event.
    pub fn on_input_event(&mut self, event: impl Into<EventId>) -> RoutingBuilder<'_, P> {
        self.push_rule(RawTrigger::InputEvent(event.into()))
    }

    /// Starts a routing rule for a step's implicit function-result event.
    /// The step must expose exactly one function.
    pub fn on_function_result(&mut self, step: StepHandle) -> RoutingBuilder<'_, P> {
        self.push_rule(RawTrigger::FunctionResult {
            step,
            function: None,
        })
    }

    /// Starts a routing rule for the result of a named function.
    pub fn on_function_result_of(
        &mut self,
        step: StepHandle,
        function: impl Into<FunctionName>,
    ) -> RoutingBuilder<'_, P> {
        self.push_rule(RawTrigger::FunctionResult {
            step,
            function: Some(function.into()),
        })
    }

    /// Starts a routing rule for a named event emitted by a step.
    pub fn on_event(
        &mut self,
        step: StepHandle,
        event: impl Into<EventId>,
    ) -> RoutingBuilder<'_, P> {
        self.push_rule(RawTrigger::Event {
            step,
            event: event.into(),
        })
    }

    fn push_rule(&mut self, trigger: RawTrigger) -> RoutingBuilder<'_, P> {
        self.rules.push(PendingRule {
            trigger,
            targets: Vec::new(),
            stops: false,
        });
        let rule = self.rules.len() - 1;
        RoutingBuilder {
            builder: self,
            rule,
        }
    }

    /// Validates every step definition and routing rule, producing the
    /// immutable graph.
    pub fn build(self) -> Result<ProcessGraph<P>, GraphValidationError> {
        if self.name.is_empty() {
            return Err(GraphValidationError::EmptyProcessName);
        }
        self.validate_definitions()?;

        let mut input_routes: HashMap<EventId, RouteSet> = HashMap::new();
        let mut routes: HashMap<Trigger, RouteSet> = HashMap::new();

        for rule in &self.rules {
            let targets = self.resolve_targets(&rule.targets)?;
            if targets.is_empty() && !rule.stops {
                return Err(GraphValidationError::DanglingTrigger {
                    trigger: self.describe_trigger(&rule.trigger),
                });
            }

            // Rules sharing a trigger merge into one route set, so a trigger
            // may be wired in several calls.
            let set = match &rule.trigger {
                RawTrigger::InputEvent(event) => {
                    if event.is_empty() {
                        return Err(GraphValidationError::EmptyInputEvent);
                    }
                    input_routes.entry(event.clone()).or_default()
                }
                RawTrigger::FunctionResult {
                    step,
                    function,
                } => {
                    let index = self.check_handle(*step)?;
                    let spec = self.resolve_function(index, function.as_ref())?;
                    routes
                        .entry(Trigger::FunctionResult {
                            step: index,
                            function: spec.name().clone(),
                        })
                        .or_default()
                }
                RawTrigger::Event {
                    step,
                    event,
                } => {
                    let index = self.check_handle(*step)?;
                    let definition = &self.steps[index].definition;
                    if !definition.declares_event(event) {
                        return Err(GraphValidationError::UndeclaredEvent {
                            step: definition.name().clone(),
                            event: event.clone(),
                        });
                    }
                    routes
                        .entry(Trigger::Event {
                            step: index,
                            event: event.clone(),
                        })
                        .or_default()
                }
            };
            set.targets.extend(targets);
            set.stops |= rule.stops;
        }

        Ok(ProcessGraph {
            name: self.name,
            steps: self.steps,
            input_routes,
            routes,
        })
    }

    fn validate_definitions(&self) -> Result<(), GraphValidationError> {
        let mut seen = HashSet::new();
        for node in &self.steps {
            let definition = &node.definition;
            let step = definition.name().clone();
            if step.is_empty() {
                return Err(GraphValidationError::EmptyIdentifier {
                    step,
                });
            }
            if !seen.insert(step.clone()) {
                return Err(GraphValidationError::DuplicateStep {
                    step,
                });
            }
            if definition.functions().is_empty() {
                return Err(GraphValidationError::NoFunctions {
                    step,
                });
            }
            let mut functions = HashSet::new();
            for spec in definition.functions() {
                if spec.name().is_empty()
                    || spec.parameter().is_some_and(|p| p.is_empty())
                    || spec.output_events().iter().any(|e| e.is_empty())
                {
                    return Err(GraphValidationError::EmptyIdentifier {
                        step,
                    });
                }
                if !functions.insert(spec.name().clone()) {
                    return Err(GraphValidationError::DuplicateFunction {
                        step,
                        function: spec.name().clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn resolve_targets(
        &self,
        targets: &[FunctionTarget],
    ) -> Result<Vec<RouteTarget>, GraphValidationError> {
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let index = self.check_handle(target.step)?;
            let spec = self.resolve_function(index, target.function.as_ref())?;
            if target.parameter.is_some() && target.parameter.as_ref() != spec.parameter() {
                return Err(GraphValidationError::ParameterMismatch {
                    step: self.steps[index].definition.name().clone(),
                    function: spec.name().clone(),
                    expected: spec.parameter().cloned(),
                    supplied: target.parameter.clone(),
                });
            }
            resolved.push(RouteTarget {
                step: index,
                function: spec.name().clone(),
            });
        }
        Ok(resolved)
    }

    fn resolve_function(
        &self,
        step: usize,
        function: Option<&FunctionName>,
    ) -> Result<&crate::step::FunctionSpec, GraphValidationError> {
        let definition = &self.steps[step].definition;
        match function {
            Some(name) => definition.function(name).ok_or_else(|| {
                GraphValidationError::UnknownFunction {
                    step: definition.name().clone(),
                    function: name.clone(),
                }
            }),
            None => definition.sole_function().ok_or_else(|| {
                GraphValidationError::AmbiguousFunction {
                    step: definition.name().clone(),
                    count: definition.functions().len(),
                }
            }),
        }
    }

    fn check_handle(&self, handle: StepHandle) -> Result<usize, GraphValidationError> {
        if handle.0 < self.steps.len() {
            Ok(handle.0)
        } else {
            Err(GraphValidationError::UnknownStep {
                index: handle.0,
            })
        }
    }

    fn describe_trigger(&self, trigger: &RawTrigger) -> String {
        match trigger {
            RawTrigger::InputEvent(event) => format!("input event '{event}'"),
            RawTrigger::FunctionResult {
                step,
                function,
            } => {
                let step = self.step_label(*step);
                match function {
                    Some(function) => format!("result of '{step}::{function}'"),
                    None => format!("function result of '{step}'"),
                }
            }
            RawTrigger::Event {
                step,
                event,
            } => format!("event '{event}' of '{}'", self.step_label(*step)),
        }
    }

    fn step_label(&self, handle: StepHandle) -> String {
        self.steps
            .get(handle.0)
            .map(|node| node.definition.name().to_string())
            .unwrap_or_else(|| format!("#{}", handle.0))
    }
}

// ---------------------------------------------------------------------------
// Routing builder
// ---------------------------------------------------------------------------

/// Chainable routing DSL for one trigger.
///
/// Each [`send_event_to`](Self::send_event_to) adds a destination (fan-out);
/// [`stop_process`](Self::stop_process) marks the trigger as terminal. A
/// trigger may both route and stop.
pub struct RoutingBuilder<'a, P> {
    builder: &'a mut ProcessBuilder<P>,
    rule: usize,
}

impl<P> RoutingBuilder<'_, P> {
    /// Adds a destination for this trigger.
    pub fn send_event_to(self, target: FunctionTarget) -> Self {
        self.builder.rules[self.rule].targets.push(target);
        self
    }

    /// Marks this trigger as terminal: once it fires, the run halts and no
    /// further dispatch is dequeued.
    pub fn stop_process(self) -> Self {
        self.builder.rules[self.rule].stops = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The immutable process graph: step registry, input-event bindings, and the
/// fully resolved edge set.
///
/// Built once by [`ProcessBuilder::build`]; executed any number of times by
/// [`ProcessEngine`](crate::ProcessEngine), each run with fresh step
/// instances.
#[derive(Debug)]
pub struct ProcessGraph<P> {
    name: ProcessName,
    pub(crate) steps: Vec<StepNode<P>>,
    pub(crate) input_routes: HashMap<EventId, RouteSet>,
    pub(crate) routes: HashMap<Trigger, RouteSet>,
}

impl<P> ProcessGraph<P> {
    /// The process name.
    pub fn name(&self) -> &ProcessName {
        &self.name
    }

    /// The number of registered steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// The name of the step behind `handle`, if the handle is valid.
    pub fn step_name(&self, handle: StepHandle) -> Option<&StepName> {
        self.steps.get(handle.0).map(|node| node.definition.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FunctionError;
    use crate::step::{FunctionSpec, StepContext};
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Default)]
    struct SingleFn;

    impl StepMetadata for SingleFn {
        fn definition() -> StepDefinition {
            StepDefinition::new("Single").with_function(
                FunctionSpec::new("Run")
                    .with_parameter("input")
                    .emits("Done"),
            )
        }
    }

    #[async_trait]
    impl ProcessStep<Value> for SingleFn {
        async fn invoke(
            &mut self,
            _function: &crate::FunctionName,
            _input: Option<Value>,
            _ctx: &mut StepContext<Value>,
        ) -> Result<Option<Value>, FunctionError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct TwoFns;

    impl StepMetadata for TwoFns {
        fn definition() -> StepDefinition {
            StepDefinition::new("Pair")
                .with_function(FunctionSpec::new("First").with_parameter("a"))
                .with_function(FunctionSpec::new("Second"))
        }
    }

    #[async_trait]
    impl ProcessStep<Value> for TwoFns {
        async fn invoke(
            &mut self,
            _function: &crate::FunctionName,
            _input: Option<Value>,
            _ctx: &mut StepContext<Value>,
        ) -> Result<Option<Value>, FunctionError> {
            Ok(None)
        }
    }

    #[test]
    fn builds_a_linear_graph() {
        let mut builder = ProcessBuilder::new("Linear");
        let a = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a).with_parameter("input"));
        builder.on_event(a, "Done").stop_process();

        let graph = builder.build().expect("graph should build");
        assert_eq!(graph.step_count(), 1);
        assert!(graph.input_routes.contains_key(&EventId::from("Start")));
    }

    #[test]
    fn rejects_unknown_function() {
        let mut builder = ProcessBuilder::new("P");
        let a = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::function(a, "Missing"));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::UnknownFunction { .. }));
    }

    #[test]
    fn rejects_parameter_mismatch() {
        let mut builder = ProcessBuilder::new("P");
        let a = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a).with_parameter("wrong"));
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            GraphValidationError::ParameterMismatch { .. }
        ));
    }

    #[test]
    fn rejects_undeclared_event_trigger() {
        let mut builder = ProcessBuilder::new("P");
        let a = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a));
        builder.on_event(a, "Never").stop_process();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::UndeclaredEvent { .. }));
    }

    #[test]
    fn rejects_ambiguous_default_function() {
        let mut builder = ProcessBuilder::new("P");
        let pair = builder.add_step::<TwoFns>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(pair));
        let err = builder.build().unwrap_err();
        assert!(matches!(
            err,
            GraphValidationError::AmbiguousFunction { count: 2, .. }
        ));
    }

    #[test]
    fn rejects_dangling_trigger() {
        let mut builder = ProcessBuilder::<Value>::new("P");
        let a = builder.add_step::<SingleFn>();
        builder.on_event(a, "Done");
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::DanglingTrigger { .. }));
    }

    #[derive(Default)]
    struct BlankFn;

    impl StepMetadata for BlankFn {
        fn definition() -> StepDefinition {
            StepDefinition::new("Blank").with_function(FunctionSpec::new(""))
        }
    }

    #[async_trait]
    impl ProcessStep<Value> for BlankFn {
        async fn invoke(
            &mut self,
            _function: &crate::FunctionName,
            _input: Option<Value>,
            _ctx: &mut StepContext<Value>,
        ) -> Result<Option<Value>, FunctionError> {
            Ok(None)
        }
    }

    #[test]
    fn rejects_an_empty_process_name() {
        let mut builder = ProcessBuilder::<Value>::new("");
        let a = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a));
        assert_eq!(
            builder.build().unwrap_err(),
            GraphValidationError::EmptyProcessName
        );
    }

    #[test]
    fn rejects_empty_identifiers_in_definitions() {
        let mut builder = ProcessBuilder::<Value>::new("P");
        let blank = builder.add_step::<BlankFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(blank));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::EmptyIdentifier { .. }));
    }

    #[test]
    fn rejects_duplicate_steps() {
        let mut builder = ProcessBuilder::<Value>::new("P");
        let a = builder.add_step::<SingleFn>();
        let _again = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::DuplicateStep { .. }));
    }

    #[test]
    fn rejects_foreign_handles() {
        let mut other = ProcessBuilder::<Value>::new("Other");
        let _ = other.add_step::<SingleFn>();
        let foreign = other.add_step::<TwoFns>();

        let mut builder = ProcessBuilder::<Value>::new("P");
        let _ = builder.add_step::<SingleFn>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(foreign));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GraphValidationError::UnknownStep { index: 1 }));
    }

    #[test]
    fn merges_rules_with_the_same_trigger() {
        let mut builder = ProcessBuilder::new("P");
        let a = builder.add_step::<SingleFn>();
        let b = builder.add_step::<TwoFns>();
        builder
            .on_input_event("Start")
            .send_event_to(FunctionTarget::step(a));
        builder.on_event(a, "Done").send_event_to(FunctionTarget::function(b, "Second"));
        builder.on_event(a, "Done").stop_process();

        let graph = builder.build().expect("graph should build");
        let set = graph
            .routes
            .get(&Trigger::Event {
                step: 0,
                event: EventId::from("Done"),
            })
            .expect("route set");
        assert_eq!(set.targets.len(), 1);
        assert!(set.stops);
    }
}
