//! Engine-level scenarios: routing, activation, fan-out, stop semantics, and
//! failure handling, exercised through small purpose-built steps.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use engine::{
    ActivationError, EngineError, FunctionError, FunctionName, FunctionSpec, FunctionTarget,
    ProcessBuilder, ProcessEngine, ProcessEvent, ProcessStep, RunStatus, StepContext,
    StepDefinition, StepMetadata,
};
use serde_json::{json, Value};

/// Shared recorder handed to test steps through their factories.
#[derive(Clone, Default)]
struct Probe {
    activations: Arc<AtomicUsize>,
    invocations: Arc<Mutex<Vec<(String, Option<Value>)>>>,
}

impl Probe {
    fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    fn received(&self) -> Vec<(String, Option<Value>)> {
        self.invocations.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Test steps
// ---------------------------------------------------------------------------

/// Counts activations and records every invocation; emits nothing.
struct SinkStep {
    probe: Probe,
}

impl SinkStep {
    fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl StepMetadata for SinkStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("Sink")
            .with_function(FunctionSpec::new("Receive").with_parameter("payload"))
    }
}

#[async_trait]
impl ProcessStep<Value> for SinkStep {
    async fn activate(&mut self) -> Result<(), ActivationError> {
        self.probe.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        self.probe
            .invocations
            .lock()
            .unwrap()
            .push((function.to_string(), input));
        Ok(None)
    }
}

/// Same behavior as [`SinkStep`] under a second name, so fan-out can target
/// two distinct instances.
struct OtherSinkStep {
    probe: Probe,
}

impl OtherSinkStep {
    fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl StepMetadata for OtherSinkStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("OtherSink")
            .with_function(FunctionSpec::new("Receive").with_parameter("payload"))
    }
}

#[async_trait]
impl ProcessStep<Value> for OtherSinkStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        self.probe
            .invocations
            .lock()
            .unwrap()
            .push((function.to_string(), input));
        Ok(None)
    }
}

/// Emits a scripted sequence of events, then optionally returns a result.
struct EmitterStep {
    emissions: Vec<(&'static str, Value)>,
    result: Option<Value>,
}

impl EmitterStep {
    fn emitting(emissions: Vec<(&'static str, Value)>) -> impl Fn() -> EmitterStep + Send + Sync {
        move || EmitterStep {
            emissions: emissions.clone(),
            result: None,
        }
    }
}

impl StepMetadata for EmitterStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("Emitter").with_function(
            FunctionSpec::new("Run")
                .with_parameter("input")
                .emits("First")
                .emits("Second")
                .emits("Fanout")
                .emits("Halt"),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for EmitterStep {
    async fn invoke(
        &mut self,
        _function: &FunctionName,
        _input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        for (id, data) in &self.emissions {
            ctx.emit_event(*id, data.clone());
        }
        Ok(self.result.clone())
    }
}

/// Echoes its input as a `Pong` event; wired to itself it cycles forever.
#[derive(Default)]
struct BouncerStep;

impl StepMetadata for BouncerStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("Bouncer").with_function(
            FunctionSpec::new("Bounce")
                .with_parameter("ball")
                .emits("Pong"),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for BouncerStep {
    async fn invoke(
        &mut self,
        _function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        ctx.emit_event("Pong", input.unwrap_or(Value::Null));
        Ok(None)
    }
}

/// Always raises an unhandled fault.
#[derive(Default)]
struct FailingStep;

impl StepMetadata for FailingStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("Failing")
            .with_function(FunctionSpec::new("Explode").with_parameter("input"))
    }
}

#[async_trait]
impl ProcessStep<Value> for FailingStep {
    async fn invoke(
        &mut self,
        _function: &FunctionName,
        _input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        Err(FunctionError::execution("deliberate fault"))
    }
}

/// Fails its activation phase.
#[derive(Default)]
struct BrokenActivationStep;

impl StepMetadata for BrokenActivationStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("BrokenActivation")
            .with_function(FunctionSpec::new("Run").with_parameter("input"))
    }
}

#[async_trait]
impl ProcessStep<Value> for BrokenActivationStep {
    async fn activate(&mut self) -> Result<(), ActivationError> {
        Err(ActivationError::new("state store unavailable"))
    }

    async fn invoke(
        &mut self,
        _function: &FunctionName,
        _input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        Ok(None)
    }
}

/// Emits an event that is not part of its declared vocabulary.
#[derive(Default)]
struct RogueStep;

impl StepMetadata for RogueStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("Rogue").with_function(
            FunctionSpec::new("Run")
                .with_parameter("input")
                .emits("Declared"),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for RogueStep {
    async fn invoke(
        &mut self,
        _function: &FunctionName,
        _input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        ctx.emit_event("Undeclared", json!("surprise"));
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unbound_start_event_performs_no_dispatch() {
    let probe = Probe::default();
    let mut builder = ProcessBuilder::new("Unbound");
    let sink = {
        let probe = probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(sink));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let err = engine
        .start(ProcessEvent::new("Missing", json!("x")))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnboundStartEvent { .. }));
    assert!(probe.received().is_empty());
}

#[tokio::test]
async fn activation_runs_exactly_once_per_run() {
    let probe = Probe::default();
    let mut builder = ProcessBuilder::new("ActivateOnce");
    let sink = {
        let probe = probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    // Three dispatches to the same instance from a single trigger.
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(sink))
        .send_event_to(FunctionTarget::step(sink))
        .send_event_to(FunctionTarget::step(sink));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let result = engine
        .start(ProcessEvent::new("Go", json!("payload")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(probe.activation_count(), 1);
    assert_eq!(probe.received().len(), 3);

    // A second run gets a fresh instance and activates it again.
    engine
        .start(ProcessEvent::new("Go", json!("payload")))
        .await
        .unwrap();
    assert_eq!(probe.activation_count(), 2);
}

#[tokio::test]
async fn fanout_delivers_identical_payload_copies() {
    let record = json!({"title": "Widget", "labels": ["a", "b"], "count": 3});
    let sink_probe = Probe::default();
    let other_probe = Probe::default();

    let mut builder = ProcessBuilder::new("Fanout");
    let emitter =
        builder.add_step_with(EmitterStep::emitting(vec![("Fanout", record.clone())]));
    let sink = {
        let probe = sink_probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    let other = {
        let probe = other_probe.clone();
        builder.add_step_with(move || OtherSinkStep::new(probe.clone()))
    };
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(emitter));
    builder
        .on_event(emitter, "Fanout")
        .send_event_to(FunctionTarget::step(sink))
        .send_event_to(FunctionTarget::step(other));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let result = engine
        .start(ProcessEvent::new("Go", json!("start")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    let sink_received = sink_probe.received();
    let other_received = other_probe.received();
    assert_eq!(sink_received.len(), 1);
    assert_eq!(other_received.len(), 1);

    // Every target sees the record unchanged, byte for byte.
    let expected = serde_json::to_string(&record).unwrap();
    for received in [&sink_received[0].1, &other_received[0].1] {
        let received = received.as_ref().expect("payload present");
        assert_eq!(serde_json::to_string(received).unwrap(), expected);
    }
}

#[tokio::test]
async fn stop_edge_prevents_sibling_dispatch() {
    let probe = Probe::default();
    let mut builder = ProcessBuilder::new("StopWins");
    let emitter = builder.add_step_with(EmitterStep::emitting(vec![("Halt", json!("end"))]));
    let sink = {
        let probe = probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(emitter));
    // The same trigger routes to the sink and stops the process; stop wins.
    builder
        .on_event(emitter, "Halt")
        .send_event_to(FunctionTarget::step(sink))
        .stop_process();
    let engine = ProcessEngine::new(builder.build().unwrap());

    let result = engine
        .start(ProcessEvent::new("Go", json!("start")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Halted);
    assert!(probe.received().is_empty());
}

#[tokio::test]
async fn emissions_route_in_emission_order() {
    let probe = Probe::default();
    let mut builder = ProcessBuilder::new("Ordered");
    let emitter = builder.add_step_with(EmitterStep::emitting(vec![
        ("First", json!(1)),
        ("Second", json!(2)),
    ]));
    let sink = {
        let probe = probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(emitter));
    builder
        .on_event(emitter, "First")
        .send_event_to(FunctionTarget::step(sink));
    builder
        .on_event(emitter, "Second")
        .send_event_to(FunctionTarget::step(sink));
    let engine = ProcessEngine::new(builder.build().unwrap());

    engine
        .start(ProcessEvent::new("Go", json!("start")))
        .await
        .unwrap();

    let received = probe.received();
    assert_eq!(
        received.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(),
        vec![Some(json!(1)), Some(json!(2))]
    );
}

#[tokio::test]
async fn cycle_is_bounded_by_the_dispatch_limit() {
    let mut builder = ProcessBuilder::new("Cycle");
    let bouncer = builder.add_step::<BouncerStep>();
    builder
        .on_input_event("Serve")
        .send_event_to(FunctionTarget::step(bouncer));
    builder
        .on_event(bouncer, "Pong")
        .send_event_to(FunctionTarget::step(bouncer));
    let engine = ProcessEngine::new(builder.build().unwrap()).with_dispatch_limit(5);

    let err = engine
        .start(ProcessEvent::new("Serve", json!("ball")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::DispatchLimitExceeded { limit: 5 }
    ));
}

#[tokio::test]
async fn failed_dispatch_routes_no_events_but_the_run_drains() {
    let probe = Probe::default();
    let mut builder = ProcessBuilder::new("Failing");
    let failing = builder.add_step::<FailingStep>();
    let sink = {
        let probe = probe.clone();
        builder.add_step_with(move || SinkStep::new(probe.clone()))
    };
    // The failing step's result would route to the sink; the independent
    // sibling dispatch from the input event must still run.
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(failing))
        .send_event_to(FunctionTarget::step(sink));
    builder
        .on_function_result(failing)
        .send_event_to(FunctionTarget::step(sink));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let result = engine
        .start(ProcessEvent::new("Go", json!("x")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].step.as_str(), "Failing");
    // Only the sibling dispatch reached the sink.
    assert_eq!(probe.received().len(), 1);
}

#[tokio::test]
async fn activation_failure_aborts_the_run() {
    let mut builder = ProcessBuilder::new("BrokenActivation");
    let broken = builder.add_step::<BrokenActivationStep>();
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(broken));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let err = engine
        .start(ProcessEvent::new("Go", json!("x")))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Activation { .. }));
}

#[tokio::test]
async fn undeclared_emission_is_dropped() {
    let mut builder = ProcessBuilder::new("RogueEmission");
    let rogue = builder.add_step::<RogueStep>();
    builder
        .on_input_event("Go")
        .send_event_to(FunctionTarget::step(rogue));
    let engine = ProcessEngine::new(builder.build().unwrap());

    let result = engine
        .start(ProcessEvent::new("Go", json!("x")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.dispatches, 1);
    assert!(result.failures.is_empty());
}
