//! The process engine: the runtime that drives a graph from a start event to
//! exhaustion of the dispatch queue or a stop instruction.
//!
//! One run is driven by one control loop. The queue is drained in batches; a
//! batch is grouped per step instance and runs one tokio task per instance,
//! so dispatches to the same instance execute sequentially in enqueue order
//! while different instances run concurrently. Emissions are routed after the
//! batch joins, within one dispatch in emission order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{ActivationError, EngineError, FunctionError};
use crate::event::ProcessEvent;
use crate::graph::{ProcessGraph, RouteSet, Trigger};
use crate::observer::{NoopObserver, RunObserver};
use crate::step::{ProcessStep, StepContext};
use crate::{FunctionName, RunId, StepName};

/// Default cap on the number of dispatches a single run may perform.
///
/// Generous enough for any of the demo workflows including several
/// human-feedback rounds; tight enough to turn an unbounded cycle into an
/// error.
pub const DEFAULT_DISPATCH_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Run result
// ---------------------------------------------------------------------------

/// How a run reached its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The dispatch queue drained with no failures.
    Completed,
    /// A stop edge fired; nothing further was dequeued.
    Halted,
    /// At least one dispatch raised an unhandled fault. The rest of the run
    /// drained normally, but the failed dispatches routed no events.
    Failed,
}

/// One dispatch that raised an unhandled fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchFailure {
    /// The step that was being invoked.
    pub step: StepName,
    /// The function that failed.
    pub function: FunctionName,
    /// The rendered fault.
    pub reason: String,
}

/// The outcome of one process run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Correlates all spans and observer callbacks of this run.
    pub run_id: RunId,
    /// The terminal condition.
    pub status: RunStatus,
    /// How many dispatches were executed.
    pub dispatches: usize,
    /// Every dispatch that raised an unhandled fault.
    pub failures: Vec<DispatchFailure>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal condition.
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// `true` if a stop edge ended the run.
    pub fn is_halted(&self) -> bool {
        self.status == RunStatus::Halted
    }

    /// `true` if the queue drained with no failures.
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Executes a [`ProcessGraph`]. The graph is immutable and may be started any
/// number of times; every run gets fresh step instances from the registered
/// factories.
pub struct ProcessEngine<P> {
    graph: ProcessGraph<P>,
    dispatch_limit: usize,
}

impl<P> ProcessEngine<P>
where
    P: Clone + Send + 'static,
{
    /// Wraps a graph with the default dispatch limit.
    pub fn new(graph: ProcessGraph<P>) -> Self {
        Self {
            graph,
            dispatch_limit: DEFAULT_DISPATCH_LIMIT,
        }
    }

    /// Overrides the per-run dispatch cap.
    pub fn with_dispatch_limit(mut self, limit: usize) -> Self {
        self.dispatch_limit = limit;
        self
    }

    /// The graph this engine executes.
    pub fn graph(&self) -> &ProcessGraph<P> {
        &self.graph
    }

    /// Runs the graph from `start_event` without an observer.
    pub async fn start(&self, start_event: ProcessEvent<P>) -> Result<RunResult, EngineError> {
        self.start_observed(start_event, Arc::new(NoopObserver)).await
    }

    /// Runs the graph from `start_event`, reporting progress to a run-scoped
    /// observer.
    #[instrument(
        name = "process_run",
        skip(self, start_event, observer),
        fields(process = %self.graph.name(), start_event = %start_event.id())
    )]
    pub async fn start_observed(
        &self,
        start_event: ProcessEvent<P>,
        observer: Arc<dyn RunObserver>,
    ) -> Result<RunResult, EngineError> {
        let (start_id, payload) = start_event.into_parts();
        let Some(seed_routes) = self.graph.input_routes.get(&start_id) else {
            return Err(EngineError::UnboundStartEvent {
                process: self.graph.name().clone(),
                event: start_id,
            });
        };

        let run_id = RunId::new_random();
        let started_at = Utc::now();
        observer.run_started(run_id, self.graph.name());
        info!(run_id = %run_id, "run_started");

        // Fresh instances per run; state never leaks across runs.
        let instances: Vec<Arc<Mutex<InstanceCell<P>>>> = self
            .graph
            .steps
            .iter()
            .map(|node| {
                Arc::new(Mutex::new(InstanceCell {
                    step: (node.factory)(),
                    activated: false,
                }))
            })
            .collect();

        let mut queue: VecDeque<Dispatch<P>> = VecDeque::new();
        let mut halted = self.enqueue_routes(&mut queue, seed_routes, payload.as_ref());

        let mut dispatched = 0usize;
        let mut failures: Vec<DispatchFailure> = Vec::new();

        while !halted && !queue.is_empty() {
            if dispatched + queue.len() > self.dispatch_limit {
                return Err(EngineError::DispatchLimitExceeded {
                    limit: self.dispatch_limit,
                });
            }

            // Group the batch per step instance, preserving enqueue order
            // within each group. One task per instance keeps same-instance
            // dispatches sequential and cross-instance dispatches concurrent.
            let mut groups: Vec<(usize, Vec<Dispatch<P>>)> = Vec::new();
            for dispatch in queue.drain(..) {
                match groups.iter_mut().find(|(step, _)| *step == dispatch.step) {
                    Some((_, list)) => list.push(dispatch),
                    None => groups.push((dispatch.step, vec![dispatch])),
                }
            }

            let mut handles = Vec::with_capacity(groups.len());
            for (step, dispatches) in groups {
                dispatched += dispatches.len();
                let cell = Arc::clone(&instances[step]);
                let step_name = self.graph.steps[step].definition.name().clone();
                let observer = Arc::clone(&observer);
                handles.push(tokio::spawn(execute_instance_batch(
                    cell, step_name, dispatches, observer,
                )));
            }

            let grouped = join_all(handles).await;
            let mut outcomes = Vec::new();
            for joined in grouped {
                let reports = joined.map_err(|e| EngineError::Internal {
                    message: e.to_string(),
                })?;
                for report in reports {
                    match report {
                        DispatchReport::Done(outcome) => outcomes.push(outcome),
                        DispatchReport::ActivationFailed {
                            step,
                            error,
                        } => {
                            error!(step = %step, error = %error, "activation_failed");
                            return Err(EngineError::Activation {
                                step,
                                source: error,
                            });
                        }
                    }
                }
            }

            'outcomes: for outcome in outcomes {
                if let Some(fault) = outcome.error {
                    warn!(
                        step = %outcome.step_name,
                        function = %outcome.function,
                        error = %fault,
                        "dispatch_failed"
                    );
                    observer.dispatch_failed(&outcome.step_name, &outcome.function, &fault);
                    failures.push(DispatchFailure {
                        step: outcome.step_name,
                        function: outcome.function,
                        reason: fault.to_string(),
                    });
                    continue;
                }
                observer.dispatch_completed(&outcome.step_name, &outcome.function);

                // Explicit emissions first, in emission order; the implicit
                // function-result event fires at return, so it routes last.
                for event in outcome.emitted {
                    if halted {
                        break 'outcomes;
                    }
                    observer.event_emitted(&outcome.step_name, event.id());
                    if !self.graph.steps[outcome.step].definition.declares_event(event.id()) {
                        warn!(
                            step = %outcome.step_name,
                            event = %event.id(),
                            "undeclared event dropped"
                        );
                        continue;
                    }
                    let trigger = Trigger::Event {
                        step: outcome.step,
                        event: event.id().clone(),
                    };
                    halted |= self.route_trigger(&mut queue, &trigger, event.data());
                }
                if halted {
                    break 'outcomes;
                }
                if let Some(value) = outcome.result {
                    let trigger = Trigger::FunctionResult {
                        step: outcome.step,
                        function: outcome.function.clone(),
                    };
                    halted |= self.route_trigger(&mut queue, &trigger, Some(&value));
                    if halted {
                        break 'outcomes;
                    }
                }
            }
        }

        let status = if halted {
            RunStatus::Halted
        } else if failures.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        let result = RunResult {
            run_id,
            status,
            dispatches: dispatched,
            failures,
            started_at,
            finished_at: Utc::now(),
        };
        info!(run_id = %run_id, status = ?result.status, dispatches = result.dispatches, "run_finished");
        observer.run_finished(&result);
        Ok(result)
    }

    /// Enqueues one dispatch per target of `routes`, every target receiving
    /// its own copy of the payload. Returns `true` if the route set stops the
    /// run; nothing is enqueued in that case.
    fn enqueue_routes(
        &self,
        queue: &mut VecDeque<Dispatch<P>>,
        routes: &RouteSet,
        payload: Option<&P>,
    ) -> bool {
        if routes.stops {
            return true;
        }
        for target in &routes.targets {
            queue.push_back(Dispatch {
                step: target.step,
                function: target.function.clone(),
                payload: payload.cloned(),
            });
        }
        false
    }

    fn route_trigger(
        &self,
        queue: &mut VecDeque<Dispatch<P>>,
        trigger: &Trigger,
        payload: Option<&P>,
    ) -> bool {
        let Some(routes) = self.graph.routes.get(trigger) else {
            debug!(?trigger, "no route for trigger; dropped");
            return false;
        };
        let halted = self.enqueue_routes(queue, routes, payload);
        if halted {
            info!(?trigger, "stop edge fired; halting run");
        }
        halted
    }
}

// ---------------------------------------------------------------------------
// Dispatch execution
// ---------------------------------------------------------------------------

struct Dispatch<P> {
    step: usize,
    function: FunctionName,
    payload: Option<P>,
}

struct InstanceCell<P> {
    step: Box<dyn ProcessStep<P>>,
    activated: bool,
}

struct DispatchOutcome<P> {
    step: usize,
    step_name: StepName,
    function: FunctionName,
    emitted: Vec<ProcessEvent<P>>,
    result: Option<P>,
    error: Option<FunctionError>,
}

enum DispatchReport<P> {
    Done(DispatchOutcome<P>),
    ActivationFailed {
        step: StepName,
        error: ActivationError,
    },
}

/// Runs one batch's dispatches for a single step instance, sequentially in
/// enqueue order.
///
/// The instance cell is locked for the duration of the group; activation
/// happens under the same lock, so it runs exactly once no matter how many
/// dispatches target the instance.
async fn execute_instance_batch<P>(
    cell: Arc<Mutex<InstanceCell<P>>>,
    step_name: StepName,
    dispatches: Vec<Dispatch<P>>,
    observer: Arc<dyn RunObserver>,
) -> Vec<DispatchReport<P>>
where
    P: Send + 'static,
{
    let mut cell = cell.lock().await;
    let mut reports = Vec::with_capacity(dispatches.len());

    for dispatch in dispatches {
        if !cell.activated {
            match cell.step.activate().await {
                Ok(()) => {
                    cell.activated = true;
                    debug!(step = %step_name, "step activated");
                }
                Err(error) => {
                    reports.push(DispatchReport::ActivationFailed {
                        step: step_name,
                        error,
                    });
                    return reports;
                }
            }
        }

        observer.dispatch_started(&step_name, &dispatch.function);
        debug!(step = %step_name, function = %dispatch.function, "dispatch_started");

        let mut ctx = StepContext::new();
        let invoked = cell
            .step
            .invoke(&dispatch.function, dispatch.payload, &mut ctx)
            .await;

        reports.push(match invoked {
            Ok(result) => DispatchReport::Done(DispatchOutcome {
                step: dispatch.step,
                step_name: step_name.clone(),
                function: dispatch.function,
                emitted: ctx.into_emitted(),
                result,
                error: None,
            }),
            Err(error) => DispatchReport::Done(DispatchOutcome {
                step: dispatch.step,
                step_name: step_name.clone(),
                function: dispatch.function,
                emitted: Vec::new(),
                result: None,
                error: Some(error),
            }),
        });
    }

    reports
}
