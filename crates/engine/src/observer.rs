//! Run-scoped progress observation.
//!
//! An observer is handed to
//! [`ProcessEngine::start_observed`](crate::ProcessEngine::start_observed) and
//! lives for exactly one run, so progress state can never leak between runs.
//! All callbacks have no-op defaults; implementors override only what they
//! care about.

use crate::engine::RunResult;
use crate::errors::FunctionError;
use crate::{EventId, FunctionName, ProcessName, RunId, StepName};

/// Callbacks for the lifecycle of one process run.
///
/// Callbacks may be invoked from concurrent dispatch tasks; implementations
/// guard their own interior state.
pub trait RunObserver: Send + Sync {
    /// The run has been seeded and is about to dispatch.
    fn run_started(&self, run_id: RunId, process: &ProcessName) {
        let _ = (run_id, process);
    }

    /// A function invocation is starting (its step is activated by now).
    fn dispatch_started(&self, step: &StepName, function: &FunctionName) {
        let _ = (step, function);
    }

    /// A function invocation returned without fault.
    fn dispatch_completed(&self, step: &StepName, function: &FunctionName) {
        let _ = (step, function);
    }

    /// A function invocation raised an unhandled fault; none of its events
    /// will be routed.
    fn dispatch_failed(&self, step: &StepName, function: &FunctionName, error: &FunctionError) {
        let _ = (step, function, error);
    }

    /// A step explicitly emitted an event.
    fn event_emitted(&self, step: &StepName, event: &EventId) {
        let _ = (step, event);
    }

    /// The run reached its terminal condition.
    fn run_finished(&self, result: &RunResult) {
        let _ = result;
    }
}

/// The observer used by [`ProcessEngine::start`](crate::ProcessEngine::start):
/// ignores everything.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
