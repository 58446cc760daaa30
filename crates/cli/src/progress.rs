//! Run-scoped workflow checklist.
//!
//! A [`ProgressReporter`] is created per run and handed to
//! `ProcessEngine::start_observed`, so two runs can never see each other's
//! progress. It maps step names to human-readable stages and reprints the
//! checklist as stages start and complete.

use std::collections::HashSet;
use std::sync::Mutex;

use engine::{FunctionError, FunctionName, ProcessName, RunId, RunObserver, RunResult, StepName};

struct Stage {
    step: &'static str,
    label: &'static str,
}

#[derive(Default)]
struct State {
    completed: HashSet<usize>,
}

/// Prints a checklist of workflow stages as the run progresses.
///
/// Steps without a stage mapping (e.g. the feedback revision step) run
/// silently; the checklist covers the milestones an operator cares about.
pub struct ProgressReporter {
    stages: Vec<Stage>,
    state: Mutex<State>,
}

impl ProgressReporter {
    /// The checklist for the GitHub issue workflow.
    pub fn github_issue() -> Self {
        Self::new(vec![
            (
                "ValidateIssueInput",
                "Input validation - parse repository and issue details",
            ),
            (
                "EnhanceIssue",
                "AI enhancement - improve title, body, and labels",
            ),
            (
                "UserReview",
                "Human review - approve, reject, or request changes",
            ),
            ("CreateGitHubIssue", "GitHub API call - create the issue"),
            ("IssueConfirmation", "Confirmation - show the final result"),
        ])
    }

    fn new(stages: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            stages: stages
                .into_iter()
                .map(|(step, label)| Stage {
                    step,
                    label,
                })
                .collect(),
            state: Mutex::new(State::default()),
        }
    }

    fn stage_index(&self, step: &StepName) -> Option<usize> {
        self.stages.iter().position(|s| s.step == step.as_str())
    }

    fn render(&self, current: Option<usize>) {
        let Ok(state) = self.state.lock() else {
            return;
        };
        println!();
        for (index, stage) in self.stages.iter().enumerate() {
            let marker = if state.completed.contains(&index) {
                "[x]"
            } else if Some(index) == current {
                "[>]"
            } else {
                "[ ]"
            };
            println!("  {marker} {}", stage.label);
        }
        println!();
    }
}

impl RunObserver for ProgressReporter {
    fn run_started(&self, _run_id: RunId, process: &ProcessName) {
        println!();
        println!("Workflow: {process}");
        self.render(None);
    }

    fn dispatch_started(&self, step: &StepName, _function: &FunctionName) {
        if let Some(index) = self.stage_index(step) {
            self.render(Some(index));
        }
    }

    fn dispatch_completed(&self, step: &StepName, _function: &FunctionName) {
        if let Some(index) = self.stage_index(step) {
            if let Ok(mut state) = self.state.lock() {
                state.completed.insert(index);
            }
        }
    }

    fn dispatch_failed(&self, step: &StepName, function: &FunctionName, error: &FunctionError) {
        println!("  !!  {step}::{function} failed: {error}");
    }

    fn run_finished(&self, result: &RunResult) {
        self.render(None);
        println!(
            "Run {:?} after {} dispatch(es).",
            result.status, result.dispatches
        );
    }
}
