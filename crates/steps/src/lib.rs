//! Process steps and workflow definitions for the StepWorks demo.
//!
//! This crate holds everything between the engine and the outside world:
//! the step implementations, the payload record types they exchange, the
//! collaborator traits they depend on, and the wired process graphs.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* collaborators are needed; the `llm`, `github`, and `cli`
//! crates define *how* they are supplied.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ports`] | Collaborator traits, [`ChatHistory`], review decisions, error types |
//! | [`types`] | Payload records (issue input, enhancement, created issue) |
//! | [`docs`] | Documentation workflow steps |
//! | [`validation`] | Operator-validation step |
//! | [`issue`] | GitHub issue workflow steps |
//! | [`processes`] | Wired process graphs and the demo catalog |

pub mod docs;
pub mod issue;
pub mod ports;
pub mod processes;
pub mod types;
pub mod validation;

// Re-export the port surface and catalog at the crate root for ergonomic
// usage by the adapter crates and the CLI.
pub use ports::{
    ChatCompletion, ChatHistory, ChatMessage, CompletionError, DecisionProvider, IssueTracker,
    IssueTrackerError, Operator, OperatorError, ReviewDecision, Role,
};
pub use processes::{
    documentation_hitl_process, documentation_process, github_issue_process, quick_info_process,
    DemoProcess, START_DOCUMENTATION, START_DOCUMENTATION_HITL, START_GITHUB_ISSUE,
    START_QUICK_INFO,
};
pub use types::{EnhancedIssue, IssueInput, IssueParseError, IssueRecord, ModificationRequest, NewIssue};
