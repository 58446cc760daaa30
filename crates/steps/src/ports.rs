//! Collaborator ports.
//!
//! The steps in this crate never talk to the network or the terminal
//! directly; they depend on the traits defined here. The `llm` and `github`
//! crates provide the HTTP implementations, the `cli` crate the console ones,
//! and tests inject scripted stand-ins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IssueRecord, NewIssue};

// ---------------------------------------------------------------------------
// Chat completion
// ---------------------------------------------------------------------------

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Behavioral instructions, added once when a step activates.
    System,
    /// Content supplied by the running process.
    User,
    /// A completion returned by the model.
    Assistant,
}

/// One entry of a [`ChatHistory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

/// An ordered conversation, owned privately by a stateful step and grown
/// across invocations within one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// A history seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.push(Role::System, prompt);
        history
    }

    /// Appends a message.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content);
    }

    /// The messages in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// `true` if the history holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Failure modes of a [`ChatCompletion`] call.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The completion API answered with a non-success status.
    #[error("completion API returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("completion transport failed: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The response arrived but did not contain a completion.
    #[error("completion response was malformed: {message}")]
    MalformedResponse {
        /// Description of what was missing or wrong.
        message: String,
    },
}

/// A language-model completion service.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Produces the assistant's next message for the given history.
    async fn complete(&self, history: &ChatHistory) -> Result<String, CompletionError>;
}

// ---------------------------------------------------------------------------
// Issue tracker
// ---------------------------------------------------------------------------

/// Failure modes of an [`IssueTracker`] call.
#[derive(Debug, Error)]
pub enum IssueTrackerError {
    /// The tracker API answered with a non-success status.
    #[error("issue API returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("issue transport failed: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The response arrived but could not be interpreted.
    #[error("issue response was malformed: {message}")]
    MalformedResponse {
        /// Description of what was missing or wrong.
        message: String,
    },
}

/// An external issue tracker capable of creating issues.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Creates the issue and returns the tracker's record of it.
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRecord, IssueTrackerError>;
}

// ---------------------------------------------------------------------------
// Operator I/O
// ---------------------------------------------------------------------------

/// Failure modes of operator interaction.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// The input stream is closed; no further answers will arrive.
    #[error("operator input stream closed")]
    Eof,

    /// Reading or writing failed.
    #[error("operator I/O failed: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },
}

/// Line-oriented interaction with the human operator.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Writes one line of output.
    fn write_line(&self, line: &str);

    /// Shows `prompt` and waits for one line of input.
    async fn read_line(&self, prompt: &str) -> Result<String, OperatorError>;
}

// ---------------------------------------------------------------------------
// Review decisions
// ---------------------------------------------------------------------------

/// The operator's verdict on a piece of reviewed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Proceed with the content as shown.
    Approved,
    /// Abandon the workflow.
    Rejected,
    /// Revise the content according to the carried feedback, then review
    /// again.
    Modify(String),
}

impl ReviewDecision {
    /// Interprets a raw operator answer.
    ///
    /// Empty input asks for another round with a canned feedback note; an
    /// answer starting with `n`, or any of `exit`/`quit`/`q`, rejects;
    /// `y`/`yes`/`approve` approves; anything else is treated as free-text
    /// modification feedback.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::Modify("No input provided".to_string());
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with('n') {
            return Self::Rejected;
        }
        if matches!(lower.as_str(), "exit" | "quit" | "q") {
            return Self::Rejected;
        }
        if matches!(lower.as_str(), "y" | "yes" | "approve") {
            return Self::Approved;
        }
        Self::Modify(trimmed.to_string())
    }
}

/// Presents content to the operator and returns their decision.
///
/// Keeps the review step free of terminal coupling; the console
/// implementation lives in the `cli` crate and tests inject scripted
/// decisions.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Shows `content` and waits for a decision.
    async fn present(&self, content: &str) -> Result<ReviewDecision, OperatorError>;
}
