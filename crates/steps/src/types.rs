//! Payload record types for the demo workflows, plus helpers for moving them
//! across step boundaries as JSON values.
//!
//! Inter-step payloads are `serde_json::Value`s; the helpers at the bottom
//! convert between values and the typed records so individual steps stay free
//! of serialization noise.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use engine::FunctionError;

// ---------------------------------------------------------------------------
// Issue records
// ---------------------------------------------------------------------------

/// Raw issue request parsed from operator input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInput {
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Issue title.
    pub title: String,
    /// Issue body; may be empty.
    pub body: String,
    /// Labels requested up front; usually empty, the enhancement step
    /// suggests its own.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Why a raw issue line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IssueParseError {
    /// The line did not contain the two mandatory `|`-separated fields.
    #[error("invalid input format; expected 'owner/repo|title|body'")]
    InvalidFormat,

    /// The repository field was not `owner/repo`.
    #[error("invalid repository format; expected 'owner/repo'")]
    InvalidRepository,

    /// The title field was blank.
    #[error("title cannot be empty")]
    EmptyTitle,
}

impl IssueInput {
    /// Parses the operator's raw line, `owner/repo|title|body` (body
    /// optional).
    pub fn parse(raw: &str) -> Result<Self, IssueParseError> {
        let parts: Vec<&str> = raw.splitn(3, '|').collect();
        if parts.len() < 2 {
            return Err(IssueParseError::InvalidFormat);
        }

        let repo_parts: Vec<&str> = parts[0].split('/').collect();
        let [owner, repository] = repo_parts.as_slice() else {
            return Err(IssueParseError::InvalidRepository);
        };
        if owner.trim().is_empty() || repository.trim().is_empty() {
            return Err(IssueParseError::InvalidRepository);
        }

        let title = parts[1].trim();
        if title.is_empty() {
            return Err(IssueParseError::EmptyTitle);
        }

        Ok(Self {
            owner: owner.trim().to_string(),
            repository: repository.trim().to_string(),
            title: title.to_string(),
            body: parts.get(2).map(|b| b.trim()).unwrap_or("").to_string(),
            labels: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------

/// An issue after the enhancement pass: the original text side by side with
/// the assistant's improved version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedIssue {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// The title as the operator wrote it.
    pub original_title: String,
    /// The body as the operator wrote it.
    pub original_body: String,
    /// The improved title.
    pub enhanced_title: String,
    /// The improved body.
    pub enhanced_body: String,
    /// Labels the assistant suggests.
    pub suggested_labels: Vec<String>,
}

/// The shape of the assistant's structured reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssistantReply {
    enhanced_title: Option<String>,
    enhanced_body: Option<String>,
    suggested_labels: Option<Vec<String>>,
}

impl EnhancedIssue {
    /// Seeds an enhancement from the validated input: the enhanced fields
    /// start as copies of the originals until a reply is applied.
    pub fn from_input(input: &IssueInput) -> Self {
        Self {
            owner: input.owner.clone(),
            repository: input.repository.clone(),
            original_title: input.title.clone(),
            original_body: input.body.clone(),
            enhanced_title: input.title.clone(),
            enhanced_body: input.body.clone(),
            suggested_labels: vec!["enhancement".to_string()],
        }
    }

    /// Applies an assistant reply.
    ///
    /// The raw reply becomes the body; if it parses as the structured
    /// `{enhancedTitle, enhancedBody, suggestedLabels}` object, the present
    /// fields overwrite their counterparts (empty labels are discarded).
    pub fn apply_reply(&mut self, reply: &str) {
        self.enhanced_body = reply.to_string();
        let Ok(parsed) = serde_json::from_str::<AssistantReply>(reply) else {
            return;
        };
        if let Some(title) = parsed.enhanced_title {
            self.enhanced_title = title;
        }
        if let Some(body) = parsed.enhanced_body {
            self.enhanced_body = body;
        }
        if let Some(labels) = parsed.suggested_labels {
            self.suggested_labels = labels.into_iter().filter(|l| !l.is_empty()).collect();
        }
    }
}

// ---------------------------------------------------------------------------

/// The request handed to the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Final title.
    pub title: String,
    /// Final body.
    pub body: String,
    /// Final labels.
    pub labels: Vec<String>,
}

impl NewIssue {
    /// Builds the tracker request from an approved enhancement.
    pub fn from_enhanced(issue: &EnhancedIssue) -> Self {
        Self {
            owner: issue.owner.clone(),
            repository: issue.repository.clone(),
            title: issue.enhanced_title.clone(),
            body: issue.enhanced_body.clone(),
            labels: issue.suggested_labels.clone(),
        }
    }
}

// ---------------------------------------------------------------------------

/// The tracker's record of a created issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Tracker-assigned numeric id.
    pub id: u64,
    /// Issue number within the repository.
    pub number: u64,
    /// Browser URL of the issue.
    pub url: String,
    /// Title as stored by the tracker.
    pub title: String,
    /// Body as stored by the tracker.
    pub body: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Labels attached to the issue.
    pub labels: Vec<String>,
    /// Issue state (e.g. `"open"`).
    pub state: String,
    /// Creation timestamp as reported by the tracker (ISO-8601 text).
    pub created_at: String,
    /// Login of the creating user.
    pub author: String,
}

// ---------------------------------------------------------------------------

/// A revision request: the current enhancement plus the operator's feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRequest {
    /// The enhancement under review.
    pub issue: EnhancedIssue,
    /// The operator's free-text feedback.
    pub feedback: String,
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Extracts a plain-text payload.
pub fn text_payload(input: Option<&Value>) -> Result<String, FunctionError> {
    match input {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(FunctionError::malformed(format!(
            "expected a text payload, got {other}"
        ))),
        None => Err(FunctionError::malformed("expected a text payload, got none")),
    }
}

/// Decodes a structured record payload.
pub fn record_payload<T: DeserializeOwned>(input: Option<&Value>) -> Result<T, FunctionError> {
    let value = input
        .ok_or_else(|| FunctionError::malformed("expected a record payload, got none"))?;
    serde_json::from_value(value.clone()).map_err(FunctionError::malformed)
}

/// Encodes a record for emission.
pub fn to_payload<T: Serialize>(record: &T) -> Result<Value, FunctionError> {
    serde_json::to_value(record).map_err(FunctionError::malformed)
}
