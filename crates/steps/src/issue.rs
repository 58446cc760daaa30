//! Steps of the GitHub issue workflow: validate the raw request, enhance it
//! with the assistant, have the operator review it (with a revision cycle),
//! create the issue, and confirm the outcome.
//!
//! Collaborator failures never cross a step boundary as faults: each step
//! catches them and emits an explicit failure event (`ValidationFailed`,
//! `EnhancementFailed`, `CreationFailed`), which the graph routes like any
//! other data.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use engine::{
    ActivationError, FunctionError, FunctionName, FunctionSpec, ProcessStep, StepContext,
    StepDefinition, StepMetadata,
};

use crate::ports::{
    ChatCompletion, ChatHistory, DecisionProvider, IssueTracker, Operator, ReviewDecision,
};
use crate::types::{
    record_payload, text_payload, to_payload, EnhancedIssue, IssueInput, IssueRecord,
    ModificationRequest, NewIssue,
};

// ---------------------------------------------------------------------------
// ValidateIssueInput
// ---------------------------------------------------------------------------

/// Parses the operator's raw `owner/repo|title|body` line into an
/// [`IssueInput`].
#[derive(Default)]
pub struct ValidateIssueInputStep;

impl ValidateIssueInputStep {
    /// Function: validates the raw input line.
    pub const VALIDATE_INPUT: &'static str = "ValidateInput";

    /// Event: the input parsed; carries the [`IssueInput`] record.
    pub const INPUT_VALIDATED: &'static str = "InputValidated";
    /// Event: the input was rejected; carries the reason.
    pub const VALIDATION_FAILED: &'static str = "ValidationFailed";
}

impl StepMetadata for ValidateIssueInputStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("ValidateIssueInput").with_function(
            FunctionSpec::new(Self::VALIDATE_INPUT)
                .with_parameter("raw_input")
                .emits(Self::INPUT_VALIDATED)
                .emits(Self::VALIDATION_FAILED),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for ValidateIssueInputStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        if function.as_str() != Self::VALIDATE_INPUT {
            return Err(FunctionError::unknown(function.clone()));
        }
        let raw = text_payload(input.as_ref())?;
        match IssueInput::parse(&raw) {
            Ok(issue) => {
                info!(
                    repository = %format!("{}/{}", issue.owner, issue.repository),
                    title = %issue.title,
                    "issue input validated"
                );
                ctx.emit_event(Self::INPUT_VALIDATED, to_payload(&issue)?);
            }
            Err(reason) => {
                warn!(error = %reason, "issue input rejected");
                ctx.emit_event(Self::VALIDATION_FAILED, Value::String(reason.to_string()));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// EnhanceIssue
// ---------------------------------------------------------------------------

const ISSUE_ASSISTANT_PROMPT: &str = r#"You are an expert GitHub issue assistant. Your job is to improve issue titles and descriptions to make them clear, actionable, and well-formatted.

For the title:
- Make it concise but descriptive
- Use imperative mood when appropriate
- Ensure it clearly describes the problem or request

For the body:
- Structure it with clear sections
- Add markdown formatting
- Include relevant details like steps to reproduce, expected behavior, etc.
- Suggest appropriate labels based on content

Respond with a JSON object containing:
{
  "enhancedTitle": "improved title",
  "enhancedBody": "improved body with markdown",
  "suggestedLabels": ["label1", "label2"]
}"#;

/// Stateful step: asks the assistant to improve the issue, keeping the chat
/// history in private state for the lifetime of the run.
pub struct EnhanceIssueStep {
    chat: Arc<dyn ChatCompletion>,
    history: Option<ChatHistory>,
}

impl EnhanceIssueStep {
    /// Function: enhances a validated issue.
    pub const ENHANCE_ISSUE: &'static str = "EnhanceIssue";

    /// Event: enhancement done; carries the [`EnhancedIssue`] record.
    pub const ISSUE_ENHANCED: &'static str = "IssueEnhanced";
    /// Event: the completion call failed; carries the reason.
    pub const ENHANCEMENT_FAILED: &'static str = "EnhancementFailed";

    /// Creates the step with its completion collaborator.
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self {
            chat,
            history: None,
        }
    }
}

impl StepMetadata for EnhanceIssueStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("EnhanceIssue").with_function(
            FunctionSpec::new(Self::ENHANCE_ISSUE)
                .with_parameter("issue_input")
                .emits(Self::ISSUE_ENHANCED)
                .emits(Self::ENHANCEMENT_FAILED),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for EnhanceIssueStep {
    async fn activate(&mut self) -> Result<(), ActivationError> {
        self.history = Some(ChatHistory::with_system(ISSUE_ASSISTANT_PROMPT));
        Ok(())
    }

    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        if function.as_str() != Self::ENHANCE_ISSUE {
            return Err(FunctionError::unknown(function.clone()));
        }
        let issue_input: IssueInput = record_payload(input.as_ref())?;
        let history = self.history.as_mut().ok_or(FunctionError::NotActivated)?;

        history.push_user(format!(
            "Please enhance this GitHub issue:\n\n\
             Title: {}\n\
             Body: {}\n\
             Repository: {}/{}\n\n\
             Provide suggestions to make it clearer and more actionable.",
            issue_input.title, issue_input.body, issue_input.owner, issue_input.repository
        ));

        match self.chat.complete(history).await {
            Ok(reply) => {
                history.push_assistant(reply.clone());
                let mut enhanced = EnhancedIssue::from_input(&issue_input);
                enhanced.apply_reply(&reply);
                info!(title = %enhanced.enhanced_title, "issue enhanced");
                ctx.emit_event(Self::ISSUE_ENHANCED, to_payload(&enhanced)?);
            }
            Err(err) => {
                warn!(error = %err, "issue enhancement failed");
                ctx.emit_event(Self::ENHANCEMENT_FAILED, Value::String(err.to_string()));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// UserReview
// ---------------------------------------------------------------------------

/// Presents the enhancement to the operator and routes their decision.
///
/// This is the human-in-the-loop suspension point: the dispatch simply waits
/// for the decision provider, which may take as long as the operator needs.
pub struct UserReviewStep {
    decisions: Arc<dyn DecisionProvider>,
}

impl UserReviewStep {
    /// Function: reviews an enhanced issue.
    pub const REVIEW_ENHANCEMENT: &'static str = "ReviewEnhancement";

    /// Event: the operator approved; carries the [`EnhancedIssue`] record.
    pub const APPROVAL_RECEIVED: &'static str = "ApprovalReceived";
    /// Event: the operator cancelled; carries the reason.
    pub const REJECTION_RECEIVED: &'static str = "RejectionReceived";
    /// Event: the operator asked for changes; carries a
    /// [`ModificationRequest`].
    pub const MODIFICATION_REQUESTED: &'static str = "ModificationRequested";

    /// Creates the step with its decision collaborator.
    pub fn new(decisions: Arc<dyn DecisionProvider>) -> Self {
        Self { decisions }
    }

    fn render_review(issue: &EnhancedIssue) -> String {
        let rule = "=".repeat(60);
        format!(
            "{rule}\n\
             ISSUE ENHANCEMENT REVIEW\n\
             {rule}\n\
             Repository: {}/{}\n\n\
             Original title:\n  {}\n\n\
             Enhanced title:\n  {}\n\n\
             Original body:\n  {}\n\n\
             Enhanced body:\n  {}\n\n\
             Suggested labels: {}\n\
             {rule}",
            issue.owner,
            issue.repository,
            issue.original_title,
            issue.enhanced_title,
            if issue.original_body.is_empty() {
                "(empty)"
            } else {
                &issue.original_body
            },
            issue.enhanced_body,
            issue.suggested_labels.join(", "),
        )
    }
}

impl StepMetadata for UserReviewStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("UserReview").with_function(
            FunctionSpec::new(Self::REVIEW_ENHANCEMENT)
                .with_parameter("enhanced_issue")
                .emits(Self::APPROVAL_RECEIVED)
                .emits(Self::REJECTION_RECEIVED)
                .emits(Self::MODIFICATION_REQUESTED),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for UserReviewStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        if function.as_str() != Self::REVIEW_ENHANCEMENT {
            return Err(FunctionError::unknown(function.clone()));
        }
        let issue: EnhancedIssue = record_payload(input.as_ref())?;
        let decision = self
            .decisions
            .present(&Self::render_review(&issue))
            .await
            .unwrap_or(ReviewDecision::Rejected);

        match decision {
            ReviewDecision::Approved => {
                info!("enhancement approved");
                ctx.emit_event(Self::APPROVAL_RECEIVED, to_payload(&issue)?);
            }
            ReviewDecision::Rejected => {
                info!("enhancement rejected");
                ctx.emit_event(
                    Self::REJECTION_RECEIVED,
                    Value::String("User cancelled".to_string()),
                );
            }
            ReviewDecision::Modify(feedback) => {
                info!(feedback = %feedback, "modification requested");
                let request = ModificationRequest {
                    issue,
                    feedback,
                };
                ctx.emit_event(Self::MODIFICATION_REQUESTED, to_payload(&request)?);
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// ProcessUserFeedback
// ---------------------------------------------------------------------------

const ISSUE_EDITOR_PROMPT: &str = r#"You are an expert GitHub issue editor. Your job is to modify GitHub issues based on user feedback while preserving the original intent and structure.

When given an issue and user feedback, you should:
1. Carefully analyze what the user wants to change
2. Apply the requested changes while maintaining quality
3. Keep the markdown formatting and structure
4. Preserve important technical details unless explicitly asked to change them

Respond with a JSON object containing the updated issue:
{
  "enhancedTitle": "updated title",
  "enhancedBody": "updated body with markdown",
  "suggestedLabels": ["label1", "label2"]
}

Be precise and only change what the user requested."#;

/// Stateful step: applies operator feedback to the enhancement, forming the
/// revision cycle back into review.
pub struct ProcessUserFeedbackStep {
    chat: Arc<dyn ChatCompletion>,
    history: Option<ChatHistory>,
}

impl ProcessUserFeedbackStep {
    /// Function: applies feedback to the current enhancement.
    pub const PROCESS_FEEDBACK: &'static str = "ProcessFeedback";

    /// Event: the revised issue; carries the [`EnhancedIssue`] record.
    pub const ISSUE_MODIFIED: &'static str = "IssueModified";
    /// Event: the completion call failed; carries the reason.
    pub const ENHANCEMENT_FAILED: &'static str = "EnhancementFailed";

    /// Creates the step with its completion collaborator.
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self {
            chat,
            history: None,
        }
    }
}

impl StepMetadata for ProcessUserFeedbackStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("ProcessUserFeedback").with_function(
            FunctionSpec::new(Self::PROCESS_FEEDBACK)
                .with_parameter("modification_request")
                .emits(Self::ISSUE_MODIFIED)
                .emits(Self::ENHANCEMENT_FAILED),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for ProcessUserFeedbackStep {
    async fn activate(&mut self) -> Result<(), ActivationError> {
        self.history = Some(ChatHistory::with_system(ISSUE_EDITOR_PROMPT));
        Ok(())
    }

    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        if function.as_str() != Self::PROCESS_FEEDBACK {
            return Err(FunctionError::unknown(function.clone()));
        }
        let request: ModificationRequest = record_payload(input.as_ref())?;
        let history = self.history.as_mut().ok_or(FunctionError::NotActivated)?;

        history.push_user(format!(
            "Current GitHub Issue:\n\
             Title: {}\n\
             Body: {}\n\
             Labels: {}\n\n\
             User Feedback: {}\n\n\
             Please modify the issue based on this feedback while keeping the quality high.",
            request.issue.enhanced_title,
            request.issue.enhanced_body,
            request.issue.suggested_labels.join(", "),
            request.feedback
        ));

        match self.chat.complete(history).await {
            Ok(reply) => {
                history.push_assistant(reply.clone());
                let mut revised = request.issue;
                revised.apply_reply(&reply);
                info!(title = %revised.enhanced_title, "issue revised from feedback");
                ctx.emit_event(Self::ISSUE_MODIFIED, to_payload(&revised)?);
            }
            Err(err) => {
                warn!(error = %err, "feedback processing failed");
                ctx.emit_event(Self::ENHANCEMENT_FAILED, Value::String(err.to_string()));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// CreateGitHubIssue
// ---------------------------------------------------------------------------

/// Calls the issue tracker with the approved enhancement.
pub struct CreateGitHubIssueStep {
    tracker: Arc<dyn IssueTracker>,
}

impl CreateGitHubIssueStep {
    /// Function: creates the issue.
    pub const CREATE_ISSUE: &'static str = "CreateIssue";

    /// Event: the issue exists; carries the [`IssueRecord`].
    pub const ISSUE_CREATED: &'static str = "IssueCreated";
    /// Event: the tracker call failed; carries the reason.
    pub const CREATION_FAILED: &'static str = "CreationFailed";

    /// Creates the step with its tracker collaborator.
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }
}

impl StepMetadata for CreateGitHubIssueStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("CreateGitHubIssue").with_function(
            FunctionSpec::new(Self::CREATE_ISSUE)
                .with_parameter("enhanced_issue")
                .emits(Self::ISSUE_CREATED)
                .emits(Self::CREATION_FAILED),
        )
    }
}

#[async_trait]
impl ProcessStep<Value> for CreateGitHubIssueStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        if function.as_str() != Self::CREATE_ISSUE {
            return Err(FunctionError::unknown(function.clone()));
        }
        let issue: EnhancedIssue = record_payload(input.as_ref())?;
        let request = NewIssue::from_enhanced(&issue);

        match self.tracker.create_issue(&request).await {
            Ok(record) => {
                info!(number = record.number, url = %record.url, "issue created");
                ctx.emit_event(Self::ISSUE_CREATED, to_payload(&record)?);
            }
            Err(err) => {
                warn!(error = %err, "issue creation failed");
                ctx.emit_event(Self::CREATION_FAILED, Value::String(err.to_string()));
            }
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// IssueConfirmation
// ---------------------------------------------------------------------------

/// Terminal step: renders either the created issue or the failure notice.
pub struct IssueConfirmationStep {
    operator: Arc<dyn Operator>,
}

impl IssueConfirmationStep {
    /// Function: shows the created issue.
    pub const SHOW_CONFIRMATION: &'static str = "ShowConfirmation";
    /// Function: shows a failure notice.
    pub const SHOW_ERROR: &'static str = "ShowError";

    /// Creates the step with its output collaborator.
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self { operator }
    }

    fn render_confirmation(record: &IssueRecord) -> String {
        let rule = "=".repeat(60);
        let labels = if record.labels.is_empty() {
            "none".to_string()
        } else {
            record.labels.join(", ")
        };
        format!(
            "{rule}\n\
             ISSUE CREATED\n\
             {rule}\n\
             Repository: {}/{}\n\
             Issue:      #{} (id {})\n\
             State:      {}\n\
             Title:      {}\n\
             Author:     {}\n\
             Created:    {}\n\
             Labels:     {labels}\n\
             URL:        {}\n\
             {rule}",
            record.owner,
            record.repository,
            record.number,
            record.id,
            record.state,
            record.title,
            record.author,
            record.created_at,
            record.url,
        )
    }
}

impl StepMetadata for IssueConfirmationStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("IssueConfirmation")
            .with_function(
                FunctionSpec::new(Self::SHOW_CONFIRMATION).with_parameter("created_issue"),
            )
            .with_function(FunctionSpec::new(Self::SHOW_ERROR).with_parameter("error"))
    }
}

#[async_trait]
impl ProcessStep<Value> for IssueConfirmationStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        match function.as_str() {
            Self::SHOW_CONFIRMATION => {
                let record: IssueRecord = record_payload(input.as_ref())?;
                self.operator.write_line(&Self::render_confirmation(&record));
                Ok(None)
            }
            Self::SHOW_ERROR => {
                let reason = text_payload(input.as_ref())?;
                self.operator.write_line(&format!(
                    "Issue creation failed: {reason}\n\
                     Check that the repository exists, the token has 'repo' \
                     permissions, and the input format is 'owner/repo|title|body'."
                ));
                Ok(None)
            }
            _ => Err(FunctionError::unknown(function.clone())),
        }
    }
}
