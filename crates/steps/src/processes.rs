//! The demo process graphs and the catalog the CLI menu is built from.
//!
//! Each builder wires the steps of one workflow and validates the result;
//! collaborators are injected as trait objects so the same graphs run against
//! real adapters in the CLI and scripted stand-ins in tests.

use std::sync::Arc;

use serde_json::Value;

use engine::{FunctionTarget, GraphValidationError, ProcessBuilder, ProcessGraph};

use crate::docs::{GatherProductInfoStep, GenerateDocumentationStep, PublishDocumentationStep};
use crate::issue::{
    CreateGitHubIssueStep, EnhanceIssueStep, IssueConfirmationStep, ProcessUserFeedbackStep,
    UserReviewStep, ValidateIssueInputStep,
};
use crate::ports::{ChatCompletion, DecisionProvider, IssueTracker, Operator};
use crate::validation::UserValidationStep;

/// Start event of the quick-info process.
pub const START_QUICK_INFO: &str = "StartQuickInfo";
/// Start event of the automatic documentation process.
pub const START_DOCUMENTATION: &str = "StartDocumentationProcess";
/// Start event of the human-in-the-loop documentation process.
pub const START_DOCUMENTATION_HITL: &str = "StartDocumentationWithHitlProcess";
/// Start event of the GitHub issue process.
pub const START_GITHUB_ISSUE: &str = "StartGitHubIssueProcess";

// ---------------------------------------------------------------------------
// Graph builders
// ---------------------------------------------------------------------------

/// Single-step graph: gather product information and stop.
pub fn quick_info_process() -> Result<ProcessGraph<Value>, GraphValidationError> {
    let mut builder = ProcessBuilder::new("QuickInfoProcess");
    let gather = builder.add_step::<GatherProductInfoStep>();

    builder
        .on_input_event(START_QUICK_INFO)
        .send_event_to(FunctionTarget::step(gather));

    builder.build()
}

/// Linear three-step graph: gather, generate with the assistant, publish.
pub fn documentation_process(
    chat: Arc<dyn ChatCompletion>,
    operator: Arc<dyn Operator>,
) -> Result<ProcessGraph<Value>, GraphValidationError> {
    let mut builder = ProcessBuilder::new("DocumentationProcess");
    let gather = builder.add_step::<GatherProductInfoStep>();
    let generate = builder.add_step_with(move || GenerateDocumentationStep::new(chat.clone()));
    let publish = builder.add_step_with(move || PublishDocumentationStep::new(operator.clone()));

    builder
        .on_input_event(START_DOCUMENTATION)
        .send_event_to(FunctionTarget::step(gather));
    builder.on_function_result(gather).send_event_to(
        FunctionTarget::function(generate, GenerateDocumentationStep::GENERATE_DOC)
            .with_parameter("product_info"),
    );
    builder
        .on_event(generate, GenerateDocumentationStep::DOCUMENTATION_GENERATED)
        .send_event_to(FunctionTarget::step(publish));

    builder.build()
}

/// Documentation with operator validation: the generated text goes to the
/// validation step, whose answer fans out to an echo and the publisher, or
/// stops the process on `exit`.
pub fn documentation_hitl_process(
    chat: Arc<dyn ChatCompletion>,
    operator: Arc<dyn Operator>,
) -> Result<ProcessGraph<Value>, GraphValidationError> {
    let mut builder = ProcessBuilder::new("DocumentationWithHitlProcess");
    let gather = builder.add_step::<GatherProductInfoStep>();
    let generate = builder.add_step_with({
        let chat = chat.clone();
        move || GenerateDocumentationStep::new(chat.clone())
    });
    let user_input = builder.add_step_with({
        let operator = operator.clone();
        move || UserValidationStep::new(operator.clone())
    });
    let publish = builder.add_step_with(move || PublishDocumentationStep::new(operator.clone()));

    builder
        .on_input_event(START_DOCUMENTATION_HITL)
        .send_event_to(FunctionTarget::step(gather));
    builder.on_function_result(gather).send_event_to(
        FunctionTarget::function(generate, GenerateDocumentationStep::GENERATE_DOC_AFTER_HITL)
            .with_parameter("product_info"),
    );
    builder
        .on_event(
            generate,
            GenerateDocumentationStep::DOCUMENTATION_GENERATED_REQUEST_FEEDBACK,
        )
        .send_event_to(FunctionTarget::function(
            user_input,
            UserValidationStep::GET_USER_INPUT,
        ));
    builder
        .on_event(user_input, UserValidationStep::USER_INPUT_RECEIVED)
        .send_event_to(
            FunctionTarget::function(user_input, UserValidationStep::SHOW_USER_INPUT)
                .with_parameter("user_input"),
        )
        .send_event_to(FunctionTarget::step(publish));
    builder
        .on_event(user_input, UserValidationStep::EXIT)
        .stop_process();

    builder.build()
}

/// The GitHub issue workflow: validate, enhance, review (with a revision
/// cycle through the feedback step), create, confirm. Every failure event is
/// routed to the confirmation step's error view; rejection stops the process.
pub fn github_issue_process(
    chat: Arc<dyn ChatCompletion>,
    tracker: Arc<dyn IssueTracker>,
    operator: Arc<dyn Operator>,
    decisions: Arc<dyn DecisionProvider>,
) -> Result<ProcessGraph<Value>, GraphValidationError> {
    let mut builder = ProcessBuilder::new("GitHubIssueProcess");
    let validate = builder.add_step::<ValidateIssueInputStep>();
    let enhance = builder.add_step_with({
        let chat = chat.clone();
        move || EnhanceIssueStep::new(chat.clone())
    });
    let review = builder.add_step_with(move || UserReviewStep::new(decisions.clone()));
    let feedback = builder.add_step_with(move || ProcessUserFeedbackStep::new(chat.clone()));
    let create = builder.add_step_with(move || CreateGitHubIssueStep::new(tracker.clone()));
    let confirm = builder.add_step_with(move || IssueConfirmationStep::new(operator.clone()));

    builder
        .on_input_event(START_GITHUB_ISSUE)
        .send_event_to(FunctionTarget::step(validate).with_parameter("raw_input"));

    builder
        .on_event(validate, ValidateIssueInputStep::INPUT_VALIDATED)
        .send_event_to(FunctionTarget::step(enhance).with_parameter("issue_input"));
    builder
        .on_event(validate, ValidateIssueInputStep::VALIDATION_FAILED)
        .send_event_to(FunctionTarget::function(
            confirm,
            IssueConfirmationStep::SHOW_ERROR,
        ));

    builder
        .on_event(enhance, EnhanceIssueStep::ISSUE_ENHANCED)
        .send_event_to(FunctionTarget::step(review).with_parameter("enhanced_issue"));
    builder
        .on_event(enhance, EnhanceIssueStep::ENHANCEMENT_FAILED)
        .send_event_to(FunctionTarget::function(
            confirm,
            IssueConfirmationStep::SHOW_ERROR,
        ));

    builder
        .on_event(review, UserReviewStep::APPROVAL_RECEIVED)
        .send_event_to(FunctionTarget::step(create).with_parameter("enhanced_issue"));
    builder
        .on_event(review, UserReviewStep::REJECTION_RECEIVED)
        .stop_process();
    builder
        .on_event(review, UserReviewStep::MODIFICATION_REQUESTED)
        .send_event_to(FunctionTarget::step(feedback).with_parameter("modification_request"));

    // The revision cycle: modified issues go back into review.
    builder
        .on_event(feedback, ProcessUserFeedbackStep::ISSUE_MODIFIED)
        .send_event_to(FunctionTarget::step(review).with_parameter("enhanced_issue"));
    builder
        .on_event(feedback, ProcessUserFeedbackStep::ENHANCEMENT_FAILED)
        .send_event_to(FunctionTarget::function(
            confirm,
            IssueConfirmationStep::SHOW_ERROR,
        ));

    builder
        .on_event(create, CreateGitHubIssueStep::ISSUE_CREATED)
        .send_event_to(
            FunctionTarget::function(confirm, IssueConfirmationStep::SHOW_CONFIRMATION)
                .with_parameter("created_issue"),
        );
    builder
        .on_event(create, CreateGitHubIssueStep::CREATION_FAILED)
        .send_event_to(FunctionTarget::function(
            confirm,
            IssueConfirmationStep::SHOW_ERROR,
        ));

    builder.build()
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The processes the demo offers, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoProcess {
    /// Gather basic product information, nothing else.
    QuickInfo,
    /// Generate documentation without human intervention.
    Documentation,
    /// Generate documentation with operator review.
    DocumentationWithHitl,
    /// Create an enhanced GitHub issue with operator review.
    GithubIssue,
}

impl DemoProcess {
    /// Menu order.
    pub const ALL: [DemoProcess; 4] = [
        DemoProcess::QuickInfo,
        DemoProcess::Documentation,
        DemoProcess::DocumentationWithHitl,
        DemoProcess::GithubIssue,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            DemoProcess::QuickInfo => "Quick Info Process",
            DemoProcess::Documentation => "Documentation Process",
            DemoProcess::DocumentationWithHitl => "Documentation Process with Human in the Loop",
            DemoProcess::GithubIssue => "GitHub Issue Process",
        }
    }

    /// One-line description for the menu.
    pub fn description(self) -> &'static str {
        match self {
            DemoProcess::QuickInfo => "Quickly gather basic product information",
            DemoProcess::Documentation => {
                "Generate comprehensive documentation for a product without human intervention"
            }
            DemoProcess::DocumentationWithHitl => {
                "Includes human review and feedback in the documentation generation"
            }
            DemoProcess::GithubIssue => {
                "Validate, enhance, review, and create a GitHub issue from one input line"
            }
        }
    }

    /// Input used when the operator just presses enter.
    pub fn default_input(self) -> &'static str {
        match self {
            DemoProcess::QuickInfo => "Quick Product",
            DemoProcess::Documentation => "Sample Product",
            DemoProcess::DocumentationWithHitl => "Enterprise Product",
            DemoProcess::GithubIssue => {
                "octocat/hello-world|Fix the login button|Clicking it does nothing"
            }
        }
    }

    /// The external event that seeds the run.
    pub fn start_event(self) -> &'static str {
        match self {
            DemoProcess::QuickInfo => START_QUICK_INFO,
            DemoProcess::Documentation => START_DOCUMENTATION,
            DemoProcess::DocumentationWithHitl => START_DOCUMENTATION_HITL,
            DemoProcess::GithubIssue => START_GITHUB_ISSUE,
        }
    }

    /// `true` if the process calls the completion collaborator.
    pub fn needs_chat(self) -> bool {
        !matches!(self, DemoProcess::QuickInfo)
    }

    /// `true` if the process calls the issue tracker.
    pub fn needs_tracker(self) -> bool {
        matches!(self, DemoProcess::GithubIssue)
    }
}
