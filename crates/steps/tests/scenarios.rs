//! End-to-end workflow scenarios run against scripted collaborators: the
//! documentation flows, the validation failure path, rejection, and the
//! feedback revision cycle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use engine::{ProcessEngine, ProcessEvent, RunStatus};
use steps::{
    documentation_hitl_process, documentation_process, github_issue_process, ChatCompletion,
    ChatHistory, CompletionError, DecisionProvider, IssueRecord, IssueTracker, IssueTrackerError,
    NewIssue, Operator, OperatorError, ReviewDecision, Role, START_DOCUMENTATION,
    START_DOCUMENTATION_HITL, START_GITHUB_ISSUE,
};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Returns canned replies in order and records every user message it saw.
#[derive(Default)]
struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    user_messages: Mutex<Vec<String>>,
}

impl ScriptedChat {
    fn with_replies(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            user_messages: Mutex::new(Vec::new()),
        })
    }

    fn user_messages(&self) -> Vec<String> {
        self.user_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, history: &ChatHistory) -> Result<String, CompletionError> {
        let last_user = history
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.user_messages.lock().unwrap().push(last_user);

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CompletionError::Transport {
                message: "no scripted reply left".to_string(),
            })
    }
}

/// Pops scripted decisions; records what was presented.
#[derive(Default)]
struct ScriptedDecisions {
    decisions: Mutex<VecDeque<ReviewDecision>>,
    presented: Mutex<Vec<String>>,
}

impl ScriptedDecisions {
    fn with_decisions(decisions: Vec<ReviewDecision>) -> Arc<Self> {
        Arc::new(Self {
            decisions: Mutex::new(decisions.into()),
            presented: Mutex::new(Vec::new()),
        })
    }

    fn presented_count(&self) -> usize {
        self.presented.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedDecisions {
    async fn present(&self, content: &str) -> Result<ReviewDecision, OperatorError> {
        self.presented.lock().unwrap().push(content.to_string());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OperatorError::Eof)
    }
}

/// Records created issues and answers with a deterministic record.
#[derive(Default)]
struct RecordingTracker {
    created: Mutex<Vec<NewIssue>>,
}

impl RecordingTracker {
    fn created(&self) -> Vec<NewIssue> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRecord, IssueTrackerError> {
        self.created.lock().unwrap().push(issue.clone());
        Ok(IssueRecord {
            id: 101,
            number: 7,
            url: format!(
                "https://github.com/{}/{}/issues/7",
                issue.owner, issue.repository
            ),
            title: issue.title.clone(),
            body: issue.body.clone(),
            owner: issue.owner.clone(),
            repository: issue.repository.clone(),
            labels: issue.labels.clone(),
            state: "open".to_string(),
            created_at: "2025-06-01T12:00:00Z".to_string(),
            author: "octocat".to_string(),
        })
    }
}

/// Serves scripted input lines and records everything written.
#[derive(Default)]
struct ScriptedOperator {
    inputs: Mutex<VecDeque<String>>,
    written: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    fn with_inputs(inputs: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            inputs: Mutex::new(inputs.iter().map(|i| i.to_string()).collect()),
            written: Mutex::new(Vec::new()),
        })
    }

    fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    fn wrote_containing(&self, needle: &str) -> bool {
        self.written().iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    fn write_line(&self, line: &str) {
        self.written.lock().unwrap().push(line.to_string());
    }

    async fn read_line(&self, _prompt: &str) -> Result<String, OperatorError> {
        self.inputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OperatorError::Eof)
    }
}

// ---------------------------------------------------------------------------
// Documentation scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn documentation_flows_from_gather_to_publish() {
    let chat = ScriptedChat::with_replies(&["# Widget\nGenerated widget documentation."]);
    let operator = ScriptedOperator::with_inputs(&[]);
    let graph = documentation_process(chat.clone(), operator.clone()).unwrap();
    let engine = ProcessEngine::new(graph);

    let result = engine
        .start(ProcessEvent::new(START_DOCUMENTATION, json!("Widget")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    // The generator saw the gathered product description.
    assert!(chat.user_messages()[0].contains("Product 'Widget' is a revolutionary gadget"));
    // The publisher received the assistant's text.
    assert!(operator.wrote_containing("Generated widget documentation."));
}

#[tokio::test]
async fn hitl_documentation_fans_out_operator_input() {
    let chat = ScriptedChat::with_replies(&["Draft documentation."]);
    let operator = ScriptedOperator::with_inputs(&["ship it"]);
    let graph = documentation_hitl_process(chat, operator.clone()).unwrap();
    let engine = ProcessEngine::new(graph);

    let result = engine
        .start(ProcessEvent::new(
            START_DOCUMENTATION_HITL,
            json!("Enterprise Product"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    // The validated input fans out to the echo function and the publisher.
    assert!(operator.wrote_containing("You entered: ship it"));
    assert!(operator.wrote_containing("Publishing document:\nship it"));
}

#[tokio::test]
async fn hitl_documentation_halts_on_exit() {
    let chat = ScriptedChat::with_replies(&["Draft documentation."]);
    let operator = ScriptedOperator::with_inputs(&["exit"]);
    let graph = documentation_hitl_process(chat, operator.clone()).unwrap();
    let engine = ProcessEngine::new(graph);

    let result = engine
        .start(ProcessEvent::new(
            START_DOCUMENTATION_HITL,
            json!("Enterprise Product"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Halted);
    assert!(!operator.wrote_containing("Publishing document"));
}

// ---------------------------------------------------------------------------
// GitHub issue scenarios
// ---------------------------------------------------------------------------

fn issue_graph(
    chat: Arc<ScriptedChat>,
    tracker: Arc<RecordingTracker>,
    operator: Arc<ScriptedOperator>,
    decisions: Arc<ScriptedDecisions>,
) -> ProcessEngine<Value> {
    let graph = github_issue_process(chat, tracker, operator, decisions).unwrap();
    ProcessEngine::new(graph)
}

#[tokio::test]
async fn malformed_input_routes_to_the_error_view() {
    let chat = ScriptedChat::with_replies(&[]);
    let tracker = Arc::new(RecordingTracker::default());
    let operator = ScriptedOperator::with_inputs(&[]);
    let decisions = ScriptedDecisions::with_decisions(vec![]);
    let engine = issue_graph(chat, tracker.clone(), operator.clone(), decisions.clone());

    let result = engine
        .start(ProcessEvent::new(START_GITHUB_ISSUE, json!("badinput")))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(operator.wrote_containing("Issue creation failed: invalid input format"));
    // Nothing beyond validation ran.
    assert!(tracker.created().is_empty());
    assert_eq!(decisions.presented_count(), 0);
}

#[tokio::test]
async fn rejection_halts_before_issue_creation() {
    let chat = ScriptedChat::with_replies(&[
        r###"{"enhancedTitle":"Fix the login button","enhancedBody":"## Bug","suggestedLabels":["bug"]}"###,
    ]);
    let tracker = Arc::new(RecordingTracker::default());
    let operator = ScriptedOperator::with_inputs(&[]);
    let decisions = ScriptedDecisions::with_decisions(vec![ReviewDecision::Rejected]);
    let engine = issue_graph(chat, tracker.clone(), operator, decisions.clone());

    let result = engine
        .start(ProcessEvent::new(
            START_GITHUB_ISSUE,
            json!("octo/widgets|Login broken|The button does nothing"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Halted);
    assert_eq!(decisions.presented_count(), 1);
    assert!(tracker.created().is_empty());
}

#[tokio::test]
async fn feedback_cycles_once_then_creates_the_issue() {
    let chat = ScriptedChat::with_replies(&[
        r###"{"enhancedTitle":"A rather long enhanced title","enhancedBody":"## Bug","suggestedLabels":["bug"]}"###,
        r###"{"enhancedTitle":"Short title","enhancedBody":"## Bug","suggestedLabels":["bug"]}"###,
    ]);
    let tracker = Arc::new(RecordingTracker::default());
    let operator = ScriptedOperator::with_inputs(&[]);
    let decisions = ScriptedDecisions::with_decisions(vec![
        ReviewDecision::Modify("shorten the title".to_string()),
        ReviewDecision::Approved,
    ]);
    let engine = issue_graph(chat.clone(), tracker.clone(), operator.clone(), decisions.clone());

    let result = engine
        .start(ProcessEvent::new(
            START_GITHUB_ISSUE,
            json!("octo/widgets|Login broken|The button does nothing"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    // One enhancement call, one feedback call.
    assert_eq!(chat.user_messages().len(), 2);
    assert!(chat.user_messages()[1].contains("shorten the title"));
    // The review ran twice: before and after the revision.
    assert_eq!(decisions.presented_count(), 2);
    // The created issue carries the revised title.
    let created = tracker.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Short title");
    assert!(operator.wrote_containing("ISSUE CREATED"));
    assert!(operator.wrote_containing("https://github.com/octo/widgets/issues/7"));
}

#[tokio::test]
async fn approval_creates_the_issue_from_the_enhancement() {
    let chat = ScriptedChat::with_replies(&[
        r###"{"enhancedTitle":"Fix the login button","enhancedBody":"## Bug\nSteps","suggestedLabels":["bug","ui"]}"###,
    ]);
    let tracker = Arc::new(RecordingTracker::default());
    let operator = ScriptedOperator::with_inputs(&[]);
    let decisions = ScriptedDecisions::with_decisions(vec![ReviewDecision::Approved]);
    let engine = issue_graph(chat, tracker.clone(), operator.clone(), decisions);

    let result = engine
        .start(ProcessEvent::new(
            START_GITHUB_ISSUE,
            json!("octo/widgets|Login broken|The button does nothing"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    let created = tracker.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].owner, "octo");
    assert_eq!(created[0].repository, "widgets");
    assert_eq!(created[0].title, "Fix the login button");
    assert_eq!(created[0].labels, vec!["bug".to_string(), "ui".to_string()]);
}

#[tokio::test]
async fn completion_failure_routes_to_the_error_view() {
    // No scripted replies: the completion collaborator fails, the step emits
    // its failure event, and the error view renders it.
    let chat = ScriptedChat::with_replies(&[]);
    let tracker = Arc::new(RecordingTracker::default());
    let operator = ScriptedOperator::with_inputs(&[]);
    let decisions = ScriptedDecisions::with_decisions(vec![]);
    let engine = issue_graph(chat, tracker.clone(), operator.clone(), decisions);

    let result = engine
        .start(ProcessEvent::new(
            START_GITHUB_ISSUE,
            json!("octo/widgets|Login broken|The button does nothing"),
        ))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert!(operator.wrote_containing("Issue creation failed"));
    assert!(tracker.created().is_empty());
}
