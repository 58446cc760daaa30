//! StepWorks GitHub infrastructure adapter.
//!
//! Implements [`steps::IssueTracker`] directly over the GitHub REST API.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All GitHub API details (URLs, headers, response field
//! shapes) are handled here; the `steps` crate never sees them.

use async_trait::async_trait;
use reqwest::header;
use serde_json::{json, Value};
use tracing::debug;

use steps::{IssueRecord, IssueTracker, IssueTrackerError, NewIssue};

/// Default REST API base; override with
/// [`with_base_url`](GithubIssues::with_base_url) for GitHub Enterprise.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "step-works-demo";

/// Issue tracker backed by the GitHub REST API.
pub struct GithubIssues {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GithubIssues {
    /// Creates a client authenticating with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
        }
    }

    /// Points the client at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl IssueTracker for GithubIssues {
    async fn create_issue(&self, issue: &NewIssue) -> Result<IssueRecord, IssueTrackerError> {
        let url = format!(
            "{}/repos/{}/{}/issues",
            self.base_url, issue.owner, issue.repository
        );
        let request = json!({
            "title": issue.title,
            "body": issue.body,
            "labels": issue.labels,
        });

        debug!(url = %url, title = %issue.title, "creating issue");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(header::USER_AGENT, USER_AGENT)
            .json(&request)
            .send()
            .await
            .map_err(|e| IssueTrackerError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IssueTrackerError::Transport {
                message: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(IssueTrackerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_issue_response(&body, &issue.owner, &issue.repository)
    }
}

/// Interprets the REST response for a created issue.
///
/// Labels may come back as plain strings or as objects with a `name` field;
/// both forms are accepted.
fn parse_issue_response(
    body: &str,
    owner: &str,
    repository: &str,
) -> Result<IssueRecord, IssueTrackerError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| IssueTrackerError::MalformedResponse {
            message: format!("response is not JSON: {e}"),
        })?;

    let field_u64 = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| IssueTrackerError::MalformedResponse {
                message: format!("response carries no numeric '{name}'"),
            })
    };
    let field_str = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| IssueTrackerError::MalformedResponse {
                message: format!("response carries no '{name}'"),
            })
    };

    let labels = value
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| match label {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(fields) => fields
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(IssueRecord {
        id: field_u64("id")?,
        number: field_u64("number")?,
        url: field_str("html_url")?,
        title: field_str("title")?,
        body: value
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        owner: owner.to_string(),
        repository: repository.to_string(),
        labels,
        state: value
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("open")
            .to_string(),
        created_at: value
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        author: value
            .pointer("/user/login")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
    })
}
