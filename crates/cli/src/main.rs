//! StepWorks CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Read configuration** — API keys and model selection from the
//!    environment (see [`config`]).
//! 2. **Wire observability** — configure `tracing-subscriber` with an
//!    env-filter layer writing to stderr, so structured events from every
//!    crate in the workspace stay out of the interactive stdout stream.
//! 3. **Construct infrastructure** — create the chat-completion and issue
//!    tracker adapters for whatever credentials are present, plus the console
//!    operator.
//! 4. **Drive the demo loop** — list the catalog, build the selected process
//!    graph, seed it with the operator's input, and report the run's terminal
//!    condition.

mod config;
mod console;
mod progress;

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use engine::{ProcessEngine, ProcessEvent, RunStatus};
use github::GithubIssues;
use llm::OpenAiChatCompletion;
use steps::{
    documentation_hitl_process, documentation_process, github_issue_process, quick_info_process,
    ChatCompletion, DecisionProvider, DemoProcess, IssueTracker, Operator,
};

use crate::config::CliConfig;
use crate::console::Console;
use crate::progress::ProgressReporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::from_env();
    tracing::debug!(
        model = %config.openai_model,
        completion_configured = config.openai_api_key.is_some(),
        tracker_configured = config.github_token.is_some(),
        "configuration loaded"
    );
    let console = Arc::new(Console::new());

    let chat: Option<Arc<dyn ChatCompletion>> = config.openai_api_key.as_deref().map(|key| {
        let mut client = OpenAiChatCompletion::new(key, config.openai_model.as_str());
        if let Some(base_url) = config.openai_base_url.as_deref() {
            client = client.with_base_url(base_url);
        }
        Arc::new(client) as Arc<dyn ChatCompletion>
    });
    let tracker: Option<Arc<dyn IssueTracker>> = config
        .github_token
        .as_deref()
        .map(|token| Arc::new(GithubIssues::new(token)) as Arc<dyn IssueTracker>);

    console.write_line("Welcome to the StepWorks Process Demo!");
    console.write_line("======================================");

    let exit_choice = DemoProcess::ALL.len() + 1;
    loop {
        console.write_line("");
        console.write_line("Available processes:");
        for (index, process) in DemoProcess::ALL.iter().enumerate() {
            console.write_line(&format!(
                "{}. {} - {}",
                index + 1,
                process.name(),
                process.description()
            ));
        }
        console.write_line(&format!("{exit_choice}. Exit"));

        let Ok(selection) = console
            .read_line(&format!("Select a process (1-{exit_choice}):"))
            .await
        else {
            break;
        };
        let choice = selection.trim().parse::<usize>().ok();
        let Some(choice) = choice.filter(|c| (1..=exit_choice).contains(c)) else {
            console.write_line("Invalid selection. Please try again.");
            continue;
        };
        if choice == exit_choice {
            console.write_line("Goodbye!");
            break;
        }
        let process = DemoProcess::ALL[choice - 1];

        let Ok(input) = console
            .read_line(&format!("Enter the input for {}:", process.name()))
            .await
        else {
            break;
        };
        let input = if input.trim().is_empty() {
            console.write_line(&format!(
                "No input provided. Using default: '{}'",
                process.default_input()
            ));
            process.default_input().to_string()
        } else {
            input.trim().to_string()
        };

        console.write_line(&format!("Starting {} for: {input}", process.name()));
        if let Err(error) = run_process(process, &chat, &tracker, &console, input).await {
            console.write_line(&format!("Could not run the process: {error:#}"));
        }

        let Ok(again) = console.read_line("Run another process? (y/n):").await else {
            break;
        };
        let again = again.trim();
        if !again.eq_ignore_ascii_case("y") && !again.eq_ignore_ascii_case("yes") {
            console.write_line("Goodbye!");
            break;
        }
    }

    Ok(())
}

/// Builds the selected process graph, checks its collaborators, and drives
/// one run.
async fn run_process(
    process: DemoProcess,
    chat: &Option<Arc<dyn ChatCompletion>>,
    tracker: &Option<Arc<dyn IssueTracker>>,
    console: &Arc<Console>,
    input: String,
) -> anyhow::Result<()> {
    let operator: Arc<dyn Operator> = console.clone();
    let decisions: Arc<dyn DecisionProvider> = console.clone();

    let graph = match process {
        DemoProcess::QuickInfo => quick_info_process()?,
        DemoProcess::Documentation => {
            let chat = require_chat(chat)?;
            documentation_process(chat, operator)?
        }
        DemoProcess::DocumentationWithHitl => {
            let chat = require_chat(chat)?;
            documentation_hitl_process(chat, operator)?
        }
        DemoProcess::GithubIssue => {
            let chat = require_chat(chat)?;
            let tracker = tracker
                .clone()
                .context("GITHUB_TOKEN is not set; the GitHub issue process needs it")?;
            github_issue_process(chat, tracker, operator, decisions)?
        }
    };

    let engine = ProcessEngine::new(graph);
    let event = ProcessEvent::new(process.start_event(), Value::String(input));
    let result = match process {
        DemoProcess::GithubIssue => {
            engine
                .start_observed(event, Arc::new(ProgressReporter::github_issue()))
                .await?
        }
        _ => engine.start(event).await?,
    };

    match result.status {
        RunStatus::Completed => console.write_line("Process completed."),
        RunStatus::Halted => console.write_line("Process halted by a stop instruction."),
        RunStatus::Failed => {
            for failure in &result.failures {
                console.write_line(&format!(
                    "Dispatch {}::{} failed: {}",
                    failure.step, failure.function, failure.reason
                ));
            }
            console.write_line("Process finished with failures.");
        }
    }
    Ok(())
}

fn require_chat(
    chat: &Option<Arc<dyn ChatCompletion>>,
) -> anyhow::Result<Arc<dyn ChatCompletion>> {
    chat.clone()
        .context("OPENAI_API_KEY is not set; this process needs the completion service")
}
