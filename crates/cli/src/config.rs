//! Environment configuration for the demo CLI.
//!
//! Nothing here is mandatory at startup: each process checks for the
//! collaborators it needs right before it runs, so the documentation demos
//! work without a GitHub token and the quick-info demo works with nothing
//! configured at all.

/// Model used when `OPENAI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Everything the CLI reads from the environment.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// `OPENAI_API_KEY` — enables the completion-backed processes.
    pub openai_api_key: Option<String>,
    /// `OPENAI_BASE_URL` — optional OpenAI-compatible gateway.
    pub openai_base_url: Option<String>,
    /// `OPENAI_MODEL` — completion model, defaulting to [`DEFAULT_MODEL`].
    pub openai_model: String,
    /// `GITHUB_TOKEN` — enables the GitHub issue process.
    pub github_token: Option<String>,
}

impl CliConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            openai_base_url: non_empty_env("OPENAI_BASE_URL"),
            openai_model: non_empty_env("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            github_token: non_empty_env("GITHUB_TOKEN"),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
