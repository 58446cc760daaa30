//! Terminal implementations of the operator ports.
//!
//! One [`Console`] value serves as both [`Operator`] and [`DecisionProvider`];
//! line reads go through `spawn_blocking` so a waiting prompt never blocks the
//! runtime's worker threads.

use std::io::Write;

use async_trait::async_trait;

use steps::{DecisionProvider, Operator, OperatorError, ReviewDecision};

/// Stdin/stdout operator.
pub struct Console;

impl Console {
    /// Creates the console.
    pub fn new() -> Self {
        Self
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_stdin_line() -> Result<String, OperatorError> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => Err(OperatorError::Eof),
            Ok(_) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => Err(OperatorError::Io {
                message: e.to_string(),
            }),
        }
    })
    .await
    .map_err(|e| OperatorError::Io {
        message: e.to_string(),
    })?
}

#[async_trait]
impl Operator for Console {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }

    async fn read_line(&self, prompt: &str) -> Result<String, OperatorError> {
        println!("{prompt}");
        print!("> ");
        let _ = std::io::stdout().flush();
        read_stdin_line().await
    }
}

#[async_trait]
impl DecisionProvider for Console {
    async fn present(&self, content: &str) -> Result<ReviewDecision, OperatorError> {
        println!("{content}");
        println!("Review options:");
        println!("  y / yes     approve and create the issue");
        println!("  n / no      cancel");
        println!("  exit        quit the process");
        println!("  anything else is treated as modification feedback");
        let answer = self.read_line("What would you like to do?").await?;
        Ok(ReviewDecision::parse(&answer))
    }
}
