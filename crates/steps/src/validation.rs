//! The operator-validation step used by the human-in-the-loop documentation
//! workflow: elicit one line of input, route it onward or end the process.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use engine::{
    FunctionError, FunctionName, FunctionSpec, ProcessStep, StepContext, StepDefinition,
    StepMetadata,
};

use crate::ports::Operator;
use crate::types::text_payload;

/// A step that elicits operator input.
///
/// `GetUserInput` blocks its dispatch on the operator: empty input (or a
/// closed input stream) is answered with a notice and emits nothing, which
/// ends the run once the queue drains; `exit`/`quit` emits [`Self::EXIT`];
/// anything else emits [`Self::USER_INPUT_RECEIVED`] carrying the line.
pub struct UserValidationStep {
    operator: Arc<dyn Operator>,
}

impl UserValidationStep {
    /// Function: prompt the operator for one line.
    pub const GET_USER_INPUT: &'static str = "GetUserInput";
    /// Function: echo a previously captured line.
    pub const SHOW_USER_INPUT: &'static str = "ShowUserInput";

    /// Event: the operator provided usable input.
    pub const USER_INPUT_RECEIVED: &'static str = "UserInputReceived";
    /// Event: the operator asked to leave the process.
    pub const EXIT: &'static str = "Exit";

    /// Creates the step with its I/O collaborator.
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self { operator }
    }

    async fn get_user_input(&self, ctx: &mut StepContext<Value>) {
        let answer = self
            .operator
            .read_line("Please enter your input (type 'exit' to quit):")
            .await;

        let Ok(line) = answer else {
            self.operator
                .write_line("Input stream closed; leaving the process.");
            return;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.operator
                .write_line("Input cannot be empty. Please try again.");
            return;
        }

        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            self.operator
                .write_line("Exiting the process as requested.");
            ctx.emit_event(Self::EXIT, Value::String(trimmed.to_string()));
            return;
        }

        ctx.emit_event(Self::USER_INPUT_RECEIVED, Value::String(trimmed.to_string()));
    }
}

impl StepMetadata for UserValidationStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("UserValidation")
            .with_function(
                FunctionSpec::new(Self::GET_USER_INPUT)
                    .emits(Self::USER_INPUT_RECEIVED)
                    .emits(Self::EXIT),
            )
            .with_function(FunctionSpec::new(Self::SHOW_USER_INPUT).with_parameter("user_input"))
    }
}

#[async_trait]
impl ProcessStep<Value> for UserValidationStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        match function.as_str() {
            Self::GET_USER_INPUT => {
                self.get_user_input(ctx).await;
                Ok(None)
            }
            Self::SHOW_USER_INPUT => {
                let user_input = text_payload(input.as_ref())?;
                self.operator
                    .write_line(&format!("You entered: {user_input}"));
                Ok(None)
            }
            _ => Err(FunctionError::unknown(function.clone())),
        }
    }
}
