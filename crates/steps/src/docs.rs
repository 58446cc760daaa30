//! Steps of the product-documentation workflows: gather product information,
//! generate documentation with the assistant, publish the result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use engine::{
    ActivationError, FunctionError, FunctionName, FunctionSpec, ProcessStep, StepContext,
    StepDefinition, StepMetadata,
};

use crate::ports::{ChatCompletion, ChatHistory, Operator};
use crate::types::text_payload;

// ---------------------------------------------------------------------------
// GatherProductInfo
// ---------------------------------------------------------------------------

/// Stateless first step: turns a product name into a product description.
///
/// The demo returns a canned description; a real deployment would query a
/// catalogue service here.
#[derive(Default)]
pub struct GatherProductInfoStep;

impl GatherProductInfoStep {
    /// Function: gathers info for a product name.
    pub const GATHER_INFO: &'static str = "GatherInfo";
}

impl StepMetadata for GatherProductInfoStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("GatherProductInfo")
            .with_function(FunctionSpec::new(Self::GATHER_INFO).with_parameter("product_name"))
    }
}

#[async_trait]
impl ProcessStep<Value> for GatherProductInfoStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        match function.as_str() {
            Self::GATHER_INFO => {
                let product_name = text_payload(input.as_ref())?;
                info!(product = %product_name, "gathering product info");
                let info = format!(
                    "Product '{product_name}' is a revolutionary gadget with \
                     cutting-edge features..."
                );
                Ok(Some(Value::String(info)))
            }
            _ => Err(FunctionError::unknown(function.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// GenerateDocumentation
// ---------------------------------------------------------------------------

const DOC_WRITER_PROMPT: &str = "You are an AI documentation writer. Given product \
information, produce clear, well-structured user documentation in markdown. Keep \
the tone factual and the sections short.";

/// Stateful step: keeps a chat history across invocations and asks the
/// assistant to write documentation from product information.
///
/// Exposes two functions with identical bodies but different output events:
/// the plain one feeds the publisher directly, the human-in-the-loop one
/// requests operator feedback first.
pub struct GenerateDocumentationStep {
    chat: Arc<dyn ChatCompletion>,
    history: Option<ChatHistory>,
}

impl GenerateDocumentationStep {
    /// Function: generate documentation for direct publication.
    pub const GENERATE_DOC: &'static str = "GenerateDoc";
    /// Function: generate documentation and ask for operator feedback.
    pub const GENERATE_DOC_AFTER_HITL: &'static str = "GenerateDocAfterHitl";

    /// Event: documentation is ready for publication.
    pub const DOCUMENTATION_GENERATED: &'static str = "DocumentationGenerated";
    /// Event: documentation is ready and awaits operator validation.
    pub const DOCUMENTATION_GENERATED_REQUEST_FEEDBACK: &'static str =
        "DocumentationGeneratedRequestFeedback";
    /// Event: the completion call failed.
    pub const GENERATION_FAILED: &'static str = "GenerationFailed";

    /// Creates the step with its completion collaborator.
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self {
            chat,
            history: None,
        }
    }

    async fn generate(
        &mut self,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
        success_event: &'static str,
    ) -> Result<Option<Value>, FunctionError> {
        let product_info = text_payload(input.as_ref())?;
        let history = self.history.as_mut().ok_or(FunctionError::NotActivated)?;
        history.push_user(format!("Product Info: {product_info}"));

        match self.chat.complete(history).await {
            Ok(doc) => {
                history.push_assistant(doc.clone());
                ctx.emit_event(success_event, Value::String(doc));
            }
            Err(err) => {
                warn!(error = %err, "documentation generation failed");
                ctx.emit_event(Self::GENERATION_FAILED, Value::String(err.to_string()));
            }
        }
        Ok(None)
    }
}

impl StepMetadata for GenerateDocumentationStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("GenerateDocumentation")
            .with_function(
                FunctionSpec::new(Self::GENERATE_DOC)
                    .with_parameter("product_info")
                    .emits(Self::DOCUMENTATION_GENERATED)
                    .emits(Self::GENERATION_FAILED),
            )
            .with_function(
                FunctionSpec::new(Self::GENERATE_DOC_AFTER_HITL)
                    .with_parameter("product_info")
                    .emits(Self::DOCUMENTATION_GENERATED_REQUEST_FEEDBACK)
                    .emits(Self::GENERATION_FAILED),
            )
    }
}

#[async_trait]
impl ProcessStep<Value> for GenerateDocumentationStep {
    async fn activate(&mut self) -> Result<(), ActivationError> {
        self.history = Some(ChatHistory::with_system(DOC_WRITER_PROMPT));
        Ok(())
    }

    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        match function.as_str() {
            Self::GENERATE_DOC => {
                self.generate(input, ctx, Self::DOCUMENTATION_GENERATED).await
            }
            Self::GENERATE_DOC_AFTER_HITL => {
                self.generate(input, ctx, Self::DOCUMENTATION_GENERATED_REQUEST_FEEDBACK)
                    .await
            }
            _ => Err(FunctionError::unknown(function.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// PublishDocumentation
// ---------------------------------------------------------------------------

/// Stateless final step: hands the finished document to the operator.
pub struct PublishDocumentationStep {
    operator: Arc<dyn Operator>,
}

impl PublishDocumentationStep {
    /// Function: publishes the document.
    pub const PUBLISH_DOC: &'static str = "PublishDoc";

    /// Creates the step with its output collaborator.
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self { operator }
    }
}

impl StepMetadata for PublishDocumentationStep {
    fn definition() -> StepDefinition {
        StepDefinition::new("PublishDocumentation")
            .with_function(FunctionSpec::new(Self::PUBLISH_DOC).with_parameter("docs"))
    }
}

#[async_trait]
impl ProcessStep<Value> for PublishDocumentationStep {
    async fn invoke(
        &mut self,
        function: &FunctionName,
        input: Option<Value>,
        _ctx: &mut StepContext<Value>,
    ) -> Result<Option<Value>, FunctionError> {
        match function.as_str() {
            Self::PUBLISH_DOC => {
                let docs = text_payload(input.as_ref())?;
                self.operator
                    .write_line(&format!("Publishing document:\n{docs}"));
                Ok(None)
            }
            _ => Err(FunctionError::unknown(function.clone())),
        }
    }
}
