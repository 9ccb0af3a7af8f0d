use std::sync::Arc;

use crate::llm::{GenerationRequest, LanguageModel, LlmError};
use crate::prompt;

pub const DRAFT_TEMPERATURE: f32 = 0.3;
pub const RISK_TEMPERATURE: f32 = 0.5;

pub const DRAFT_FAILURE: &str =
    "An error occurred while generating the draft. Please check the server logs for details.";
pub const RISK_FAILURE: &str =
    "An error occurred while identifying the risks. Please check the server logs for details.";

/// Free-text generators for controls a document does not cover.
pub struct Advisor {
    llm: Arc<dyn LanguageModel>,
    draft_temperature: f32,
    risk_temperature: f32,
}

impl Advisor {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            draft_temperature: DRAFT_TEMPERATURE,
            risk_temperature: RISK_TEMPERATURE,
        }
    }

    pub fn with_temperatures(mut self, draft: f32, risk: f32) -> Self {
        self.draft_temperature = draft;
        self.risk_temperature = risk;
        self
    }

    pub async fn try_draft_policy(&self, control_id: &str, description: &str) -> Result<String, LlmError> {
        let prompt = prompt::build_policy_draft_prompt(control_id, description);
        self.llm
            .generate(GenerationRequest::text(prompt, self.draft_temperature))
            .await
    }

    /// Markdown policy draft; failures collapse into [`DRAFT_FAILURE`].
    pub async fn draft_policy(&self, control_id: &str, description: &str) -> String {
        match self.try_draft_policy(control_id, description).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::error!(control = control_id, error = %e, "Policy draft generation failed");
                DRAFT_FAILURE.to_string()
            }
        }
    }

    pub async fn try_identify_risks(&self, control_id: &str, description: &str) -> Result<String, LlmError> {
        let prompt = prompt::build_risk_prompt(control_id, description);
        self.llm
            .generate(GenerationRequest::text(prompt, self.risk_temperature))
            .await
    }

    /// Markdown list of risks; failures collapse into [`RISK_FAILURE`].
    pub async fn identify_risks(&self, control_id: &str, description: &str) -> String {
        match self.try_identify_risks(control_id, description).await {
            Ok(risks) => risks,
            Err(e) => {
                tracing::error!(control = control_id, error = %e, "Risk identification failed");
                RISK_FAILURE.to_string()
            }
        }
    }
}
