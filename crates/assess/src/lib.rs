pub mod advisor;
pub mod llm;
pub mod prompt;
pub mod schema;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use advisor::{Advisor, DRAFT_FAILURE, RISK_FAILURE};
pub use llm::{BoxFuture, FailureKind, GenerationRequest, LanguageModel, LlmError, OllamaClient};
pub use schema::{
    ApplicableControls, ControlAssessment, ControlOutcome, ControlResult, CoverageReport, CoverageStatus,
    CoverageSummary,
};

use controls::{CatalogueError, Control, ControlSource};
use std::sync::Arc;

pub const ASSESSMENT_TEMPERATURE: f32 = 0.0;

pub const NOT_APPLICABLE_JUSTIFICATION: &str =
    "Marked as not applicable by the user in the Statement of Applicability.";

#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("could not load the ISO 27001 controls: {0}")]
    CatalogueUnavailable(#[from] CatalogueError),
}

/// Checks a document against every control of the catalogue, one LLM call
/// per applicable control.
pub struct Assessor {
    llm: Arc<dyn LanguageModel>,
    catalogue: Arc<dyn ControlSource>,
    temperature: f32,
}

impl Assessor {
    pub fn new(llm: Arc<dyn LanguageModel>, catalogue: Arc<dyn ControlSource>) -> Self {
        Self {
            llm,
            catalogue,
            temperature: ASSESSMENT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// One result per catalogue control, in catalogue order.
    ///
    /// A failed call only marks its own control. Provider-wide failures
    /// (missing model, denied access, exhausted quota) additionally mark every
    /// remaining applicable control without calling the model again.
    pub async fn assess(
        &self,
        document_text: &str,
        applicable: &ApplicableControls,
    ) -> Result<CoverageReport, AssessError> {
        let controls = self.catalogue.load().map_err(|e| {
            tracing::error!(error = %e, "Control catalogue unavailable");
            e
        })?;

        let unknown = applicable.unknown_ids(&controls);
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "Applicable set names controls missing from the catalogue");
        }

        let schema = schema::assessment_schema();
        let instructions = prompt::format_instructions(&schema);

        let mut results = Vec::with_capacity(controls.len());
        let mut halted: Option<(FailureKind, String)> = None;

        for control in controls {
            if !applicable.includes(&control.id) {
                results.push(ControlResult::assessed(
                    control,
                    ControlAssessment {
                        status: CoverageStatus::NotApplicable,
                        justification: NOT_APPLICABLE_JUSTIFICATION.to_string(),
                    },
                ));
                continue;
            }

            if let Some((kind, message)) = &halted {
                results.push(ControlResult::failed(control, *kind, message.clone()));
                continue;
            }

            match self.assess_control(document_text, &control, &schema, &instructions).await {
                Ok(assessment) => {
                    tracing::debug!(control = %control.id, status = %assessment.status, "Control assessed");
                    results.push(ControlResult::assessed(control, assessment));
                }
                Err(e) => {
                    let kind = e.kind();
                    let message = e.user_message();
                    if e.is_fatal() {
                        tracing::error!(
                            control = %control.id,
                            error = %e,
                            "Provider failure; skipping model calls for the remaining controls"
                        );
                        halted = Some((kind, message.clone()));
                    } else {
                        tracing::warn!(control = %control.id, error = %e, "Control assessment failed");
                    }
                    results.push(ControlResult::failed(control, kind, message));
                }
            }
        }

        let report = CoverageReport::new(results);
        tracing::info!(
            controls = report.results.len(),
            covered = report.summary.covered,
            partially_covered = report.summary.partially_covered,
            not_covered = report.summary.not_covered,
            not_applicable = report.summary.not_applicable,
            failed = report.summary.failed,
            "Coverage analysis finished"
        );
        Ok(report)
    }

    async fn assess_control(
        &self,
        document_text: &str,
        control: &Control,
        schema: &serde_json::Value,
        instructions: &str,
    ) -> Result<ControlAssessment, LlmError> {
        let prompt = prompt::build_assessment_prompt(document_text, control, instructions);
        let request = GenerationRequest::structured(prompt, self.temperature, schema.clone());
        let raw = self.llm.generate(request).await?;
        schema::parse_assessment(&raw)
    }
}
