use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::llm::{FailureKind, LlmError};
use controls::Control;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CoverageStatus {
    Covered,
    PartiallyCovered,
    NotCovered,
    NotApplicable,
}

impl CoverageStatus {
    pub const ALL: [CoverageStatus; 4] = [
        Self::Covered,
        Self::PartiallyCovered,
        Self::NotCovered,
        Self::NotApplicable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Covered => "Covered",
            Self::PartiallyCovered => "Partially Covered",
            Self::NotCovered => "Not Covered",
            Self::NotApplicable => "Not Applicable",
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "covered" => Ok(Self::Covered),
            "partiallycovered" => Ok(Self::PartiallyCovered),
            "notcovered" => Ok(Self::NotCovered),
            "notapplicable" => Ok(Self::NotApplicable),
            _ => Err(format!("unknown coverage status '{s}'")),
        }
    }
}

impl TryFrom<String> for CoverageStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CoverageStatus> for String {
    fn from(status: CoverageStatus) -> Self {
        status.as_str().to_string()
    }
}

/// The two fields the model is asked to return for each control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlAssessment {
    pub status: CoverageStatus,
    pub justification: String,
}

/// JSON schema handed to the provider as the structured-output format.
pub fn assessment_schema() -> serde_json::Value {
    let statuses: Vec<&str> = CoverageStatus::ALL.iter().map(|s| s.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "status": {
                "type": "string",
                "enum": statuses,
                "description": "One of: 'Covered', 'Partially Covered', 'Not Covered', 'Not Applicable'"
            },
            "justification": {
                "type": "string",
                "description": "Concise explanation of the reasoning, based on the document."
            }
        },
        "required": ["status", "justification"]
    })
}

/// Coerce a raw model reply into a validated assessment.
///
/// Tolerates Markdown code fences and prose around the JSON object.
pub fn parse_assessment(raw: &str) -> Result<ControlAssessment, LlmError> {
    let body = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = body.find('{');
    let end = body.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(LlmError::StructuredParse("no JSON object in response".to_string())),
    };

    let assessment: ControlAssessment =
        serde_json::from_str(json).map_err(|e| LlmError::StructuredParse(e.to_string()))?;

    if assessment.justification.trim().is_empty() {
        return Err(LlmError::StructuredParse("justification is empty".to_string()));
    }

    Ok(ControlAssessment {
        status: assessment.status,
        justification: assessment.justification.trim().to_string(),
    })
}

/// Control ids the user considers applicable to the document.
/// An empty selection means every control applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicableControls(HashSet<String>);

impl ApplicableControls {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(|s| s.into().trim().to_string()).filter(|s| !s.is_empty()).collect())
    }

    pub fn includes(&self, control_id: &str) -> bool {
        self.0.is_empty() || self.0.contains(control_id)
    }

    /// Selected ids that do not name any control in `catalogue`.
    pub fn unknown_ids(&self, catalogue: &[Control]) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .0
            .iter()
            .filter(|id| !catalogue.iter().any(|c| &c.id == *id))
            .cloned()
            .collect();
        unknown.sort();
        unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Assessed {
        status: CoverageStatus,
        justification: String,
    },
    Failed {
        kind: FailureKind,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResult {
    pub control_id: String,
    pub description: String,
    #[serde(flatten)]
    pub outcome: ControlOutcome,
}

impl ControlResult {
    pub fn assessed(control: Control, assessment: ControlAssessment) -> Self {
        Self {
            control_id: control.id,
            description: control.description,
            outcome: ControlOutcome::Assessed {
                status: assessment.status,
                justification: assessment.justification,
            },
        }
    }

    pub fn failed(control: Control, kind: FailureKind, error: String) -> Self {
        Self {
            control_id: control.id,
            description: control.description,
            outcome: ControlOutcome::Failed { kind, error },
        }
    }

    pub fn status(&self) -> Option<CoverageStatus> {
        match &self.outcome {
            ControlOutcome::Assessed { status, .. } => Some(*status),
            ControlOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub covered: usize,
    pub partially_covered: usize,
    pub not_covered: usize,
    pub not_applicable: usize,
    pub failed: usize,
}

impl CoverageSummary {
    pub fn from_results(results: &[ControlResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status() {
                Some(CoverageStatus::Covered) => summary.covered += 1,
                Some(CoverageStatus::PartiallyCovered) => summary.partially_covered += 1,
                Some(CoverageStatus::NotCovered) => summary.not_covered += 1,
                Some(CoverageStatus::NotApplicable) => summary.not_applicable += 1,
                None => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.covered + self.partially_covered + self.not_covered + self.not_applicable + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub results: Vec<ControlResult>,
    pub summary: CoverageSummary,
}

impl CoverageReport {
    pub fn new(results: Vec<ControlResult>) -> Self {
        let summary = CoverageSummary::from_results(&results);
        Self { results, summary }
    }
}
