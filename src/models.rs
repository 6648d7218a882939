//! Request/response records for the analysis API.
//!
//! Everything here is transient: records live for one request/response cycle
//! and carry no identity beyond their field values. Wire names follow the
//! front-end contract (`drug1`/`drug2`, camelCase alternative fields).

use serde::{Deserialize, Serialize};

/// A single drug mention extracted from a prescription (or entered manually).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drug {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl Drug {
    /// A mention with no dosage/frequency details attached.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: String::new(),
            frequency: String::new(),
            route: None,
        }
    }
}

/// A pairwise drug interaction reported by the analysis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(rename = "drug1")]
    pub first: String,
    #[serde(rename = "drug2")]
    pub second: String,
    pub description: String,
    pub severity: String,
    pub recommendation: String,
}

/// A suggested substitution for one of the prescribed drugs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub original_drug: String,
    pub alternative: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_adjustment: Option<String>,
}

/// Where the report content came from.
///
/// The upload endpoint answers HTTP 200 even when extraction fails and the
/// fixed demo payload is substituted. This field makes the substitution
/// visible to callers instead of masking it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Text and drugs come from the uploaded image.
    Extracted,
    /// Extraction failed or came back empty; canned demo data substituted.
    DemoFallback,
}

/// Full analysis response for one uploaded prescription.
///
/// The interaction/recommendation/alternative lists are always present and
/// frequently empty (the interaction service is a stub).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub text: String,
    pub drugs: Vec<Drug>,
    pub interactions: Vec<Interaction>,
    pub recommendations: Vec<String>,
    pub alternatives: Vec<Alternative>,
    pub source: ReportSource,
}

/// Fixed demo prescription text, served whenever OCR produces nothing usable.
pub const DEMO_TEXT: &str =
    "Demo Prescription: Aspirin 325mg twice daily. Metformin 500mg once daily.";

/// Fixed two-entry demo drug list matching [`DEMO_TEXT`].
pub fn demo_drugs() -> Vec<Drug> {
    vec![
        Drug {
            name: "Aspirin".into(),
            dosage: "325mg".into(),
            frequency: "twice daily".into(),
            route: None,
        },
        Drug {
            name: "Metformin".into(),
            dosage: "500mg".into(),
            frequency: "once daily".into(),
            route: None,
        },
    ]
}

/// Complete demo payload: demo text, demo drugs, empty analysis lists.
pub fn demo_report() -> AnalysisReport {
    AnalysisReport {
        text: DEMO_TEXT.into(),
        drugs: demo_drugs(),
        interactions: Vec::new(),
        recommendations: Vec::new(),
        alternatives: Vec::new(),
        source: ReportSource::DemoFallback,
    }
}
