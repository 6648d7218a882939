//! Drug-interaction analysis seam.
//!
//! The real analysis belongs to an external clinical service that is not
//! wired in yet. [`StubInteractionService`] keeps the response contract in
//! place (three always-present lists) while returning no findings for any
//! input.

use super::AnalysisError;
use crate::models::{Alternative, Drug, Interaction};

/// Findings for one drug list.
#[derive(Debug, Clone, Default)]
pub struct InteractionFindings {
    pub interactions: Vec<Interaction>,
    pub recommendations: Vec<String>,
    pub alternatives: Vec<Alternative>,
}

impl InteractionFindings {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Drugs-to-findings abstraction.
pub trait InteractionAnalyzer {
    fn analyze(&self, drugs: &[Drug]) -> Result<InteractionFindings, AnalysisError>;
}

/// Placeholder for the external interaction service: every drug list maps
/// to empty findings.
pub struct StubInteractionService;

impl InteractionAnalyzer for StubInteractionService {
    fn analyze(&self, drugs: &[Drug]) -> Result<InteractionFindings, AnalysisError> {
        tracing::debug!(
            drug_count = drugs.len(),
            "Interaction service stubbed, returning empty findings"
        );
        Ok(InteractionFindings::empty())
    }
}
