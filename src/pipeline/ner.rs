//! Drug-mention recognition.
//!
//! Two recognizers behind one trait: an offline lexicon matcher (default)
//! and a thin client for a remote NER inference endpoint. The lexicon
//! matcher also picks up dosage and frequency phrases near each mention,
//! which token-level NER models do not return.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use super::AnalysisError;
use crate::models::Drug;

/// Text-to-drug-mentions abstraction.
pub trait DrugRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<Drug>, AnalysisError>;
}

// ---------------------------------------------------------------------------
// Lexicon recognizer
// ---------------------------------------------------------------------------

const BUILTIN_LEXICON: &str = include_str!("../../resources/drug_lexicon.txt");

/// Matches drug names from a wordlist and attaches the dosage/frequency
/// phrases that follow them within the same sentence.
pub struct LexiconRecognizer {
    term_re: Regex,
    dosage_re: Regex,
    frequency_re: Regex,
}

impl LexiconRecognizer {
    pub fn new(terms: impl IntoIterator<Item = String>) -> Self {
        let mut escaped: Vec<String> = terms
            .into_iter()
            .map(|t| regex::escape(t.trim()))
            .filter(|t| !t.is_empty())
            .collect();
        // Longest-first so "Metformin XR" wins over "Metformin".
        escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        escaped.dedup();

        let pattern = if escaped.is_empty() {
            // Never matches.
            r"\b\B".to_string()
        } else {
            format!(r"(?i)\b(?:{})\b", escaped.join("|"))
        };

        Self {
            term_re: Regex::new(&pattern).unwrap(),
            dosage_re: Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mcg|mg|g|ml|iu|units?)\b").unwrap(),
            frequency_re: Regex::new(
                r"(?i)\b(?:(?:once|twice|three times|four times)\s+(?:daily|a day|per day|weekly|a week)|every\s+\d+\s+hours?|at bedtime|as needed|with meals|bid|tid|qid|prn)\b",
            )
            .unwrap(),
        }
    }

    /// Recognizer backed by the bundled lexicon in `resources/`.
    pub fn with_builtin_lexicon() -> Self {
        Self::new(parse_wordlist(BUILTIN_LEXICON))
    }

    /// Recognizer backed by a wordlist file (one term per line, `#` comments).
    pub fn from_wordlist(path: &Path) -> Result<Self, AnalysisError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(parse_wordlist(&content)))
    }
}

impl DrugRecognizer for LexiconRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<Drug>, AnalysisError> {
        let mut drugs: Vec<Drug> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for segment in text.split(['.', ';', '\n']) {
            let matches: Vec<_> = self.term_re.find_iter(segment).collect();
            for (i, m) in matches.iter().enumerate() {
                let key = m.as_str().to_lowercase();
                if !seen.insert(key) {
                    continue;
                }
                // Details are looked for between this mention and the next
                // one, so "Aspirin 325mg, Metformin 500mg" resolves cleanly.
                let window_end = matches.get(i + 1).map_or(segment.len(), |n| n.start());
                let window = &segment[m.end()..window_end];

                drugs.push(Drug {
                    name: m.as_str().to_string(),
                    dosage: self
                        .dosage_re
                        .find(window)
                        .map_or(String::new(), |d| d.as_str().to_string()),
                    frequency: self
                        .frequency_re
                        .find(window)
                        .map_or(String::new(), |f| f.as_str().to_string()),
                    route: None,
                });
            }
        }

        Ok(drugs)
    }
}

/// Parse a wordlist: one term per line, blank lines and `#` comments skipped.
pub fn parse_wordlist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Remote recognizer
// ---------------------------------------------------------------------------

/// Entity record returned by token-classification inference endpoints.
#[derive(Debug, serde::Deserialize)]
struct RemoteEntity {
    word: String,
    entity_group: String,
    #[serde(default)]
    score: f32,
}

/// Groups treated as drug mentions. General-purpose NER models without a
/// pharma vocabulary tag medication tokens as PER/MISC; dedicated clinical
/// models emit DRUG or CHEMICAL.
fn is_drug_like(entity_group: &str) -> bool {
    matches!(
        entity_group,
        "DRUG" | "CHEMICAL" | "MEDICATION" | "PER" | "MISC"
    )
}

/// Client for a remote NER inference endpoint.
///
/// Posts `{"inputs": text}` and expects a JSON array of
/// `{word, entity_group, score}` records. Blocking on purpose: the caller
/// runs the whole pipeline on a blocking task.
pub struct RemoteNer {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteNer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AnalysisError::Recognition(format!("HTTP client init: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl DrugRecognizer for RemoteNer {
    fn recognize(&self, text: &str) -> Result<Vec<Drug>, AnalysisError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .map_err(|e| AnalysisError::Recognition(format!("NER request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AnalysisError::Recognition(format!(
                "NER endpoint returned {}",
                response.status()
            )));
        }

        let entities: Vec<RemoteEntity> = response
            .json()
            .map_err(|e| AnalysisError::Recognition(format!("NER response parse: {e}")))?;

        let mut seen = HashSet::new();
        let drugs = entities
            .into_iter()
            .inspect(|e| {
                tracing::debug!(word = %e.word, group = %e.entity_group, score = e.score, "NER entity")
            })
            .filter(|e| is_drug_like(&e.entity_group))
            .filter(|e| seen.insert(e.word.to_lowercase()))
            .map(|e| Drug::named(e.word))
            .collect();

        Ok(drugs)
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

/// Mock recognizer: fixed drug list or a forced error.
pub struct MockRecognizer {
    drugs: Vec<Drug>,
    error: Option<String>,
}

impl MockRecognizer {
    pub fn returning(drugs: Vec<Drug>) -> Self {
        Self { drugs, error: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            drugs: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

impl DrugRecognizer for MockRecognizer {
    fn recognize(&self, _text: &str) -> Result<Vec<Drug>, AnalysisError> {
        if let Some(message) = &self.error {
            return Err(AnalysisError::Recognition(message.clone()));
        }
        Ok(self.drugs.clone())
    }
}
