//! Report types produced by the analysis pipeline.
//!
//! Every record here is built once per request and never mutated afterwards.
//! Absent text fields are represented by empty strings, never by `Option`,
//! so the scorer treats "not found" and "not attempted" identically.

use serde::{Deserialize, Serialize};

/// Semantic fields recovered from recognized certificate text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    pub name: String,
    pub course: String,
    pub issuer: String,
    pub date: String,
    pub certificate_id: String,
    pub raw_text: String,
}

impl FieldSet {
    /// Number of the five semantic fields that are non-empty.
    pub fn filled_count(&self) -> usize {
        [
            &self.name,
            &self.course,
            &self.issuer,
            &self.date,
            &self.certificate_id,
        ]
        .iter()
        .filter(|f| !f.trim().is_empty())
        .count()
    }
}

/// Document authoring metadata plus detected anomaly flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataReport {
    pub created_date: String,
    pub modified_date: String,
    pub author: String,
    pub software: String,
    pub flags: Vec<String>,
}

/// Tri-state outcome of QR content validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrValidation {
    Valid,
    Invalid,
    Unverifiable,
}

/// Result of QR detection and content validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrResult {
    pub found: bool,
    pub content: String,
    pub validation: QrValidation,
}

impl Default for QrResult {
    fn default() -> Self {
        Self {
            found: false,
            content: String::new(),
            validation: QrValidation::Unverifiable,
        }
    }
}

/// A single reference-logo correlation hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoMatch {
    pub name: String,
    pub confidence: f32,
}

/// Logo matches sorted by descending confidence. `ambiguous` is raised when
/// every recorded match cleared the acceptance bar only weakly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogoMatchSet {
    pub matches: Vec<LogoMatch>,
    pub ambiguous: bool,
}

impl LogoMatchSet {
    pub fn best_confidence(&self) -> Option<f32> {
        self.matches.first().map(|m| m.confidence)
    }
}

/// Composite forensic suspicion score in [0,1] plus an illustrative overlay.
/// The overlay is a base64 PNG; empty when rendering failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperReport {
    pub score: f64,
    pub heatmap: String,
}

impl Default for TamperReport {
    fn default() -> Self {
        // Neutral: "could not determine", never "clean".
        Self {
            score: 0.5,
            heatmap: String::new(),
        }
    }
}

/// Three-way categorical verdict derived from the final trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Valid,
    Suspicious,
    Fake,
}

/// Fused trust verdict: integer score in [0,100], verdict tier, and
/// human-readable reasons in fixed component order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEvaluation {
    pub trust_score: u8,
    pub verdict: Verdict,
    pub reasons: Vec<String>,
}

/// Complete per-request analysis report returned by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateAnalysis {
    pub certificate_preview: String,
    pub ocr: FieldSet,
    pub metadata: MetadataReport,
    pub qr: QrResult,
    pub logo_detection: LogoMatchSet,
    pub tamper_report: TamperReport,
    pub trust_evaluation: TrustEvaluation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_count_ignores_whitespace_fields() {
        let fields = FieldSet {
            name: "Jane Doe".into(),
            course: "   ".into(),
            issuer: String::new(),
            date: "12/05/2024".into(),
            certificate_id: "AB-12345".into(),
            raw_text: String::new(),
        };
        assert_eq!(fields.filled_count(), 3);
    }

    #[test]
    fn qr_default_is_unverifiable_and_empty() {
        let qr = QrResult::default();
        assert!(!qr.found);
        assert!(qr.content.is_empty());
        assert_eq!(qr.validation, QrValidation::Unverifiable);
    }

    #[test]
    fn validation_serializes_lowercase() {
        let json = serde_json::to_string(&QrValidation::Unverifiable).unwrap();
        assert_eq!(json, "\"unverifiable\"");
    }
}
