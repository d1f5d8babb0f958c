//! Trust Scorer: fuses the five evidence reports into one verdict.
//!
//! Each report maps to an independent 0-100 sub-score by a fixed monotonic
//! rule, then a weighted sum produces the final score. Weights are a
//! configuration invariant (they must sum to 1.0, enforced at config
//! validation), so no defensive normalization happens here. Reasons
//! accumulate in fixed component order so reports reproduce byte-for-byte;
//! they are neither deduplicated nor ranked.

use tracing::debug;

use crate::config::TrustWeights;
use crate::types::{
    FieldSet, LogoMatchSet, MetadataReport, QrResult, QrValidation, TamperReport,
    TrustEvaluation, Verdict,
};

const SEMANTIC_FIELD_COUNT: f64 = 5.0;
const RAW_TEXT_BONUS_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct TrustScorer {
    weights: TrustWeights,
}

impl TrustScorer {
    pub fn new(weights: TrustWeights) -> Self {
        Self { weights }
    }

    pub fn evaluate(
        &self,
        fields: &FieldSet,
        metadata: &MetadataReport,
        qr: &QrResult,
        logos: &LogoMatchSet,
        tamper: &TamperReport,
    ) -> TrustEvaluation {
        let mut reasons = Vec::new();

        let ocr = ocr_subscore(fields);
        if ocr < 50.0 {
            reasons.push("Missing or incomplete certificate information".to_string());
        }

        let meta = metadata_subscore(metadata);
        reasons.extend(metadata.flags.iter().cloned());

        let qr_score = qr_subscore(qr);
        if qr.found && qr.validation == QrValidation::Invalid {
            reasons.push("QR code verification failed".to_string());
        } else if !qr.found {
            reasons.push("No QR code found for verification".to_string());
        }

        let logo = logo_subscore(logos);
        if logos.ambiguous {
            reasons.push("Low confidence logo matches detected".to_string());
        } else if logos.matches.is_empty() {
            reasons.push("No recognized issuer logos found".to_string());
        }

        let tamper_score = tamper_subscore(tamper);
        if tamper.score > 0.7 {
            reasons.push("High tamper detection score detected".to_string());
        } else if tamper.score > 0.5 {
            reasons.push("Moderate tamper indicators found".to_string());
        }

        let total = ocr * self.weights.ocr
            + meta * self.weights.metadata
            + qr_score * self.weights.qr
            + logo * self.weights.logo
            + tamper_score * self.weights.tamper;
        let trust_score = total.round().clamp(0.0, 100.0) as u8;

        let verdict = if trust_score >= 80 {
            Verdict::Valid
        } else if trust_score >= 60 {
            Verdict::Suspicious
        } else {
            Verdict::Fake
        };

        debug!(
            ocr, meta, qr = qr_score, logo, tamper = tamper_score, trust_score,
            "sub-scores fused"
        );

        TrustEvaluation {
            trust_score,
            verdict,
            reasons,
        }
    }
}

/// Fraction of semantic fields filled, with a flat bonus for substantial
/// raw text yield; rewards structured extraction and raw yield alike.
pub fn ocr_subscore(fields: &FieldSet) -> f64 {
    let mut score = (fields.filled_count() as f64 / SEMANTIC_FIELD_COUNT) * 100.0;
    if fields.raw_text.len() > RAW_TEXT_BONUS_LEN {
        score = (score + 10.0).min(100.0);
    }
    score
}

/// 20 points per anomaly flag, 10 more if the creation date is absent.
pub fn metadata_subscore(metadata: &MetadataReport) -> f64 {
    let mut score = 100.0 - 20.0 * metadata.flags.len() as f64;
    if metadata.created_date.is_empty() {
        score -= 10.0;
    }
    score.max(0.0)
}

/// Absence of evidence is not evidence of absence: unverifiable and
/// not-found are both neutral.
pub fn qr_subscore(qr: &QrResult) -> f64 {
    if !qr.found {
        return 50.0;
    }
    match qr.validation {
        QrValidation::Valid => 100.0,
        QrValidation::Invalid => 0.0,
        QrValidation::Unverifiable => 50.0,
    }
}

/// Banded by best-match confidence. Total absence of matches scores 40,
/// mildly below a weak positive match.
pub fn logo_subscore(logos: &LogoMatchSet) -> f64 {
    let Some(best) = logos.best_confidence() else {
        return 40.0;
    };
    if best >= 0.8 {
        100.0
    } else if best >= 0.6 {
        75.0
    } else if best >= 0.5 {
        50.0
    } else {
        25.0
    }
}

/// Inverted: lower forensic suspicion contributes more trust.
pub fn tamper_subscore(tamper: &TamperReport) -> f64 {
    (1.0 - tamper.score) * 100.0
}
