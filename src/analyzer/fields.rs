//! Field Extractor: normalizes recognized raw text into semantic fields.
//!
//! Each field has an ordered cascade of patterns tried in priority order;
//! the first structurally plausible match wins. Returning an empty field is
//! not an error, it is evidence of low recognition yield and is scored as
//! such downstream. This component is a total function: no input can make
//! it fail.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::config::{ExtractionConfig, ExtractionMode};
use crate::types::FieldSet;

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

lazy_static! {
    static ref NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?:(?i:certify|certificate|awarded to|presented to|this is to certify that))[\s:]+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)"
        )
        .unwrap(),
        Regex::new(r"(?:(?i:name|student|participant))[\s:]+([A-Z][a-z]+\s+[A-Z][a-z]+)").unwrap(),
        Regex::new(r"\b([A-Z][a-z]+\s+[A-Z][a-z]+)\b").unwrap(),
    ];
    static ref COURSE_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?:(?i:course|program|certification in|for|completed))[\s:]+([A-Z][A-Za-z\s&]+?)(?:(?i:has|successfully|completed|certificate|program))"
        )
        .unwrap(),
        Regex::new(
            r"(?:(?i:successfully completed|completed))[\s:]+([A-Z][A-Za-z\s&]+?)(?:(?i:course|program|certification))"
        )
        .unwrap(),
    ];
    static ref ISSUER_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?:(?i:issued by|certified by|awarded by|organization|from|by))[\s:]+([A-Z][A-Za-z\s&.,-]+?)(?:(?i:\bon\b|\bdate\b)|$)"
        )
        .unwrap(),
        Regex::new(
            r"([A-Z][A-Za-z\s&.,-]+(?:University|College|Institute|Academy|Organization|Corporation|Inc|Ltd|Foundation))"
        )
        .unwrap(),
    ];
    static ref DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").unwrap(),
        Regex::new(&format!(r"\b(\d{{1,2}}\s+(?:(?i:{MONTHS}))\s+\d{{4}})\b")).unwrap(),
        Regex::new(&format!(r"\b((?:(?i:{MONTHS}))\s+\d{{1,2}},?\s+\d{{4}})\b")).unwrap(),
        Regex::new(r"\b(?:(?i:date|on))[\s:]+(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").unwrap(),
    ];
    static ref ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:(?i:certificate|cert|id|number|serial))[\s#:]+([A-Z0-9-]{5,})").unwrap(),
        Regex::new(r"(?:ID|No\.?|Number|Serial)[\s:]+([A-Z0-9-]{5,})").unwrap(),
        Regex::new(r"([A-Z]{2,}\d{4,})").unwrap(),
    ];
}

/// Reject matches that are certificate boilerplate rather than a name.
const NAME_STOPLIST: [&str; 5] = ["certificate", "course", "program", "certification", "this is"];

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    config: ExtractionConfig,
}

impl FieldExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extracts the five semantic fields from recognized text. In simple
    /// mode only the raw text carries through.
    pub fn extract(&self, raw_text: &str) -> FieldSet {
        let raw_text = raw_text.trim().to_string();

        if self.config.mode == ExtractionMode::Simple {
            return FieldSet {
                raw_text,
                ..FieldSet::default()
            };
        }

        let fields = FieldSet {
            name: extract_name(&raw_text),
            course: extract_course(&raw_text),
            issuer: extract_issuer(&raw_text),
            date: extract_date(&raw_text),
            certificate_id: extract_certificate_id(&raw_text),
            raw_text,
        };
        debug!(filled = fields.filled_count(), "field extraction finished");
        fields
    }
}

fn first_plausible<F>(patterns: &[Regex], text: &str, plausible: F) -> String
where
    F: Fn(&str) -> bool,
{
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                let candidate = m.as_str().trim();
                if plausible(candidate) {
                    return candidate.to_string();
                }
            }
        }
    }
    String::new()
}

fn extract_name(text: &str) -> String {
    first_plausible(&NAME_PATTERNS, text, |name| {
        let lowered = name.to_lowercase();
        name.split_whitespace().count() >= 2 && !NAME_STOPLIST.contains(&lowered.as_str())
    })
}

fn extract_course(text: &str) -> String {
    first_plausible(&COURSE_PATTERNS, text, |course| {
        course.len() > 3 && course.len() < 100 && !course.to_lowercase().starts_with("has")
    })
}

fn extract_issuer(text: &str) -> String {
    first_plausible(&ISSUER_PATTERNS, text, |issuer| issuer.len() > 3)
}

fn extract_date(text: &str) -> String {
    first_plausible(&DATE_PATTERNS, text, |_| true)
}

fn extract_certificate_id(text: &str) -> String {
    first_plausible(&ID_PATTERNS, text, |id| {
        id.chars().filter(|c| c.is_ascii_alphanumeric()).count() >= 5
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "This is to certify that Jane Doe has successfully completed \
        Data Science Specialization course issued by Example University on 12/05/2024 \
        Certificate ID: AB-12345";

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(ExtractionConfig::default())
    }

    #[test]
    fn extracts_all_five_fields_from_sample_text() {
        let fields = extractor().extract(SAMPLE);
        assert_eq!(fields.name, "Jane Doe");
        assert_eq!(fields.course, "Data Science Specialization");
        assert_eq!(fields.issuer, "Example University");
        assert_eq!(fields.date, "12/05/2024");
        assert_eq!(fields.certificate_id, "AB-12345");
        assert_eq!(fields.filled_count(), 5);
    }

    #[test]
    fn month_name_dates_are_recognized() {
        let fields = extractor().extract("Awarded on 3 March 2023 to someone");
        assert_eq!(fields.date, "3 March 2023");
        let fields = extractor().extract("Dated March 3, 2023");
        assert_eq!(fields.date, "March 3, 2023");
    }

    #[test]
    fn single_word_names_are_rejected() {
        let fields = extractor().extract("name: Madonna performed well");
        assert!(fields.name.is_empty());
    }

    #[test]
    fn empty_text_yields_empty_fields() {
        let fields = extractor().extract("");
        assert_eq!(fields.filled_count(), 0);
        assert!(fields.raw_text.is_empty());
    }

    #[test]
    fn simple_mode_keeps_only_raw_text() {
        let extractor = FieldExtractor::new(ExtractionConfig {
            mode: ExtractionMode::Simple,
        });
        let fields = extractor.extract(SAMPLE);
        assert_eq!(fields.filled_count(), 0);
        assert_eq!(fields.raw_text, SAMPLE);
    }

    #[test]
    fn low_yield_text_keeps_raw_transcript() {
        let fields = extractor().extract("   lorem ipsum dolor   ");
        assert_eq!(fields.raw_text, "lorem ipsum dolor");
        assert_eq!(fields.filled_count(), 0);
    }
}
