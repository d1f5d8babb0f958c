//! Metadata Analyzer: inspects document authoring metadata for anomalies.
//!
//! Two anomaly classes are detected: a modification timestamp strictly
//! after creation (post-issuance editing), and producing software from a
//! denylist of general-purpose image/vector editors. Flags are append-only
//! findings. A parse failure of the metadata container yields an empty
//! report plus a single flag; nothing here ever aborts the request.
//!
//! Known detection gap: the modified-after-created comparison silently
//! skips when either timestamp fails to parse under the fixed format list,
//! so anomalies in non-conforming date formats go unflagged.

use chrono::{NaiveDate, NaiveDateTime};
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use crate::types::MetadataReport;

/// General-purpose editors that have no business producing a certificate.
const SOFTWARE_DENYLIST: [&str; 4] = ["photoshop", "gimp", "inkscape", "illustrator"];

/// Accepted date formats, tried in order. The first two carry a time
/// component; the rest are date-only and compare at midnight.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

#[derive(Debug, Default, Clone)]
pub struct MetadataAnalyzer;

impl MetadataAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Total function from document bytes to a report.
    pub fn analyze(&self, bytes: &[u8]) -> MetadataReport {
        let mut report = MetadataReport::default();

        let doc = match Document::load_mem(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "metadata container unreadable");
                report.flags.push("Failed to parse metadata".to_string());
                return report;
            }
        };

        let Some(info) = info_dictionary(&doc) else {
            debug!("document carries no Info dictionary");
            return report;
        };

        report.created_date = info_text(&doc, info, b"CreationDate")
            .map(|raw| normalize_pdf_date(&raw))
            .unwrap_or_default();
        report.modified_date = info_text(&doc, info, b"ModDate")
            .map(|raw| normalize_pdf_date(&raw))
            .unwrap_or_default();
        report.author = info_text(&doc, info, b"Author").unwrap_or_default();
        report.software = info_text(&doc, info, b"Producer")
            .or_else(|| info_text(&doc, info, b"Creator"))
            .unwrap_or_default();

        if let (Some(created), Some(modified)) = (
            parse_timestamp(&report.created_date),
            parse_timestamp(&report.modified_date),
        ) {
            if modified > created {
                report
                    .flags
                    .push("PDF modified after creation date".to_string());
            }
        }

        let lowered = report.software.to_lowercase();
        if !lowered.is_empty() && SOFTWARE_DENYLIST.iter().any(|s| lowered.contains(s)) {
            report
                .flags
                .push(format!("Suspicious creation software: {}", report.software));
        }

        report
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_text(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let obj = match info.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).trim().to_string()),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}

/// Expands a provider `D:YYYYMMDDHHmmSS...` stamp into `YYYY-MM-DD HH:MM:SS`.
/// Anything else passes through verbatim.
fn normalize_pdf_date(raw: &str) -> String {
    let Some(digits) = raw.strip_prefix("D:") else {
        return raw.to_string();
    };
    if digits.len() < 14 || !digits[..14].bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    format!(
        "{}-{}-{} {}:{}:{}",
        &digits[0..4],
        &digits[4..6],
        &digits[6..8],
        &digits[8..10],
        &digits[10..12],
        &digits[12..14]
    )
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use std::io::Cursor;

    fn pdf_with_info(info: Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let info_id = doc.add_object(Object::Dictionary(info));
        doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        doc.save_to(&mut Cursor::new(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn modified_after_created_is_flagged() {
        let bytes = pdf_with_info(dictionary! {
            "CreationDate" => Object::string_literal("D:20240101120000Z"),
            "ModDate" => Object::string_literal("D:20240301120000Z"),
        });
        let report = MetadataAnalyzer::new().analyze(&bytes);
        assert_eq!(report.created_date, "2024-01-01 12:00:00");
        assert_eq!(report.modified_date, "2024-03-01 12:00:00");
        assert_eq!(report.flags, vec!["PDF modified after creation date"]);
    }

    #[test]
    fn identical_timestamps_are_clean() {
        let bytes = pdf_with_info(dictionary! {
            "CreationDate" => Object::string_literal("D:20240101120000Z"),
            "ModDate" => Object::string_literal("D:20240101120000Z"),
        });
        let report = MetadataAnalyzer::new().analyze(&bytes);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn denylisted_software_is_flagged_case_insensitively() {
        let bytes = pdf_with_info(dictionary! {
            "Producer" => Object::string_literal("Adobe PHOTOSHOP 25.1"),
        });
        let report = MetadataAnalyzer::new().analyze(&bytes);
        assert_eq!(report.software, "Adobe PHOTOSHOP 25.1");
        assert_eq!(
            report.flags,
            vec!["Suspicious creation software: Adobe PHOTOSHOP 25.1"]
        );
    }

    #[test]
    fn creator_is_fallback_when_producer_missing() {
        let bytes = pdf_with_info(dictionary! {
            "Creator" => Object::string_literal("Inkscape 1.3"),
        });
        let report = MetadataAnalyzer::new().analyze(&bytes);
        assert_eq!(report.software, "Inkscape 1.3");
        assert_eq!(report.flags.len(), 1);
    }

    #[test]
    fn unparsable_dates_skip_the_ordering_check() {
        let bytes = pdf_with_info(dictionary! {
            "CreationDate" => Object::string_literal("sometime in spring"),
            "ModDate" => Object::string_literal("later that year"),
        });
        let report = MetadataAnalyzer::new().analyze(&bytes);
        assert!(report.flags.is_empty());
        // raw values survive for the report even when unparsable
        assert_eq!(report.created_date, "sometime in spring");
    }

    #[test]
    fn unreadable_container_yields_single_flag() {
        let report = MetadataAnalyzer::new().analyze(b"not a pdf at all");
        assert_eq!(report.flags, vec!["Failed to parse metadata"]);
        assert!(report.created_date.is_empty());
        assert!(report.author.is_empty());
    }

    #[test]
    fn normalizes_provider_date_stamps() {
        assert_eq!(normalize_pdf_date("D:20231115093015+05'30'"), "2023-11-15 09:30:15");
        assert_eq!(normalize_pdf_date("2023-11-15"), "2023-11-15");
        assert_eq!(normalize_pdf_date("D:2023"), "D:2023");
    }
}
