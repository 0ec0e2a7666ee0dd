//! Conversion between canonical records and the JSON strings stored on
//! Neo4j list properties.

use mindgraph_models::{DescriptionRecord, OriginalSentence};
use tracing::warn;

/// Serialize description records to the stored JSON-string form.
pub fn descriptions_to_json(records: &[DescriptionRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| serde_json::to_string(r).ok())
        .collect()
}

pub fn sentences_to_json(records: &[OriginalSentence]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| serde_json::to_string(r).ok())
        .collect()
}

/// Parse stored JSON strings, dropping malformed entries with a warning.
pub fn parse_descriptions(raw: &[String]) -> Vec<DescriptionRecord> {
    raw.iter()
        .filter_map(|s| match serde_json::from_str(s) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("⚠️  Malformed description record skipped: {e}");
                None
            }
        })
        .collect()
}

pub fn parse_sentences(raw: &[String]) -> Vec<OriginalSentence> {
    raw.iter()
        .filter_map(|s| match serde_json::from_str(s) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("⚠️  Malformed sentence record skipped: {e}");
                None
            }
        })
        .collect()
}

/// Whether any stored description carries non-empty text.
pub fn has_nonempty_description(raw: &[String]) -> bool {
    parse_descriptions(raw)
        .iter()
        .any(|d| !d.description.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> DescriptionRecord {
        DescriptionRecord {
            description: text.to_string(),
            source_id: "7".to_string(),
        }
    }

    #[test]
    fn round_trips_description_records() {
        let records = vec![record("Alice is an engineer."), record("")];
        let json = descriptions_to_json(&records);
        assert_eq!(parse_descriptions(&json), records);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let raw = vec!["not json".to_string(), serde_json::to_string(&record("ok")).unwrap()];
        let parsed = parse_descriptions(&raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "ok");
    }

    #[test]
    fn empty_descriptions_are_detected() {
        let empty = descriptions_to_json(&[record(""), record("   ")]);
        assert!(!has_nonempty_description(&empty));
        let full = descriptions_to_json(&[record(""), record("text")]);
        assert!(has_nonempty_description(&full));
    }

    #[test]
    fn sentence_records_keep_scores_in_storage() {
        let records = vec![OriginalSentence {
            original_sentence: "Alice works at Acme.".into(),
            source_id: "7".into(),
            score: Some(1.0),
        }];
        let json = sentences_to_json(&records);
        assert!(json[0].contains("score"));
        let parsed = parse_sentences(&json);
        assert_eq!(parsed[0].score, Some(1.0));
    }
}
