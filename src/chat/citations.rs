//! Best-effort citation extraction from answer text.
//!
//! The assistant is prompted to cite as `[Source: name, Page: n]` or
//! `[Source: name, Time: mm:ss]`. Parsing free-form model output is
//! inherently fragile, so the extracted records are advisory: nothing
//! downstream may depend on every citation being recovered.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Citation, SourceType};

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[Source: ([^,\]]+), (?:Page|Time): ([^\]]+)\]").expect("valid regex")
    })
}

/// Extract citations in order of appearance; 1-based ids.
///
/// `source_id`, `source_type`, and `preview_text` cannot be recovered from
/// the text alone and are emitted as placeholders.
pub fn extract_citations(answer: &str) -> Vec<Citation> {
    citation_pattern()
        .captures_iter(answer)
        .enumerate()
        .map(|(i, caps)| Citation {
            citation_id: i + 1,
            source_id: String::new(),
            source_name: caps[1].trim().to_string(),
            source_type: SourceType::Document,
            location: caps[2].trim().to_string(),
            preview_text: String::new(),
            confidence_score: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_page_and_time_citations_in_order() {
        let answer = "Linear algebra studies vectors [Source: Math.pdf, Page: 5]. \
                      See also [Source: Video.mp4, Time: 02:34].";
        let citations = extract_citations(answer);

        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].citation_id, 1);
        assert_eq!(citations[0].source_name, "Math.pdf");
        assert_eq!(citations[0].location, "5");
        assert_eq!(citations[1].citation_id, 2);
        assert_eq!(citations[1].source_name, "Video.mp4");
        assert_eq!(citations[1].location, "02:34");
    }

    #[test]
    fn placeholders_stay_empty() {
        let citations = extract_citations("[Source: Notes.pdf, Page: 12]");
        assert_eq!(citations[0].source_id, "");
        assert_eq!(citations[0].preview_text, "");
        assert!(citations[0].confidence_score.is_none());
    }

    #[test]
    fn non_matching_text_yields_no_citations() {
        assert!(extract_citations("no citations here").is_empty());
        assert!(extract_citations("[Source: broken").is_empty());
        assert!(extract_citations("[Source: x, Line: 3]").is_empty());
    }

    #[test]
    fn whitespace_around_fields_is_trimmed() {
        let citations = extract_citations("[Source:  Math.pdf , Page:  5 ]");
        assert_eq!(citations[0].source_name, "Math.pdf");
        assert_eq!(citations[0].location, "5");
    }
}
