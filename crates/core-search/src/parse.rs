use crate::{SearchResults, dedupe_by_title};
use core_model::{Candidate, FALLBACK_TITLE, safe_title};
use serde_json::Value;

pub const DEFAULT_SNIPPET: &str = "Vibe check: Certified bussing. 100% no cap.";
pub const DEFAULT_DISTANCE: &str = "Nearby";

/// Extract Maps-grounded candidates from a `generateContent` response body.
///
/// Grounding chunks without a `maps.title` are skipped; duplicated titles keep
/// their first occurrence. Anything missing yields an empty result rather than
/// an error.
pub fn parse_response(body: &Value) -> SearchResults {
    let first = body.pointer("/candidates/0");
    let text = first
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let chunks = first
        .and_then(|c| c.pointer("/groundingMetadata/groundingChunks"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let candidates = chunks
        .iter()
        .filter_map(|chunk| chunk.get("maps"))
        .filter_map(map_chunk)
        .collect();

    SearchResults {
        text,
        candidates: dedupe_by_title(candidates),
    }
}

fn map_chunk(maps: &Value) -> Option<Candidate> {
    let raw_title = maps
        .get("title")
        .filter(|t| !t.is_null() && t.as_str().is_none_or(|s| !s.trim().is_empty()))?;
    let title = safe_title(Some(raw_title), FALLBACK_TITLE);
    let snippet = maps
        .pointer("/placeAnswerSources/0/reviewSnippets/0")
        .filter(|s| !s.is_null());
    let description = match snippet {
        Some(value) => safe_title(Some(value), DEFAULT_SNIPPET),
        None => DEFAULT_SNIPPET.to_string(),
    };
    let mut candidate = Candidate::new(title)
        .with_distance(DEFAULT_DISTANCE)
        .with_description(description);
    if let Some(uri) = maps.get("uri").and_then(Value::as_str) {
        candidate = candidate.with_uri(uri);
    }
    Some(candidate)
}
