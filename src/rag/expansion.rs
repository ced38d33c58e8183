//! Adaptive threshold and query expansion. A short,
//! generic query ("pain", "back") retrieves poorly against a strict
//! similarity floor, so short queries get both a lowered threshold and a
//! handful of related clinical terms appended before embedding.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::rag::language::Language;

/// Queries at or below this word count are considered short/generic.
const SHORT_QUERY_WORD_THRESHOLD: usize = 3;

/// `min_similarity` is never lowered past this floor, regardless of how
/// short the query is.
const MIN_SIMILARITY_FLOOR: f32 = 0.15;

pub fn should_expand_query(query: &str) -> bool {
    query.split_whitespace().count() <= SHORT_QUERY_WORD_THRESHOLD
}

/// Lowers `configured_min_similarity` toward the floor for short queries;
/// longer queries are specific enough to keep the caller's threshold as-is.
pub fn compute_adaptive_threshold(configured_min_similarity: f32, query: &str) -> f32 {
    if should_expand_query(query) {
        configured_min_similarity.min(MIN_SIMILARITY_FLOOR.max(configured_min_similarity * 0.5))
    } else {
        configured_min_similarity
    }
}

type ExpansionTable = HashMap<(&'static str, &'static str), &'static [&'static str]>;

static EXPANSION_TABLE: Lazy<ExpansionTable> = Lazy::new(|| {
    let mut table: ExpansionTable = HashMap::new();
    table.insert(("en", "pain"), &["discomfort", "ache", "tenderness"]);
    table.insert(("en", "back"), &["lumbar", "spine", "lower back"]);
    table.insert(("en", "knee"), &["patella", "joint", "meniscus"]);
    table.insert(("en", "headache"), &["migraine", "tension headache"]);
    table.insert(("he", "כאב"), &["אי נוחות", "רגישות"]);
    table.insert(("he", "גב"), &["עמוד שדרה", "גב תחתון"]);
    table
});

/// Appends the first matching expansion terms for each recognized keyword
/// in `query`, in the query's own language. Returns the query unchanged if
/// nothing in the table matches, or if the query isn't short enough to
/// trigger expansion.
pub fn expand_query(query: &str, language: Language) -> String {
    if !should_expand_query(query) {
        return query.to_string();
    }

    let lang_code = language.code();
    let lowercase_query = query.to_lowercase();
    let mut extra_terms: Vec<&'static str> = Vec::new();

    for ((lang, keyword), expansions) in EXPANSION_TABLE.iter() {
        if *lang != lang_code {
            continue;
        }
        if lowercase_query.contains(&keyword.to_lowercase()) {
            extra_terms.extend(expansions.iter().copied());
        }
    }

    if extra_terms.is_empty() {
        return query.to_string();
    }

    format!("{query} {}", extra_terms.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_query_triggers_expansion_flag() {
        assert!(should_expand_query("back pain"));
        assert!(!should_expand_query("chronic lower back pain after the fall last tuesday"));
    }

    #[test]
    fn adaptive_threshold_lowers_for_short_queries_but_respects_floor() {
        let lowered = compute_adaptive_threshold(0.7, "pain");
        assert!(lowered < 0.7);
        assert!(lowered >= MIN_SIMILARITY_FLOOR);
    }

    #[test]
    fn adaptive_threshold_unchanged_for_long_queries() {
        let query = "the patient reports persistent pain in the lower back since last month";
        assert_eq!(compute_adaptive_threshold(0.7, query), 0.7);
    }

    #[test]
    fn expand_query_appends_related_english_terms() {
        let expanded = expand_query("back pain", Language::English);
        assert!(expanded.contains("back pain"));
        assert!(expanded.len() > "back pain".len());
    }

    #[test]
    fn expand_query_leaves_unrecognized_terms_untouched() {
        assert_eq!(expand_query("xyz", Language::English), "xyz");
    }
}
