//! Heuristic credibility and relevance scores for web hits.

use std::collections::HashSet;

const TRUSTED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "edu",
    "gov",
    "nih.gov",
    "who.int",
    "nature.com",
    "science.org",
    "arxiv.org",
    "ieee.org",
    "acm.org",
    "springer.com",
    "elsevier.com",
    "tandfonline.com",
];

const ACADEMIC_KEYWORDS: &[&str] = &["research", "study", "journal", "paper", "academic"];

const QUALITY_INDICATORS: &[&str] = &["study", "research", "analysis", "evidence", "data"];

/// The host part (with port, if any) of `url`, lowercased.
pub fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.to_lowercase()
}

/// How trustworthy a hit looks, in [0.5, 1.0].
///
/// Starts at 0.5 and adds: 0.3 for a trusted domain, 0.1 per academic
/// keyword found in the domain or title, 0.05 per quality indicator in the
/// snippet, 0.1 for a PDF link and 0.05 when `current_year` appears in the
/// URL or title.
pub fn credibility_score(url: &str, title: &str, snippet: &str, current_year: i32) -> f32 {
    let mut score = 0.5f32;
    let domain = domain_of(url);
    let title = title.to_lowercase();
    let snippet = snippet.to_lowercase();

    if TRUSTED_DOMAINS.iter().any(|trusted| domain.contains(trusted)) {
        score += 0.3;
    }
    for keyword in ACADEMIC_KEYWORDS {
        if domain.contains(keyword) || title.contains(keyword) {
            score += 0.1;
        }
    }
    for indicator in QUALITY_INDICATORS {
        if snippet.contains(indicator) {
            score += 0.05;
        }
    }
    if url.contains("/pdf/") || url.contains(".pdf") {
        score += 0.1;
    }
    let year = current_year.to_string();
    if url.contains(&year) || title.contains(&year) {
        score += 0.05;
    }

    score.min(1.0)
}

/// Share of query words found in the title (weight 0.7) and in the snippet
/// (weight 0.3), in [0, 1].
pub fn relevance_score(query: &str, title: &str, snippet: &str) -> f32 {
    let words = |text: &str| -> HashSet<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    };
    let query_terms = words(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let title_terms = words(title);
    let snippet_terms = words(snippet);

    let total = query_terms.len() as f32;
    let title_score = query_terms.intersection(&title_terms).count() as f32 / total;
    let snippet_score = query_terms.intersection(&snippet_terms).count() as f32 / total;

    (title_score * 0.7 + snippet_score * 0.3).min(1.0)
}
