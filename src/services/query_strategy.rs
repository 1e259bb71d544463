//! Search query generation for claim verification.
//!
//! Each claim type has its own extraction routine that pulls names,
//! institutions, years, percentages or product tokens out of the claim text
//! and turns them into targeted queries. When nothing useful is extracted
//! the claim text itself (first 100 characters) becomes the query, so the
//! result is never empty.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::claim::{ClaimType, QuerySet};

/// Default number of primary queries handed to the evidence retriever.
pub const DEFAULT_MAX_QUERIES: usize = 3;

/// Length of the verbatim claim excerpt used when extraction finds nothing.
const EXCERPT_CHARS: usize = 100;

/// Maximum number of keywords kept when building keyword queries.
const MAX_KEYWORDS: usize = 8;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "claims", "could", "does", "from",
    "have", "into", "just", "like", "more", "most", "much", "only", "over", "said", "says",
    "some", "such", "than", "that", "their", "them", "then", "there", "these", "they", "this",
    "those", "very", "were", "what", "when", "which", "while", "will", "with", "would", "your",
];

// ── Patterns ─────────────────────────────────────────────────────────────

static TITLED_NAME_RE: OnceLock<Regex> = OnceLock::new();
static PROPER_NAME_RE: OnceLock<Regex> = OnceLock::new();
static INSTITUTION_RE: OnceLock<Regex> = OnceLock::new();
static JOURNAL_RE: OnceLock<Regex> = OnceLock::new();
static YEAR_RE: OnceLock<Regex> = OnceLock::new();
static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
static PRODUCT_CUE_RE: OnceLock<Regex> = OnceLock::new();
static PRODUCT_TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static WORD_RE: OnceLock<Regex> = OnceLock::new();

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("query strategy patterns are valid"))
}

fn titled_name_re() -> &'static Regex {
    cached(
        &TITLED_NAME_RE,
        r"\b(?:Dr\.?|Doctor|Prof\.?|Professor|Nurse)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){0,2})",
    )
}

fn proper_name_re() -> &'static Regex {
    cached(&PROPER_NAME_RE, r"\b([A-Z][a-z]+(?:\s+[A-Z]\.)?\s+[A-Z][a-z]+)\b")
}

fn institution_re() -> &'static Regex {
    cached(
        &INSTITUTION_RE,
        r"\b((?:University|Institute|College|School|Hospital)\s+of\s+[A-Z][A-Za-z]+(?:\s+[A-Z][A-Za-z]+)*|(?:[A-Z][A-Za-z]+\s+)+(?:University|Institute|College|Hospital|Clinic|Foundation|Center|Centre))\b",
    )
}

fn journal_re() -> &'static Regex {
    cached(
        &JOURNAL_RE,
        r"(?i:published\s+in|journal\s+of|appeared\s+in)\s+(?:the\s+)?([A-Z][A-Za-z]+(?:\s+(?:of\s+)?[A-Z][A-Za-z]+)*)",
    )
}

fn year_re() -> &'static Regex {
    cached(&YEAR_RE, r"\b((?:19|20)\d{2})\b")
}

fn percent_re() -> &'static Regex {
    cached(&PERCENT_RE, r"(\d+(?:\.\d+)?)\s?(?:%|percent\b)")
}

fn product_cue_re() -> &'static Regex {
    cached(
        &PRODUCT_CUE_RE,
        r"\b(?i:called|named|brand|product|supplement|taking|using)\s+([A-Z][\w-]*(?:\s+[A-Z][\w-]*)?)",
    )
}

fn product_token_re() -> &'static Regex {
    cached(&PRODUCT_TOKEN_RE, r"\b([A-Z][A-Za-z]*\d+[A-Za-z0-9]*|[A-Z][A-Za-z0-9]+[®™])")
}

fn word_re() -> &'static Regex {
    cached(&WORD_RE, r"[A-Za-z][A-Za-z'-]+")
}

// ── Extraction helpers ──────────────────────────────────────────────────

fn captures(re: &Regex, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for cap in re.captures_iter(text) {
        if let Some(m) = cap.get(1) {
            let value = m.as_str().trim().to_string();
            if !value.is_empty() && !found.contains(&value) {
                found.push(value);
            }
        }
    }
    found
}

fn person_names(text: &str) -> Vec<String> {
    let mut names = captures(titled_name_re(), text);
    for name in captures(proper_name_re(), text) {
        let is_institution = institution_re().is_match(&name);
        if !is_institution && !names.iter().any(|n| n.contains(&name) || name.contains(n)) {
            names.push(name);
        }
    }
    names
}

fn keywords(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for m in word_re().find_iter(text) {
        let word = m.as_str().to_lowercase();
        if word.len() > 3 && !STOPWORDS.contains(&word.as_str()) && !words.contains(&word) {
            words.push(word);
        }
        if words.len() >= MAX_KEYWORDS {
            break;
        }
    }
    words
}

fn keyword_phrase(text: &str, limit: usize) -> Option<String> {
    let words = keywords(text);
    if words.is_empty() {
        None
    } else {
        Some(words.into_iter().take(limit).collect::<Vec<_>>().join(" "))
    }
}

/// First `EXCERPT_CHARS` characters of the claim, whitespace-normalised.
pub fn claim_excerpt(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(EXCERPT_CHARS).collect()
}

fn push_unique(queries: &mut Vec<String>, query: String) {
    let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if !query.is_empty() && !queries.contains(&query) {
        queries.push(query);
    }
}

// ── Per-type strategies ─────────────────────────────────────────────────

fn credential_queries(text: &str) -> Vec<String> {
    let names = person_names(text);
    let institutions = captures(institution_re(), text);
    let mut queries = Vec::new();

    if let Some(name) = names.first() {
        push_unique(&mut queries, format!("\"{}\" medical license", name));
        match institutions.first() {
            Some(inst) => push_unique(&mut queries, format!("\"{}\" {}", name, inst)),
            None => push_unique(&mut queries, format!("\"{}\" credentials board certification", name)),
        }
    }
    if let Some(inst) = institutions.first() {
        push_unique(&mut queries, format!("{} faculty directory", inst));
    }
    queries
}

fn publication_queries(text: &str) -> Vec<String> {
    let names = person_names(text);
    let journals = captures(journal_re(), text);
    let years = captures(year_re(), text);
    let topic = keyword_phrase(text, 4);
    let mut queries = Vec::new();

    if let Some(name) = names.first() {
        let year = years.first().map(String::as_str).unwrap_or("");
        push_unique(&mut queries, format!("{} {} publication", name, year));
    }
    if let Some(journal) = journals.first() {
        let topic = topic.as_deref().unwrap_or("");
        push_unique(&mut queries, format!("\"{}\" {}", journal, topic));
    }
    if let (Some(name), Some(topic)) = (names.first(), topic.as_deref()) {
        push_unique(&mut queries, format!("{} {} pubmed", name, topic));
    }
    queries
}

fn study_queries(text: &str) -> Vec<String> {
    let institutions = captures(institution_re(), text);
    let years = captures(year_re(), text);
    let percents = captures(percent_re(), text);
    let topic = keyword_phrase(text, 4);
    let mut queries = Vec::new();

    if let Some(inst) = institutions.first() {
        let year = years.first().map(String::as_str).unwrap_or("");
        push_unique(&mut queries, format!("{} study {}", inst, year));
    }
    if let (Some(pct), Some(topic)) = (percents.first(), topic.as_deref()) {
        push_unique(&mut queries, format!("study {}% {}", pct, topic));
    }
    if let Some(topic) = topic.as_deref() {
        if !years.is_empty() || !institutions.is_empty() || !percents.is_empty() {
            push_unique(&mut queries, format!("{} clinical study results", topic));
        }
    }
    queries
}

fn absence_queries(text: &str) -> Vec<String> {
    let mut queries = Vec::new();
    if let Some(topic) = keyword_phrase(text, 5) {
        push_unique(&mut queries, format!("{} evidence", topic));
        push_unique(&mut queries, format!("{} studies research", topic));
    }
    queries
}

fn product_queries(text: &str) -> Vec<String> {
    let mut products = captures(product_cue_re(), text);
    for token in captures(product_token_re(), text) {
        if !products.contains(&token) {
            products.push(token);
        }
    }
    let mut queries = Vec::new();
    if let Some(product) = products.first() {
        push_unique(&mut queries, format!("\"{}\" clinical trial", product));
        push_unique(&mut queries, format!("\"{}\" efficacy study", product));
        push_unique(&mut queries, format!("\"{}\" side effects review", product));
    }
    queries
}

fn other_queries(text: &str) -> Vec<String> {
    let mut queries = Vec::new();
    if let Some(phrase) = keyword_phrase(text, MAX_KEYWORDS) {
        push_unique(&mut queries, phrase);
    }
    if let Some(name) = person_names(text).first() {
        push_unique(&mut queries, format!("\"{}\" fact check", name));
    }
    queries
}

fn targeted_queries(text: &str, claim_type: ClaimType) -> Vec<String> {
    match claim_type {
        ClaimType::Credential => credential_queries(text),
        ClaimType::Publication => publication_queries(text),
        ClaimType::Study => study_queries(text),
        ClaimType::Absence => absence_queries(text),
        ClaimType::ProductEfficacy => product_queries(text),
        ClaimType::Other => other_queries(text),
    }
}

/// Category-generic queries used when specific entities lead nowhere.
fn generic_queries(claim_type: ClaimType) -> &'static [&'static str] {
    match claim_type {
        ClaimType::Credential => &[
            "doctor medical license verification",
            "physician board certification lookup",
        ],
        ClaimType::Publication => &[
            "peer reviewed publication database search",
            "journal article retraction database",
        ],
        ClaimType::Study => &[
            "clinical study results registry",
            "systematic review meta analysis",
        ],
        ClaimType::Absence => &[
            "scientific evidence review",
            "research literature search",
        ],
        ClaimType::ProductEfficacy => &[
            "supplement efficacy clinical evidence",
            "product health claims FTC",
        ],
        ClaimType::Other => &["fact check claim verification"],
    }
}

/// The most specific entity the claim mentions, used to anchor negative queries.
fn primary_entity(text: &str, claim_type: ClaimType) -> Option<String> {
    let entity = match claim_type {
        ClaimType::Credential => person_names(text).into_iter().next(),
        ClaimType::Publication => person_names(text)
            .into_iter()
            .next()
            .or_else(|| captures(journal_re(), text).into_iter().next()),
        ClaimType::Study => captures(institution_re(), text).into_iter().next(),
        ClaimType::ProductEfficacy => captures(product_cue_re(), text)
            .into_iter()
            .next()
            .or_else(|| captures(product_token_re(), text).into_iter().next()),
        ClaimType::Absence | ClaimType::Other => None,
    };
    entity.or_else(|| keyword_phrase(text, 5))
}

fn disconfirming_terms(claim_type: ClaimType) -> &'static str {
    match claim_type {
        ClaimType::Credential => "fraud fake unlicensed disciplinary complaint",
        ClaimType::Publication => "retracted debunked criticism",
        ClaimType::Study => "study flawed criticism retracted",
        ClaimType::Absence => "proven effective study evidence",
        ClaimType::ProductEfficacy => "lawsuit FTC false advertising complaint",
        ClaimType::Other => "debunked false misleading",
    }
}

// ── Public API ───────────────────────────────────────────────────────────

/// Primary search queries for a claim, most specific first.
///
/// Never empty: without usable entities the claim excerpt is returned, and
/// for blank claims the type's generic query. `max_queries` below 1 is treated as 1.
pub fn generate(claim_text: &str, claim_type: ClaimType, max_queries: usize) -> Vec<String> {
    let limit = max_queries.max(1);
    let mut queries = targeted_queries(claim_text, claim_type);

    if queries.is_empty() {
        let excerpt = claim_excerpt(claim_text);
        if !excerpt.is_empty() {
            queries.push(excerpt);
        }
    }
    if queries.is_empty() {
        queries.push(generic_queries(claim_type)[0].to_string());
    }

    queries.truncate(limit);
    queries
}

/// Primary, fallback and negative queries. Every list has at least one entry.
pub fn generate_multi(claim_text: &str, claim_type: ClaimType) -> QuerySet {
    let primary = generate(claim_text, claim_type, DEFAULT_MAX_QUERIES);

    let fallback = generic_queries(claim_type)
        .iter()
        .map(|q| q.to_string())
        .collect();

    let anchor = primary_entity(claim_text, claim_type)
        .or_else(|| Some(claim_excerpt(claim_text)).filter(|e| !e.is_empty()))
        .unwrap_or_else(|| generic_queries(claim_type)[0].to_string());
    let negative = vec![format!("{} {}", anchor, disconfirming_terms(claim_type))];

    QuerySet {
        primary,
        fallback,
        negative,
    }
}
