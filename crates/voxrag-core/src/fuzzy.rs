//! Edit-distance fallback matcher for transcription-damaged queries.
//!
//! Speech-to-text routinely misspells proper nouns ("Sarah Chin" for
//! "Sarah Chen") in ways that wreck embedding similarity while staying one
//! or two edits away from the original. [`FuzzyMatcher`] scores a query
//! against a pool of candidate texts with two techniques:
//!
//! 1. **Name-confusion table.** A [`NameConfusionTable`] maps a canonical
//!    name to its known transcription variants. When the query contains a
//!    variant of an entry and the candidate contains a variant of the same
//!    entry, the pair is scored by normalized edit distance and accepted
//!    above `name_threshold` (0.6).
//! 2. **Whole-query scan.** The lowercased query is compared with the first
//!    `prefix_chars` (100) characters of the candidate and accepted above
//!    `query_threshold` (0.7).
//!
//! A candidate's score is the best accepted score; it qualifies when that
//! score exceeds `min_score` (0.5). Every comparison is O(len(a)·len(b)), so
//! callers bound the pool size.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Seed variants for common East-Asian transliteration clusters and common
/// Hispanic surnames. Extend at runtime with [`NameConfusionTable::insert`].
const SEED_NAMES: &[(&str, &[&str])] = &[
    ("chen", &["chen", "chin", "chan", "cheng", "chien", "tchen"]),
    ("zhang", &["zhang", "chang", "jang", "zang", "cheung"]),
    ("wang", &["wang", "wong", "whang", "vang"]),
    ("li", &["li", "lee", "leigh", "ly"]),
    ("liu", &["liu", "lau", "lew", "lio"]),
    ("huang", &["huang", "hwang", "whong", "hoang"]),
    ("zhou", &["zhou", "chou", "chow", "jou"]),
    ("zhao", &["zhao", "chao", "jao"]),
    ("xu", &["xu", "hsu", "shu", "su"]),
    ("wu", &["wu", "woo", "ng"]),
    ("nguyen", &["nguyen", "ngyuen", "nuyen", "nguyin", "newyen"]),
    ("kim", &["kim", "kym", "gim", "keem"]),
    ("park", &["park", "pak", "bak", "parke"]),
    ("tanaka", &["tanaka", "tanica", "tanacka"]),
    ("yamamoto", &["yamamoto", "yamamota", "yammamoto"]),
    ("garcia", &["garcia", "garsia", "garcya", "gracia"]),
    ("rodriguez", &["rodriguez", "rodrigues", "rodriquez", "rodrigez"]),
    ("hernandez", &["hernandez", "hernandes", "fernandez", "ernandez"]),
    ("martinez", &["martinez", "martines", "martinex"]),
    ("lopez", &["lopez", "lopes", "lopaz"]),
    ("gonzalez", &["gonzalez", "gonzales", "gonsalez", "gonzalas"]),
    ("perez", &["perez", "peres", "pérez"]),
    ("sanchez", &["sanchez", "sanches", "sanchess"]),
    ("ramirez", &["ramirez", "ramires", "ramiris"]),
    ("jimenez", &["jimenez", "gimenez", "himenez", "jiminez"]),
];

/// Levenshtein distance over Unicode scalar values.
///
/// Insertion, deletion, and substitution each cost 1. Symmetric, and zero
/// exactly when `a == b`.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - edit_distance / max(len(a), len(b))`, in `[0, 1]`.
///
/// Two empty strings are identical and score `1.0`.
pub fn similarity(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f32 / max_len as f32
}

/// Lowercased alphanumeric word tokens.
fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Canonical name → known transcription variants.
#[derive(Debug, Clone)]
pub struct NameConfusionTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl NameConfusionTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add variants for `canonical`. The canonical spelling is always
    /// treated as one of its own variants.
    pub fn insert<I, S>(&mut self, canonical: &str, variants: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical = canonical.to_lowercase();
        let entry = self.entries.entry(canonical.clone()).or_default();
        if !entry.contains(&canonical) {
            entry.push(canonical);
        }
        for v in variants {
            let v = v.as_ref().to_lowercase();
            if !entry.contains(&v) {
                entry.push(v);
            }
        }
    }

    /// The seed table with `extra` entries merged in.
    pub fn seeded_with(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::default();
        for (canonical, variants) in extra {
            table.insert(canonical, variants);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Variants of `canonical`, if the table has an entry for it.
    pub fn variants(&self, canonical: &str) -> Option<&[String]> {
        self.entries.get(canonical).map(|v| v.as_slice())
    }

    /// Best name-pair score between query tokens and candidate tokens.
    fn best_pair_score(&self, query: &HashSet<String>, candidate: &HashSet<String>) -> Option<f32> {
        let mut best: Option<f32> = None;
        for variants in self.entries.values() {
            for qv in variants.iter().filter(|v| query.contains(*v)) {
                for cv in variants.iter().filter(|v| candidate.contains(*v)) {
                    let score = similarity(qv, cv);
                    if best.map_or(true, |b| score > b) {
                        best = Some(score);
                    }
                }
            }
        }
        best
    }
}

impl Default for NameConfusionTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (canonical, variants) in SEED_NAMES {
            table.insert(canonical, variants.iter());
        }
        table
    }
}

/// Thresholds for [`FuzzyMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// A candidate qualifies when its best score exceeds this.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Name-pair scores must exceed this to count.
    #[serde(default = "default_name_threshold")]
    pub name_threshold: f32,
    /// Whole-query scores must exceed this to count.
    #[serde(default = "default_query_threshold")]
    pub query_threshold: f32,
    /// Candidate prefix length for the whole-query comparison.
    #[serde(default = "default_prefix_chars")]
    pub prefix_chars: usize,
    /// Extra name-confusion entries (canonical → variants), merged into
    /// the seed table. Variants of a seeded name extend that entry.
    #[serde(default)]
    pub names: BTreeMap<String, Vec<String>>,
}

fn default_min_score() -> f32 {
    0.5
}
fn default_name_threshold() -> f32 {
    0.6
}
fn default_query_threshold() -> f32 {
    0.7
}
fn default_prefix_chars() -> usize {
    100
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            name_threshold: default_name_threshold(),
            query_threshold: default_query_threshold(),
            prefix_chars: default_prefix_chars(),
            names: BTreeMap::new(),
        }
    }
}

/// A qualifying candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Position of the candidate in the input pool.
    pub index: usize,
    pub text: String,
    /// Best accepted score, in `(0, 1]`.
    pub score: f32,
}

/// Scores candidate texts against a query. See the module docs.
#[derive(Debug, Clone, Default)]
pub struct FuzzyMatcher {
    table: NameConfusionTable,
    config: FuzzyConfig,
}

impl FuzzyMatcher {
    pub fn new(table: NameConfusionTable, config: FuzzyConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &NameConfusionTable {
        &self.table
    }

    /// Score one candidate; `None` when it does not qualify.
    pub fn score(&self, query: &str, candidate: &str) -> Option<f32> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return None;
        }
        self.score_prepared(&query_lower, &tokens(&query_lower), candidate)
    }

    fn score_prepared(
        &self,
        query_lower: &str,
        query_tokens: &HashSet<String>,
        candidate: &str,
    ) -> Option<f32> {
        let candidate_lower = candidate.to_lowercase();
        let mut best: Option<f32> = None;

        if let Some(s) = self
            .table
            .best_pair_score(query_tokens, &tokens(&candidate_lower))
        {
            if s > self.config.name_threshold {
                best = Some(s);
            }
        }

        let prefix: String = candidate_lower.chars().take(self.config.prefix_chars).collect();
        let s = similarity(query_lower, &prefix);
        if s > self.config.query_threshold && best.map_or(true, |b| s > b) {
            best = Some(s);
        }

        best.filter(|s| *s > self.config.min_score)
    }

    /// Rank `candidates` against `query`, best first.
    ///
    /// Only qualifying candidates are returned; ties keep pool order.
    pub fn rank<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> Vec<FuzzyMatch> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokens(&query_lower);

        let mut matches: Vec<FuzzyMatch> = candidates
            .iter()
            .enumerate()
            .filter_map(|(index, text)| {
                let text = text.as_ref();
                self.score_prepared(&query_lower, &query_tokens, text)
                    .map(|score| FuzzyMatch {
                        index,
                        text: text.to_string(),
                        score,
                    })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &[&str] = &[
        "", "a", "chen", "chin", "sarah", "Sarah Chen", "kitten", "sitting", "pérez", "perez",
        "naïve", "abcdef", "fedcba", "日本語", "日本",
    ];

    #[test]
    fn edit_distance_known_values() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("chen", "chin"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("pérez", "perez"), 1);
        assert_eq!(edit_distance("日本語", "日本"), 1);
    }

    #[test]
    fn edit_distance_is_symmetric_and_reflexive() {
        for a in WORDS {
            assert_eq!(edit_distance(a, a), 0, "d({a:?},{a:?})");
            for b in WORDS {
                assert_eq!(edit_distance(a, b), edit_distance(b, a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn similarity_bounds() {
        for a in WORDS {
            for b in WORDS {
                let s = similarity(a, b);
                assert!((0.0..=1.0).contains(&s), "{a:?} vs {b:?} = {s}");
            }
        }
        assert_eq!(similarity("chen", "chin"), 0.75);
    }

    #[test]
    fn name_table_matches_transcription_variant() {
        let matcher = FuzzyMatcher::default();
        let score = matcher
            .score(
                "who is sarah chin",
                "Row 1: name: Sarah Chen, role: Engineer",
            )
            .expect("should match");
        assert!(score > 0.6, "score {}", score);
    }

    #[test]
    fn name_table_requires_same_entry() {
        let matcher = FuzzyMatcher::default();
        // "chin" belongs to chen, "garcia" to garcia: no shared entry.
        assert!(matcher.score("sarah chin", "Row 1: name: Maria Garcia").is_none());
    }

    #[test]
    fn whole_query_scan_catches_near_duplicates() {
        let matcher = FuzzyMatcher::new(NameConfusionTable::empty(), FuzzyConfig::default());
        let score = matcher
            .score("deployment runbok", "Deployment runbook")
            .expect("near-identical prefix should match");
        assert!(score > 0.7);
        assert!(matcher.score("deployment runbook", "Quarterly revenue summary").is_none());
    }

    #[test]
    fn rank_is_sorted_and_bounded() {
        let matcher = FuzzyMatcher::default();
        let pool = vec![
            "Row 3: name: Wei Zhang, role: Designer".to_string(),
            "Row 1: name: Sarah Chen, role: Engineer".to_string(),
            "who is sarah chin".to_string(),
            "Totally unrelated paragraph about gardening.".to_string(),
        ];
        let ranked = matcher.rank("who is sarah chin", &pool);
        assert!(ranked.len() >= 2);
        assert_eq!(ranked[0].index, 2);
        assert_eq!(ranked[0].score, 1.0);
        assert!(ranked.iter().any(|m| m.index == 1));
        assert!(!ranked.iter().any(|m| m.index == 3));
        for m in &ranked {
            assert!(m.score > 0.0 && m.score <= 1.0);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn empty_query_matches_nothing() {
        let matcher = FuzzyMatcher::default();
        assert!(matcher.rank("   ", &["anything"]).is_empty());
    }

    #[test]
    fn table_is_extendable() {
        let mut table = NameConfusionTable::empty();
        table.insert("Aoife", ["aoifa", "eefa"]);
        let variants = table.variants("aoife").unwrap();
        assert!(variants.contains(&"aoife".to_string()));
        assert!(variants.contains(&"eefa".to_string()));

        let matcher = FuzzyMatcher::new(table, FuzzyConfig::default());
        let score = matcher.score("call aoifa", "Aoife Byrne, Director").unwrap();
        assert!((score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn configured_names_extend_the_seed_table() {
        let config: FuzzyConfig =
            serde_json::from_str(r#"{"names": {"aoife": ["aoifa", "eefa"], "chen": ["shen"]}}"#)
                .unwrap();
        let table = NameConfusionTable::seeded_with(&config.names);
        assert_eq!(table.len(), SEED_NAMES.len() + 1);
        let chen = table.variants("chen").unwrap();
        assert!(chen.contains(&"chin".to_string()));
        assert!(chen.contains(&"shen".to_string()));

        let matcher = FuzzyMatcher::new(table, config);
        assert!(matcher.score("call aoifa", "Aoife Byrne, Director").is_some());
        assert!(FuzzyMatcher::default()
            .score("call aoifa", "Aoife Byrne, Director")
            .is_none());
    }

    #[test]
    fn seed_table_has_both_clusters() {
        let table = NameConfusionTable::default();
        assert!(table.variants("chen").is_some());
        assert!(table.variants("gonzalez").is_some());
        assert_eq!(table.len(), SEED_NAMES.len());
    }
}
