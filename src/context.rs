//! N-gram context classifier.
//!
//! Estimates whether a span's surrounding words indicate a location, a person,
//! an organization or something else. Patterns are the 1 to 3 lowercase words
//! immediately left of a span (`"the city of _"`) or right of it (`"_ said"`),
//! each with per-category counts collected offline.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::Span;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'.-]*").expect("valid regex"));

const MAX_CONTEXT_WORDS: usize = 3;

/// Entity categories distinguished by the context model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Loc,
    Per,
    Org,
    Misc,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Loc, Category::Per, Category::Org, Category::Misc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Loc => "LOC",
            Category::Per => "PER",
            Category::Org => "ORG",
            Category::Misc => "MISC",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Probability per category; always sums to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryProbabilities([f64; 4]);

impl CategoryProbabilities {
    pub fn uniform() -> Self {
        Self([0.25; 4])
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    /// Most likely category; the earlier category wins ties.
    pub fn most_likely(&self) -> Category {
        let mut best = Category::Loc;
        for category in Category::ALL {
            if self.get(category) > self.get(best) {
                best = category;
            }
        }
        best
    }
}

/// Immutable pattern table used at inference time.
#[derive(Debug, Clone, Default)]
pub struct ContextModel {
    patterns: BTreeMap<String, [u64; 4]>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PatternRow {
    pattern: String,
    #[serde(rename = "LOC")]
    loc: u64,
    #[serde(rename = "PER")]
    per: u64,
    #[serde(rename = "ORG")]
    org: u64,
    #[serde(rename = "MISC")]
    misc: u64,
}

impl ContextModel {
    /// Load a model TSV (optionally gzipped) with header `pattern LOC PER ORG MISC`.
    pub fn load_tsv(path: &Path) -> Result<Self> {
        info!("Loading context model from {}", path.display());
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut tsv = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b'\t')
            .quoting(false)
            .from_reader(reader);

        let mut patterns = BTreeMap::new();
        for row in tsv.deserialize::<PatternRow>() {
            let row = row.map_err(|e| Error::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !row.pattern.contains('_') {
                return Err(Error::ModelLoad {
                    path: path.to_path_buf(),
                    reason: format!("pattern '{}' has no '_' placeholder", row.pattern),
                });
            }
            patterns.insert(row.pattern, [row.loc, row.per, row.org, row.misc]);
        }

        info!("Loaded {} context patterns", patterns.len());
        Ok(Self { patterns })
    }

    pub fn save_tsv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_path(path)?;
        for (pattern, counts) in &self.patterns {
            writer.serialize(PatternRow {
                pattern: pattern.clone(),
                loc: counts[0],
                per: counts[1],
                org: counts[2],
                misc: counts[3],
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Category probabilities for the context around `span`.
    ///
    /// Every matching pattern contributes its relative category frequencies;
    /// the sum is normalized. Without any match the result is uniform.
    pub fn classify(&self, text: &str, span: &Span) -> CategoryProbabilities {
        let mut scores = [0.0f64; 4];
        for pattern in context_patterns(text, span) {
            let Some(counts) = self.patterns.get(&pattern) else {
                continue;
            };
            let sum: u64 = counts.iter().sum();
            if sum == 0 {
                continue;
            }
            for (score, count) in scores.iter_mut().zip(counts) {
                *score += *count as f64 / sum as f64;
            }
        }

        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            return CategoryProbabilities::uniform();
        }
        for score in scores.iter_mut() {
            *score /= total;
        }
        CategoryProbabilities(scores)
    }
}

/// Training-time accumulator producing a [`ContextModel`].
#[derive(Debug, Default)]
pub struct ContextModelBuilder {
    patterns: BTreeMap<String, [u64; 4]>,
}

impl ContextModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the contexts of one labelled span.
    pub fn add(&mut self, text: &str, span: &Span, category: Category) {
        for pattern in context_patterns(text, span) {
            self.patterns.entry(pattern).or_insert([0; 4])[category.index()] += 1;
        }
    }

    /// Drop patterns seen fewer than `min_count` times in total.
    pub fn prune(&mut self, min_count: u64) {
        self.patterns.retain(|_, counts| counts.iter().sum::<u64>() >= min_count);
    }

    pub fn build(self) -> ContextModel {
        ContextModel {
            patterns: self.patterns,
        }
    }
}

/// The last `n` words of `left`, lowercased. Only a growing tail of the
/// text is tokenized.
fn last_words(left: &str, n: usize) -> Vec<String> {
    let mut window = 64;
    loop {
        let mut start = left.len().saturating_sub(window);
        while !left.is_char_boundary(start) {
            start -= 1;
        }
        let words: Vec<&str> = WORD.find_iter(&left[start..]).map(|m| m.as_str()).collect();
        // with more than n words found, a word cut at the window edge is never used
        if start == 0 || words.len() > n {
            return words[words.len().saturating_sub(n)..]
                .iter()
                .map(|w| w.to_lowercase())
                .collect();
        }
        window *= 2;
    }
}

/// Left and right context patterns of `span`, shortest first.
fn context_patterns(text: &str, span: &Span) -> Vec<String> {
    let (Some(left), Some(right)) = (text.get(..span.start), text.get(span.end..)) else {
        return Vec::new();
    };
    let left_words = last_words(left, MAX_CONTEXT_WORDS);
    let right_words: Vec<String> = WORD
        .find_iter(right)
        .take(MAX_CONTEXT_WORDS)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    let mut patterns = Vec::new();
    for n in 1..=MAX_CONTEXT_WORDS.min(left_words.len()) {
        let words = &left_words[left_words.len() - n..];
        patterns.push(format!("{} _", words.join(" ")));
    }
    for n in 1..=right_words.len() {
        patterns.push(format!("_ {}", right_words[..n].join(" ")));
    }
    patterns
}
