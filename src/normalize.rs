//! Place name normalization.
//!
//! Two levels: [`Normalizer::normalize`] produces the display form used for
//! lookups (marks trimmed, whitespace collapsed, abbreviations canonicalized),
//! and [`fold_key`] produces the case- and accent-insensitive key under which
//! candidates are grouped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

use crate::error::Result;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"#.*").expect("valid regex"));

const TRIMMED_MARKS: &[char] = &['©', '®', '™'];

const BUILTIN_ABBREVIATIONS: &[(&str, &str)] = &[
    ("US", "U.S."),
    ("USA", "U.S.A."),
    ("UK", "U.K."),
    ("UAE", "U.A.E."),
    ("EU", "E.U."),
];

/// Canonicalizes place names before gazetteer lookup.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Abbreviation -> canonical form, matched on the whole name
    abbreviations: HashMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            abbreviations: BUILTIN_ABBREVIATIONS
                .iter()
                .map(|(abbr, canonical)| (abbr.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl Normalizer {
    /// A normalizer without any abbreviation table.
    pub fn empty() -> Self {
        Self {
            abbreviations: HashMap::new(),
        }
    }

    pub fn add_abbreviation(&mut self, abbreviation: &str, canonical: &str) {
        self.abbreviations
            .insert(abbreviation.trim().to_string(), canonical.trim().to_string());
    }

    pub fn abbreviation_count(&self) -> usize {
        self.abbreviations.len()
    }

    /// Normalize a raw span value.
    pub fn normalize(&self, name: &str) -> String {
        let without_marks: String = name.chars().filter(|c| !TRIMMED_MARKS.contains(c)).collect();
        let collapsed = WHITESPACE.replace_all(without_marks.trim(), " ").into_owned();
        match self.abbreviations.get(&collapsed) {
            Some(canonical) => canonical.clone(),
            None => collapsed,
        }
    }

    /// Load extra abbreviations from every `*.txt` file under `dir`, recursively.
    ///
    /// Lines look like `abbr => canonical` or `abbr1, abbr2 => canonical`;
    /// `#` starts a comment.
    pub fn load_from_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            warn!("Abbreviation directory not found: {}", dir.display());
            return Ok(());
        }

        info!("Loading abbreviations from {}", dir.display());
        let before = self.abbreviations.len();

        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |e| e != "txt") {
                continue;
            }
            self.load_file(path)?;
        }

        info!(
            "Loaded {} abbreviations",
            self.abbreviations.len().saturating_sub(before)
        );
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        for (number, line) in content.lines().enumerate() {
            let line = COMMENT.replace(line, "");
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((lefts, canonical)) = line.split_once("=>") else {
                debug!("{}:{}: no '=>' in line, skipping", path.display(), number + 1);
                continue;
            };
            let canonical = WHITESPACE.replace_all(canonical.trim(), " ");
            if canonical.is_empty() {
                continue;
            }
            for abbreviation in lefts.split(',') {
                let abbreviation = abbreviation.trim();
                if !abbreviation.is_empty() && abbreviation != canonical {
                    self.add_abbreviation(abbreviation, &canonical);
                }
            }
        }
        Ok(())
    }
}

/// Case- and accent-insensitive grouping key: `"Zürich "` and `"zurich"` fold
/// to the same key.
pub fn fold_key(name: &str) -> String {
    let stripped: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Number of whitespace-separated tokens.
pub fn token_count(name: &str) -> usize {
    name.split_whitespace().count()
}
