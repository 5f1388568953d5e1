//! Disallowed-content screening
//!
//! Checks the user-visible text of a manifest (folder name, friendly name,
//! description and categories) against a term oracle. A hit drops the whole
//! workspace and is counted once in the run statistics.
//!
//! The default oracle is the `rustrict` censor. Operators can add their own
//! terms through a word list file.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rustrict::CensorStr;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Rejection;
use crate::stats::{Counter, HarvestStats};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("valid word regex"));

/// Decides whether a piece of text contains a disallowed term
pub trait TermOracle: Send + Sync {
    fn contains_disallowed(&self, text: &str) -> bool;
}

/// Oracle backed by the `rustrict` censor (profane, offensive, sexual and
/// mean content, with obfuscation handling)
#[derive(Debug, Clone, Copy, Default)]
pub struct CensorOracle;

impl TermOracle for CensorOracle {
    fn contains_disallowed(&self, text: &str) -> bool {
        text.is_inappropriate()
    }
}

/// Operator-supplied terms with case and punctuation-insensitive whole-word
/// matching
#[derive(Debug, Clone, Default)]
pub struct WordList {
    single: HashSet<String>,
    phrases: Vec<Vec<String>>,
}

/// Lower-case, undo common character substitutions, and split into words
fn words(text: &str) -> Vec<String> {
    let folded: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            '@' | '4' => 'a',
            '$' | '5' => 's',
            '0' => 'o',
            '1' | '!' => 'i',
            '3' => 'e',
            '7' => 't',
            other => other,
        })
        .collect();

    WORD.find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

impl WordList {
    /// Terms from `path`, one per line; `#` starts a comment line
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read term list: {}", path.display()))?;
        let mut list = Self::default();
        list.extend_from_str(&content);
        info!("Loaded {} additional disallowed terms from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn extend_from_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add_term(line);
        }
    }

    pub fn add_term(&mut self, term: &str) {
        let mut parts = words(term);
        match parts.len() {
            0 => {}
            1 => {
                self.single.insert(parts.remove(0));
            }
            _ => self.phrases.push(parts),
        }
    }

    pub fn len(&self) -> usize {
        self.single.len() + self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TermOracle for WordList {
    fn contains_disallowed(&self, text: &str) -> bool {
        let tokens = words(text);
        if tokens.iter().any(|t| self.single.contains(t)) {
            return true;
        }
        self.phrases.iter().any(|phrase| {
            tokens
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
        })
    }
}

/// The censor plus any operator terms
#[derive(Debug, Clone, Default)]
pub struct DisallowedTerms {
    censor: CensorOracle,
    extra: WordList,
}

impl DisallowedTerms {
    pub fn with_terms(extra: WordList) -> Self {
        Self {
            censor: CensorOracle,
            extra,
        }
    }

    /// Censor extended with the word list at `path`
    pub fn with_file(path: &Path) -> Result<Self> {
        Ok(Self::with_terms(WordList::from_file(path)?))
    }
}

impl TermOracle for DisallowedTerms {
    fn contains_disallowed(&self, text: &str) -> bool {
        self.censor.contains_disallowed(text) || self.extra.contains_disallowed(text)
    }
}

/// Render a manifest field for screening; absent and null fields yield nothing
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" "),
        ),
        other => Some(other.to_string()),
    }
}

/// Screens manifests using a [`TermOracle`]
#[derive(Clone)]
pub struct ContentFilter {
    oracle: Arc<dyn TermOracle>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(Arc::new(DisallowedTerms::default()))
    }
}

impl ContentFilter {
    pub fn new(oracle: Arc<dyn TermOracle>) -> Self {
        Self { oracle }
    }

    /// Screen a raw manifest, naming the first offending field.
    ///
    /// Increments `profanity_filtered_workspaces` exactly once on rejection.
    pub fn check(
        &self,
        manifest: &Value,
        folder_name: &str,
        stats: &HarvestStats,
    ) -> std::result::Result<(), Rejection> {
        let object = manifest.as_object();
        let fields: [(&'static str, Option<String>); 4] = [
            ("workspace_name", Some(folder_name.to_string())),
            (
                "friendly_name",
                field_text(object.and_then(|o| o.get("friendly_name"))),
            ),
            (
                "description",
                field_text(object.and_then(|o| o.get("description"))),
            ),
            (
                "categories",
                field_text(object.and_then(|o| o.get("categories"))),
            ),
        ];

        for (field, text) in fields {
            let Some(text) = text.filter(|t| !t.is_empty()) else {
                continue;
            };
            if self.oracle.contains_disallowed(&text) {
                debug!("Disallowed content detected in {}: {}", field, text);
                stats.increment(Counter::ProfanityFiltered);
                return Err(Rejection::ContentRejected { field });
            }
        }

        Ok(())
    }

    /// Boolean form of [`ContentFilter::check`]
    pub fn contains_disallowed_content(
        &self,
        manifest: &Value,
        folder_name: &str,
        stats: &HarvestStats,
    ) -> bool {
        self.check(manifest, folder_name, stats).is_err()
    }
}
