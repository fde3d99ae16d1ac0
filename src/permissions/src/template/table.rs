/// Keyed URI template table with best-match lookup
///
/// Templates are bucketed by segment count; matching only considers the
/// bucket of the url's length and ranks successful candidates by
/// specificity.
use std::collections::HashMap;

use tracing::trace;

use super::types::{normalize_url, UriTemplate};
use crate::error::{PermissionsError, Result};

/// A registered template and its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub key: String,
    pub template: UriTemplate,
}

/// Best match for a url
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch<'a> {
    /// Key of the winning template
    pub key: &'a str,
    /// The winning template
    pub template: &'a UriTemplate,
    /// Variable name to captured url segment
    pub bindings: HashMap<String, String>,
}

/// Table of URI templates keyed by an opaque, unique key
///
/// # Tie-breaking
///
/// Among templates of equal length that all match a url, the one with the
/// most literal segments wins. When several share that highest
/// specificity, the earliest registered template wins.
///
/// # Examples
///
/// ```
/// use permscope_permissions::template::TemplateTable;
///
/// let mut table = TemplateTable::new();
/// table.add("baz", "/baz/{bar}").unwrap();
/// table.add("kit", "/baz/kit").unwrap();
///
/// assert_eq!(table.match_url("/baz/kit").unwrap().unwrap().key, "kit");
/// assert_eq!(table.match_url("/baz/fod").unwrap().unwrap().key, "baz");
/// assert!(table.match_url("/baz/fod/burg").unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateTable {
    /// Entries in registration order
    entries: Vec<TemplateEntry>,
    /// Key to position in `entries`
    by_key: HashMap<String, usize>,
    /// Segment count to positions in `entries`, registration order kept
    by_length: HashMap<usize, Vec<usize>>,
}

impl TemplateTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `template_text` under `key`.
    ///
    /// # Errors
    ///
    /// - `InvalidTemplate` if the text is empty or malformed
    /// - `InvalidKey` if the key is empty
    /// - `DuplicateKey` if the key is already registered
    pub fn add(&mut self, key: &str, template_text: &str) -> Result<()> {
        if template_text.trim().is_empty() {
            return Err(PermissionsError::InvalidTemplate(format!(
                "template for key '{}' cannot be empty",
                key
            )));
        }
        if key.is_empty() {
            return Err(PermissionsError::InvalidKey(
                "template key cannot be empty".to_string(),
            ));
        }
        if self.by_key.contains_key(key) {
            return Err(PermissionsError::DuplicateKey(key.to_string()));
        }

        let template = UriTemplate::parse(template_text)?;
        let position = self.entries.len();

        self.by_length
            .entry(template.len())
            .or_default()
            .push(position);
        self.by_key.insert(key.to_string(), position);
        self.entries.push(TemplateEntry {
            key: key.to_string(),
            template,
        });

        Ok(())
    }

    /// Returns the template text registered under `key`
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        if key.is_empty() {
            return Err(PermissionsError::InvalidArgument(
                "template key cannot be empty".to_string(),
            ));
        }

        Ok(self
            .by_key
            .get(key)
            .map(|&position| self.entries[position].template.as_str()))
    }

    /// Finds the best template for `url`.
    ///
    /// Returns `Ok(None)` when no template matches.
    pub fn match_url(&self, url: &str) -> Result<Option<TemplateMatch<'_>>> {
        let path = normalize_url(url)?;
        Ok(self.match_segments(&path))
    }

    /// Finds the best template for an already normalized path
    pub fn match_segments(&self, path: &[String]) -> Option<TemplateMatch<'_>> {
        let candidates = self.by_length.get(&path.len())?;

        let mut best: Option<(&TemplateEntry, usize, HashMap<String, String>)> = None;
        for &position in candidates {
            let entry = &self.entries[position];
            let specificity = entry.template.specificity();

            // Earlier registrations already hold ties.
            if let Some((_, best_specificity, _)) = &best {
                if specificity <= *best_specificity {
                    continue;
                }
            }

            if let Some(bindings) = entry.template.bind(path) {
                best = Some((entry, specificity, bindings));
            }
        }

        let (entry, _, bindings) = best?;
        trace!(key = %entry.key, template = %entry.template, "template matched");

        Some(TemplateMatch {
            key: &entry.key,
            template: &entry.template,
            bindings,
        })
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }
}
