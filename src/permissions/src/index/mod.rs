//! Permission index
//!
//! Parses the permissions dataset into a [`TemplateTable`] plus per-template,
//! per-verb, per-scope-type scope lists. An index is immutable once built;
//! refreshing the dataset means building a new instance.

mod dataset;

pub use dataset::{EntryParseError, ScopeMetadata};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{PermissionsError, Result};
use crate::template::{normalize_url, TemplateMatch, TemplateTable};
use crate::types::{normalize_verb, EndpointScopes, ScopeDescriptor, ScopeType};

/// Message reported for urls that match no template
pub const NO_MATCHING_ENDPOINT: &str = "no matching endpoint";

/// Index build options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// ASCII-lowercase template literals and request paths before matching
    pub ignore_case: bool,
}

/// Scopes registered for one template
#[derive(Debug, Clone)]
struct EndpointRecord {
    /// Template text as declared in the dataset
    template: String,
    /// One entry per HTTP verb
    verbs: Vec<EndpointScopes>,
}

/// Read-only permission index built from the permissions dataset
///
/// # Examples
///
/// ```
/// use permscope_permissions::index::{IndexOptions, PermissionIndex};
/// use permscope_permissions::ScopeType;
///
/// let dataset = r#"{
///     "/users/{id}/messages": [
///         { "HttpVerb": "GET", "DelegatedWork": ["Mail.Read", "Mail.ReadWrite"] }
///     ]
/// }"#;
///
/// let index = PermissionIndex::build(dataset, None, IndexOptions::default()).unwrap();
/// let scopes = index
///     .lookup("/users/12345/messages", None, ScopeType::DelegatedWork)
///     .unwrap();
/// assert_eq!(scopes.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct PermissionIndex {
    table: TemplateTable,
    /// Template key to its scopes
    endpoints: HashMap<String, EndpointRecord>,
    /// Declared template text to template key
    keys_by_template: HashMap<String, String>,
    parse_errors: Vec<EntryParseError>,
    options: IndexOptions,
    build_duration: Duration,
}

impl PermissionIndex {
    /// Builds an index from the permissions document and the optional scope
    /// descriptions document.
    ///
    /// Malformed entries are skipped and reported through
    /// [`parse_errors`](Self::parse_errors). The build fails only when a
    /// document as a whole cannot be parsed.
    pub fn build(
        permissions: &str,
        descriptions: Option<&str>,
        options: IndexOptions,
    ) -> Result<Self> {
        let started = Instant::now();
        let mut parse_errors = Vec::new();

        let metadata = match descriptions {
            Some(text) => dataset::parse_descriptions(text, &mut parse_errors)?,
            None => HashMap::new(),
        };

        let entries = dataset::permission_entries(permissions)?;
        let mut table = TemplateTable::new();
        let mut endpoints = HashMap::with_capacity(entries.len());
        let mut keys_by_template = HashMap::with_capacity(entries.len());

        for (ordinal, (template, value)) in entries.into_iter().enumerate() {
            let verbs = match dataset::parse_entry(value, &metadata) {
                Ok(verbs) => verbs,
                Err(e) => {
                    warn!(template = %template, error = %e, "skipping malformed permissions entry");
                    parse_errors.push(EntryParseError::new(template, e.to_string()));
                    continue;
                }
            };

            let key = format!("t{}", ordinal);
            let registered = if options.ignore_case {
                fold_literals(&template)
            } else {
                template.clone()
            };

            if let Err(e) = table.add(&key, &registered) {
                warn!(template = %template, error = %e, "skipping unregistrable template");
                parse_errors.push(EntryParseError::new(template, e.to_string()));
                continue;
            }

            keys_by_template.insert(template.clone(), key.clone());
            endpoints.insert(key, EndpointRecord { template, verbs });
        }

        let build_duration = started.elapsed();
        if table.is_empty() {
            warn!(
                skipped = parse_errors.len(),
                "permissions dataset produced an empty index"
            );
        } else {
            info!(
                templates = table.len(),
                skipped = parse_errors.len(),
                elapsed = ?build_duration,
                "permission index built"
            );
        }

        Ok(Self {
            table,
            endpoints,
            keys_by_template,
            parse_errors,
            options,
            build_duration,
        })
    }

    /// True when no entry of the dataset could be registered
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Entries skipped during the build
    pub fn parse_errors(&self) -> &[EntryParseError] {
        &self.parse_errors
    }

    pub fn build_duration(&self) -> Duration {
        self.build_duration
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Declared template texts in registration order
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.table
            .keys()
            .filter_map(|key| self.endpoints.get(key).map(|r| r.template.as_str()))
    }

    /// Scopes declared for `template` and `verb`, addressed by declared text
    pub fn endpoint(&self, template: &str, verb: &str) -> Option<&EndpointScopes> {
        let key = self.keys_by_template.get(template)?;
        let verb = normalize_verb(Some(verb));
        self.endpoints
            .get(key)?
            .verbs
            .iter()
            .find(|e| e.verb == verb)
    }

    /// Matches `url` against the template table
    pub fn match_url(&self, url: &str) -> Result<Option<TemplateMatch<'_>>> {
        let mut path = normalize_url(url)?;
        if self.options.ignore_case {
            for segment in &mut path {
                segment.make_ascii_lowercase();
            }
        }
        Ok(self.table.match_segments(&path))
    }

    /// Declared template text for a match returned by [`match_url`](Self::match_url)
    pub fn declared_template(&self, matched: &TemplateMatch<'_>) -> Option<&str> {
        self.endpoints.get(matched.key).map(|r| r.template.as_str())
    }

    /// Returns the scopes of `scope_type` required to call `verb` on `url`.
    ///
    /// `verb` defaults to `GET` and is case-insensitive. A matched endpoint
    /// without that verb or scope type yields an empty slice.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the url cannot be normalized
    /// - `NotFound` if no template matches
    pub fn lookup(
        &self,
        url: &str,
        verb: Option<&str>,
        scope_type: ScopeType,
    ) -> Result<&[ScopeDescriptor]> {
        let matched = self
            .match_url(url)?
            .ok_or_else(|| PermissionsError::NotFound(NO_MATCHING_ENDPOINT.to_string()))?;

        let verb = normalize_verb(verb);
        let record = self
            .endpoints
            .get(matched.key)
            .ok_or_else(|| PermissionsError::NotFound(NO_MATCHING_ENDPOINT.to_string()))?;

        debug!(url, template = %record.template, verb = %verb, "endpoint matched");

        Ok(record
            .verbs
            .iter()
            .find(|e| e.verb == verb)
            .map(|e| e.scopes(scope_type))
            .unwrap_or(&[]))
    }
}

/// ASCII-lowercases literal segments, leaving `{name}` segments as declared
fn fold_literals(template: &str) -> String {
    template
        .split('/')
        .map(|segment| {
            if segment.starts_with('{') && segment.ends_with('}') {
                segment.to_string()
            } else {
                segment.to_ascii_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "/users/{id}/messages": [
            {
                "HttpVerb": "GET",
                "DelegatedWork": ["Mail.Read", "Mail.ReadWrite"],
                "Application": ["Mail.Read"],
                "LeastPrivilege": { "DelegatedWork": ["Mail.Read"] }
            },
            { "HttpVerb": "POST", "DelegatedWork": ["Mail.ReadWrite"] }
        ],
        "/users/{id}": [
            { "HttpVerb": "GET", "DelegatedWork": ["User.Read"] }
        ],
        "/broken": { "HttpVerb": "GET" },
        "": [ { "HttpVerb": "GET" } ]
    }"#;

    fn names(scopes: &[ScopeDescriptor]) -> Vec<&str> {
        scopes.iter().map(|s| s.scope_name.as_str()).collect()
    }

    #[test]
    fn test_build_skips_malformed_entries() {
        let index = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();

        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
        assert_eq!(index.parse_errors().len(), 2);
        assert_eq!(index.parse_errors()[0].entry, "/broken");

        let templates: Vec<&str> = index.templates().collect();
        assert_eq!(templates, vec!["/users/{id}/messages", "/users/{id}"]);
    }

    #[test]
    fn test_lookup_defaults_to_get() {
        let index = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();

        let scopes = index
            .lookup("/users/12345/messages", None, ScopeType::DelegatedWork)
            .unwrap();
        assert_eq!(names(scopes), vec!["Mail.Read", "Mail.ReadWrite"]);
        assert!(scopes[0].is_least_privilege);

        let scopes = index
            .lookup("/users/12345/messages", Some("post"), ScopeType::DelegatedWork)
            .unwrap();
        assert_eq!(names(scopes), vec!["Mail.ReadWrite"]);
    }

    #[test]
    fn test_lookup_absent_verb_or_type_is_empty() {
        let index = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();

        assert!(index
            .lookup("/users/1", Some("DELETE"), ScopeType::DelegatedWork)
            .unwrap()
            .is_empty());
        assert!(index
            .lookup("/users/1", None, ScopeType::DelegatedPersonal)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_lookup_not_found() {
        let index = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();

        let err = index
            .lookup("/does/not/exist", None, ScopeType::DelegatedWork)
            .unwrap_err();
        assert!(matches!(err, PermissionsError::NotFound(ref m) if m == NO_MATCHING_ENDPOINT));
    }

    #[test]
    fn test_ignore_case() {
        let sensitive = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();
        assert!(sensitive
            .lookup("/Users/1/Messages", None, ScopeType::DelegatedWork)
            .is_err());

        let folded = PermissionIndex::build(DATASET, None, IndexOptions { ignore_case: true }).unwrap();
        let scopes = folded
            .lookup("/Users/1/Messages", None, ScopeType::DelegatedWork)
            .unwrap();
        assert_eq!(scopes.len(), 2);

        let matched = folded.match_url("/USERS/1").unwrap().unwrap();
        assert_eq!(folded.declared_template(&matched), Some("/users/{id}"));
    }

    #[test]
    fn test_ignore_case_keeps_variable_names() {
        let dataset = r#"{
            "/Users/{userId}/mailFolders/{MailFolder-Id}": [
                { "HttpVerb": "GET", "DelegatedWork": ["Mail.Read"] }
            ]
        }"#;
        let index = PermissionIndex::build(dataset, None, IndexOptions { ignore_case: true }).unwrap();

        let matched = index.match_url("/users/ABC/MAILFOLDERS/inbox").unwrap().unwrap();
        assert_eq!(matched.bindings.get("userId").map(String::as_str), Some("abc"));
        assert_eq!(matched.bindings.get("MailFolder-Id").map(String::as_str), Some("inbox"));
        assert_eq!(
            index.declared_template(&matched),
            Some("/Users/{userId}/mailFolders/{MailFolder-Id}")
        );
    }

    #[test]
    fn test_fold_literals() {
        assert_eq!(fold_literals("/Users/{userId}/Delta()"), "/users/{userId}/delta()");
        assert_eq!(fold_literals("/"), "/");
    }

    #[test]
    fn test_endpoint_by_template_text() {
        let index = PermissionIndex::build(DATASET, None, IndexOptions::default()).unwrap();

        let endpoint = index.endpoint("/users/{id}/messages", "get").unwrap();
        assert_eq!(endpoint.verb, "GET");
        assert_eq!(endpoint.scopes(ScopeType::Application).len(), 1);
        assert!(index.endpoint("/users/{id}/messages", "PUT").is_none());
        assert!(index.endpoint("/groups", "GET").is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = PermissionIndex::build(r#"{ "/bad": 5 }"#, None, IndexOptions::default()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.parse_errors().len(), 1);

        assert!(PermissionIndex::build("not json", None, IndexOptions::default()).is_err());
    }

    #[test]
    fn test_descriptions_are_merged() {
        let descriptions = r#"{
            "Mail.ReadWrite": {
                "displayName": "Read and write mail",
                "description": "Allows reading and writing mail",
                "isAdmin": true,
                "isHidden": true
            }
        }"#;

        let index =
            PermissionIndex::build(DATASET, Some(descriptions), IndexOptions::default()).unwrap();
        let scopes = index
            .lookup("/users/1/messages", None, ScopeType::DelegatedWork)
            .unwrap();

        assert_eq!(scopes[1].display_name.as_deref(), Some("Read and write mail"));
        assert!(scopes[1].is_admin);
        assert!(scopes[1].is_hidden);
        assert!(!scopes[0].is_hidden);
    }
}
