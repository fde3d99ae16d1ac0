//! Typed dataset records and the validating parse step
//!
//! The permissions document is parsed entry by entry: a malformed entry is
//! reported as an [`EntryParseError`] and skipped while the rest of the
//! document is still used.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PermissionsError, Result};
use crate::types::{normalize_verb, EndpointScopes, ScopeDescriptor, ScopeType};

static SCOPE_NAME: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$")
        .size_limit(1 << 16)
        .build()
        .expect("scope name pattern is valid")
});

/// A dataset entry that was skipped during the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryParseError {
    /// Template text, or scope name for description entries
    pub entry: String,
    pub message: String,
}

impl EntryParseError {
    pub(crate) fn new(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            message: message.into(),
        }
    }
}

/// One HTTP verb's declaration inside a permissions entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VerbDeclaration {
    http_verb: String,
    #[serde(default)]
    application: Vec<String>,
    #[serde(default)]
    delegated_work: Vec<String>,
    #[serde(default)]
    delegated_personal: Vec<String>,
    /// Scope type name to the scopes flagged least-privilege for this verb
    #[serde(default)]
    least_privilege: BTreeMap<String, Vec<String>>,
}

impl VerbDeclaration {
    fn names(&self, scope_type: ScopeType) -> &[String] {
        match scope_type {
            ScopeType::Application => &self.application,
            ScopeType::DelegatedWork => &self.delegated_work,
            ScopeType::DelegatedPersonal => &self.delegated_personal,
        }
    }
}

/// Display metadata for one scope, keyed by scope name in its document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_least_privilege: bool,
}

/// Parses the scope descriptions document.
///
/// Fails only if the document is not a JSON object; malformed entries are
/// pushed to `errors` and skipped.
pub(crate) fn parse_descriptions(
    text: &str,
    errors: &mut Vec<EntryParseError>,
) -> Result<HashMap<String, ScopeMetadata>> {
    let document: Value = serde_json::from_str(text)?;
    let Value::Object(entries) = document else {
        return Err(PermissionsError::Parse(
            "scope descriptions document must be a JSON object".to_string(),
        ));
    };

    let mut metadata = HashMap::with_capacity(entries.len());
    for (name, value) in entries {
        match serde_json::from_value::<ScopeMetadata>(value) {
            Ok(record) => {
                metadata.insert(name, record);
            }
            Err(e) => errors.push(EntryParseError::new(name, e.to_string())),
        }
    }

    Ok(metadata)
}

/// Splits the permissions document into its entries in document order.
pub(crate) fn permission_entries(text: &str) -> Result<Vec<(String, Value)>> {
    let document: Value = serde_json::from_str(text)?;
    match document {
        Value::Object(entries) => Ok(entries.into_iter().collect()),
        _ => Err(PermissionsError::Parse(
            "permissions document must be a JSON object keyed by URI template".to_string(),
        )),
    }
}

/// Converts one permissions entry into per-verb scope lists.
///
/// Declarations repeating a verb are merged in declaration order.
pub(crate) fn parse_entry(
    value: Value,
    metadata: &HashMap<String, ScopeMetadata>,
) -> Result<Vec<EndpointScopes>> {
    let declarations: Vec<VerbDeclaration> = serde_json::from_value(value)?;
    let mut endpoints: Vec<EndpointScopes> = Vec::with_capacity(declarations.len());

    for declaration in declarations {
        if declaration.http_verb.trim().is_empty() {
            return Err(PermissionsError::Parse("HttpVerb cannot be empty".to_string()));
        }
        let verb = normalize_verb(Some(&declaration.http_verb));
        let least_privilege = least_privilege_names(&declaration)?;

        let position = match endpoints.iter().position(|e| e.verb == verb) {
            Some(position) => position,
            None => {
                endpoints.push(EndpointScopes::new(verb));
                endpoints.len() - 1
            }
        };
        let endpoint = &mut endpoints[position];

        for scope_type in ScopeType::ALL {
            let scopes = endpoint.scopes_mut(scope_type);
            for name in declaration.names(scope_type) {
                if !SCOPE_NAME.is_match(name) {
                    return Err(PermissionsError::Parse(format!(
                        "invalid {} scope name '{}'",
                        scope_type, name
                    )));
                }
                if scopes.iter().any(|s| &s.scope_name == name) {
                    continue;
                }
                let flagged = least_privilege
                    .get(&scope_type)
                    .map_or(false, |names| names.contains(name.as_str()));
                scopes.push(describe(name, scope_type, flagged, metadata));
            }
        }
    }

    Ok(endpoints)
}

fn least_privilege_names(
    declaration: &VerbDeclaration,
) -> Result<HashMap<ScopeType, HashSet<&str>>> {
    let mut flagged = HashMap::new();
    for (type_name, names) in &declaration.least_privilege {
        let scope_type: ScopeType = type_name
            .parse()
            .map_err(|_| PermissionsError::Parse(format!("unknown scope type '{}'", type_name)))?;
        flagged
            .entry(scope_type)
            .or_insert_with(HashSet::new)
            .extend(names.iter().map(String::as_str));
    }
    Ok(flagged)
}

fn describe(
    name: &str,
    scope_type: ScopeType,
    least_privilege: bool,
    metadata: &HashMap<String, ScopeMetadata>,
) -> ScopeDescriptor {
    let record = metadata.get(name);
    ScopeDescriptor {
        scope_name: name.to_string(),
        scope_type,
        is_least_privilege: least_privilege || record.map_or(false, |r| r.is_least_privilege),
        is_hidden: record.map_or(false, |r| r.is_hidden),
        display_name: record.and_then(|r| r.display_name.clone()),
        description: record.and_then(|r| r.description.clone()),
        is_admin: record.map_or(false, |r| r.is_admin),
    }
}
