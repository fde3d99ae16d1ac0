//! Core permission types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PermissionsError, Result};

/// Default HTTP verb for lookups that do not name one
pub const DEFAULT_VERB: &str = "GET";

/// Kind of principal a scope is granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeType {
    /// App-only access without a signed-in user
    Application,
    /// Delegated access for a work or school account
    DelegatedWork,
    /// Delegated access for a personal account
    DelegatedPersonal,
}

impl ScopeType {
    /// All scope types in dataset order
    pub const ALL: [ScopeType; 3] = [
        ScopeType::Application,
        ScopeType::DelegatedWork,
        ScopeType::DelegatedPersonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Application => "Application",
            ScopeType::DelegatedWork => "DelegatedWork",
            ScopeType::DelegatedPersonal => "DelegatedPersonal",
        }
    }
}

impl Default for ScopeType {
    fn default() -> Self {
        ScopeType::DelegatedWork
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = PermissionsError;

    /// Case-insensitive; `-` and `_` separators are ignored
    fn from_str(s: &str) -> Result<Self> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "application" => Ok(ScopeType::Application),
            "delegatedwork" => Ok(ScopeType::DelegatedWork),
            "delegatedpersonal" => Ok(ScopeType::DelegatedPersonal),
            _ => Err(PermissionsError::InvalidArgument(format!(
                "unsupported scope type '{}'",
                s
            ))),
        }
    }
}

/// Normalizes an HTTP verb to uppercase, defaulting to `GET`
pub fn normalize_verb(verb: Option<&str>) -> String {
    match verb.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_ascii_uppercase(),
        _ => DEFAULT_VERB.to_string(),
    }
}

/// A permission scope as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDescriptor {
    /// Scope name (e.g., "Mail.Read")
    pub scope_name: String,

    pub scope_type: ScopeType,

    /// Minimal sufficient scope for the endpoint
    pub is_least_privilege: bool,

    /// Excluded from results unless hidden scopes are requested
    pub is_hidden: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Requires administrator consent
    pub is_admin: bool,
}

impl ScopeDescriptor {
    /// Create a visible, non-admin scope with no description
    pub fn new(scope_name: impl Into<String>, scope_type: ScopeType) -> Self {
        Self {
            scope_name: scope_name.into(),
            scope_type,
            is_least_privilege: false,
            is_hidden: false,
            display_name: None,
            description: None,
            is_admin: false,
        }
    }

    pub fn least_privilege(mut self, flag: bool) -> Self {
        self.is_least_privilege = flag;
        self
    }

    pub fn hidden(mut self, flag: bool) -> Self {
        self.is_hidden = flag;
        self
    }
}

/// Scopes declared for one template and one HTTP verb
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointScopes {
    /// Uppercase HTTP verb
    pub verb: String,

    pub application: Vec<ScopeDescriptor>,
    pub delegated_work: Vec<ScopeDescriptor>,
    pub delegated_personal: Vec<ScopeDescriptor>,
}

impl EndpointScopes {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            ..Default::default()
        }
    }

    /// Scopes of one type in declaration order
    pub fn scopes(&self, scope_type: ScopeType) -> &[ScopeDescriptor] {
        match scope_type {
            ScopeType::Application => &self.application,
            ScopeType::DelegatedWork => &self.delegated_work,
            ScopeType::DelegatedPersonal => &self.delegated_personal,
        }
    }

    pub(crate) fn scopes_mut(&mut self, scope_type: ScopeType) -> &mut Vec<ScopeDescriptor> {
        match scope_type {
            ScopeType::Application => &mut self.application,
            ScopeType::DelegatedWork => &mut self.delegated_work,
            ScopeType::DelegatedPersonal => &mut self.delegated_personal,
        }
    }

    /// Total number of scopes across all types
    pub fn len(&self) -> usize {
        self.application.len() + self.delegated_work.len() + self.delegated_personal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_type_parsing() {
        assert_eq!("DelegatedWork".parse::<ScopeType>().unwrap(), ScopeType::DelegatedWork);
        assert_eq!("application".parse::<ScopeType>().unwrap(), ScopeType::Application);
        assert_eq!(
            "delegated-personal".parse::<ScopeType>().unwrap(),
            ScopeType::DelegatedPersonal
        );
        assert!(matches!(
            "Delegated".parse::<ScopeType>(),
            Err(PermissionsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scope_type_display_round_trip() {
        for scope_type in ScopeType::ALL {
            assert_eq!(scope_type.to_string().parse::<ScopeType>().unwrap(), scope_type);
        }
    }

    #[test]
    fn test_normalize_verb() {
        assert_eq!(normalize_verb(None), "GET");
        assert_eq!(normalize_verb(Some("")), "GET");
        assert_eq!(normalize_verb(Some(" patch ")), "PATCH");
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let scope = ScopeDescriptor::new("Mail.Read", ScopeType::DelegatedWork).least_privilege(true);
        let json = serde_json::to_value(&scope).unwrap();

        assert_eq!(json["scopeName"], "Mail.Read");
        assert_eq!(json["scopeType"], "DelegatedWork");
        assert_eq!(json["isLeastPrivilege"], true);
        assert!(json.get("displayName").is_none());
    }

    #[test]
    fn test_endpoint_scopes_by_type() {
        let mut endpoint = EndpointScopes::new("GET");
        endpoint
            .scopes_mut(ScopeType::Application)
            .push(ScopeDescriptor::new("Mail.Read", ScopeType::Application));

        assert_eq!(endpoint.scopes(ScopeType::Application).len(), 1);
        assert!(endpoint.scopes(ScopeType::DelegatedWork).is_empty());
        assert_eq!(endpoint.len(), 1);
    }
}
