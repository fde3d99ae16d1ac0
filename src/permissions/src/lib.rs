//! # Permscope Permissions
//!
//! Resolves the permission scopes an API request needs by matching the
//! request url against a table of URI templates.
//!
//! ## Features
//!
//! - **Template matching** with literal and `{variable}` segments, ranked by
//!   specificity with deterministic tie-breaking
//! - **Permission index** parsed once from a declarative dataset, with
//!   malformed entries skipped instead of failing the whole build
//! - **Batch resolution** with hidden and least-privilege filtering and
//!   per-url error reporting
//! - **Build-once caching** of indexes through [`permscope_cache::CacheGuard`]
//!
//! ## Example
//!
//! ```rust
//! use permscope_permissions::{resolve, IndexOptions, PermissionIndex, ScopeRequest, ScopeType};
//!
//! let dataset = r#"{
//!     "/users/{id}/messages": [
//!         { "HttpVerb": "GET", "DelegatedWork": ["Mail.Read", "Mail.ReadWrite"] }
//!     ]
//! }"#;
//!
//! let index = PermissionIndex::build(dataset, None, IndexOptions::default()).unwrap();
//! let request = ScopeRequest::new(["/users/12345/messages"])
//!     .with_scope_type(ScopeType::DelegatedWork);
//!
//! let result = resolve(&index, &request).unwrap();
//! assert_eq!(result.scope_names(), vec!["Mail.Read", "Mail.ReadWrite"]);
//! assert!(result.errors.is_empty());
//! ```

pub mod content;
pub mod error;
pub mod index;
pub mod resolver;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use content::{ContentProvider, FileContentProvider, InMemoryContentProvider};
pub use error::{PermissionsError, Result};
pub use index::{EntryParseError, IndexOptions, PermissionIndex};
pub use resolver::{
    resolve, IndexCache, PermissionResult, ScopeRequest, ScopeResolver, ScopeResolverConfig,
    UrlError,
};
pub use template::{TemplateMatch, TemplateTable, UriTemplate};
pub use types::{EndpointScopes, ScopeDescriptor, ScopeType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
