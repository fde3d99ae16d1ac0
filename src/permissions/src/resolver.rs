//! Batch scope resolution
//!
//! Queries a [`PermissionIndex`] for many urls at once, filters hidden and
//! non-least-privilege scopes, and aggregates per-url failures as data.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use permscope_cache::{CacheGuard, CacheStats};
use serde::Serialize;
use tracing::{debug, info};

use crate::content::ContentProvider;
use crate::error::{PermissionsError, Result};
use crate::index::{IndexOptions, PermissionIndex, NO_MATCHING_ENDPOINT};
use crate::types::{ScopeDescriptor, ScopeType};

/// Placeholder substituted with the locale in the descriptions path
pub const LOCALE_PLACEHOLDER: &str = "{locale}";

/// Shared cache of built indexes, keyed by dataset and locale
pub type IndexCache = CacheGuard<String, Arc<PermissionIndex>>;

/// Parameters of one batch scope query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequest {
    /// Request urls, absolute or path-only
    pub urls: Vec<String>,
    /// Scope type to report; `DelegatedWork` when absent
    pub scope_type: Option<ScopeType>,
    /// HTTP verb; `GET` when absent
    pub verb: Option<String>,
    /// Report scopes flagged hidden
    pub include_hidden: bool,
    /// Report only least-privilege scopes where the endpoint declares any
    pub least_privilege_only: bool,
}

impl ScopeRequest {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_scope_type(mut self, scope_type: ScopeType) -> Self {
        self.scope_type = Some(scope_type);
        self
    }

    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    pub fn include_hidden(mut self, flag: bool) -> Self {
        self.include_hidden = flag;
        self
    }

    pub fn least_privilege_only(mut self, flag: bool) -> Self {
        self.least_privilege_only = flag;
        self
    }
}

/// A url that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlError {
    pub url: String,
    pub message: String,
}

/// Outcome of a batch query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionResult {
    /// Scopes deduplicated by name, first occurrence wins
    pub results: Vec<ScopeDescriptor>,
    /// One entry per url that failed
    pub errors: Vec<UrlError>,
}

impl PermissionResult {
    /// Scope names in result order
    pub fn scope_names(&self) -> Vec<&str> {
        self.results.iter().map(|s| s.scope_name.as_str()).collect()
    }
}

/// Resolves the scopes for every url of `request` against `index`.
///
/// Per-url failures are collected in [`PermissionResult::errors`]; the call
/// only fails for an empty index or an empty url list.
pub fn resolve(index: &PermissionIndex, request: &ScopeRequest) -> Result<PermissionResult> {
    if index.is_empty() {
        return Err(PermissionsError::Configuration(
            "permissions dataset is empty or failed to load".to_string(),
        ));
    }
    if request.urls.is_empty() {
        return Err(PermissionsError::InvalidArgument(
            "at least one url is required".to_string(),
        ));
    }

    let scope_type = request.scope_type.unwrap_or_default();
    let mut seen = HashSet::new();
    let mut result = PermissionResult::default();

    for url in &request.urls {
        match index.lookup(url, request.verb.as_deref(), scope_type) {
            Ok(scopes) => {
                for scope in select(scopes, request) {
                    if seen.insert(scope.scope_name.as_str()) {
                        result.results.push(scope.clone());
                    }
                }
            }
            Err(PermissionsError::NotFound(_)) => result.errors.push(UrlError {
                url: url.clone(),
                message: NO_MATCHING_ENDPOINT.to_string(),
            }),
            Err(e) => result.errors.push(UrlError {
                url: url.clone(),
                message: e.to_string(),
            }),
        }
    }

    debug!(
        urls = request.urls.len(),
        scopes = result.results.len(),
        errors = result.errors.len(),
        "scopes resolved"
    );

    Ok(result)
}

/// Applies the hidden and least-privilege filters to one endpoint's scopes.
///
/// With `least_privilege_only`, an endpoint that flags none of its visible
/// scopes falls back to all visible scopes.
fn select<'a>(scopes: &'a [ScopeDescriptor], request: &ScopeRequest) -> Vec<&'a ScopeDescriptor> {
    let visible: Vec<&ScopeDescriptor> = scopes
        .iter()
        .filter(|s| request.include_hidden || !s.is_hidden)
        .collect();

    if request.least_privilege_only && visible.iter().any(|s| s.is_least_privilege) {
        visible.into_iter().filter(|s| s.is_least_privilege).collect()
    } else {
        visible
    }
}

/// Where the resolver reads its datasets from and how long indexes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeResolverConfig {
    /// Path of the permissions document
    pub permissions_path: String,
    /// Path of the scope descriptions document; may contain `{locale}`
    pub descriptions_path: Option<String>,
    /// Locale used when a call does not name one
    pub default_locale: String,
    /// Lifetime of a built index
    pub ttl: Duration,
    pub index_options: IndexOptions,
}

impl Default for ScopeResolverConfig {
    fn default() -> Self {
        Self {
            permissions_path: "permissions.json".to_string(),
            descriptions_path: None,
            default_locale: "en-US".to_string(),
            ttl: Duration::from_secs(3600),
            index_options: IndexOptions::default(),
        }
    }
}

/// Scope resolver backed by a content provider and a shared index cache
///
/// # Architecture
///
/// ```text
/// get_scopes → IndexCache.get_or_build(locale) ─ miss → ContentProvider.read → PermissionIndex::build
///                     ↓ ready
///                  resolve(index, request)
/// ```
pub struct ScopeResolver {
    config: ScopeResolverConfig,
    provider: Arc<dyn ContentProvider>,
    cache: Arc<IndexCache>,
}

impl ScopeResolver {
    /// Create a resolver; `cache` may be shared with other content stores
    pub fn new(
        config: ScopeResolverConfig,
        provider: Arc<dyn ContentProvider>,
        cache: Arc<IndexCache>,
    ) -> Self {
        Self {
            config,
            provider,
            cache,
        }
    }

    pub fn config(&self) -> &ScopeResolverConfig {
        &self.config
    }

    /// Returns the index for `locale`, building it on first use or after
    /// its TTL elapsed.
    pub async fn index(&self, locale: Option<&str>) -> Result<Arc<PermissionIndex>> {
        let locale = self.locale(locale);
        let key = cache_key(locale);

        self.cache
            .get_or_build(&key, self.config.ttl, || self.build_index(locale))
            .await
    }

    /// Resolves `request` against the index for `locale`
    pub async fn get_scopes(
        &self,
        locale: Option<&str>,
        request: &ScopeRequest,
    ) -> Result<PermissionResult> {
        let index = self.index(locale).await?;
        resolve(&index, request)
    }

    /// Drops the cached index for `locale` so the next call rebuilds it.
    ///
    /// Returns false if no index is ready; a build in flight already reads
    /// the current dataset and is left running.
    pub fn refresh(&self, locale: Option<&str>) -> bool {
        let locale = self.locale(locale);
        self.cache.invalidate(&cache_key(locale))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn locale<'a>(&'a self, locale: Option<&'a str>) -> &'a str {
        match locale.map(str::trim) {
            Some(l) if !l.is_empty() => l,
            _ => &self.config.default_locale,
        }
    }

    async fn build_index(&self, locale: &str) -> Result<Arc<PermissionIndex>> {
        let permissions = self.provider.read(&self.config.permissions_path).await?;
        let descriptions = match &self.config.descriptions_path {
            Some(path) => {
                let path = path.replace(LOCALE_PLACEHOLDER, locale);
                Some(self.provider.read(&path).await?)
            }
            None => None,
        };

        let options = self.config.index_options.clone();
        let index = tokio::task::spawn_blocking(move || {
            PermissionIndex::build(&permissions, descriptions.as_deref(), options)
        })
        .await
        .map_err(|e| PermissionsError::Configuration(format!("index build task failed: {}", e)))??;

        info!(locale, templates = index.len(), "permission index published");
        Ok(Arc::new(index))
    }
}

fn cache_key(locale: &str) -> String {
    format!("permissions:{}", locale)
}
