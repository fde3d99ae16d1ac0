/// URI template type definitions and parsing
///
/// A template is a `/`-separated sequence of segments. A segment written as
/// `{name}` is a variable; every other segment is a literal compared
/// case-sensitively.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{PermissionsError, Result};

/// Compiled size is capped so matching stays bounded for any input.
static VARIABLE_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"^\{([^{}/]+)\}$")
        .size_limit(1 << 16)
        .build()
        .expect("variable segment pattern is valid")
});

/// One segment of a URI template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Must equal the url segment exactly
    Literal(String),
    /// Matches any non-empty url segment and binds it under this name
    Variable(String),
}

impl Segment {
    fn parse(text: &str) -> Result<Self> {
        if let Some(captures) = VARIABLE_SEGMENT.captures(text) {
            return Ok(Segment::Variable(captures[1].to_string()));
        }

        if text.starts_with('{') && text.ends_with('}') {
            return Err(PermissionsError::InvalidTemplate(format!(
                "invalid variable segment '{}'",
                text
            )));
        }

        Ok(Segment::Literal(text.to_string()))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Segment::Literal(literal) => literal == candidate,
            Segment::Variable(_) => !candidate.is_empty(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => write!(f, "{}", text),
            Segment::Variable(name) => write!(f, "{{{}}}", name),
        }
    }
}

/// Parsed URI template
///
/// # Examples
///
/// ```
/// use permscope_permissions::template::UriTemplate;
///
/// let template = UriTemplate::parse("/users/{id}/messages").unwrap();
/// assert_eq!(template.len(), 3);
/// assert_eq!(template.specificity(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriTemplate {
    /// Template text as declared
    raw: String,
    /// Parsed segments, leading and trailing slashes removed
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parses template text.
    ///
    /// `"/"` is the root template with zero segments. A trailing slash is
    /// ignored.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(PermissionsError::InvalidTemplate(
                "template text cannot be empty".to_string(),
            ));
        }

        let segments = split_path(text)
            .into_iter()
            .map(Segment::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: text.to_string(),
            segments,
        })
    }

    /// Returns the template text as declared
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root template `/`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of literal segments; higher wins among equal-length matches
    pub fn specificity(&self) -> usize {
        self.segments.iter().filter(|s| s.is_literal()).count()
    }

    /// Names of the variable segments in order
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Compares segment by segment and returns the variable bindings on
    /// success. The caller guarantees equal segment counts.
    pub(crate) fn bind(&self, path: &[String]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut bindings = HashMap::new();
        for (segment, candidate) in self.segments.iter().zip(path) {
            if !segment.matches(candidate) {
                return None;
            }
            if let Segment::Variable(name) = segment {
                bindings.insert(name.clone(), candidate.clone());
            }
        }

        Some(bindings)
    }
}

impl FromStr for UriTemplate {
    type Err = PermissionsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Splits a path on `/`, dropping the leading empty segment of a rooted
/// path and the trailing empty segment left by a trailing slash.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').collect()
}

/// Reduces a request url to its decoded path segments.
///
/// Strips `scheme://host`, the query and the fragment, then percent-decodes
/// each segment. Segments are decoded after splitting so an encoded `%2F`
/// stays inside its segment.
pub fn normalize_url(url: &str) -> Result<Vec<String>> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(PermissionsError::InvalidArgument(
            "url cannot be empty".to_string(),
        ));
    }

    let without_fragment = trimmed.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();

    let path = match without_query.find("://") {
        Some(scheme_end) => {
            let after_scheme = &without_query[scheme_end + 3..];
            match after_scheme.find('/') {
                Some(path_start) => &after_scheme[path_start..],
                None => "/",
            }
        }
        None => without_query,
    };

    if !path.starts_with('/') {
        return Err(PermissionsError::InvalidArgument(format!(
            "url '{}' must be an absolute path",
            url
        )));
    }

    split_path(path)
        .into_iter()
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .map_err(|e| {
                    PermissionsError::InvalidArgument(format!(
                        "url '{}' is not valid percent-encoded UTF-8: {}",
                        url, e
                    ))
                })
        })
        .collect()
}
