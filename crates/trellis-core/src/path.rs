//! Path parsing and route patterns
//!
//! Navigation paths follow this format:
//! ```text
//! /main/hosts/c6401.ambari.apache.org/summary
//! /main/admin/user/
//! ```
//!
//! Route patterns are declared per node and may span several segments:
//! - a literal segment matches only the identical string
//! - `:name` matches any non-empty segment and binds it under `name`
//! - an empty pattern (`/`) is an index route and consumes nothing

use crate::{Error, Result, PARAM_PREFIX};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Dynamic segment bindings, keyed by placeholder name
pub type Params = BTreeMap<String, String>;

/// A parsed navigation path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath {
    raw: String,
    segments: Vec<String>,
}

impl RoutePath {
    /// Parse a path string
    ///
    /// A single trailing slash is accepted (`/hosts/` is `/hosts`), empty
    /// interior segments are not.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidPath("empty path".to_string()));
        }

        let Some(rest) = s.strip_prefix('/') else {
            return Err(Error::InvalidPath(format!("path must start with '/': {}", s)));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let segments: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').map(|seg| seg.to_string()).collect()
        };

        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(Error::InvalidPath(format!("empty segment in path: {}", s)));
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }

    /// Get the raw path string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the path segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for RoutePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RoutePath::parse(s)
    }
}

impl TryFrom<&str> for RoutePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        RoutePath::parse(s)
    }
}

impl TryFrom<String> for RoutePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        RoutePath::parse(&s)
    }
}

/// One segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches only the identical string
    Literal(String),
    /// Matches any non-empty segment, binding it under this name
    Param(String),
}

impl Segment {
    /// Parse a single pattern segment
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(name) = s.strip_prefix(PARAM_PREFIX) {
            if name.is_empty() {
                return Err(Error::InvalidPath(format!(
                    "placeholder without a name in segment '{}'",
                    s
                )));
            }
            if name.contains(PARAM_PREFIX) {
                return Err(Error::InvalidPath(format!(
                    "more than one placeholder in segment '{}'",
                    s
                )));
            }
            Ok(Segment::Param(name.to_string()))
        } else if s.contains(PARAM_PREFIX) {
            Err(Error::InvalidPath(format!(
                "placeholder must span the whole segment: '{}'",
                s
            )))
        } else {
            Ok(Segment::Literal(s.to_string()))
        }
    }

    /// Check whether a path segment matches
    pub fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Param(_) => !segment.is_empty(),
        }
    }

    /// Placeholder name, if dynamic
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Literal(lit) => write!(f, "{}", lit),
            Segment::Param(name) => write!(f, "{}{}", PARAM_PREFIX, name),
        }
    }
}

/// A compiled route pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a pattern from a route declaration
    ///
    /// Leading and trailing slashes are optional: `/hosts/:host_id`,
    /// `apps/:app_id` and `dag` are all accepted.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|seg| {
                    if seg.is_empty() {
                        Err(Error::InvalidPath(format!("empty segment in pattern: {}", s)))
                    } else {
                        Segment::parse(seg)
                    }
                })
                .collect::<Result<Vec<_>>>()?
        };

        let mut seen = Vec::new();
        for name in segments.iter().filter_map(Segment::param_name) {
            if seen.contains(&name) {
                return Err(Error::InvalidPath(format!(
                    "duplicate placeholder :{} in pattern: {}",
                    name, s
                )));
            }
            seen.push(name);
        }

        Ok(Self {
            raw: s.to_string(),
            segments,
        })
    }

    /// An index pattern consuming no segments
    pub fn index() -> Self {
        Self {
            raw: "/".to_string(),
            segments: Vec::new(),
        }
    }

    /// Get the raw pattern string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the compiled segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of path segments this pattern consumes
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if this is an index pattern
    pub fn is_index(&self) -> bool {
        self.segments.is_empty()
    }

    /// Alias of [`RoutePattern::is_index`]
    pub fn is_empty(&self) -> bool {
        self.is_index()
    }

    /// Check if this pattern has no placeholders
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| s.param_name().is_none())
    }

    /// Placeholder names in declaration order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Match this pattern against the front of `segments`
    ///
    /// Returns the bindings when every pattern segment matches.
    pub fn match_prefix(&self, segments: &[String]) -> Option<Params> {
        if segments.len() < self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (pat, seg) in self.segments.iter().zip(segments) {
            if !pat.matches(seg) {
                return None;
            }
            if let Some(name) = pat.param_name() {
                params.insert(name.to_string(), seg.clone());
            }
        }
        Some(params)
    }

    /// Render the pattern back into path segments using `params`
    ///
    /// Returns `None` if a placeholder has no binding.
    pub fn render(&self, params: &Params) -> Option<Vec<String>> {
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Literal(lit) => Some(lit.clone()),
                Segment::Param(name) => params.get(name).cloned(),
            })
            .collect()
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let path = RoutePath::parse("/main/hosts/c6401/summary").unwrap();
        assert_eq!(path.segments().len(), 4);
        assert_eq!(path.segments()[1], "hosts");
    }

    #[test]
    fn test_parse_trailing_slash() {
        let path = RoutePath::parse("/main/hosts/").unwrap();
        assert_eq!(path.segments(), &["main", "hosts"]);
        assert!(RoutePath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(RoutePath::parse("").is_err());
        assert!(RoutePath::parse("no/leading/slash").is_err());
        assert!(RoutePath::parse("/double//slash").is_err());
    }

    #[test]
    fn test_pattern_multi_segment() {
        let pattern = RoutePattern::parse("/hosts/:host_id").unwrap();
        assert_eq!(pattern.len(), 2);
        assert!(!pattern.is_literal());
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["host_id"]);

        let segments: Vec<String> = vec!["hosts".into(), "c6401".into(), "summary".into()];
        let params = pattern.match_prefix(&segments).unwrap();
        assert_eq!(params.get("host_id").map(String::as_str), Some("c6401"));
    }

    #[test]
    fn test_pattern_literal_mismatch() {
        let pattern = RoutePattern::parse("dag").unwrap();
        assert!(pattern.match_prefix(&["bar".to_string()]).is_none());
        assert!(pattern.match_prefix(&[]).is_none());
    }

    #[test]
    fn test_pattern_index() {
        assert!(RoutePattern::parse("/").unwrap().is_index());
        assert!(RoutePattern::parse("").unwrap().is_index());
        assert_eq!(RoutePattern::index().match_prefix(&[]), Some(Params::new()));
    }

    #[test]
    fn test_pattern_rejects_bad_placeholders() {
        assert!(RoutePattern::parse("/:").is_err());
        assert!(RoutePattern::parse("/:a:b").is_err());
        assert!(RoutePattern::parse("/host-:id").is_err());
        assert!(RoutePattern::parse("/:id/x/:id").is_err());
    }

    #[test]
    fn test_render() {
        let pattern = RoutePattern::parse("/runs/:workflow_id").unwrap();
        let mut params = Params::new();
        assert_eq!(pattern.render(&params), None);
        params.insert("workflow_id".to_string(), "wf-7".to_string());
        assert_eq!(
            pattern.render(&params),
            Some(vec!["runs".to_string(), "wf-7".to_string()])
        );
    }
}
