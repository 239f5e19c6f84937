//! Route pattern compilation and matching.
//!
//! # Grammar
//! ```text
//! /literal          exact segment (ASCII case-insensitive)
//! /:name            exactly one segment
//! /:name?           zero or one segment
//! /:name*           zero or more segments
//! /:name+           one or more segments
//! /*                anonymous zero-or-more wildcard
//! ?key=value&k=:v   query constraints (literal value or captured `:param`)
//! ```
//!
//! # Design Decisions
//! - Segment matching, no regex in the hot path
//! - Trailing slash on the request path is tolerated
//! - Patterns without a query section ignore the request query entirely
//! - Greedy repetition with backtracking, so `/:a*/edit` still works

use std::fmt;

/// Error returned when a route pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("route pattern is empty")]
    Empty,
    #[error("route pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),
    #[error("route pattern `{pattern}` has a parameter with no name")]
    EmptyParamName { pattern: String },
    #[error("route pattern `{pattern}` has an invalid segment `{segment}`")]
    InvalidSegment { pattern: String, segment: String },
    #[error("route pattern `{pattern}` has an invalid query constraint `{constraint}`")]
    InvalidQuery { pattern: String, constraint: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, repeat: Repeat },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryValue {
    Any,
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryRule {
    key: String,
    value: QueryValue,
}

/// Parameters captured by a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    params: Vec<(String, String)>,
}

impl RouteMatch {
    /// Look up a captured parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All captured parameters.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    query: Vec<QueryRule>,
}

impl RoutePattern {
    /// Compile a pattern string.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }

        let (path, query) = split_query(pattern);

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| parse_segment(pattern, s))
            .collect::<Result<Vec<_>, _>>()?;

        let query = match query {
            Some(q) => q
                .split('&')
                .filter(|c| !c.is_empty())
                .map(|c| parse_query_rule(pattern, c))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            source: pattern.to_string(),
            segments,
            query,
        })
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path and optional raw query string.
    pub fn matches(&self, path: &str, query: Option<&str>) -> Option<RouteMatch> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Vec::new();

        if !match_segments(&self.segments, &parts, &mut params) {
            return None;
        }

        if !self.query.is_empty() {
            let pairs: Vec<(String, String)> =
                url::form_urlencoded::parse(query.unwrap_or("").as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();

            for rule in &self.query {
                let (_, value) = pairs.iter().find(|(k, _)| *k == rule.key)?;
                match &rule.value {
                    QueryValue::Any => {}
                    QueryValue::Literal(expected) if expected == value => {}
                    QueryValue::Literal(_) => return None,
                    QueryValue::Param(name) => params.push((name.clone(), value.clone())),
                }
            }
        }

        Some(RouteMatch { params })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Find the `?` that opens the query section. A `?` directly after a
/// parameter name is an optional modifier instead.
fn split_query(pattern: &str) -> (&str, Option<&str>) {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b':' => {
                i += 1;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                if i < bytes.len() && matches!(bytes[i], b'?' | b'*' | b'+') {
                    i += 1;
                }
            }
            b'?' => return (&pattern[..i], Some(&pattern[i + 1..])),
            _ => i += 1,
        }
    }
    (pattern, None)
}

fn parse_segment(pattern: &str, segment: &str) -> Result<Segment, PatternError> {
    let invalid = || PatternError::InvalidSegment {
        pattern: pattern.to_string(),
        segment: segment.to_string(),
    };

    if segment == "*" {
        return Ok(Segment::Param {
            name: "*".to_string(),
            repeat: Repeat::ZeroOrMore,
        });
    }

    if let Some(rest) = segment.strip_prefix(':') {
        let (name, repeat) = match rest.as_bytes().last() {
            Some(b'?') => (&rest[..rest.len() - 1], Repeat::Optional),
            Some(b'*') => (&rest[..rest.len() - 1], Repeat::ZeroOrMore),
            Some(b'+') => (&rest[..rest.len() - 1], Repeat::OneOrMore),
            _ => (rest, Repeat::One),
        };
        if name.is_empty() {
            return Err(PatternError::EmptyParamName {
                pattern: pattern.to_string(),
            });
        }
        if !name.bytes().all(is_name_byte) {
            return Err(invalid());
        }
        return Ok(Segment::Param {
            name: name.to_string(),
            repeat,
        });
    }

    if segment.contains([':', '*', '?', '+']) {
        return Err(invalid());
    }

    Ok(Segment::Literal(segment.to_string()))
}

fn parse_query_rule(pattern: &str, constraint: &str) -> Result<QueryRule, PatternError> {
    let invalid = || PatternError::InvalidQuery {
        pattern: pattern.to_string(),
        constraint: constraint.to_string(),
    };

    let (key, value) = match constraint.split_once('=') {
        Some((k, v)) => (k, Some(v)),
        None => (constraint, None),
    };
    if key.is_empty() {
        return Err(invalid());
    }

    let value = match value {
        None => QueryValue::Any,
        Some(v) => match v.strip_prefix(':') {
            Some("") => return Err(invalid()),
            Some(name) if name.bytes().all(is_name_byte) => QueryValue::Param(name.to_string()),
            Some(_) => return Err(invalid()),
            None => QueryValue::Literal(v.to_string()),
        },
    };

    Ok(QueryRule {
        key: key.to_string(),
        value,
    })
}

fn match_segments(pattern: &[Segment], path: &[&str], params: &mut Vec<(String, String)>) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };

    match first {
        Segment::Literal(literal) => {
            path.first().is_some_and(|s| s.eq_ignore_ascii_case(literal))
                && match_segments(rest, &path[1..], params)
        }
        Segment::Param { name, repeat } => {
            let (min, max) = match repeat {
                Repeat::One => (1, 1),
                Repeat::Optional => (0, 1),
                Repeat::ZeroOrMore => (0, path.len()),
                Repeat::OneOrMore => (1, path.len()),
            };
            let max = max.min(path.len());
            if min > max {
                return false;
            }

            for take in (min..=max).rev() {
                let mark = params.len();
                if take > 0 {
                    params.push((name.clone(), path[..take].join("/")));
                }
                if match_segments(rest, &path[take..], params) {
                    return true;
                }
                params.truncate(mark);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_param_matches_prefix_and_descendants() {
        let pattern = RoutePattern::parse("/foo/:_*").unwrap();

        assert!(pattern.matches("/foo", None).is_some());
        assert!(pattern.matches("/foo/", None).is_some());
        assert_eq!(
            pattern.matches("/foo/bar/baz", None).unwrap().get("_"),
            Some("bar/baz")
        );
        assert!(pattern.matches("/foobar", None).is_none());
        assert!(pattern.matches("/other/foo", None).is_none());
    }

    #[test]
    fn test_single_and_optional_params() {
        let one = RoutePattern::parse("/users/:id").unwrap();
        assert_eq!(one.matches("/users/42", None).unwrap().get("id"), Some("42"));
        assert!(one.matches("/users", None).is_none());
        assert!(one.matches("/users/42/posts", None).is_none());

        let optional = RoutePattern::parse("/users/:id?").unwrap();
        assert!(optional.matches("/users", None).is_some());
        assert!(optional.matches("/users/42", None).is_some());
        assert!(optional.matches("/users/42/x", None).is_none());
    }

    #[test]
    fn test_one_or_more_requires_a_segment() {
        let pattern = RoutePattern::parse("/docs/:path+").unwrap();
        assert!(pattern.matches("/docs", None).is_none());
        assert_eq!(pattern.matches("/docs/a/b", None).unwrap().get("path"), Some("a/b"));
    }

    #[test]
    fn test_repetition_backtracks_for_trailing_literal() {
        let pattern = RoutePattern::parse("/:rest*/edit").unwrap();
        let m = pattern.matches("/a/b/edit", None).unwrap();
        assert_eq!(m.get("rest"), Some("a/b"));
        assert!(pattern.matches("/a/b", None).is_none());
    }

    #[test]
    fn test_literals_are_case_insensitive() {
        let pattern = RoutePattern::parse("/Settings").unwrap();
        assert!(pattern.matches("/settings", None).is_some());
    }

    #[test]
    fn test_bare_star_wildcard() {
        let pattern = RoutePattern::parse("/assets/*").unwrap();
        assert!(pattern.matches("/assets", None).is_some());
        assert!(pattern.matches("/assets/js/app.js", None).is_some());
    }

    #[test]
    fn test_query_constraints() {
        let pattern = RoutePattern::parse("/share?view=fragment&id=:shared").unwrap();

        let m = pattern.matches("/share", Some("id=abc&view=fragment&x=1")).unwrap();
        assert_eq!(m.get("shared"), Some("abc"));

        assert!(pattern.matches("/share", Some("view=other&id=abc")).is_none());
        assert!(pattern.matches("/share", Some("view=fragment")).is_none());
        assert!(pattern.matches("/share", None).is_none());
    }

    #[test]
    fn test_query_ignored_without_constraints() {
        let pattern = RoutePattern::parse("/foo/:_*").unwrap();
        assert!(pattern.matches("/foo/bar", Some("a=b")).is_some());
    }

    #[test]
    fn test_optional_param_followed_by_query() {
        let pattern = RoutePattern::parse("/page/:id??tab=:tab").unwrap();
        let m = pattern.matches("/page", Some("tab=info")).unwrap();
        assert_eq!(m.get("tab"), Some("info"));
        assert_eq!(m.get("id"), None);
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(RoutePattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(
            RoutePattern::parse("foo"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/foo/:"),
            Err(PatternError::EmptyParamName { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/foo/ba*r"),
            Err(PatternError::InvalidSegment { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/foo?=x"),
            Err(PatternError::InvalidQuery { .. })
        ));
    }
}
