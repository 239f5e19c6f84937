//! Fragment registry and request-to-fragment lookup.
//!
//! # Responsibilities
//! - Store fragment configs keyed by id
//! - Compile route patterns at registration time
//! - Resolve a URL or request to at most one fragment
//!
//! # Design Decisions
//! - Populated at startup, then frozen behind an `Arc` (lock-free reads)
//! - Duplicate ids are ignored with a warning, never fatal
//! - First match wins in registration order; no specificity ranking, so a
//!   broad pattern registered early shadows a narrower one registered later

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{request, Request, Uri};

use super::fragment::{FragmentConfig, RegistryError};
use super::matcher::{PatternError, RouteMatch, RoutePattern};
use crate::config::schema::FragmentEntry;

/// Path and raw query extracted from something routable.
#[derive(Debug, Clone)]
pub struct RouteTarget<'a> {
    pub path: Cow<'a, str>,
    pub query: Option<Cow<'a, str>>,
}

/// Anything the registry can match: URLs, URIs, path strings, requests.
pub trait Routable {
    fn route_target(&self) -> RouteTarget<'_>;
}

impl Routable for str {
    fn route_target(&self) -> RouteTarget<'_> {
        if !self.starts_with('/') {
            if let Ok(url) = url::Url::parse(self) {
                return RouteTarget {
                    path: Cow::Owned(url.path().to_string()),
                    query: url.query().map(|q| Cow::Owned(q.to_string())),
                };
            }
        }

        let without_fragment = self.split('#').next().unwrap_or("");
        match without_fragment.split_once('?') {
            Some((path, query)) => RouteTarget {
                path: Cow::Borrowed(path),
                query: Some(Cow::Borrowed(query)),
            },
            None => RouteTarget {
                path: Cow::Borrowed(without_fragment),
                query: None,
            },
        }
    }
}

impl Routable for String {
    fn route_target(&self) -> RouteTarget<'_> {
        self.as_str().route_target()
    }
}

impl Routable for Uri {
    fn route_target(&self) -> RouteTarget<'_> {
        RouteTarget {
            path: Cow::Borrowed(self.path()),
            query: self.query().map(Cow::Borrowed),
        }
    }
}

impl Routable for url::Url {
    fn route_target(&self) -> RouteTarget<'_> {
        RouteTarget {
            path: Cow::Borrowed(self.path()),
            query: self.query().map(Cow::Borrowed),
        }
    }
}

impl<B> Routable for Request<B> {
    fn route_target(&self) -> RouteTarget<'_> {
        self.uri().route_target()
    }
}

impl Routable for request::Parts {
    fn route_target(&self) -> RouteTarget<'_> {
        self.uri.route_target()
    }
}

/// Registry of fragments and their compiled routes.
#[derive(Debug, Default)]
pub struct FragmentRegistry {
    fragments: HashMap<String, Arc<FragmentConfig>>,
    routes: Vec<(RoutePattern, Arc<FragmentConfig>)>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from config file entries, in file order.
    pub fn from_entries(entries: &[FragmentEntry]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(FragmentConfig::from_entry(entry)?)?;
        }
        Ok(registry)
    }

    /// Register a fragment.
    ///
    /// Returns `Ok(false)` when the id is already taken; the registry is left
    /// untouched in that case. All patterns are compiled before anything is
    /// inserted, so a bad pattern never leaves a half-registered fragment.
    pub fn register(&mut self, config: FragmentConfig) -> Result<bool, PatternError> {
        if self.fragments.contains_key(&config.fragment_id) {
            tracing::warn!(
                fragment_id = %config.fragment_id,
                "Fragment already registered, ignoring duplicate"
            );
            return Ok(false);
        }

        let patterns = config
            .route_patterns
            .iter()
            .map(|p| RoutePattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Arc::new(config);
        for pattern in patterns {
            self.routes.push((pattern, Arc::clone(&config)));
        }

        tracing::info!(
            fragment_id = %config.fragment_id,
            endpoint = %config.endpoint,
            routes = config.route_patterns.len(),
            "Fragment registered"
        );
        self.fragments.insert(config.fragment_id.clone(), config);
        Ok(true)
    }

    /// Resolve a target to its fragment, or `None` when nothing matches.
    pub fn match_request_to_fragment<T: Routable + ?Sized>(
        &self,
        target: &T,
    ) -> Option<Arc<FragmentConfig>> {
        self.resolve(target).map(|(config, _)| config)
    }

    /// Like [`match_request_to_fragment`](Self::match_request_to_fragment),
    /// also returning the captured route parameters.
    pub fn resolve<T: Routable + ?Sized>(
        &self,
        target: &T,
    ) -> Option<(Arc<FragmentConfig>, RouteMatch)> {
        let target = target.route_target();
        self.routes.iter().find_map(|(pattern, config)| {
            pattern
                .matches(&target.path, target.query.as_deref())
                .map(|m| (Arc::clone(config), m))
        })
    }

    pub fn get(&self, fragment_id: &str) -> Option<&Arc<FragmentConfig>> {
        self.fragments.get(fragment_id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn registry() -> FragmentRegistry {
        let mut registry = FragmentRegistry::new();
        registry
            .register(FragmentConfig::new("foo", "http://foo.test", ["/foo/:_*"]))
            .unwrap();
        registry
            .register(FragmentConfig::new(
                "shared",
                "http://shared.test",
                ["/share?fragment=:id", "/embed/:id"],
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_match_by_path_uri_url_and_request() {
        let registry = registry();

        assert_eq!(registry.match_request_to_fragment("/foo/bar").unwrap().fragment_id, "foo");

        let uri: Uri = "/foo/bar?x=1".parse().unwrap();
        assert_eq!(registry.match_request_to_fragment(&uri).unwrap().fragment_id, "foo");

        let url = url::Url::parse("https://example.com/embed/42").unwrap();
        assert_eq!(registry.match_request_to_fragment(&url).unwrap().fragment_id, "shared");

        let request = Request::builder()
            .uri("http://example.com/foo")
            .body(Body::empty())
            .unwrap();
        assert_eq!(registry.match_request_to_fragment(&request).unwrap().fragment_id, "foo");

        assert_eq!(
            registry
                .match_request_to_fragment("http://example.com/share?fragment=abc")
                .unwrap()
                .fragment_id,
            "shared"
        );
    }

    #[test]
    fn test_no_match() {
        let registry = registry();
        assert!(registry.match_request_to_fragment("/bar").is_none());
        assert!(registry.match_request_to_fragment("/share").is_none());
        assert!(registry.match_request_to_fragment("/").is_none());
    }

    #[test]
    fn test_every_pattern_resolves_to_its_fragment() {
        let registry = registry();
        let (config, m) = registry.resolve("/share?fragment=abc").unwrap();
        assert_eq!(config.fragment_id, "shared");
        assert_eq!(m.get("id"), Some("abc"));

        let (config, m) = registry.resolve("/embed/7").unwrap();
        assert_eq!(config.fragment_id, "shared");
        assert_eq!(m.get("id"), Some("7"));
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let mut registry = registry();
        let added = registry
            .register(FragmentConfig::new("foo", "http://other.test", ["/other"]))
            .unwrap();

        assert!(!added);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("foo").unwrap().endpoint, "http://foo.test");
        assert!(registry.match_request_to_fragment("/other").is_none());
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let mut registry = FragmentRegistry::new();
        registry
            .register(FragmentConfig::new("broad", "http://broad.test", ["/app/:_*"]))
            .unwrap();
        registry
            .register(FragmentConfig::new("narrow", "http://narrow.test", ["/app/settings"]))
            .unwrap();

        assert_eq!(
            registry.match_request_to_fragment("/app/settings").unwrap().fragment_id,
            "broad"
        );
    }

    #[test]
    fn test_invalid_pattern_leaves_registry_untouched() {
        let mut registry = FragmentRegistry::new();
        let result =
            registry.register(FragmentConfig::new("bad", "http://bad.test", ["/ok", "nope"]));

        assert!(result.is_err());
        assert!(registry.is_empty());
        assert!(registry.match_request_to_fragment("/ok").is_none());
    }
}
