//! Route matching: URL templates, methods and produced media types.
//!
//! Templates are `/`-separated. A segment is either a literal, a `{name}`
//! placeholder matching exactly one path segment, or - as the last segment
//! only - a `{*name}` catch-all matching one or more remaining segments
//! (captured joined by `/`).
//!
//! Resolution filters by structure, then by method, then walks the client's
//! acceptable media types in preference order. For each acceptable type the
//! entries whose produced types intersect it are preferred; entries without
//! a produced-type restriction serve as the fallback for that type. Among
//! the survivors the entry with the most literal segments wins, then the one
//! without a catch-all, then the one registered first.

use crate::endpoint::{EndpointId, EndpointRegistration};
use crate::http::HttpMethod;
use crate::media_type::{Accept, MediaType};
use crate::{Error, Result};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    CatchAll(String),
}

/// A parsed route template such as `/users/{id}/files/{*path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names = HashSet::new();

        for (index, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (name, catch_all) = match inner.strip_prefix('*') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(invalid("placeholder names must be non-empty identifiers"));
                    }
                    if !names.insert(name.to_string()) {
                        return Err(invalid(&format!("duplicate placeholder '{}'", name)));
                    }
                    if catch_all && index + 1 != parts.len() {
                        return Err(invalid("a catch-all placeholder must be the last segment"));
                    }
                    if catch_all {
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Variable(name.to_string())
                    }
                }
                None if part.contains(['{', '}']) => {
                    return Err(invalid("placeholders must span a whole segment"));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of literal (non-placeholder) segments.
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    /// Placeholder names in path order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) | Segment::CatchAll(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// The template with placeholder names erased, for collision detection.
    fn shape(&self, case_insensitive: bool) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(lit) if case_insensitive => shape.push_str(&lit.to_ascii_lowercase()),
                Segment::Literal(lit) => shape.push_str(lit),
                Segment::Variable(_) => shape.push_str("{}"),
                Segment::CatchAll(_) => shape.push_str("{*}"),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Match decoded path segments, returning placeholder values in path order.
    pub fn match_segments(
        &self,
        path: &[String],
        case_insensitive: bool,
    ) -> Option<Vec<(String, String)>> {
        if self.has_catch_all() {
            if path.len() < self.segments.len() {
                return None;
            }
        } else if path.len() != self.segments.len() {
            return None;
        }

        let mut variables = Vec::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    let same = if case_insensitive {
                        lit.eq_ignore_ascii_case(&path[index])
                    } else {
                        *lit == path[index]
                    };
                    if !same {
                        return None;
                    }
                }
                Segment::Variable(name) => variables.push((name.clone(), path[index].clone())),
                Segment::CatchAll(name) => {
                    variables.push((name.clone(), path[index..].join("/")));
                }
            }
        }
        Some(variables)
    }

    /// Match a raw request path.
    pub fn match_path(&self, path: &str, case_insensitive: bool) -> Option<Vec<(String, String)>> {
        self.match_segments(&split_path(path), case_insensitive)
    }
}

/// Split a request path into percent-decoded segments, ignoring empty ones.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect()
}

/// One template-to-endpoint mapping, scoped by methods and produced types.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub template: UriTemplate,
    pub endpoint: EndpointId,
    /// Empty means the entry places no restriction on the client's Accept list
    pub produces: Vec<MediaType>,
    pub methods: Vec<HttpMethod>,
    order: usize,
}

impl RouteEntry {
    fn accepts_method(&self, method: HttpMethod, head_matches_get: bool) -> bool {
        self.methods.contains(&method)
            || (head_matches_get && method == HttpMethod::HEAD && self.methods.contains(&HttpMethod::GET))
    }

    fn is_restricted(&self) -> bool {
        !self.produces.is_empty()
    }

    fn produces_for(&self, wanted: &MediaType) -> bool {
        self.produces.iter().any(|produced| wanted.matches(produced))
    }

    fn specificity_key(&self) -> (Reverse<usize>, bool, usize) {
        (
            Reverse(self.template.literal_count()),
            self.template.has_catch_all(),
            self.order,
        )
    }
}

/// Matching knobs, normally taken from [`crate::config::DispatchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RoutingOptions {
    pub case_insensitive: bool,
    pub head_matches_get: bool,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            head_matches_get: true,
        }
    }
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: EndpointId,
    /// Placeholder values in path order
    pub variables: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Immutable set of route entries built once from endpoint registrations.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
    options: RoutingOptions,
}

impl RoutingTable {
    /// Build the table, rejecting any two entries that share a template
    /// shape, a method and a produced media type.
    pub fn build(registrations: &[EndpointRegistration], options: RoutingOptions) -> Result<Self> {
        let mut entries = Vec::new();
        let mut seen: HashMap<(String, HttpMethod, String), &'static str> = HashMap::new();

        for (index, registration) in registrations.iter().enumerate() {
            let produces = registration
                .produced_types()
                .iter()
                .map(|raw| {
                    MediaType::parse(raw).ok_or_else(|| {
                        Error::Configuration(format!(
                            "{} declares invalid media type '{}'",
                            registration.name(),
                            raw
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for raw in registration.templates() {
                let template = UriTemplate::parse(raw)?;
                let shape = template.shape(options.case_insensitive);

                for method in registration.methods() {
                    let keys: Vec<String> = if produces.is_empty() {
                        vec!["*/*".to_string()]
                    } else {
                        produces.iter().map(MediaType::essence).collect()
                    };
                    for media in keys {
                        let key = (shape.clone(), *method, media);
                        if let Some(existing) = seen.insert(key, registration.name()) {
                            return Err(Error::RouteCollision(format!(
                                "{} {} ({}) is declared by both {} and {}",
                                method,
                                raw,
                                if produces.is_empty() { "any media type" } else { "same media type" },
                                existing,
                                registration.name()
                            )));
                        }
                    }
                }

                entries.push(RouteEntry {
                    template,
                    endpoint: EndpointId(index),
                    produces: produces.clone(),
                    methods: registration.methods().to_vec(),
                    order: entries.len(),
                });
            }
        }

        info!(entries = entries.len(), "Routing table built");
        Ok(Self { entries, options })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Resolve a request to an endpoint and its path variables.
    pub fn resolve(&self, path: &str, accept: &Accept, method: HttpMethod) -> Option<RouteMatch> {
        let segments = split_path(path);

        let structural: Vec<(&RouteEntry, Vec<(String, String)>)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .template
                    .match_segments(&segments, self.options.case_insensitive)
                    .map(|vars| (entry, vars))
            })
            .collect();
        if structural.is_empty() {
            debug!(path = %path, "No route template matches");
            return None;
        }

        let candidates: Vec<_> = structural
            .into_iter()
            .filter(|(entry, _)| entry.accepts_method(method, self.options.head_matches_get))
            .collect();
        if candidates.is_empty() {
            debug!(path = %path, method = %method, "No route accepts method");
            return None;
        }

        // A client that refused every type still reaches an endpoint;
        // output negotiation then answers 415.
        if accept.is_empty() {
            let (entry, vars) = candidates
                .iter()
                .min_by_key(|(entry, _)| (entry.is_restricted(), entry.specificity_key()))?;
            debug!(path = %path, template = %entry.template.as_str(), "Route resolved without acceptable types");
            return Some(RouteMatch {
                endpoint: entry.endpoint,
                variables: vars.clone(),
            });
        }

        for wanted in accept.types() {
            let mut pool: Vec<_> = candidates
                .iter()
                .filter(|(entry, _)| entry.is_restricted() && entry.produces_for(wanted))
                .collect();
            if pool.is_empty() {
                pool = candidates
                    .iter()
                    .filter(|(entry, _)| !entry.is_restricted())
                    .collect();
            }

            if let Some((entry, vars)) = pool.into_iter().min_by_key(|(entry, _)| entry.specificity_key()) {
                debug!(
                    path = %path,
                    template = %entry.template.as_str(),
                    media_type = %wanted,
                    "Route resolved"
                );
                return Some(RouteMatch {
                    endpoint: entry.endpoint,
                    variables: vars.clone(),
                });
            }
        }

        debug!(path = %path, "No route produces an acceptable media type");
        None
    }
}
