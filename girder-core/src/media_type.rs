//! Media types and `Accept` header parsing.
//!
//! The parsed [`Accept`] list drives both route selection and serializer
//! selection, so its ordering matters: entries are sorted by descending
//! quality value with a stable sort, which keeps the client's declaration
//! order among equally weighted entries.
//!
//! ```
//! use girder_core::media_type::{Accept, MediaType};
//!
//! let accept = Accept::parse("application/xml;q=0.5, application/json;q=0.9");
//! assert_eq!(accept.preferred(), Some(&MediaType::json()));
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_JSON: &str = "text/json";
pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_XHTML: &str = "application/xhtml+xml";
pub const TEXT_PLAIN: &str = "text/plain";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A media type (MIME type) with optional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// The type (e.g., "application", "text")
    pub type_: String,
    /// The subtype (e.g., "json", "html")
    pub subtype: String,
    /// Parameters other than `q` (e.g., charset=utf-8)
    pub params: HashMap<String, String>,
}

impl MediaType {
    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            subtype: subtype.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// `application/json`
    pub fn json() -> Self {
        Self::new("application", "json")
    }

    /// `text/html`
    pub fn html() -> Self {
        Self::new("text", "html")
    }

    /// `application/xhtml+xml`
    pub fn xhtml() -> Self {
        Self::new("application", "xhtml+xml")
    }

    /// `text/plain`
    pub fn plain_text() -> Self {
        Self::new("text", "plain")
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type, ignoring any quality parameter.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(';');

        let mut type_parts = parts.next()?.trim().splitn(2, '/');
        let type_ = type_parts.next()?.trim().to_ascii_lowercase();
        let subtype = type_parts.next()?.trim().to_ascii_lowercase();
        if type_.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = HashMap::new();
        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                let key = key.trim().to_ascii_lowercase();
                if key != "q" {
                    params.insert(key, value.trim().trim_matches('"').to_string());
                }
            }
        }

        Some(Self {
            type_,
            subtype,
            params,
        })
    }

    /// Check if this media type matches another, honouring wildcards on either side.
    pub fn matches(&self, other: &MediaType) -> bool {
        let type_matches = self.type_ == "*" || other.type_ == "*" || self.type_ == other.type_;
        let subtype_matches =
            self.subtype == "*" || other.subtype == "*" || self.subtype == other.subtype;
        type_matches && subtype_matches
    }

    /// Type and subtype equal, no wildcard involved.
    pub fn matches_exactly(&self, other: &MediaType) -> bool {
        !self.has_wildcard() && self.type_ == other.type_ && self.subtype == other.subtype
    }

    pub fn is_any(&self) -> bool {
        self.type_ == "*" && self.subtype == "*"
    }

    pub fn has_wildcard(&self) -> bool {
        self.type_ == "*" || self.subtype == "*"
    }

    /// The `type/subtype` essence, without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.type_, self.subtype)
    }

    /// Check the essence against a `type/subtype` string.
    pub fn is(&self, essence: &str) -> bool {
        essence
            .split_once('/')
            .is_some_and(|(t, s)| self.type_.eq_ignore_ascii_case(t) && self.subtype.eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        let mut params: Vec<_> = self.params.iter().collect();
        params.sort();
        for (key, value) in params {
            write!(f, "; {}={}", key, value)?;
        }
        Ok(())
    }
}

/// A parsed `Accept` header: acceptable media types, most preferred first.
#[derive(Debug, Clone, Default)]
pub struct Accept {
    pub media_types: Vec<(MediaType, f32)>,
}

impl Accept {
    /// An Accept list that takes anything.
    pub fn any() -> Self {
        Self {
            media_types: vec![(MediaType::any(), 1.0)],
        }
    }

    /// Parse an Accept header string.
    ///
    /// Entries with `q=0` are dropped since the client refuses them; missing
    /// quality values default to 1.0. Unparseable entries are skipped.
    pub fn parse(header: &str) -> Self {
        Self::from_weighted(Self::weighted(header))
    }

    /// Parse a header, falling back to `default` when the header is missing,
    /// blank or holds no parseable entry. A header that refuses every type it
    /// lists yields an empty list.
    pub fn parse_or(header: Option<&str>, default: &str) -> Self {
        let weighted = header.map(Self::weighted).unwrap_or_default();
        if weighted.is_empty() {
            Self::parse(default)
        } else {
            Self::from_weighted(weighted)
        }
    }

    fn weighted(header: &str) -> Vec<(MediaType, f32)> {
        header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let quality = Self::extract_quality(part);
                MediaType::parse(part).map(|mt| (mt, quality))
            })
            .collect()
    }

    fn from_weighted(weighted: Vec<(MediaType, f32)>) -> Self {
        let mut media_types: Vec<(MediaType, f32)> =
            weighted.into_iter().filter(|(_, q)| *q > 0.0).collect();

        // Stable: equal weights keep declaration order
        media_types.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Self { media_types }
    }

    fn extract_quality(s: &str) -> f32 {
        s.split(';')
            .skip(1)
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
            .and_then(|(_, value)| value.trim().parse::<f32>().ok())
            .map(|q| if q.is_nan() { 0.0 } else { q.clamp(0.0, 1.0) })
            .unwrap_or(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.media_types.is_empty()
    }

    /// Acceptable types in preference order.
    pub fn types(&self) -> impl Iterator<Item = &MediaType> {
        self.media_types.iter().map(|(mt, _)| mt)
    }

    pub fn preferred(&self) -> Option<&MediaType> {
        self.media_types.first().map(|(mt, _)| mt)
    }

    /// Quality assigned to `media_type` by the first matching entry, 0.0 if none.
    pub fn quality_for(&self, media_type: &MediaType) -> f32 {
        self.media_types
            .iter()
            .find(|(mt, _)| mt.matches(media_type))
            .map(|(_, q)| *q)
            .unwrap_or(0.0)
    }

    pub fn accepts(&self, media_type: &MediaType) -> bool {
        self.quality_for(media_type) > 0.0
    }

    /// Whether the client literally listed `essence` (no wildcard expansion).
    pub fn lists(&self, essence: &str) -> bool {
        self.types().any(|mt| mt.is(essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parse() {
        let mt = MediaType::parse("Application/JSON").unwrap();
        assert_eq!(mt.type_, "application");
        assert_eq!(mt.subtype, "json");
        assert!(MediaType::parse("json").is_none());
        assert!(MediaType::parse("/json").is_none());
    }

    #[test]
    fn test_media_type_with_params() {
        let mt = MediaType::parse("text/html; charset=utf-8; q=0.3").unwrap();
        assert_eq!(mt.params.get("charset"), Some(&"utf-8".to_string()));
        assert!(!mt.params.contains_key("q"));
        assert_eq!(mt.to_string(), "text/html; charset=utf-8");
    }

    #[test]
    fn test_media_type_matches() {
        let json = MediaType::json();
        let any = MediaType::any();
        let app_any = MediaType::new("application", "*");

        assert!(any.matches(&json));
        assert!(app_any.matches(&json));
        assert!(!app_any.matches(&MediaType::html()));
        assert!(json.matches_exactly(&MediaType::json()));
        assert!(!any.matches_exactly(&json));
    }

    #[test]
    fn test_accept_sorted_by_quality() {
        let accept = Accept::parse("application/xml;q=0.5, application/json;q=0.9");
        assert_eq!(accept.media_types[0].0, MediaType::json());
        assert_eq!(accept.media_types[0].1, 0.9);
        assert_eq!(accept.media_types[1].0.subtype, "xml");
    }

    #[test]
    fn test_accept_ties_keep_declaration_order() {
        let accept = Accept::parse("text/plain, */*, application/json");
        let order: Vec<String> = accept.types().map(|mt| mt.essence()).collect();
        assert_eq!(order, vec!["text/plain", "*/*", "application/json"]);
    }

    #[test]
    fn test_accept_drops_refused_types() {
        let accept = Accept::parse("application/json, text/html;q=0");
        assert_eq!(accept.media_types.len(), 1);
        assert!(!accept.accepts(&MediaType::html()));
    }

    #[test]
    fn test_accept_quality_params_anywhere() {
        let accept = Accept::parse("text/html;level=1;q=0.2, text/plain");
        assert_eq!(accept.media_types[0].0, MediaType::plain_text());
        assert_eq!(accept.media_types[1].1, 0.2);
    }

    #[test]
    fn test_accept_parse_or_default() {
        let accept = Accept::parse_or(None, "*/*");
        assert!(accept.preferred().unwrap().is_any());

        let accept = Accept::parse_or(Some("  "), "*/*");
        assert!(accept.preferred().unwrap().is_any());

        let accept = Accept::parse_or(Some("text/plain"), "*/*");
        assert_eq!(accept.preferred(), Some(&MediaType::plain_text()));
    }

    #[test]
    fn test_accept_refusing_everything_stays_empty() {
        assert!(Accept::parse_or(Some("application/json;q=0"), "*/*").is_empty());
        assert!(Accept::parse_or(Some("*/*;q=0"), "*/*").is_empty());

        // nothing parseable at all is treated like a missing header
        let accept = Accept::parse_or(Some("garbage"), "text/plain");
        assert_eq!(accept.preferred(), Some(&MediaType::plain_text()));
    }

    #[test]
    fn test_accept_lists() {
        let accept = Accept::parse("application/xhtml+xml, */*;q=0.1");
        assert!(accept.lists(APPLICATION_XHTML));
        assert!(!accept.lists(TEXT_HTML));
    }
}
