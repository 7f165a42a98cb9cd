// Normalized request/response abstractions handed in and out by hosting adapters

use crate::media_type::Accept;
use crate::media_handler::MediaTypeHandlerTable;
use crate::{Result, Status};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Deferred body producer, invoked by the hosting adapter once every header
/// has been finalized.
#[async_trait]
pub trait BodyWriter: Send + Sync {
    async fn write_to(self: Box<Self>, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()>;
}

pub type WriteFn = Box<dyn BodyWriter>;

/// A body that is already fully rendered.
pub struct BytesBody(pub Bytes);

#[async_trait]
impl BodyWriter for BytesBody {
    async fn write_to(self: Box<Self>, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_all(&self.0).await?;
        stream.flush().await?;
        Ok(())
    }
}

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming request, already parsed by the hosting adapter.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    /// Absolute path, without the query string
    pub path: String,
    /// Decoded query parameters in URL order
    pub query: Vec<(String, String)>,
    /// Header names are stored lowercased
    headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    /// Build a request from a method and a raw `path?query` URL.
    pub fn new(method: HttpMethod, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, parse_query_string(query)),
            None => (url, Vec::new()),
        };

        Self {
            method,
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(HttpMethod::GET, url)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn accept_header(&self) -> Option<&str> {
        self.header("accept")
    }

    /// The parsed Accept list, or `default` when the client sent none.
    pub fn accept(&self, default: &str) -> Accept {
        Accept::parse_or(self.accept_header(), default)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_head(&self) -> bool {
        self.method == HttpMethod::HEAD
    }
}

/// Parse a query string into decoded key/value pairs, keeping URL order.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(raw)
}

/// The response under construction. Headers keep insertion order and may repeat.
pub struct Response {
    pub status: Status,
    headers: Vec<(String, String)>,
    write_fn: Option<WriteFn>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: Status::OK,
            headers: Vec::new(),
            write_fn: None,
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    /// Replace every header called `name`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header("Content-Type", content_type);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn set_write_fn(&mut self, write_fn: WriteFn) {
        self.write_fn = Some(write_fn);
    }

    pub fn has_body(&self) -> bool {
        self.write_fn.is_some()
    }

    /// Drop every header and the pending body, keeping the status.
    pub fn discard(&mut self) {
        self.headers.clear();
        self.write_fn = None;
    }

    /// Hand the deferred body producer to the hosting adapter.
    pub fn take_write_fn(&mut self) -> Option<WriteFn> {
        self.write_fn.take()
    }

    /// Run the deferred write against `stream`, if a body was produced.
    pub async fn write_body(&mut self, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<bool> {
        match self.write_fn.take() {
            Some(writer) => {
                writer.write_to(stream).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.write_fn.is_some())
            .finish()
    }
}

/// Everything one request's pipeline reads and writes.
pub struct RequestContext {
    pub request: Arc<Request>,
    pub response: Response,
    pub media_types: Arc<MediaTypeHandlerTable>,
    /// Accept list used when the request carries no Accept header
    pub default_accept: String,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self::with_handlers(request, Arc::new(MediaTypeHandlerTable::default()))
    }

    pub fn with_handlers(request: Request, media_types: Arc<MediaTypeHandlerTable>) -> Self {
        Self {
            request: Arc::new(request),
            response: Response::new(),
            media_types,
            default_accept: "*/*".to_string(),
        }
    }

    /// The request's Accept list, most preferred first.
    pub fn accept(&self) -> Accept {
        self.request.accept(&self.default_accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let request = Request::get("/search?q=rust%20lang&page=2&flag");
        assert_eq!(request.path, "/search");
        assert_eq!(
            request.query,
            vec![
                ("q".to_string(), "rust lang".to_string()),
                ("page".to_string(), "2".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_query_plus_is_space() {
        let query = parse_query_string("name=john+doe&email=test%40example.com");
        assert_eq!(query[0].1, "john doe");
        assert_eq!(query[1].1, "test@example.com");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let request = Request::get("/").with_header("Accept", "text/plain");
        assert_eq!(request.header("accept"), Some("text/plain"));
        assert_eq!(request.header("ACCEPT"), Some("text/plain"));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(HttpMethod::from_str("head"), Some(HttpMethod::HEAD));
        assert_eq!(HttpMethod::from_str("BREW"), None);
        assert_eq!(HttpMethod::PATCH.to_string(), "PATCH");
    }

    #[test]
    fn test_response_headers() {
        let mut response = Response::new();
        response.set_header("Content-Type", "text/plain");
        response.set_header("content-type", "application/json");
        response.append_header("Set-Cookie", "a=1");
        response.append_header("Set-Cookie", "b=2");

        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.header_values("set-cookie").count(), 2);
        assert_eq!(response.headers().len(), 3);
    }

    #[tokio::test]
    async fn test_write_body_runs_once() {
        let mut response = Response::new();
        response.set_write_fn(Box::new(BytesBody(Bytes::from_static(b"hello"))));

        let mut buf: Vec<u8> = Vec::new();
        assert!(response.write_body(&mut buf).await.unwrap());
        assert_eq!(buf, b"hello");
        assert!(!response.write_body(&mut buf).await.unwrap());
    }
}
