//! Media type handlers and the table that negotiates between them.
//!
//! A [`MediaTypeHandler`] turns an endpoint's output into bytes for one or
//! more media types (and, optionally, request bodies back into values). The
//! [`MediaTypeHandlerTable`] picks a handler for a ranked Accept list: for
//! each acceptable type in client order it first looks for an exact match,
//! then for a wildcard match, so `application/json;q=0.9` beats
//! `application/xml;q=0.5` whenever both have handlers.

use crate::http::BodyWriter;
use crate::media_type::{
    APPLICATION_JSON, Accept, FORM_URLENCODED, MediaType, TEXT_JSON, TEXT_PLAIN,
};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An endpoint's output paired with the endpoint that produced it.
#[derive(Debug, Clone)]
pub struct Content {
    /// Type name of the producing endpoint
    pub endpoint: &'static str,
    pub output: Value,
}

impl Content {
    pub fn new(endpoint: &'static str, output: Value) -> Self {
        Self { endpoint, output }
    }
}

/// Serializer (and optionally deserializer) for a family of media types.
#[async_trait]
pub trait MediaTypeHandler: Send + Sync {
    /// Media types this handler is registered under, in preference order.
    fn media_types(&self) -> &'static [&'static str];

    /// Serialize `content` onto the response stream.
    async fn write(&self, content: &Content, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()>;

    /// Deserialize a request body.
    fn read(&self, _body: &[u8]) -> Result<Value> {
        Err(Error::UnsupportedMediaType(format!(
            "{} cannot read request bodies",
            self.media_types().first().copied().unwrap_or("handler")
        )))
    }
}

/// `application/json` and `text/json` via serde_json.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMediaTypeHandler;

#[async_trait]
impl MediaTypeHandler for JsonMediaTypeHandler {
    fn media_types(&self) -> &'static [&'static str] {
        &[APPLICATION_JSON, TEXT_JSON]
    }

    async fn write(&self, content: &Content, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        let bytes = serde_json::to_vec(&content.output)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        stream.write_all(&bytes).await?;
        Ok(())
    }

    fn read(&self, body: &[u8]) -> Result<Value> {
        serde_json::from_slice(body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// `text/plain`: strings verbatim, anything else in its JSON text form.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextMediaTypeHandler;

#[async_trait]
impl MediaTypeHandler for PlainTextMediaTypeHandler {
    fn media_types(&self) -> &'static [&'static str] {
        &[TEXT_PLAIN]
    }

    async fn write(&self, content: &Content, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        let text = match &content.output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        stream.write_all(text.as_bytes()).await?;
        Ok(())
    }

    fn read(&self, body: &[u8]) -> Result<Value> {
        std::str::from_utf8(body)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// `application/x-www-form-urlencoded` via serde_urlencoded.
///
/// Only flat objects of scalars can be written.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormMediaTypeHandler;

#[async_trait]
impl MediaTypeHandler for FormMediaTypeHandler {
    fn media_types(&self) -> &'static [&'static str] {
        &[FORM_URLENCODED]
    }

    async fn write(&self, content: &Content, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        let Value::Object(map) = &content.output else {
            return Err(Error::Serialization(
                "form output must be an object".to_string(),
            ));
        };

        let mut pairs = Vec::with_capacity(map.len());
        for (key, value) in map {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                _ => {
                    return Err(Error::Serialization(format!(
                        "form field '{}' is not a scalar",
                        key
                    )));
                }
            };
            pairs.push((key.as_str(), value));
        }

        let encoded =
            serde_urlencoded::to_string(&pairs).map_err(|e| Error::Serialization(e.to_string()))?;
        stream.write_all(encoded.as_bytes()).await?;
        Ok(())
    }

    fn read(&self, body: &[u8]) -> Result<Value> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(body).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(Value::Object(
            pairs
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        ))
    }
}

/// The outcome of a successful negotiation.
#[derive(Clone)]
pub struct Negotiated {
    pub handler: Arc<dyn MediaTypeHandler>,
    /// Concrete media type to send as `Content-Type`
    pub content_type: String,
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated")
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Registered media types mapped to their handlers, in registration order.
#[derive(Clone)]
pub struct MediaTypeHandlerTable {
    entries: Vec<(MediaType, Arc<dyn MediaTypeHandler>)>,
}

impl MediaTypeHandlerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a handler under every media type it declares.
    pub fn register(mut self, handler: impl MediaTypeHandler + 'static) -> Self {
        self.add(Arc::new(handler));
        self
    }

    pub fn add(&mut self, handler: Arc<dyn MediaTypeHandler>) {
        for media_type in handler.media_types() {
            if let Some(parsed) = MediaType::parse(media_type) {
                self.entries.push((parsed, Arc::clone(&handler)));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the handler for the most preferred acceptable type that has one.
    ///
    /// Within one acceptable type an exact registration beats a wildcard match.
    pub fn get_handler(&self, accept: &Accept) -> Result<Negotiated> {
        for wanted in accept.types() {
            if let Some((registered, handler)) = self
                .entries
                .iter()
                .find(|(registered, _)| registered.matches_exactly(wanted))
            {
                return Ok(Negotiated {
                    handler: Arc::clone(handler),
                    content_type: registered.essence(),
                });
            }

            if let Some((registered, handler)) = self
                .entries
                .iter()
                .find(|(registered, _)| wanted.matches(registered))
            {
                let content_type = if registered.has_wildcard() && !wanted.has_wildcard() {
                    wanted.essence()
                } else {
                    registered.essence()
                };
                return Ok(Negotiated {
                    handler: Arc::clone(handler),
                    content_type,
                });
            }
        }

        let requested: Vec<String> = accept.types().map(|mt| mt.essence()).collect();
        Err(Error::UnsupportedMediaType(requested.join(", ")))
    }

    /// The handler able to read a request body of `content_type`.
    pub fn get_reader(&self, content_type: &str) -> Option<Arc<dyn MediaTypeHandler>> {
        let wanted = MediaType::parse(content_type)?;
        self.entries
            .iter()
            .find(|(registered, _)| registered.matches_exactly(&wanted))
            .map(|(_, handler)| Arc::clone(handler))
    }
}

impl Default for MediaTypeHandlerTable {
    /// JSON first, so `*/*` negotiates to JSON.
    fn default() -> Self {
        Self::new()
            .register(JsonMediaTypeHandler)
            .register(PlainTextMediaTypeHandler)
            .register(FormMediaTypeHandler)
    }
}

impl fmt::Debug for MediaTypeHandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(mt, _)| mt.essence()))
            .finish()
    }
}

/// Deferred body that streams `content` through a negotiated handler.
pub struct SerializedBody {
    pub handler: Arc<dyn MediaTypeHandler>,
    pub content: Content,
}

#[async_trait]
impl BodyWriter for SerializedBody {
    async fn write_to(self: Box<Self>, stream: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<()> {
        self.handler.write(&self.content, stream).await?;
        stream.flush().await?;
        Ok(())
    }
}
