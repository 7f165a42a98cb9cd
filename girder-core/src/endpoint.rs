//! Endpoints, the capability contracts they may satisfy, and their registrations.
//!
//! An endpoint type is registered once with an explicit capability list.
//! The list decides which behaviors run around the endpoint (see
//! [`crate::behavior`]); the `as_*` accessors on [`Endpoint`] give those
//! behaviors typed access to the matching capability on a live instance.
//!
//! ```
//! use girder_core::prelude::*;
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! #[async_trait]
//! impl Endpoint for Hello {
//!     async fn run(&mut self) -> Result<Status> {
//!         Ok(Status::OK)
//!     }
//! }
//!
//! let registration = EndpointRegistration::of::<Hello>("/hello").produces("text/plain");
//! assert_eq!(registration.methods(), &[HttpMethod::GET]);
//! ```

use crate::auth::User;
use crate::cookie::Cookie;
use crate::http::{HttpMethod, Request};
use crate::{Error, Result, Status};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named contract an endpoint type may satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Needs a logged-in user before it may run
    RequireAuthentication,
    /// Receives a handle to the request
    NeedContext,
    /// Receives the deserialized request body
    Input,
    /// Receives the request's cookies
    ReadCookies,
    /// Sets cookies on the response
    SetCookies,
    /// May answer with a redirect location
    MayRedirect,
    /// Produces a body through content negotiation
    Output,
    /// Application-defined capability with registered behaviors
    Custom(&'static str),
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Custom(name) => write!(f, "Custom({})", name),
            other => write!(f, "{:?}", other),
        }
    }
}

pub trait RequireAuthentication: Send + Sync {
    fn set_current_user(&mut self, user: Arc<dyn User>);
}

pub trait NeedContext: Send + Sync {
    fn set_context(&mut self, request: Arc<Request>);
}

pub trait ReceiveInput: Send + Sync {
    /// Accept the body; an `Error::Deserialization` answers 400.
    fn set_input(&mut self, input: Value) -> Result<()>;
}

pub trait ReadCookies: Send + Sync {
    fn request_cookies(&mut self) -> &mut HashMap<String, Cookie>;
}

pub trait SetCookies: Send + Sync {
    fn response_cookies(&mut self) -> &mut HashMap<String, Cookie>;
}

pub trait MayRedirect: Send + Sync {
    fn location(&self) -> Option<&str>;
}

/// Produces the typed output value, possibly after awaiting I/O.
#[async_trait]
pub trait ProduceOutput: Send + Sync {
    async fn output(&self) -> Result<Output>;
}

/// A handler for matched requests.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// The primary operation.
    async fn run(&mut self) -> Result<Status>;

    /// Type name used in logs and in `Content::endpoint`.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_require_authentication(&mut self) -> Option<&mut dyn RequireAuthentication> {
        None
    }

    fn as_need_context(&mut self) -> Option<&mut dyn NeedContext> {
        None
    }

    fn as_input(&mut self) -> Option<&mut dyn ReceiveInput> {
        None
    }

    fn as_read_cookies(&mut self) -> Option<&mut dyn ReadCookies> {
        None
    }

    fn as_set_cookies(&mut self) -> Option<&mut dyn SetCookies> {
        None
    }

    fn as_may_redirect(&self) -> Option<&dyn MayRedirect> {
        None
    }

    fn as_output(&self) -> Option<&dyn ProduceOutput> {
        None
    }
}

/// Pre-rendered markup, written verbatim instead of being negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHtml(String);

impl RawHtml {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RawHtml {
    fn from(markup: &str) -> Self {
        Self::new(markup)
    }
}

/// What an endpoint hands to the output writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    RawHtml(RawHtml),
    Value(Value),
}

impl Output {
    /// Capture any serializable value for negotiation.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Output::Value)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn raw_html(markup: impl Into<String>) -> Self {
        Output::RawHtml(RawHtml::new(markup))
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

impl From<RawHtml> for Output {
    fn from(markup: RawHtml) -> Self {
        Output::RawHtml(markup)
    }
}

/// Index of a registration inside its dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub usize);

type FactoryFn = Arc<dyn Fn(&EndpointInfo) -> Result<Box<dyn Endpoint>> + Send + Sync>;

/// Static declaration of one endpoint type: routes, methods, produced
/// media types, capabilities and how to instantiate it.
#[derive(Clone)]
pub struct EndpointRegistration {
    name: &'static str,
    templates: Vec<String>,
    methods: Vec<HttpMethod>,
    produces: Vec<String>,
    capabilities: Vec<Capability>,
    factory: FactoryFn,
}

impl EndpointRegistration {
    /// Register `E` at `template`, building instances with `factory`.
    pub fn new<E, F>(template: impl Into<String>, factory: F) -> Self
    where
        E: Endpoint + 'static,
        F: Fn(&EndpointInfo) -> Result<E> + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<E>(),
            templates: vec![template.into()],
            methods: Vec::new(),
            produces: Vec::new(),
            capabilities: Vec::new(),
            factory: Arc::new(move |info| {
                factory(info).map(|endpoint| Box::new(endpoint) as Box<dyn Endpoint>)
            }),
        }
    }

    /// Register a `Default`-constructible endpoint.
    pub fn of<E>(template: impl Into<String>) -> Self
    where
        E: Endpoint + Default + 'static,
    {
        Self::new(template, |_| Ok(E::default()))
    }

    /// Also serve the endpoint at another template.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.templates.push(template.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Restrict the endpoint to clients accepting `media_type`.
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Declare a capability; declaration order breaks behavior priority ties.
    pub fn capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn capabilities_from(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        for capability in capabilities {
            self = self.capability(capability);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    /// Accepted methods; GET when none were declared.
    pub fn methods(&self) -> &[HttpMethod] {
        if self.methods.is_empty() {
            &[HttpMethod::GET]
        } else {
            &self.methods
        }
    }

    pub fn produced_types(&self) -> &[String] {
        &self.produces
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Instantiate the endpoint for one request.
    pub fn create(&self, info: &EndpointInfo) -> Result<Box<dyn Endpoint>> {
        (self.factory)(info)
    }
}

impl fmt::Debug for EndpointRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRegistration")
            .field("name", &self.name)
            .field("templates", &self.templates)
            .field("methods", &self.methods())
            .field("produces", &self.produces)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Per-request resolution result: which endpoint, with which variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub endpoint: EndpointId,
    pub endpoint_name: &'static str,
    /// Path variables in path order, then new query parameters
    pub variables: Vec<(String, String)>,
    pub method: HttpMethod,
    pub requires_authentication: bool,
}

impl EndpointInfo {
    pub fn new(
        endpoint: EndpointId,
        registration: &EndpointRegistration,
        variables: Vec<(String, String)>,
        method: HttpMethod,
    ) -> Self {
        Self {
            endpoint,
            endpoint_name: registration.name(),
            variables,
            method,
            requires_authentication: registration
                .has_capability(Capability::RequireAuthentication),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Parse a variable, answering 400 when it is present but malformed and
    /// 404 when it is missing.
    pub fn parse_variable<T: std::str::FromStr>(&self, name: &str) -> Result<T> {
        let raw = self
            .variable(name)
            .ok_or_else(|| Error::status(404, format!("Missing variable '{}'", name)))?;
        raw.parse()
            .map_err(|_| Error::status(400, format!("Invalid value for '{}'", name)))
    }

    /// Merge query parameters; duplicates overwrite in place, new keys are
    /// appended after the path variables.
    pub fn merge_query(&mut self, query: &[(String, String)]) {
        for (key, value) in query {
            match self.variables.iter_mut().find(|(existing, _)| existing == key) {
                Some((_, slot)) => *slot = value.clone(),
                None => self.variables.push((key.clone(), value.clone())),
            }
        }
    }
}
