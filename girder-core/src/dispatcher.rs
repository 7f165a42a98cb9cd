//! # Request dispatcher
//!
//! Ties the pieces together for one request:
//!
//! 1. resolve the path, method and Accept list to an endpoint registration
//! 2. instantiate the endpoint with its variables (path, then query)
//! 3. authenticate it when it requires a user (401 otherwise)
//! 4. run its behavior schedule around it
//!
//! Routing and behavior tables are built once, on first use or through
//! [`RequestDispatcher::initialize`], and shared read-only afterwards.
//! Route collisions surface from that build as configuration errors.
//!
//! Every other failure inside the pipeline is contained here: an
//! endpoint-raised [`Error::Status`](crate::Error::Status) keeps its code
//! and description, anything else becomes a bare 500.

use crate::auth::{AnonymousAuthenticationProvider, AuthenticationProvider};
use crate::behavior::{BehaviorRegistry, BehaviorSchedule};
use crate::config::DispatchConfig;
use crate::endpoint::{Capability, Endpoint, EndpointId, EndpointInfo, EndpointRegistration};
use crate::http::{Request, RequestContext};
use crate::media_handler::MediaTypeHandlerTable;
use crate::routing::RoutingTable;
use crate::runner::{EndpointRunner, RequestState};
use crate::{Error, Result, Status};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened to a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No endpoint matched; the context was left untouched for the host
    NoEndpoint,
    Completed(RequestState),
}

impl DispatchOutcome {
    pub fn was_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Completed(_))
    }
}

/// Tables derived from the registrations, built once.
struct DispatchTables {
    routes: RoutingTable,
    schedules: Vec<Arc<BehaviorSchedule>>,
}

impl DispatchTables {
    fn build(
        registrations: &[EndpointRegistration],
        behaviors: &BehaviorRegistry,
        config: &DispatchConfig,
    ) -> Result<Self> {
        let routes = RoutingTable::build(registrations, config.routing_options())?;
        let schedules = registrations
            .iter()
            .map(|registration| Arc::new(behaviors.schedule_for(registration.capabilities())))
            .collect();

        info!(
            endpoints = registrations.len(),
            routes = routes.len(),
            "Dispatch tables built"
        );
        Ok(Self { routes, schedules })
    }
}

/// Resolves requests to endpoints and drives them through their pipelines.
///
/// ```
/// use girder_core::prelude::*;
///
/// #[derive(Default)]
/// struct Ping;
///
/// #[async_trait]
/// impl Endpoint for Ping {
///     async fn run(&mut self) -> Result<Status> {
///         Ok(Status::NO_CONTENT)
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let dispatcher = RequestDispatcher::builder()
///     .endpoint(EndpointRegistration::of::<Ping>("/ping"))
///     .build();
///
/// let mut ctx = dispatcher.context(Request::get("/ping"));
/// let outcome = dispatcher.dispatch(&mut ctx).await.unwrap();
/// assert!(outcome.was_handled());
/// assert_eq!(ctx.response.status.code, 204);
/// # });
/// ```
pub struct RequestDispatcher {
    registrations: Vec<EndpointRegistration>,
    behaviors: BehaviorRegistry,
    media_types: Arc<MediaTypeHandlerTable>,
    authentication: Arc<dyn AuthenticationProvider>,
    config: DispatchConfig,
    tables: OnceCell<DispatchTables>,
}

impl RequestDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registrations(&self) -> &[EndpointRegistration] {
        &self.registrations
    }

    pub fn media_types(&self) -> &Arc<MediaTypeHandlerTable> {
        &self.media_types
    }

    /// Build the routing and behavior tables now instead of on first request.
    pub fn initialize(&self) -> Result<()> {
        self.tables().map(|_| ())
    }

    fn tables(&self) -> Result<&DispatchTables> {
        self.tables.get_or_try_init(|| {
            DispatchTables::build(&self.registrations, &self.behaviors, &self.config)
        })
    }

    /// The schedule computed for one registration.
    pub fn schedule(&self, endpoint: EndpointId) -> Result<Arc<BehaviorSchedule>> {
        self.tables()?
            .schedules
            .get(endpoint.0)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("no endpoint {:?}", endpoint)))
    }

    /// A fresh context for `request`, wired to this dispatcher's handlers.
    pub fn context(&self, request: Request) -> RequestContext {
        let mut ctx = RequestContext::with_handlers(request, Arc::clone(&self.media_types));
        ctx.default_accept = self.config.default_accept.clone();
        ctx
    }

    /// Find the endpoint for a request without running it.
    ///
    /// Query parameters are merged over path variables when enabled.
    pub fn resolve(&self, request: &Request) -> Result<Option<EndpointInfo>> {
        let tables = self.tables()?;
        let accept = request.accept(&self.config.default_accept);

        let Some(found) = tables.routes.resolve(&request.path, &accept, request.method) else {
            return Ok(None);
        };

        let registration = self.registrations.get(found.endpoint.0).ok_or_else(|| {
            Error::Internal(format!("route points at missing endpoint {:?}", found.endpoint))
        })?;

        let mut info = EndpointInfo::new(found.endpoint, registration, found.variables, request.method);
        if self.config.merge_query_parameters {
            info.merge_query(&request.query);
        }
        Ok(Some(info))
    }

    /// Dispatch one request.
    ///
    /// Only a broken endpoint set (route collision, bad template) is
    /// returned as an error; request-level failures end up in
    /// `ctx.response`.
    pub async fn dispatch(&self, ctx: &mut RequestContext) -> Result<DispatchOutcome> {
        let Some(info) = self.resolve(&ctx.request)? else {
            debug!(method = %ctx.request.method, path = %ctx.request.path, "No endpoint for request");
            return Ok(DispatchOutcome::NoEndpoint);
        };

        let endpoint_name = info.endpoint_name;
        let state = match self.execute(info, ctx).await {
            Ok(state) => state,
            Err(err) => {
                let status = err.client_status();
                if status.is_server_error() {
                    error!(endpoint = endpoint_name, error = %err, "Request failed");
                } else {
                    debug!(endpoint = endpoint_name, status = status.code, "Endpoint raised status");
                }
                ctx.response.discard();
                ctx.response.set_status(status);
                RequestState::Faulted
            }
        };

        Ok(DispatchOutcome::Completed(state))
    }

    /// Resolve, dispatch and hand back the finished response in one call.
    pub async fn handle(&self, request: Request) -> Result<(DispatchOutcome, RequestContext)> {
        let mut ctx = self.context(request);
        let outcome = self.dispatch(&mut ctx).await?;
        Ok((outcome, ctx))
    }

    async fn execute(&self, info: EndpointInfo, ctx: &mut RequestContext) -> Result<RequestState> {
        let registration = self.registrations.get(info.endpoint.0).ok_or_else(|| {
            Error::Internal(format!("no endpoint {:?}", info.endpoint))
        })?;
        let schedule = self.schedule(info.endpoint)?;

        let mut endpoint = registration.create(&info)?;

        if info.requires_authentication && !self.authenticate(&mut *endpoint, ctx).await? {
            return Ok(RequestState::Unauthorized);
        }

        EndpointRunner::new(endpoint, schedule).run(ctx).await
    }

    /// Hand the logged-in user to the endpoint, or answer 401.
    async fn authenticate(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<bool> {
        let user = self.authentication.logged_in_user(&ctx.request).await?;

        match user {
            Some(user) if user.is_authenticated() => {
                let name = endpoint.name();
                let target = endpoint.as_require_authentication().ok_or_else(|| {
                    Error::Internal(format!(
                        "{} declares {} but does not expose it",
                        name,
                        Capability::RequireAuthentication
                    ))
                })?;
                debug!(endpoint = name, user = user.name(), "Authenticated");
                target.set_current_user(user);
                Ok(true)
            }
            _ => {
                debug!(endpoint = endpoint.name(), "Authentication required");
                ctx.response.set_status(Status::UNAUTHORIZED);
                Ok(false)
            }
        }
    }
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("registrations", &self.registrations)
            .field("media_types", &self.media_types)
            .field("config", &self.config)
            .field("initialized", &self.tables.get().is_some())
            .finish()
    }
}

/// Collects registrations and collaborators for a [`RequestDispatcher`].
pub struct DispatcherBuilder {
    registrations: Vec<EndpointRegistration>,
    behaviors: BehaviorRegistry,
    media_types: MediaTypeHandlerTable,
    authentication: Arc<dyn AuthenticationProvider>,
    config: DispatchConfig,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
            behaviors: BehaviorRegistry::new(),
            media_types: MediaTypeHandlerTable::default(),
            authentication: Arc::new(AnonymousAuthenticationProvider),
            config: DispatchConfig::default(),
        }
    }
}

impl DispatcherBuilder {
    pub fn endpoint(mut self, registration: EndpointRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn endpoints(mut self, registrations: impl IntoIterator<Item = EndpointRegistration>) -> Self {
        self.registrations.extend(registrations);
        self
    }

    /// Replace the behavior declarations (the built-ins by default).
    pub fn behaviors(mut self, behaviors: BehaviorRegistry) -> Self {
        self.behaviors = behaviors;
        self
    }

    /// Replace the media type handlers (JSON, plain text, form by default).
    pub fn media_types(mut self, media_types: MediaTypeHandlerTable) -> Self {
        self.media_types = media_types;
        self
    }

    pub fn authentication(mut self, provider: impl AuthenticationProvider + 'static) -> Self {
        self.authentication = Arc::new(provider);
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Build without touching the tables; they are built on first use.
    pub fn build(self) -> RequestDispatcher {
        RequestDispatcher {
            registrations: self.registrations,
            behaviors: self.behaviors,
            media_types: Arc::new(self.media_types),
            authentication: self.authentication,
            config: self.config,
            tables: OnceCell::new(),
        }
    }

    /// Build and initialize, surfacing route collisions immediately.
    pub fn try_build(self) -> Result<RequestDispatcher> {
        let dispatcher = self.build();
        dispatcher.initialize()?;
        Ok(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Ok200;

    #[async_trait]
    impl Endpoint for Ok200 {
        async fn run(&mut self) -> Result<Status> {
            Ok(Status::OK)
        }
    }

    struct Failing(Error);

    #[async_trait]
    impl Endpoint for Failing {
        async fn run(&mut self) -> Result<Status> {
            Err(std::mem::replace(&mut self.0, Error::Internal(String::new())))
        }
    }

    #[test]
    fn test_collision_is_reported_at_build() {
        let err = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::of::<Ok200>("/a/{x}"))
            .endpoint(EndpointRegistration::of::<Ok200>("/a/{y}"))
            .try_build()
            .unwrap_err();
        assert!(matches!(err, Error::RouteCollision(_)));
    }

    #[tokio::test]
    async fn test_lazy_build_reports_collision_on_dispatch() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::of::<Ok200>("/a"))
            .endpoint(EndpointRegistration::of::<Ok200>("/A"))
            .build();

        let mut ctx = dispatcher.context(Request::get("/a"));
        assert!(dispatcher.dispatch(&mut ctx).await.is_err());
    }

    #[test]
    fn test_resolve_merges_query() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::of::<Ok200>("/users/{id}"))
            .build();

        let info = dispatcher
            .resolve(&Request::get("/users/5?id=6&tab=posts"))
            .unwrap()
            .unwrap();
        assert_eq!(info.variable("id"), Some("6"));
        assert_eq!(info.variable("tab"), Some("posts"));
        assert_eq!(info.method, HttpMethod::GET);
    }

    #[test]
    fn test_resolve_without_query_merge() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::of::<Ok200>("/users/{id}"))
            .config(DispatchConfig {
                merge_query_parameters: false,
                ..Default::default()
            })
            .build();

        let info = dispatcher
            .resolve(&Request::get("/users/5?id=6"))
            .unwrap()
            .unwrap();
        assert_eq!(info.variable("id"), Some("5"));
    }

    #[tokio::test]
    async fn test_no_endpoint_leaves_response_alone() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::of::<Ok200>("/known"))
            .build();

        let (outcome, ctx) = dispatcher.handle(Request::get("/unknown")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoEndpoint);
        assert_eq!(ctx.response.status, Status::OK);
        assert!(ctx.response.headers().is_empty());
    }

    #[tokio::test]
    async fn test_status_error_keeps_code() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::new("/gone", |_| {
                Ok(Failing(Error::status(410, "Order archived")))
            }))
            .build();

        let (outcome, ctx) = dispatcher.handle(Request::get("/gone")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed(RequestState::Faulted));
        assert_eq!(ctx.response.status.code, 410);
        assert_eq!(ctx.response.status.description, "Order archived");
    }

    #[tokio::test]
    async fn test_other_errors_become_500() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::new("/boom", |_| {
                Ok(Failing(Error::Internal("connection refused".into())))
            }))
            .build();

        let (_, ctx) = dispatcher.handle(Request::get("/boom")).await.unwrap();
        assert_eq!(ctx.response.status, Status::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_factory_error_becomes_500() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(EndpointRegistration::new("/broken", |_| -> Result<Ok200> {
                Err(Error::EndpointCreation("pool exhausted".into()))
            }))
            .build();

        let (outcome, ctx) = dispatcher.handle(Request::get("/broken")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed(RequestState::Faulted));
        assert_eq!(ctx.response.status.code, 500);
    }

    #[test]
    fn test_schedule_lookup() {
        let dispatcher = RequestDispatcher::builder()
            .endpoint(
                EndpointRegistration::of::<Ok200>("/x")
                    .capability(Capability::Output)
                    .capability(Capability::NeedContext),
            )
            .build();

        let schedule = dispatcher.schedule(EndpointId(0)).unwrap();
        assert_eq!(schedule.pre_names(), vec!["SetContext"]);
        assert_eq!(schedule.post_names(), vec!["WriteOutput"]);
        assert!(dispatcher.schedule(EndpointId(3)).is_err());
    }

    #[test]
    fn test_context_uses_configured_default_accept() {
        let dispatcher = RequestDispatcher::builder()
            .config(DispatchConfig {
                default_accept: "text/plain".into(),
                ..Default::default()
            })
            .build();
        let ctx = dispatcher.context(Request::get("/"));
        assert_eq!(ctx.accept().preferred().map(|m| m.essence()), Some("text/plain".to_string()));
    }
}
