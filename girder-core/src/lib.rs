// Request dispatch core for the Girder web framework
// Route resolution, capability-driven behavior pipelines and content negotiation

pub mod auth;
pub mod behavior;
pub mod config;
pub mod cookie;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod logging;
pub mod media_handler;
pub mod media_type;
pub mod routing;
pub mod runner;
pub mod status;

// Re-export commonly used types
pub use auth::*;
pub use behavior::*;
pub use config::*;
pub use cookie::*;
pub use dispatcher::*;
pub use endpoint::*;
pub use error::*;
pub use http::*;
pub use media_handler::*;
pub use media_type::{Accept, MediaType};
pub use routing::{RouteMatch, RoutingOptions, RoutingTable, UriTemplate};
pub use runner::*;
pub use status::*;

/// Everything an endpoint author usually needs.
pub mod prelude {
    pub use crate::auth::{AuthenticationProvider, SimpleUser, User};
    pub use crate::cookie::Cookie;
    pub use crate::dispatcher::{DispatchOutcome, RequestDispatcher};
    pub use crate::endpoint::{
        Capability, Endpoint, EndpointInfo, EndpointRegistration, MayRedirect, NeedContext,
        Output, ProduceOutput, RawHtml, ReadCookies, ReceiveInput, RequireAuthentication,
        SetCookies,
    };
    pub use crate::error::{Error, Result};
    pub use crate::http::{HttpMethod, Request, RequestContext, Response};
    pub use crate::runner::RequestState;
    pub use crate::status::Status;
    pub use async_trait::async_trait;
}
