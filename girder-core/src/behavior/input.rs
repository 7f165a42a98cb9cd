use super::{Behavior, Flow, missing_capability};
use crate::endpoint::{Capability, Endpoint};
use crate::http::RequestContext;
use crate::{Error, Result, Status};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Deserializes the request body through the handler registered for its
/// `Content-Type` and hands the value to an `Input` endpoint.
///
/// An empty body leaves the endpoint untouched. An unreadable content type
/// aborts with 415, a malformed body with 400.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetInput;

#[async_trait]
impl Behavior for SetInput {
    fn name(&self) -> &'static str {
        "SetInput"
    }

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow> {
        let name = endpoint.name();
        let target = endpoint
            .as_input()
            .ok_or_else(|| missing_capability(name, Capability::Input))?;

        let request = &ctx.request;
        if request.body.is_empty() {
            return Ok(Flow::Continue);
        }

        let Some(reader) = request
            .content_type()
            .and_then(|content_type| ctx.media_types.get_reader(content_type))
        else {
            warn!(
                endpoint = name,
                content_type = request.content_type().unwrap_or("<none>"),
                "No reader for request body"
            );
            return Ok(Flow::Abort(Status::UNSUPPORTED_MEDIA_TYPE));
        };

        let value = match reader.read(&request.body) {
            Ok(value) => value,
            Err(Error::Deserialization(reason)) => {
                debug!(endpoint = name, %reason, "Malformed request body");
                return Ok(Flow::Abort(Status::BAD_REQUEST));
            }
            Err(err) => return Err(err),
        };

        match target.set_input(value) {
            Ok(()) => Ok(Flow::Continue),
            Err(Error::Deserialization(reason)) => {
                debug!(endpoint = name, %reason, "Request body rejected");
                Ok(Flow::Abort(Status::BAD_REQUEST))
            }
            Err(err) => Err(err),
        }
    }
}
