use super::{Behavior, Flow, missing_capability};
use crate::endpoint::{Capability, Endpoint, Output, RawHtml};
use crate::http::{BytesBody, RequestContext};
use crate::media_handler::{Content, SerializedBody};
use crate::media_type::{APPLICATION_XHTML, Accept, TEXT_HTML};
use crate::{Result, Status};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

const MARKUP_TYPES: [&str; 2] = [TEXT_HTML, APPLICATION_XHTML];

/// Negotiates a serializer for the endpoint's output and installs the
/// deferred body writer.
///
/// Raw markup skips negotiation: it goes out as `text/html` unless the
/// client lists another markup type first. HEAD requests get headers only.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteOutput;

impl WriteOutput {
    fn write_markup(markup: RawHtml, accept: &Accept, ctx: &mut RequestContext) {
        let content_type = accept
            .types()
            .find_map(|wanted| MARKUP_TYPES.into_iter().find(|markup| wanted.is(markup)))
            .unwrap_or(TEXT_HTML);

        ctx.response.set_content_type(content_type);
        if !ctx.request.is_head() {
            let body = Bytes::from(markup.as_str().to_owned());
            ctx.response.set_write_fn(Box::new(BytesBody(body)));
        }
    }
}

#[async_trait]
impl Behavior for WriteOutput {
    fn name(&self) -> &'static str {
        "WriteOutput"
    }

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow> {
        let name = endpoint.name();
        let producer = endpoint
            .as_output()
            .ok_or_else(|| missing_capability(name, Capability::Output))?;
        let output = producer.output().await?;
        let accept = ctx.accept();

        let value = match output {
            Output::RawHtml(markup) => {
                Self::write_markup(markup, &accept, ctx);
                return Ok(Flow::Continue);
            }
            Output::Value(value) => value,
        };

        let negotiated = match ctx.media_types.get_handler(&accept) {
            Ok(negotiated) => negotiated,
            Err(err) => {
                warn!(endpoint = name, error = %err, "No media type handler for request");
                return Ok(Flow::Abort(Status::UNSUPPORTED_MEDIA_TYPE));
            }
        };

        debug!(endpoint = name, content_type = %negotiated.content_type, "Negotiated output");
        ctx.response.set_content_type(negotiated.content_type);
        if !ctx.request.is_head() {
            ctx.response.set_write_fn(Box::new(SerializedBody {
                handler: negotiated.handler,
                content: Content::new(name, value),
            }));
        }
        Ok(Flow::Continue)
    }
}
