use super::{Behavior, Flow, missing_capability};
use crate::Result;
use crate::cookie::parse_cookie_header;
use crate::endpoint::{Capability, Endpoint};
use crate::http::RequestContext;
use async_trait::async_trait;
use tracing::trace;

/// Copies the request's `Cookie` header into `ReadCookies` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadRequestCookies;

#[async_trait]
impl Behavior for ReadRequestCookies {
    fn name(&self) -> &'static str {
        "ReadRequestCookies"
    }

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow> {
        let name = endpoint.name();
        let target = endpoint
            .as_read_cookies()
            .ok_or_else(|| missing_capability(name, Capability::ReadCookies))?;

        if let Some(header) = ctx.request.header("cookie") {
            let cookies = parse_cookie_header(header);
            trace!(endpoint = name, count = cookies.len(), "Read request cookies");
            target.request_cookies().extend(cookies);
        }
        Ok(Flow::Continue)
    }
}

/// Renders the cookies a `SetCookies` endpoint collected as `Set-Cookie`
/// headers. Runs first in the post phase so a failing output still carries
/// its cookies.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteResponseCookies;

#[async_trait]
impl Behavior for WriteResponseCookies {
    fn name(&self) -> &'static str {
        "WriteResponseCookies"
    }

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow> {
        let name = endpoint.name();
        let source = endpoint
            .as_set_cookies()
            .ok_or_else(|| missing_capability(name, Capability::SetCookies))?;

        let mut cookies: Vec<_> = source.response_cookies().values().collect();
        cookies.sort_by(|a, b| a.name.cmp(&b.name));
        for cookie in cookies {
            ctx.response.append_header("Set-Cookie", cookie.to_header_value());
        }
        Ok(Flow::Continue)
    }
}
