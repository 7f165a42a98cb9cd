use super::{Behavior, Flow, missing_capability};
use crate::Result;
use crate::endpoint::{Capability, Endpoint};
use crate::http::RequestContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Hands the request to `NeedContext` endpoints before anything else runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetContext;

#[async_trait]
impl Behavior for SetContext {
    fn name(&self) -> &'static str {
        "SetContext"
    }

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow> {
        let name = endpoint.name();
        let target = endpoint
            .as_need_context()
            .ok_or_else(|| missing_capability(name, Capability::NeedContext))?;
        target.set_context(Arc::clone(&ctx.request));
        Ok(Flow::Continue)
    }
}
