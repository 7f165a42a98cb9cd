//! Runs one endpoint instance through its behavior schedule.

use crate::Result;
use crate::behavior::{BehaviorSchedule, Flow, ScheduledBehavior};
use crate::endpoint::Endpoint;
use crate::http::RequestContext;
use std::sync::Arc;
use tracing::{debug, trace};

/// How a request left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Authentication was required and failed; status 401
    Unauthorized,
    /// A behavior aborted with its own status
    Aborted,
    /// The endpoint returned something other than 200; post behaviors skipped
    NonSuccess,
    /// Every post behavior ran
    Written,
    /// An error escaped and was turned into a status
    Faulted,
}

/// An endpoint instance paired with its precomputed schedule.
pub struct EndpointRunner {
    endpoint: Box<dyn Endpoint>,
    schedule: Arc<BehaviorSchedule>,
}

impl EndpointRunner {
    pub fn new(endpoint: Box<dyn Endpoint>, schedule: Arc<BehaviorSchedule>) -> Self {
        Self { endpoint, schedule }
    }

    /// Pre behaviors, the endpoint, then post behaviors when it answered 200.
    ///
    /// The endpoint's status is always written. Redirect statuses carry the
    /// endpoint's location, if it has a non-blank one.
    pub async fn run(mut self, ctx: &mut RequestContext) -> Result<RequestState> {
        let schedule = Arc::clone(&self.schedule);

        if let Some(state) = self.apply_all(&schedule.pre, ctx).await? {
            return Ok(state);
        }

        let status = self.endpoint.run().await?;
        debug!(
            endpoint = self.endpoint.name(),
            status = status.code,
            "Endpoint finished"
        );
        ctx.response.set_status(status.clone());

        if status.is_redirect() {
            let location = self
                .endpoint
                .as_may_redirect()
                .and_then(|redirect| redirect.location())
                .filter(|location| !location.trim().is_empty());
            if let Some(location) = location {
                ctx.response.set_header("Location", location);
            }
        }

        if !status.is_success() {
            return Ok(RequestState::NonSuccess);
        }

        if let Some(state) = self.apply_all(&schedule.post, ctx).await? {
            return Ok(state);
        }
        Ok(RequestState::Written)
    }

    async fn apply_all(
        &mut self,
        behaviors: &[ScheduledBehavior],
        ctx: &mut RequestContext,
    ) -> Result<Option<RequestState>> {
        for scheduled in behaviors {
            trace!(behavior = scheduled.behavior.name(), "Applying behavior");
            match scheduled.behavior.apply(&mut *self.endpoint, ctx).await? {
                Flow::Continue => {}
                Flow::Abort(status) => {
                    debug!(
                        behavior = scheduled.behavior.name(),
                        status = status.code,
                        "Behavior aborted request"
                    );
                    ctx.response.set_status(status);
                    return Ok(Some(RequestState::Aborted));
                }
            }
        }
        Ok(None)
    }
}
