//! # Behaviors
//!
//! Cross-cutting steps attached to endpoint capabilities. Each capability
//! declares which behaviors run, in which [`Phase`] and at which
//! [`Priority`]; the [`BehaviorRegistry`] turns an endpoint's capability
//! list into an immutable [`BehaviorSchedule`] once, at startup.
//!
//! Built-in declarations:
//!
//! | Capability      | Phase | Priority | Behavior               |
//! |-----------------|-------|----------|------------------------|
//! | `NeedContext`   | pre   | Highest  | [`SetContext`]         |
//! | `ReadCookies`   | pre   | High     | [`ReadRequestCookies`] |
//! | `Input`         | pre   | Normal   | [`SetInput`]           |
//! | `SetCookies`    | post  | Highest  | [`WriteResponseCookies`] |
//! | `Output`        | post  | Normal   | [`WriteOutput`]        |
//!
//! Authentication and redirects are not behaviors: the dispatcher
//! authenticates before any behavior runs, and the runner sets `Location`
//! right after the endpoint returns.

mod context;
mod cookies;
mod input;
mod output;

pub use context::*;
pub use cookies::*;
pub use input::*;
pub use output::*;

use crate::endpoint::{Capability, Endpoint};
use crate::http::RequestContext;
use crate::{Error, Result, Status};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// When a behavior runs relative to the endpoint invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

/// Execution priority; `Highest` runs first within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Highest,
    High,
    Normal,
    Low,
    Lowest,
}

/// What the pipeline does after a behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop the pipeline with this final status
    Abort(Status),
}

/// One pre- or post-processing step.
#[async_trait]
pub trait Behavior: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, endpoint: &mut dyn Endpoint, ctx: &mut RequestContext) -> Result<Flow>;
}

/// Error for an endpoint registered with a capability it does not expose.
pub(crate) fn missing_capability(endpoint: &str, capability: Capability) -> Error {
    Error::Internal(format!(
        "{} declares {} but does not expose it",
        endpoint, capability
    ))
}

/// Static declaration attached to a capability.
#[derive(Clone)]
pub struct BehaviorDescriptor {
    pub phase: Phase,
    pub priority: Priority,
    pub behavior: Arc<dyn Behavior>,
}

impl fmt::Debug for BehaviorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorDescriptor")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .field("behavior", &self.behavior.name())
            .finish()
    }
}

/// Capability -> behavior declarations, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct BehaviorRegistry {
    declarations: Vec<(Capability, BehaviorDescriptor)>,
}

impl BehaviorRegistry {
    /// A registry with no declarations at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in declarations.
    pub fn new() -> Self {
        Self::empty()
            .declare(Capability::NeedContext, Phase::Pre, Priority::Highest, SetContext)
            .declare(Capability::ReadCookies, Phase::Pre, Priority::High, ReadRequestCookies)
            .declare(Capability::Input, Phase::Pre, Priority::Normal, SetInput)
            .declare(Capability::SetCookies, Phase::Post, Priority::Highest, WriteResponseCookies)
            .declare(Capability::Output, Phase::Post, Priority::Normal, WriteOutput)
    }

    /// Attach a behavior to a capability.
    pub fn declare(
        mut self,
        capability: Capability,
        phase: Phase,
        priority: Priority,
        behavior: impl Behavior + 'static,
    ) -> Self {
        self.declarations.push((
            capability,
            BehaviorDescriptor {
                phase,
                priority,
                behavior: Arc::new(behavior),
            },
        ));
        self
    }

    pub fn descriptors_for(&self, capability: Capability) -> impl Iterator<Item = &BehaviorDescriptor> {
        self.declarations
            .iter()
            .filter(move |(declared, _)| *declared == capability)
            .map(|(_, descriptor)| descriptor)
    }

    /// Order the behaviors implied by `capabilities`.
    ///
    /// Stable sort by priority: equal priorities keep capability declaration
    /// order, then descriptor declaration order.
    pub fn schedule_for(&self, capabilities: &[Capability]) -> BehaviorSchedule {
        let mut pre = Vec::new();
        let mut post = Vec::new();

        for capability in capabilities {
            for descriptor in self.descriptors_for(*capability) {
                let scheduled = ScheduledBehavior {
                    capability: *capability,
                    priority: descriptor.priority,
                    behavior: Arc::clone(&descriptor.behavior),
                };
                match descriptor.phase {
                    Phase::Pre => pre.push(scheduled),
                    Phase::Post => post.push(scheduled),
                }
            }
        }

        pre.sort_by_key(|b| b.priority);
        post.sort_by_key(|b| b.priority);

        BehaviorSchedule { pre, post }
    }
}

/// A behavior placed in a schedule.
#[derive(Clone)]
pub struct ScheduledBehavior {
    pub capability: Capability,
    pub priority: Priority,
    pub behavior: Arc<dyn Behavior>,
}

impl fmt::Debug for ScheduledBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.behavior.name(), self.priority)
    }
}

/// Immutable per-endpoint-type behavior order.
#[derive(Debug, Clone, Default)]
pub struct BehaviorSchedule {
    pub pre: Vec<ScheduledBehavior>,
    pub post: Vec<ScheduledBehavior>,
}

impl BehaviorSchedule {
    pub fn pre_names(&self) -> Vec<&'static str> {
        self.pre.iter().map(|b| b.behavior.name()).collect()
    }

    pub fn post_names(&self) -> Vec<&'static str> {
        self.post.iter().map(|b| b.behavior.name()).collect()
    }
}
