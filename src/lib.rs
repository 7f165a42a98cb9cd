// Girder - capability-driven request dispatch for Rust
//
// Endpoints declare what they need (context, input, cookies, output, a user)
// and the dispatcher routes requests to them, runs the matching behaviors in
// priority order and negotiates the response format.

// Re-export core functionality
pub use girder_core::*;

// Prelude for common imports
pub mod prelude {
    pub use girder_core::prelude::*;
    pub use girder_core::{
        Behavior, BehaviorRegistry, DispatchConfig, Flow, MediaTypeHandler,
        MediaTypeHandlerTable, Phase, Priority,
    };
}
