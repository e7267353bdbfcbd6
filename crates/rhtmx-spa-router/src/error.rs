//! Error types for route resolution and the loader lifecycle

use thiserror::Error;

/// Errors raised by the router itself
///
/// Loader, action and guard failures are not represented here: they are
/// captured as `anyhow::Error` and surfaced through
/// [`LoaderState`](crate::LoaderState) / [`ActionState`](crate::ActionState).
#[derive(Debug, Error)]
pub enum RouterError {
    /// A route pattern violates the segment rules
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// A navigation target is not accepted by any route pattern
    #[error("no route pattern accepts `{0}`")]
    UnknownTarget(String),

    /// An operation needed a matched route but the location resolved to 404
    #[error("no route matched the current location")]
    NoRouteMatched,

    /// A submission targeted a route without an action
    #[error("route `{0}` has no action")]
    NoAction(String),

    /// A submission was attempted while another is still in flight
    #[error("a submission for `{0}` is already in flight")]
    SubmissionInFlight(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Misuse of router context from a scope that does not provide it
///
/// These are integration mistakes, so accessors return them instead of
/// falling back to empty defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("router context read outside of an active router")]
    OutsideRouter,

    #[error("loader/action state read outside of a matched route")]
    OutsideRoute,
}
