//! # RHTMX SPA Router
//!
//! Client-side route matching and loader orchestration for single-page apps:
//! - Static routes (`/about`)
//! - Dynamic parameters (`/users/:id`)
//! - Catch-all routes (`/docs/*`, bound to `slug`)
//! - Nested layouts and prefix-scoped 404 pages
//! - Per-route loaders, actions and navigation guards
//!
//! ## Flow
//!
//! A [`Navigator`] owns the current [`Location`]. Every change re-runs
//! selection on the [`RouteTable`], the matched route enters the
//! [`Lifecycle`] (guard, loader, cancellation of superseded loads), and
//! [`Router::render`] composes the page inside its layout chain as a
//! [`RenderNode`] tree.
//!
//! ## Example
//!
//! ```
//! use rhtmx_spa_router::{Component, NotFoundConfig, Route, RouteTable};
//!
//! let table = RouteTable::new()
//!     .with_route(Route::new("/users/new", Component::new("NewUser")).unwrap())
//!     .with_route(Route::new("/users/:id", Component::new("User")).unwrap())
//!     .with_not_found(NotFoundConfig::global(Component::new("NotFound")));
//!
//! let matched = table.match_route("/users/123").unwrap();
//! assert_eq!(matched.params.get("id"), Some(&"123".to_string()));
//! assert_eq!(table.match_route("/users/new").unwrap().pattern(), "/users/new");
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod config;
mod error;
pub mod head;
pub mod history;
pub mod lifecycle;
pub mod navigation;
pub mod outlet;
pub mod path;
pub mod route;
mod router;
pub mod search;
pub mod table;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::RouterConfig;
pub use error::{ContextError, RouterError};
pub use head::{apply_meta, DocumentHead, MemoryHead, NoopHead};
pub use history::{History, MemoryHistory, PopDirection, PopEvent};
pub use lifecycle::{ActionState, Lifecycle, LoadTarget, LoaderState};
pub use navigation::{Location, Navigator, SetSearchOptions};
pub use outlet::{compose, RenderNode, Retry, RouteScope, RouterContext, ViewContext};
pub use route::definition::{ActionContext, ActionRequest, FormData, LoaderContext};
pub use route::{
    Component, LayoutRoute, LazyPage, MatchResult, NotFoundConfig, Page, Params, Route,
    RouteDefinition, RouteMeta, RoutePattern, Segment, SpecificityTier,
};
pub use router::{Router, RouterBuilder};
pub use search::{decode, encode, SearchParams, SearchPatch, SearchValue};
pub use table::{RouteMatch, RouteTable, Selection};
