//! Outlet composition and context propagation
//!
//! Rendering produces a [`RenderNode`] tree: the page (or pending, error,
//! 404 view) is wrapped by each matching layout, most specific innermost.
//! Every node carries a [`ViewContext`] so descendants can reach routing
//! state; loader/action state is only present inside the page subtree.

use std::fmt;
use std::sync::Arc;

use crate::error::{ContextError, RouterError};
use crate::lifecycle::{ActionState, LoaderState};
use crate::navigation::{Location, SetSearchOptions};
use crate::route::definition::FormData;
use crate::route::{Component, LayoutRoute, Params};
use crate::router::Router;
use crate::search::{SearchParams, SearchPatch};

/// Routing state visible at every depth
#[derive(Clone)]
pub struct RouterContext {
    pub pathname: String,
    pub params: Params,
    pub search_params: SearchParams,
    router: Router,
}

impl RouterContext {
    pub(crate) fn new(location: &Location, params: Params, router: Router) -> Self {
        Self {
            pathname: location.pathname.clone(),
            params,
            search_params: location.search_params.clone(),
            router,
        }
    }

    pub fn navigate(&self, target: &str) -> Location {
        self.router.navigate(target)
    }

    pub fn replace(&self, target: &str) -> Location {
        self.router.replace(target)
    }

    /// Navigates only if some route accepts `target`
    pub fn try_navigate(&self, target: &str) -> Result<Location, RouterError> {
        self.router.try_navigate(target)
    }

    pub fn set_search_params(&self, patch: SearchPatch, options: SetSearchOptions) -> Location {
        self.router.set_search_params(patch, options)
    }
}

impl fmt::Debug for RouterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterContext")
            .field("pathname", &self.pathname)
            .field("params", &self.params)
            .field("search_params", &self.search_params)
            .finish_non_exhaustive()
    }
}

/// Loader/action access for the matched page subtree
///
/// A scope belongs to one entry of its route (pattern, params and search
/// params). Once navigation moves on, every accessor fails with
/// [`ContextError::OutsideRoute`].
#[derive(Clone)]
pub struct RouteScope {
    pattern: String,
    key: String,
    router: Router,
}

impl RouteScope {
    pub(crate) fn new(pattern: impl Into<String>, key: String, router: Router) -> Self {
        Self {
            pattern: pattern.into(),
            key,
            router,
        }
    }

    /// Pattern of the route this scope belongs to
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether this scope's route entry is still the active one
    pub fn is_current(&self) -> bool {
        self.router.lifecycle().active_key().as_deref() == Some(self.key.as_str())
    }

    pub fn loader_state(&self) -> Result<LoaderState, ContextError> {
        self.ensure_current()?;
        Ok(self.router.loader_state())
    }

    pub fn action_state(&self) -> Result<ActionState, ContextError> {
        self.ensure_current()?;
        Ok(self.router.action_state())
    }

    /// Submits `form` to this route's action
    pub async fn submit(&self, form: FormData) -> Result<(), RouterError> {
        self.router.submit_to(&self.key, form).await
    }

    pub fn retry(&self) -> Result<bool, ContextError> {
        self.ensure_current()?;
        Ok(self.router.retry())
    }

    fn ensure_current(&self) -> Result<(), ContextError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(ContextError::OutsideRoute)
        }
    }
}

impl fmt::Debug for RouteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteScope")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Context carried by a rendered node
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::{ContextError, ViewContext};
///
/// let detached = ViewContext::detached();
/// assert_eq!(detached.router().unwrap_err(), ContextError::OutsideRouter);
/// assert_eq!(detached.route().unwrap_err(), ContextError::OutsideRoute);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    router: Option<RouterContext>,
    route: Option<RouteScope>,
}

impl ViewContext {
    /// A context outside of any router
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn for_router(router: RouterContext) -> Self {
        Self {
            router: Some(router),
            route: None,
        }
    }

    pub(crate) fn with_route(&self, route: RouteScope) -> Self {
        Self {
            router: self.router.clone(),
            route: Some(route),
        }
    }

    pub fn router(&self) -> Result<&RouterContext, ContextError> {
        self.router.as_ref().ok_or(ContextError::OutsideRouter)
    }

    pub fn route(&self) -> Result<&RouteScope, ContextError> {
        self.route.as_ref().ok_or(ContextError::OutsideRoute)
    }

    pub fn loader_state(&self) -> Result<LoaderState, ContextError> {
        self.route()?.loader_state()
    }

    pub fn action_state(&self) -> Result<ActionState, ContextError> {
        self.route()?.action_state()
    }
}

/// Re-runs the failed work behind an error view
#[derive(Clone)]
pub struct Retry {
    router: Router,
}

impl Retry {
    pub(crate) fn new(router: Router) -> Self {
        Self { router }
    }

    pub fn call(&self) -> bool {
        self.router.retry()
    }
}

impl fmt::Debug for Retry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Retry")
    }
}

/// A node of the composed render tree
#[derive(Debug, Clone)]
pub enum RenderNode {
    /// A layout with its nested content
    Layout {
        layout: Component,
        context: ViewContext,
        outlet: Box<RenderNode>,
    },
    Page {
        page: Component,
        context: ViewContext,
    },
    /// Shown while the loader runs or a lazy page resolves
    Pending {
        view: Component,
        context: ViewContext,
    },
    /// `view` is `None` when the route configures no error component; hosts
    /// then render their built-in error view with `error`
    Error {
        view: Option<Component>,
        error: Arc<anyhow::Error>,
        retry: Retry,
        context: ViewContext,
    },
    NotFound {
        page: Component,
        context: ViewContext,
    },
    /// Nothing matched and no 404 page applies
    Empty,
}

impl RenderNode {
    /// Component mounted at this node
    pub fn component(&self) -> Option<&Component> {
        match self {
            RenderNode::Layout { layout, .. } => Some(layout),
            RenderNode::Page { page, .. } | RenderNode::NotFound { page, .. } => Some(page),
            RenderNode::Pending { view, .. } => Some(view),
            RenderNode::Error { view, .. } => view.as_ref(),
            RenderNode::Empty => None,
        }
    }

    /// Nested content of a layout
    pub fn outlet(&self) -> Option<&RenderNode> {
        match self {
            RenderNode::Layout { outlet, .. } => Some(outlet),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&ViewContext> {
        match self {
            RenderNode::Layout { context, .. }
            | RenderNode::Page { context, .. }
            | RenderNode::Pending { context, .. }
            | RenderNode::Error { context, .. }
            | RenderNode::NotFound { context, .. } => Some(context),
            RenderNode::Empty => None,
        }
    }

    /// Innermost node below every layout
    pub fn content(&self) -> &RenderNode {
        let mut node = self;
        while let Some(inner) = node.outlet() {
            node = inner;
        }
        node
    }
}

/// Renders as nested component names, e.g. `Root(Dashboard(Settings))`
impl fmt::Display for RenderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderNode::Layout { layout, outlet, .. } => write!(f, "{}({})", layout, outlet),
            RenderNode::Error { view: None, error, .. } => write!(f, "Error[{}]", error),
            RenderNode::Empty => Ok(()),
            other => match other.component() {
                Some(component) => write!(f, "{}", component),
                None => Ok(()),
            },
        }
    }
}

/// Wraps `content` in `layouts` (least specific first), innermost last
///
/// The first layout becomes the root of the returned tree.
pub fn compose(content: RenderNode, layouts: &[LayoutRoute], context: &ViewContext) -> RenderNode {
    layouts
        .iter()
        .rev()
        .fold(content, |inner, layout| RenderNode::Layout {
            layout: layout.layout.clone(),
            context: context.clone(),
            outlet: Box::new(inner),
        })
}
