//! Route table data model
//!
//! Contains the immutable pieces a route table is built from: page routes,
//! layout scopes and scoped 404 handlers. Patterns live in [`pattern`],
//! per-route loader/action behavior in [`definition`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::path::normalize_path;
use crate::RouterError;

pub mod definition;
pub mod pattern;

pub use definition::RouteDefinition;
pub use pattern::{classify_segment, MatchResult, Params, RoutePattern, Segment, SpecificityTier};

/// Opaque handle to a renderable view
///
/// The router only decides *which* component to mount and with what
/// context; the host UI maps the handle to a concrete zero-argument view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component(Arc<str>);

impl Component {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

type LazyResolver = dyn Fn() -> BoxFuture<'static, anyhow::Result<Component>> + Send + Sync;

/// A page resolved on first use by an asynchronous import
#[derive(Clone)]
pub struct LazyPage {
    resolver: Arc<LazyResolver>,
}

impl LazyPage {
    pub fn new<F, Fut>(resolver: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Component>> + Send + 'static,
    {
        Self {
            resolver: Arc::new(move || resolver().boxed()),
        }
    }

    /// Starts resolving the page component
    pub fn load(&self) -> BoxFuture<'static, anyhow::Result<Component>> {
        (self.resolver)()
    }
}

impl std::fmt::Debug for LazyPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPage").finish_non_exhaustive()
    }
}

/// How a route's page component is bound
#[derive(Debug, Clone)]
pub enum Page {
    Eager(Component),
    Lazy(LazyPage),
}

impl From<Component> for Page {
    fn from(component: Component) -> Self {
        Page::Eager(component)
    }
}

impl From<LazyPage> for Page {
    fn from(lazy: LazyPage) -> Self {
        Page::Lazy(lazy)
    }
}

/// Document metadata attached to a route
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Extra `<meta name=..>` entries
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

impl RouteMeta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.keywords.is_empty()
            && self.custom.is_empty()
    }
}

/// A page route: pattern, page and optional behavior
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::{Component, Route};
///
/// let route = Route::new("/users/:id", Component::new("UserPage"))
///     .unwrap()
///     .with_title("User Profile")
///     .with_meta("robots", "noindex");
///
/// assert_eq!(route.pattern.as_str(), "/users/:id");
/// assert_eq!(route.meta.title.as_deref(), Some("User Profile"));
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: RoutePattern,
    pub page: Page,
    pub meta: RouteMeta,
    pub definition: Option<Arc<RouteDefinition>>,
}

impl Route {
    /// Creates a route, validating its pattern
    pub fn new(pattern: &str, page: impl Into<Page>) -> Result<Self, RouterError> {
        Ok(Self {
            pattern: RoutePattern::parse(pattern)?,
            page: page.into(),
            meta: RouteMeta::default(),
            definition: None,
        })
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    pub fn with_definition(mut self, definition: RouteDefinition) -> Self {
        self.definition = Some(Arc::new(definition));
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.meta.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Sets a custom metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.custom.insert(key.into(), value.into());
        self
    }

    /// Whether the route's parameter validator (if any) accepts `params`
    pub fn accepts_params(&self, params: &Params) -> bool {
        self.definition
            .as_ref()
            .map_or(true, |definition| definition.accepts_params(params))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.page, Page::Lazy(_))
    }
}

/// Returns true when `pathname` equals `scope` or is nested under it
fn within_scope(scope: &str, pathname: &str) -> bool {
    scope == "/"
        || pathname
            .strip_prefix(scope)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// A layout wrapping every page at or below its scope path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRoute {
    pub scope_path: String,
    pub layout: Component,
}

impl LayoutRoute {
    /// Creates a layout; the scope is normalized (`""` and `/` are root)
    pub fn new(scope_path: &str, layout: Component) -> Self {
        Self {
            scope_path: normalize_path(scope_path).into_owned(),
            layout,
        }
    }

    /// Whether this layout wraps `pathname`
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_spa_router::{Component, LayoutRoute};
    ///
    /// let layout = LayoutRoute::new("/dashboard", Component::new("DashboardLayout"));
    /// assert!(layout.covers("/dashboard"));
    /// assert!(layout.covers("/dashboard/settings"));
    /// assert!(!layout.covers("/dashboards"));
    /// ```
    pub fn covers(&self, pathname: &str) -> bool {
        within_scope(&self.scope_path, pathname)
    }
}

/// A 404 handler scoped to a path prefix (empty prefix = global fallback)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundConfig {
    pub path_prefix: String,
    pub page: Component,
}

impl NotFoundConfig {
    pub fn new(path_prefix: &str, page: Component) -> Self {
        let path_prefix = if path_prefix.is_empty() {
            String::new()
        } else {
            normalize_path(path_prefix).into_owned()
        };
        Self { path_prefix, page }
    }

    /// A global fallback matching every pathname
    pub fn global(page: Component) -> Self {
        Self::new("", page)
    }

    pub fn is_global(&self) -> bool {
        self.path_prefix.is_empty()
    }

    /// Whether this handler applies to `pathname`
    pub fn covers(&self, pathname: &str) -> bool {
        self.is_global() || within_scope(&self.path_prefix, pathname)
    }
}
