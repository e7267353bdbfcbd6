//! Route table and selection
//!
//! A [`RouteTable`] is built wholesale from routes, layouts and 404 handlers
//! and never patched in place. Ordering is computed when the table changes;
//! [`RouteTable::select`] is a pure function of the table and a pathname.

use std::cmp::Reverse;

use tracing::trace;

use crate::route::{Component, LayoutRoute, MatchResult, NotFoundConfig, Params, Route};

/// A selected route with its extracted parameters
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Route,
    pub params: Params,
}

impl RouteMatch {
    pub fn pattern(&self) -> &str {
        self.route.pattern.as_str()
    }
}

/// Everything selected for one pathname
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// The matched page route, if any
    pub route: Option<RouteMatch>,
    /// Enclosing layouts, least specific first
    pub layouts: Vec<LayoutRoute>,
    /// Most specific 404 page (only when no route matched)
    pub not_found: Option<Component>,
}

impl Selection {
    pub fn is_match(&self) -> bool {
        self.route.is_some()
    }

    pub fn params(&self) -> Params {
        self.route
            .as_ref()
            .map(|m| m.params.clone())
            .unwrap_or_default()
    }

    /// Layout chain as component names, outermost first
    pub fn layout_names(&self) -> Vec<&str> {
        self.layouts.iter().map(|layout| layout.layout.name()).collect()
    }
}

/// Immutable route table
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::{Component, LayoutRoute, NotFoundConfig, Route, RouteTable};
///
/// let table = RouteTable::new()
///     .with_route(Route::new("/users/:id", Component::new("User")).unwrap())
///     .with_route(Route::new("/users/new", Component::new("NewUser")).unwrap())
///     .with_layout(LayoutRoute::new("/", Component::new("Root")))
///     .with_not_found(NotFoundConfig::global(Component::new("NotFound")));
///
/// let selection = table.select("/users/new");
/// assert_eq!(selection.route.unwrap().pattern(), "/users/new");
/// assert_eq!(selection.layouts.len(), 1);
///
/// let missing = table.select("/nope");
/// assert_eq!(missing.not_found.unwrap().name(), "NotFound");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    layouts: Vec<LayoutRoute>,
    not_found: Vec<NotFoundConfig>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from complete collections
    pub fn from_parts(
        routes: Vec<Route>,
        layouts: Vec<LayoutRoute>,
        not_found: Vec<NotFoundConfig>,
    ) -> Self {
        let mut table = Self {
            routes,
            layouts,
            not_found,
        };
        table.sort();
        table
    }

    // ========================================================================
    // Functional Builder Methods
    // ========================================================================

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self.sort();
        self
    }

    pub fn with_routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = Route>,
    {
        self.routes.extend(routes);
        self.sort();
        self
    }

    pub fn with_layout(mut self, layout: LayoutRoute) -> Self {
        self.layouts.push(layout);
        self.sort();
        self
    }

    pub fn with_not_found(mut self, not_found: NotFoundConfig) -> Self {
        self.not_found.push(not_found);
        self.sort();
        self
    }

    /// Orders routes, layouts and 404 handlers (stable sorts)
    ///
    /// - Routes: static < dynamic < catch-all, then longer pattern first
    /// - Layouts: shortest scope first
    /// - 404 handlers: longest prefix first
    fn sort(&mut self) {
        self.routes
            .sort_by_key(|route| (route.pattern.tier(), Reverse(route.pattern.as_str().len())));
        self.layouts.sort_by_key(|layout| layout.scope_path.len());
        self.not_found
            .sort_by_key(|not_found| Reverse(not_found.path_prefix.len()));
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Matches a pathname against the ordered routes
    ///
    /// The root route only matches `/` exactly. Routes whose parameter
    /// validator rejects the extracted params are skipped.
    pub fn match_route(&self, pathname: &str) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            let result = if route.pattern.is_root() {
                if pathname == "/" {
                    MatchResult::hit(Params::new())
                } else {
                    MatchResult::miss()
                }
            } else {
                route.pattern.match_path(pathname)
            };

            if !result.matched {
                return None;
            }

            if !route.accepts_params(&result.params) {
                trace!(pattern = %route.pattern, pathname, "params rejected by validator");
                return None;
            }

            Some(RouteMatch {
                route: route.clone(),
                params: result.params,
            })
        })
    }

    /// Every layout covering `pathname`, least specific first
    pub fn layouts_for(&self, pathname: &str) -> Vec<LayoutRoute> {
        self.layouts
            .iter()
            .filter(|layout| layout.covers(pathname))
            .cloned()
            .collect()
    }

    /// Most specific 404 handler covering `pathname`
    pub fn not_found_for(&self, pathname: &str) -> Option<&NotFoundConfig> {
        self.not_found
            .iter()
            .find(|not_found| not_found.covers(pathname))
    }

    /// Selects route, layout chain and (on no match) 404 page
    pub fn select(&self, pathname: &str) -> Selection {
        let route = self.match_route(pathname);
        let not_found = match route {
            Some(_) => None,
            None => self
                .not_found_for(pathname)
                .map(|not_found| not_found.page.clone()),
        };

        Selection {
            route,
            layouts: self.layouts_for(pathname),
            not_found,
        }
    }

    /// Whether any route pattern accepts `pathname`
    ///
    /// Used to validate navigation targets before they are pushed.
    pub fn accepts(&self, pathname: &str) -> bool {
        self.match_route(pathname).is_some()
    }

    /// Finds a route by its pattern string
    pub fn route(&self, pattern: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.pattern.as_str() == pattern)
    }

    /// Routes in selection order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Layouts, least specific first
    pub fn layouts(&self) -> &[LayoutRoute] {
        &self.layouts
    }

    /// 404 handlers, most specific first
    pub fn not_found_pages(&self) -> &[NotFoundConfig] {
        &self.not_found
    }
}
