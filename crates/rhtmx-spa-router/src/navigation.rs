//! Navigation controller
//!
//! [`Navigator`] owns the current [`Location`]. Every change goes through
//! `push`, `replace`, `set_search_params` or a history traversal, and the
//! pathname and search params are always replaced together in one value.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::history::History;
use crate::path::split_url;
use crate::search::{decode, SearchParams, SearchPatch};

/// Current pathname and decoded search params
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub pathname: String,
    pub search_params: SearchParams,
}

impl Location {
    /// Parses `/path?query#fragment`; the fragment is dropped
    ///
    /// # Examples
    ///
    /// ```
    /// use rhtmx_spa_router::Location;
    ///
    /// let location = Location::parse("/search?q=rust&page=2");
    /// assert_eq!(location.pathname, "/search");
    /// assert_eq!(location.search_params.first("q"), Some("rust"));
    /// assert_eq!(location.href(), "/search?page=2&q=rust");
    /// ```
    pub fn parse(url: &str) -> Self {
        let (pathname, query) = split_url(url);
        Self {
            pathname: pathname.to_string(),
            search_params: decode(query),
        }
    }

    /// Pathname plus encoded query (no `?` when there are no params)
    pub fn href(&self) -> String {
        with_query(&self.pathname, &self.search_params)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            pathname: "/".to_string(),
            search_params: SearchParams::new(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.href())
    }
}

fn with_query(pathname: &str, params: &SearchParams) -> String {
    let query = params.to_query_string();
    if query.is_empty() {
        pathname.to_string()
    } else {
        format!("{}?{}", pathname, query)
    }
}

/// Options for [`Navigator::set_search_params`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetSearchOptions {
    /// Overwrite the current history entry instead of pushing
    pub replace: bool,
    /// Shallow-merge into the current params instead of replacing them
    pub merge: bool,
}

impl SetSearchOptions {
    pub fn merge() -> Self {
        Self {
            merge: true,
            ..Self::default()
        }
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }
}

/// Owner of the current location
pub struct Navigator {
    history: Arc<dyn History>,
    location: watch::Sender<Location>,
}

impl Navigator {
    /// Creates a navigator seeded from the history's current entry
    pub fn new(history: Arc<dyn History>) -> Self {
        let initial = Location::parse(&history.current_url());
        let (location, _) = watch::channel(initial);
        Self { history, location }
    }

    /// Snapshot of the current location
    pub fn location(&self) -> Location {
        self.location.borrow().clone()
    }

    /// Receiver notified on every location change
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.location.subscribe()
    }

    pub fn history(&self) -> &Arc<dyn History> {
        &self.history
    }

    /// Adds a history entry and updates the location
    ///
    /// A target starting with `?` keeps the current pathname; a target
    /// without a leading `/` is treated as absolute.
    pub fn push(&self, target: &str) -> Location {
        let url = self.resolve_url(target);
        self.history.push(&url);
        self.commit(&url, "push")
    }

    /// Overwrites the current history entry and updates the location
    pub fn replace(&self, target: &str) -> Location {
        let url = self.resolve_url(target);
        self.history.replace(&url);
        self.commit(&url, "replace")
    }

    /// Rewrites the search params of the current pathname
    ///
    /// With `merge`, `patch` is merged into the current params and keys it
    /// marks absent are dropped. Without it, `patch` is the whole new set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use rhtmx_spa_router::{MemoryHistory, Navigator, SearchPatch, SetSearchOptions};
    ///
    /// let navigator = Navigator::new(Arc::new(MemoryHistory::new("/list?page=2&sort=name")));
    /// let location = navigator.set_search_params(
    ///     SearchPatch::new().remove("page"),
    ///     SetSearchOptions::merge(),
    /// );
    /// assert_eq!(location.href(), "/list?sort=name");
    /// ```
    pub fn set_search_params(&self, patch: SearchPatch, options: SetSearchOptions) -> Location {
        let current = self.location();
        let params = if options.merge {
            let mut params = current.search_params;
            params.merge(&patch);
            params
        } else {
            patch.into_params()
        };

        let url = with_query(&current.pathname, &params);
        if options.replace {
            self.replace(&url)
        } else {
            self.push(&url)
        }
    }

    /// Re-derives the location after a back/forward traversal
    pub fn sync_from_history(&self) -> Location {
        let url = self.history.current_url();
        self.commit(&url, "pop")
    }

    fn commit(&self, url: &str, kind: &'static str) -> Location {
        let next = Location::parse(url);
        let previous = self.location.send_replace(next.clone());
        debug!(from = %previous, to = %next, kind, "location changed");
        next
    }

    fn resolve_url(&self, target: &str) -> String {
        if target.starts_with('?') {
            format!("{}{}", self.location.borrow().pathname, target)
        } else if target.starts_with('/') {
            target.to_string()
        } else {
            format!("/{}", target)
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("location", &*self.location.borrow())
            .finish_non_exhaustive()
    }
}
