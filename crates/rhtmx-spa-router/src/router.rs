//! Router orchestration
//!
//! [`Router`] owns the route table, the [`Navigator`] and the [`Lifecycle`].
//! Every location change re-runs selection against the current table and
//! hands the matched route to the lifecycle before anything is rendered.
//!
//! Location changes and the re-selection that follows them run under one
//! transition lock, so the stored selection always belongs to the latest
//! location. Rendering shows the route the lifecycle has admitted: while a
//! guard rejects a navigation, the previously shown route stays on screen.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::head::{apply_meta, DocumentHead, NoopHead};
use crate::history::{History, MemoryHistory};
use crate::lifecycle::{ActionState, Lifecycle, LoadTarget, LoaderState};
use crate::navigation::{Location, Navigator, SetSearchOptions};
use crate::outlet::{compose, RenderNode, Retry, RouteScope, RouterContext, ViewContext};
use crate::path::split_url;
use crate::route::definition::FormData;
use crate::route::{Component, LazyPage, Page, Route};
use crate::search::SearchPatch;
use crate::table::{RouteTable, Selection};

/// Resolution state of a lazy page
#[derive(Debug, Clone)]
enum LazySlot {
    Pending,
    Ready(Component),
    Failed(Arc<anyhow::Error>),
}

/// A location together with the selection computed for it
#[derive(Debug, Default)]
struct Resolved {
    location: Location,
    selection: Selection,
    /// [`LoadTarget::key`] of the matched route
    key: Option<String>,
}

struct RouterInner {
    table: RwLock<Arc<RouteTable>>,
    resolved: RwLock<Arc<Resolved>>,
    /// Most recent resolution that matched no route
    unmatched: RwLock<Arc<Resolved>>,
    transition: Mutex<()>,
    navigator: Navigator,
    lifecycle: Lifecycle,
    head: Arc<dyn DocumentHead>,
    config: RouterConfig,
    lazy_pages: Mutex<HashMap<String, LazySlot>>,
    revision: watch::Sender<u64>,
}

/// Builder for [`Router`]
pub struct RouterBuilder {
    table: RouteTable,
    history: Option<Arc<dyn History>>,
    head: Option<Arc<dyn DocumentHead>>,
    config: RouterConfig,
}

impl RouterBuilder {
    /// History backing the router (defaults to an in-memory stack at `/`)
    pub fn history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    /// Document head receiving route metadata (defaults to a no-op)
    pub fn head(mut self, head: Arc<dyn DocumentHead>) -> Self {
        self.head = Some(head);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the router and resolves the initial location
    pub fn build(self) -> Router {
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(MemoryHistory::default()));
        let head = self.head.unwrap_or_else(|| Arc::new(NoopHead));
        let (revision, _) = watch::channel(0);

        let router = Router {
            inner: Arc::new(RouterInner {
                table: RwLock::new(Arc::new(self.table)),
                resolved: RwLock::new(Arc::new(Resolved::default())),
                unmatched: RwLock::new(Arc::new(Resolved::default())),
                transition: Mutex::new(()),
                navigator: Navigator::new(history),
                lifecycle: Lifecycle::new(self.config.default_stale_time()),
                head,
                config: self.config,
                lazy_pages: Mutex::new(HashMap::new()),
                revision,
            }),
        };
        router.refresh();
        router
    }
}

/// Client-side router
///
/// Cloning is cheap; clones share state. Loaders run on the ambient Tokio
/// runtime.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rhtmx_spa_router::{Component, LayoutRoute, MemoryHistory, Route, RouteTable, Router};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let table = RouteTable::new()
///     .with_route(Route::new("/", Component::new("Home")).unwrap())
///     .with_route(Route::new("/users/:id", Component::new("User")).unwrap())
///     .with_layout(LayoutRoute::new("/", Component::new("App")));
///
/// let router = Router::builder(table)
///     .history(Arc::new(MemoryHistory::new("/")))
///     .build();
///
/// router.navigate("/users/42");
/// assert_eq!(router.selection().params().get("id").map(String::as_str), Some("42"));
/// assert_eq!(router.render(&Component::new("Loading")).to_string(), "App(User)");
/// # }
/// ```
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self::builder(table).build()
    }

    pub fn builder(table: RouteTable) -> RouterBuilder {
        RouterBuilder {
            table,
            history: None,
            head: None,
            config: RouterConfig::default(),
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Pushes a history entry for `target` and re-resolves
    pub fn navigate(&self, target: &str) -> Location {
        self.transition(|navigator| navigator.push(target))
    }

    /// Alias of [`navigate`](Self::navigate)
    pub fn push(&self, target: &str) -> Location {
        self.navigate(target)
    }

    /// Replaces the current history entry with `target` and re-resolves
    pub fn replace(&self, target: &str) -> Location {
        self.transition(|navigator| navigator.replace(target))
    }

    /// Navigates only when some route pattern accepts the target pathname
    pub fn try_navigate(&self, target: &str) -> Result<Location, RouterError> {
        if !target.starts_with('?') {
            let (pathname, _) = split_url(target);
            let pathname = if pathname.starts_with('/') {
                pathname.to_string()
            } else {
                format!("/{}", pathname)
            };
            if !self.table().accepts(&pathname) {
                return Err(RouterError::UnknownTarget(target.to_string()));
            }
        }
        Ok(self.navigate(target))
    }

    /// Rewrites the current search params; see [`Navigator::set_search_params`]
    pub fn set_search_params(&self, patch: SearchPatch, options: SetSearchOptions) -> Location {
        self.transition(|navigator| navigator.set_search_params(patch, options))
    }

    /// Applies a back/forward traversal that already happened in history
    pub fn handle_pop(&self) -> Location {
        self.transition(Navigator::sync_from_history)
    }

    /// Commits a location change and re-resolves before releasing the lock
    fn transition(&self, commit: impl FnOnce(&Navigator) -> Location) -> Location {
        let _transition = self.transition_lock();
        let location = commit(&self.inner.navigator);
        self.refresh();
        location
    }

    /// Follows history traversals until the history goes away
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen(&self) -> JoinHandle<()> {
        let router = self.clone();
        let mut pops = self.inner.navigator.history().subscribe();

        tokio::spawn(async move {
            loop {
                match pops.recv().await {
                    Ok(event) => {
                        debug!(url = %event.url, direction = ?event.direction, "pop event");
                        router.handle_pop();
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "pop events lagged; resyncing from history");
                        router.handle_pop();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // ========================================================================
    // Table
    // ========================================================================

    /// Replaces the whole route table and re-resolves the current location
    pub fn set_table(&self, table: RouteTable) {
        info!(routes = table.routes().len(), "route table replaced");
        let _transition = self.transition_lock();
        *self.inner.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
        self.lazy_pages().clear();
        self.inner.lifecycle.clear_cache();
        self.inner.lifecycle.leave();
        self.refresh();
    }

    pub fn table(&self) -> Arc<RouteTable> {
        self.inner
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Re-runs selection for the current location
    ///
    /// Callers other than `build` hold the transition lock.
    fn refresh(&self) {
        let location = self.inner.navigator.location();
        let selection = self.table().select(&location.pathname);

        let key = match &selection.route {
            Some(matched) => {
                let target = LoadTarget {
                    pattern: matched.pattern().to_string(),
                    pathname: location.pathname.clone(),
                    params: matched.params.clone(),
                    search_params: location.search_params.clone(),
                    definition: matched.route.definition.clone().unwrap_or_default(),
                };
                let key = target.key();
                self.inner.lifecycle.enter(target);
                self.prepare_page(&matched.route);
                Some(key)
            }
            None => {
                debug!(pathname = %location.pathname, "no route matched");
                self.inner.lifecycle.leave();
                None
            }
        };

        let resolved = Arc::new(Resolved {
            location,
            selection,
            key,
        });
        if resolved.key.is_none() {
            *self.inner.unmatched.write().unwrap_or_else(PoisonError::into_inner) = resolved.clone();
        }
        *self.inner.resolved.write().unwrap_or_else(PoisonError::into_inner) = resolved;
        self.bump_revision();
    }

    /// The resolution to render
    ///
    /// Normally the current one. After a guard rejection the lifecycle has
    /// gone back to an earlier route, whose selection is rebuilt here.
    fn displayed(&self) -> Arc<Resolved> {
        let current = self.resolved();
        let active = self.inner.lifecycle.active_target();
        let active_key = active.as_ref().map(LoadTarget::key);
        if current.key == active_key {
            return current;
        }

        match active {
            Some(target) => Arc::new(Resolved {
                selection: self.table().select(&target.pathname),
                location: Location {
                    pathname: target.pathname,
                    search_params: target.search_params,
                },
                key: active_key,
            }),
            None => self
                .inner
                .unmatched
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Applies metadata now for eager pages, after resolution for lazy ones
    fn prepare_page(&self, route: &Route) {
        match &route.page {
            Page::Eager(_) => self.apply_metadata(route),
            Page::Lazy(lazy) => {
                let pattern = route.pattern.as_str().to_string();
                let slot = self.lazy_pages().get(&pattern).cloned();
                match slot {
                    Some(LazySlot::Ready(_)) => self.apply_metadata(route),
                    Some(LazySlot::Pending) | Some(LazySlot::Failed(_)) => {}
                    None => self.resolve_lazy(pattern, lazy.clone()),
                }
            }
        }
    }

    fn resolve_lazy(&self, pattern: String, lazy: LazyPage) {
        self.lazy_pages().insert(pattern.clone(), LazySlot::Pending);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(route = %pattern, error = %err, "no async runtime; lazy page not resolved");
                self.lazy_pages().insert(
                    pattern,
                    LazySlot::Failed(Arc::new(anyhow::anyhow!("no async runtime available"))),
                );
                return;
            }
        };

        debug!(route = %pattern, "resolving lazy page");
        let router = self.clone();
        handle.spawn(async move {
            let slot = match lazy.load().await {
                Ok(component) => LazySlot::Ready(component),
                Err(err) => {
                    warn!(route = %pattern, error = %err, "lazy page failed to resolve");
                    LazySlot::Failed(Arc::new(err))
                }
            };
            router.finish_lazy(pattern, slot);
        });
    }

    fn finish_lazy(&self, pattern: String, slot: LazySlot) {
        {
            let mut lazy_pages = self.lazy_pages();
            // Entry gone: the table was swapped while resolving
            match lazy_pages.get_mut(&pattern) {
                Some(existing) if matches!(existing, LazySlot::Pending) => *existing = slot.clone(),
                _ => return,
            }
        }

        if let LazySlot::Ready(_) = slot {
            let current = self.resolved();
            if let Some(matched) = &current.selection.route {
                if matched.pattern() == pattern {
                    self.apply_metadata(&matched.route);
                }
            }
        }
        self.bump_revision();
    }

    fn apply_metadata(&self, route: &Route) {
        if self.inner.config.apply_metadata && !route.meta.is_empty() {
            apply_meta(self.inner.head.as_ref(), &route.meta, &self.inner.config);
        }
    }

    // ========================================================================
    // Loader / Action
    // ========================================================================

    /// Retries whatever failed for the current route
    ///
    /// A failed lazy page is resolved again; otherwise the loader re-runs.
    pub fn retry(&self) -> bool {
        let current = self.displayed();
        let Some(matched) = &current.selection.route else {
            return false;
        };

        if let Page::Lazy(lazy) = &matched.route.page {
            let pattern = matched.pattern().to_string();
            let failed = matches!(self.lazy_pages().get(&pattern), Some(LazySlot::Failed(_)));
            if failed {
                self.resolve_lazy(pattern, lazy.clone());
                self.bump_revision();
                return true;
            }
        }

        let retried = self.inner.lifecycle.retry();
        if retried {
            self.bump_revision();
        }
        retried
    }

    /// Submits a form to the current route's action
    pub async fn submit(&self, form: FormData) -> Result<(), RouterError> {
        let result = self.inner.lifecycle.submit(form).await;
        self.bump_revision();
        result
    }

    /// Submits only while the route entered under `key` is still active
    pub(crate) async fn submit_to(&self, key: &str, form: FormData) -> Result<(), RouterError> {
        let result = self.inner.lifecycle.submit_to(key, form).await;
        self.bump_revision();
        result
    }

    pub fn loader_state(&self) -> LoaderState {
        self.inner.lifecycle.loader_state()
    }

    pub fn action_state(&self) -> ActionState {
        self.inner.lifecycle.action_state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Composes the render tree for the current state
    ///
    /// `fallback` is shown while loading when the route has no pending view.
    pub fn render(&self, fallback: &Component) -> RenderNode {
        let resolved = self.displayed();
        let selection = &resolved.selection;
        let base = ViewContext::for_router(RouterContext::new(
            &resolved.location,
            selection.params(),
            self.clone(),
        ));

        let content = match &selection.route {
            None => match &selection.not_found {
                Some(page) => RenderNode::NotFound {
                    page: page.clone(),
                    context: base.clone(),
                },
                None => RenderNode::Empty,
            },
            Some(matched) => {
                let key = resolved.key.clone().unwrap_or_default();
                let context = base.with_route(RouteScope::new(matched.pattern(), key, self.clone()));
                let definition = matched.route.definition.clone().unwrap_or_default();

                let page = match &matched.route.page {
                    Page::Eager(component) => Ok(Some(component.clone())),
                    Page::Lazy(_) => match self.lazy_pages().get(matched.pattern()) {
                        Some(LazySlot::Ready(component)) => Ok(Some(component.clone())),
                        Some(LazySlot::Failed(err)) => Err(err.clone()),
                        Some(LazySlot::Pending) | None => Ok(None),
                    },
                };

                match (page, self.loader_state()) {
                    (Err(error), _) | (_, LoaderState::Errored(error)) => RenderNode::Error {
                        view: definition.error_component().cloned(),
                        error,
                        retry: Retry::new(self.clone()),
                        context,
                    },
                    (Ok(None), _) | (_, LoaderState::Loading) => RenderNode::Pending {
                        view: definition
                            .pending_component()
                            .cloned()
                            .unwrap_or_else(|| fallback.clone()),
                        context,
                    },
                    (Ok(Some(page)), _) => RenderNode::Page { page, context },
                }
            }
        };

        compose(content, &selection.layouts, &base)
    }

    // ========================================================================
    // State Access
    // ========================================================================

    pub fn location(&self) -> Location {
        self.inner.navigator.location()
    }

    /// Selection computed for the current location
    ///
    /// After a guard rejection this still describes the rejected location,
    /// while [`render`](Self::render) shows the route that stayed active.
    pub fn selection(&self) -> Selection {
        self.resolved().selection.clone()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Location> {
        self.inner.navigator.subscribe()
    }

    /// Ticks whenever anything affecting [`render`](Self::render) changes
    /// through the router (selection, lazy resolution, retries)
    pub fn subscribe_revision(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    fn resolved(&self) -> Arc<Resolved> {
        self.inner
            .resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition_lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lazy_pages(&self) -> std::sync::MutexGuard<'_, HashMap<String, LazySlot>> {
        self.inner
            .lazy_pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("location", &self.location())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
