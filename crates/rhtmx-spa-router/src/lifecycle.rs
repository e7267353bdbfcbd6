//! Loader and action lifecycle
//!
//! One [`Lifecycle`] tracks the currently matched route. Entering a route
//! runs its guard and loader on a spawned task; the outcome is published on
//! a `watch` channel as a [`LoaderState`]. Form submissions run the route's
//! action and publish an [`ActionState`].
//!
//! Every load is stamped with a generation number. A load superseded by a
//! newer navigation has its signal cancelled and any late result is
//! discarded by the generation check in `settle`. Action completions carry
//! the route epoch they started in and are dropped once the route is left.
//!
//! A route with a guard is not admitted until the guard allows it. When the
//! guard refuses, the last admitted route becomes active again with its
//! settled state (or resumes its loader if it had not settled yet).

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::route::definition::{ActionContext, ActionRequest, FormData, LoaderContext};
use crate::route::{Params, RouteDefinition};
use crate::search::SearchParams;
use crate::error::{ContextError, RouterError};

/// Data-loading state of the matched route
#[derive(Debug, Clone, Default)]
pub enum LoaderState {
    /// No loader configured, or nothing matched
    #[default]
    Idle,
    Loading,
    Loaded(JsonValue),
    Errored(Arc<anyhow::Error>),
}

impl LoaderState {
    pub fn data(&self) -> Option<&JsonValue> {
        match self {
            LoaderState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            LoaderState::Errored(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoaderState::Loading)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_loading()
    }
}

/// Submission state of the matched route's action
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    pub data: Option<JsonValue>,
    pub error: Option<Arc<anyhow::Error>>,
    pub is_submitting: bool,
}

/// A matched route together with everything its loader needs
#[derive(Debug, Clone)]
pub struct LoadTarget {
    pub pattern: String,
    pub pathname: String,
    pub params: Params,
    pub search_params: SearchParams,
    pub definition: Arc<RouteDefinition>,
}

impl LoadTarget {
    /// Identity of this load: route, params and search params
    ///
    /// Param names and values are percent-encoded so distinct param sets
    /// never share a key.
    pub fn key(&self) -> String {
        let params: BTreeMap<&String, &String> = self.params.iter().collect();
        let params: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!(
            "{}\u{0}{}\u{0}{}",
            self.pattern,
            params.join("&"),
            self.search_params.to_query_string()
        )
    }

    /// Pathname plus encoded search params
    pub fn url(&self) -> String {
        let query = self.search_params.to_query_string();
        if query.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, query)
        }
    }

    fn loader_context(&self, signal: CancellationToken) -> LoaderContext {
        LoaderContext {
            params: self.params.clone(),
            search_params: self.search_params.clone(),
            signal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Guard still running
    Guarding,
    Admitted,
}

#[derive(Debug)]
struct ActiveLoad {
    key: String,
    target: LoadTarget,
    signal: CancellationToken,
    admission: Admission,
    /// Whether the current load of this route has published its outcome
    settled: bool,
}

#[derive(Debug, Default)]
struct Slot {
    active: Option<ActiveLoad>,
    /// Last admitted route, restored when a guard rejects its successor
    previous: Option<ActiveLoad>,
    generation: u64,
    epoch: u64,
    last_settled: LoaderState,
}

#[derive(Debug)]
struct CacheEntry {
    pattern: String,
    data: JsonValue,
    loaded_at: Instant,
}

#[derive(Debug)]
struct Shared {
    loader: watch::Sender<LoaderState>,
    action: watch::Sender<ActionState>,
    slot: Mutex<Slot>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    default_stale_time: Duration,
}

#[derive(Debug, Clone, Copy)]
enum RunMode {
    /// Route entry: guard, then cache, then loader
    Enter,
    /// Retry or post-action reload: loader only
    Reload,
}

/// Loader/action state machine for the matched route
///
/// Cloning is cheap; clones share state. Methods that start work must be
/// called from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    shared: Arc<Shared>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Lifecycle {
    /// Creates a lifecycle; `default_stale_time` applies to routes without
    /// their own stale time (zero disables caching)
    pub fn new(default_stale_time: Duration) -> Self {
        let (loader, _) = watch::channel(LoaderState::Idle);
        let (action, _) = watch::channel(ActionState::default());
        Self {
            shared: Arc::new(Shared {
                loader,
                action,
                slot: Mutex::new(Slot::default()),
                cache: Mutex::new(HashMap::new()),
                default_stale_time,
            }),
        }
    }

    // ========================================================================
    // State Access
    // ========================================================================

    pub fn loader_state(&self) -> LoaderState {
        self.shared.loader.borrow().clone()
    }

    pub fn action_state(&self) -> ActionState {
        self.shared.action.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
        self.shared.loader.subscribe()
    }

    pub fn subscribe_action(&self) -> watch::Receiver<ActionState> {
        self.shared.action.subscribe()
    }

    /// The route currently entered, if any
    pub fn active_target(&self) -> Option<LoadTarget> {
        self.slot().active.as_ref().map(|active| active.target.clone())
    }

    /// [`LoadTarget::key`] of the route currently entered
    pub fn active_key(&self) -> Option<String> {
        self.slot().active.as_ref().map(|active| active.key.clone())
    }

    /// Waits until the loader state is no longer `Loading`
    pub async fn settled(&self) -> LoaderState {
        let mut rx = self.shared.loader.subscribe();
        let settled = rx.wait_for(LoaderState::is_settled).await.map(|state| state.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.loader_state(),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Enters `target`, starting its guard and loader
    ///
    /// Returns false (and does nothing) when `target` is the route already
    /// entered with identical params and search params.
    pub fn enter(&self, target: LoadTarget) -> bool {
        let key = target.key();
        let mut slot = self.slot();

        if slot.active.as_ref().is_some_and(|active| active.key == key) {
            return false;
        }

        match slot.active.take() {
            Some(outgoing) => {
                outgoing.signal.cancel();
                debug!(route = %outgoing.target.pattern, generation = slot.generation, "loader superseded");
                // A route still behind its guard was never shown
                if outgoing.admission == Admission::Admitted {
                    slot.previous = Some(outgoing);
                }
            }
            None => slot.previous = None,
        }

        slot.generation += 1;
        slot.epoch += 1;
        let generation = slot.generation;
        let signal = CancellationToken::new();
        let definition = target.definition.clone();
        let immediate = !definition.has_loader() && !definition.has_guard();

        self.shared.action.send_replace(ActionState::default());
        slot.active = Some(ActiveLoad {
            key,
            target: target.clone(),
            signal: signal.clone(),
            admission: if definition.has_guard() {
                Admission::Guarding
            } else {
                Admission::Admitted
            },
            settled: immediate,
        });

        if immediate {
            slot.last_settled = LoaderState::Idle;
            self.shared.loader.send_replace(LoaderState::Idle);
            return true;
        }

        debug!(route = %target.pattern, generation, "loader started");
        self.shared.loader.send_replace(LoaderState::Loading);
        drop(slot);

        self.spawn(generation, self.clone().run(generation, target, signal, RunMode::Enter));
        true
    }

    /// Leaves the current route (no route matched)
    pub fn leave(&self) {
        let mut slot = self.slot();
        if let Some(previous) = slot.active.take() {
            previous.signal.cancel();
            debug!(route = %previous.target.pattern, "route left");
        }
        slot.previous = None;
        slot.generation += 1;
        slot.epoch += 1;
        slot.last_settled = LoaderState::Idle;
        self.shared.loader.send_replace(LoaderState::Idle);
        self.shared.action.send_replace(ActionState::default());
    }

    /// Re-runs the loader with the context captured at match time
    ///
    /// The guard and the cache are skipped. Returns false when there is
    /// nothing to reload or the route's guard has not admitted it yet.
    pub fn retry(&self) -> bool {
        let mut slot = self.slot();
        let Some(active) = slot.active.as_mut() else {
            return false;
        };
        if active.admission != Admission::Admitted || !active.target.definition.has_loader() {
            return false;
        }

        active.signal.cancel();
        let signal = CancellationToken::new();
        active.signal = signal.clone();
        active.settled = false;
        let target = active.target.clone();

        slot.generation += 1;
        let generation = slot.generation;
        debug!(route = %target.pattern, generation, "loader retried");
        self.shared.loader.send_replace(LoaderState::Loading);
        drop(slot);

        self.spawn(generation, self.clone().run(generation, target, signal, RunMode::Reload));
        true
    }

    /// Submits a form to the current route's action
    ///
    /// Action failures are recorded in [`ActionState`], not returned. On
    /// success the route's cached loads are dropped and the loader re-runs;
    /// this resolves once that reload settles.
    pub async fn submit(&self, form: FormData) -> Result<(), RouterError> {
        self.submit_checked(None, form).await
    }

    /// Like [`submit`](Self::submit), but only while the route entered
    /// under `key` is still the active one
    pub async fn submit_to(&self, key: &str, form: FormData) -> Result<(), RouterError> {
        self.submit_checked(Some(key), form).await
    }

    async fn submit_checked(&self, expected: Option<&str>, form: FormData) -> Result<(), RouterError> {
        let (target, epoch) = {
            let slot = self.slot();
            let active = slot.active.as_ref();
            if let Some(expected) = expected {
                if active.map(|active| active.key.as_str()) != Some(expected) {
                    return Err(ContextError::OutsideRoute.into());
                }
            }
            let active = active
                .filter(|active| active.admission == Admission::Admitted)
                .ok_or(RouterError::NoRouteMatched)?;
            let target = active.target.clone();
            if !target.definition.has_action() {
                return Err(RouterError::NoAction(target.pattern));
            }
            if self.shared.action.borrow().is_submitting {
                return Err(RouterError::SubmissionInFlight(target.pattern));
            }
            self.shared.action.send_modify(|state| state.is_submitting = true);
            (target, slot.epoch)
        };

        info!(route = %target.pattern, "action submitted");
        let lifecycle = self.clone();
        let completion = tokio::spawn(async move { lifecycle.complete_action(target, form, epoch).await });
        if let Err(err) = completion.await {
            warn!(error = %err, "action task did not complete");
        }
        Ok(())
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Drops every cached load of `pattern`
    pub fn invalidate(&self, pattern: &str) {
        self.cache().retain(|_, entry| entry.pattern != pattern);
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    fn stale_time(&self, definition: &RouteDefinition) -> Duration {
        definition
            .stale_time_override()
            .unwrap_or(self.shared.default_stale_time)
    }

    fn cached(&self, target: &LoadTarget) -> Option<JsonValue> {
        let stale_time = self.stale_time(&target.definition);
        if stale_time.is_zero() {
            return None;
        }
        let cache = self.cache();
        let entry = cache.get(&target.key())?;
        (entry.loaded_at.elapsed() < stale_time).then(|| entry.data.clone())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn slot(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.shared.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, generation: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(err) => {
                warn!(error = %err, "no async runtime; loader not started");
                self.settle(
                    generation,
                    LoaderState::Errored(Arc::new(anyhow::anyhow!("no async runtime available"))),
                    None,
                );
            }
        }
    }

    async fn run(self, generation: u64, target: LoadTarget, signal: CancellationToken, mode: RunMode) {
        let definition = target.definition.clone();
        let ctx = target.loader_context(signal.clone());

        if let (RunMode::Enter, Some(guard)) = (mode, definition.before_enter.clone()) {
            let allowed = tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    debug!(route = %target.pattern, generation, "guard cancelled");
                    return;
                }
                allowed = guard(ctx.clone()) => allowed,
            };
            if !allowed {
                self.reject(generation, &target);
                return;
            }
            if !self.admit(generation) {
                return;
            }
        }

        if let RunMode::Enter = mode {
            if let Some(data) = self.cached(&target) {
                debug!(route = %target.pattern, generation, "loader replayed from cache");
                self.settle(generation, LoaderState::Loaded(data), None);
                return;
            }
        }

        let Some(loader) = definition.loader.clone() else {
            self.settle(generation, LoaderState::Idle, None);
            return;
        };

        let result = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                debug!(route = %target.pattern, generation, "loader cancelled");
                return;
            }
            result = loader(ctx) => result,
        };

        match result {
            Ok(data) => {
                self.settle(generation, LoaderState::Loaded(data), Some(&target));
            }
            Err(err) => {
                warn!(route = %target.pattern, generation, error = %err, "loader failed");
                self.settle(generation, LoaderState::Errored(Arc::new(err)), None);
            }
        }
    }

    /// Publishes a load outcome unless a newer load has started
    fn settle(&self, generation: u64, state: LoaderState, cache_for: Option<&LoadTarget>) -> bool {
        let mut slot = self.slot();
        if slot.generation != generation {
            debug!(generation, current = slot.generation, "stale loader result discarded");
            return false;
        }

        if let (Some(target), LoaderState::Loaded(data)) = (cache_for, &state) {
            if !self.stale_time(&target.definition).is_zero() {
                self.cache().insert(
                    target.key(),
                    CacheEntry {
                        pattern: target.pattern.clone(),
                        data: data.clone(),
                        loaded_at: Instant::now(),
                    },
                );
            }
        }

        debug!(generation, "loader settled");
        if let Some(active) = slot.active.as_mut() {
            active.settled = true;
        }
        slot.last_settled = state.clone();
        self.shared.loader.send_replace(state);
        true
    }

    /// Guard said yes: the route may now submit and retry
    fn admit(&self, generation: u64) -> bool {
        let mut slot = self.slot();
        if slot.generation != generation {
            return false;
        }
        if let Some(active) = slot.active.as_mut() {
            active.admission = Admission::Admitted;
        }
        true
    }

    /// Guard said no: the last admitted route becomes active again
    fn reject(&self, generation: u64, target: &LoadTarget) {
        let mut slot = self.slot();
        if slot.generation != generation {
            return;
        }
        info!(route = %target.pattern, generation, "navigation guard rejected entry");
        slot.active = None;
        slot.epoch += 1;
        self.shared.action.send_replace(ActionState::default());

        let previous = slot.previous.take();
        match previous {
            Some(mut previous) if !previous.settled => {
                slot.generation += 1;
                let generation = slot.generation;
                let signal = CancellationToken::new();
                previous.signal = signal.clone();
                let resumed = previous.target.clone();
                slot.active = Some(previous);
                debug!(route = %resumed.pattern, generation, "previous route resumed");
                self.shared.loader.send_replace(LoaderState::Loading);
                drop(slot);

                self.spawn(generation, self.clone().run(generation, resumed, signal, RunMode::Reload));
            }
            previous => {
                if let Some(mut previous) = previous {
                    previous.signal = CancellationToken::new();
                    debug!(route = %previous.target.pattern, "previous route restored");
                    slot.active = Some(previous);
                }
                let prior = slot.last_settled.clone();
                self.shared.loader.send_replace(prior);
            }
        }
    }

    async fn complete_action(self, target: LoadTarget, form: FormData, epoch: u64) {
        let Some(action) = target.definition.action.clone() else {
            return;
        };
        let ctx = ActionContext {
            params: target.params.clone(),
            search_params: target.search_params.clone(),
            request: ActionRequest::post(target.url(), form),
        };

        let result = match tokio::spawn(action(ctx)).await {
            Ok(result) => result,
            Err(err) => Err(anyhow::anyhow!("action task failed: {}", err)),
        };

        match result {
            Ok(data) => {
                if !self.update_action(epoch, |state| {
                    state.data = Some(data);
                    state.error = None;
                }) {
                    return;
                }
                debug!(route = %target.pattern, "action succeeded");
                self.invalidate(&target.pattern);
                if self.retry() {
                    self.settled().await;
                }
                self.update_action(epoch, |state| state.is_submitting = false);
            }
            Err(err) => {
                warn!(route = %target.pattern, error = %err, "action failed");
                self.update_action(epoch, |state| {
                    state.error = Some(Arc::new(err));
                    state.is_submitting = false;
                });
            }
        }
    }

    /// Applies `update` if the route entered at `epoch` is still current
    fn update_action(&self, epoch: u64, update: impl FnOnce(&mut ActionState)) -> bool {
        let slot = self.slot();
        if slot.epoch != epoch {
            debug!(epoch, current = slot.epoch, "action result for departed route discarded");
            return false;
        }
        self.shared.action.send_modify(update);
        true
    }
}
