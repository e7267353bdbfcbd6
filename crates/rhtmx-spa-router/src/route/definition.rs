//! Per-route loader, action and guard configuration
//!
//! A [`RouteDefinition`] is built once when the route table is generated
//! and never mutated afterwards. Functions are stored type-erased so a
//! table can hold heterogeneous routes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use super::pattern::Params;
use super::Component;
use crate::search::SearchParams;

pub type LoaderFn = Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, anyhow::Result<JsonValue>> + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(ActionContext) -> BoxFuture<'static, anyhow::Result<JsonValue>> + Send + Sync>;
pub type GuardFn = Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, bool> + Send + Sync>;
pub type ParamValidator = Arc<dyn Fn(&Params) -> bool + Send + Sync>;

/// Input handed to guards and loaders
#[derive(Debug, Clone)]
pub struct LoaderContext {
    pub params: Params,
    pub search_params: SearchParams,
    /// Cancelled when a newer navigation supersedes this load
    pub signal: CancellationToken,
}

/// Input handed to actions
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub params: Params,
    pub search_params: SearchParams,
    pub request: ActionRequest,
}

/// Request-like payload built from a form submission
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: String,
    /// Pathname and query string of the submitting location
    pub url: String,
    pub form: FormData,
}

impl ActionRequest {
    pub fn post(url: impl Into<String>, form: FormData) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            form,
        }
    }
}

/// Submitted form fields, in submission order
///
/// Keys may repeat (checkbox groups, multi-selects).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, trimming the value
    pub fn append(&mut self, key: impl Into<String>, value: impl AsRef<str>) {
        self.fields.push((key.into(), value.as_ref().trim().to_string()));
    }

    /// Builder form of [`append`](Self::append)
    pub fn with(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.append(key, value);
        self
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in submission order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value for `key` parsed as `T`
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Converts fields to a JSON object
    ///
    /// Numeric-looking values become numbers; repeated keys become arrays.
    pub fn to_json(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (key, value) in self.iter() {
            let value = parse_value_to_json(value);
            match map.get_mut(key) {
                Some(JsonValue::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = JsonValue::Array(vec![first, value]);
                }
                None => {
                    map.insert(key.to_string(), value);
                }
            }
        }
        JsonValue::Object(map)
    }

    /// Deserializes the fields into a typed struct
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = FormData::new();
        for (key, value) in iter {
            form.append(key, value);
        }
        form
    }
}

/// Parses a form value into the narrowest JSON type (pure function)
fn parse_value_to_json(value: &str) -> JsonValue {
    value
        .parse::<i64>()
        .map(|num| json!(num))
        .or_else(|_| value.parse::<f64>().map(|num| json!(num)))
        .unwrap_or_else(|_| json!(value))
}

/// Optional behavior attached to a route
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::{Component, RouteDefinition};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let definition = RouteDefinition::new()
///     .loader(|ctx| async move { Ok(json!({ "id": ctx.params.get("id") })) })
///     .before_enter(|_ctx| async { true })
///     .pending(Component::new("Spinner"))
///     .stale_time(Duration::from_secs(30));
///
/// assert!(definition.has_loader());
/// ```
#[derive(Clone, Default)]
pub struct RouteDefinition {
    pub(crate) loader: Option<LoaderFn>,
    pub(crate) action: Option<ActionFn>,
    pub(crate) before_enter: Option<GuardFn>,
    pub(crate) pending: Option<Component>,
    pub(crate) error: Option<Component>,
    pub(crate) stale_time: Option<Duration>,
    pub(crate) validate_params: Option<ParamValidator>,
}

impl RouteDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Sets the data loader run whenever the route is entered
    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |ctx| loader(ctx).boxed()));
        self
    }

    /// Sets the form-submission handler
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<JsonValue>> + Send + 'static,
    {
        self.action = Some(Arc::new(move |ctx| action(ctx).boxed()));
        self
    }

    /// Sets the navigation guard; resolving to `false` aborts the load
    pub fn before_enter<F, Fut>(mut self, guard: F) -> Self
    where
        F: Fn(LoaderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.before_enter = Some(Arc::new(move |ctx| guard(ctx).boxed()));
        self
    }

    /// View shown while this route loads
    pub fn pending(mut self, component: Component) -> Self {
        self.pending = Some(component);
        self
    }

    /// View shown when this route's loader fails
    pub fn error(mut self, component: Component) -> Self {
        self.error = Some(component);
        self
    }

    /// How long a successful load may be replayed without re-running
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Rejects matches whose params fail `validator`
    pub fn validate_params<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Params) -> bool + Send + Sync + 'static,
    {
        self.validate_params = Some(Arc::new(validator));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    pub fn has_guard(&self) -> bool {
        self.before_enter.is_some()
    }

    pub fn pending_component(&self) -> Option<&Component> {
        self.pending.as_ref()
    }

    pub fn error_component(&self) -> Option<&Component> {
        self.error.as_ref()
    }

    pub fn stale_time_override(&self) -> Option<Duration> {
        self.stale_time
    }

    pub fn accepts_params(&self, params: &Params) -> bool {
        self.validate_params
            .as_ref()
            .map_or(true, |validator| validator(params))
    }
}

impl std::fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("loader", &self.has_loader())
            .field("action", &self.has_action())
            .field("before_enter", &self.has_guard())
            .field("pending", &self.pending)
            .field("error", &self.error)
            .field("stale_time", &self.stale_time)
            .field("validate_params", &self.validate_params.is_some())
            .finish()
    }
}
