//! Document metadata side channel
//!
//! The router calls into a [`DocumentHead`] after selection but never owns
//! the document. Hosts implement the trait over their real head element.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::config::RouterConfig;
use crate::route::RouteMeta;

pub trait DocumentHead: Send + Sync {
    fn set_title(&self, title: &str);

    /// Sets `<meta name={name} content={content}>`
    fn set_meta(&self, name: &str, content: &str);
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHead;

impl DocumentHead for NoopHead {
    fn set_title(&self, _title: &str) {}

    fn set_meta(&self, _name: &str, _content: &str) {}
}

#[derive(Debug, Default)]
struct HeadState {
    title: Option<String>,
    meta: BTreeMap<String, String>,
}

/// Records updates in memory
#[derive(Debug, Default)]
pub struct MemoryHead {
    state: Mutex<HeadState>,
}

impl MemoryHead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<String> {
        self.state().title.clone()
    }

    pub fn meta(&self, name: &str) -> Option<String> {
        self.state().meta.get(name).cloned()
    }

    pub fn meta_entries(&self) -> BTreeMap<String, String> {
        self.state().meta.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HeadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentHead for MemoryHead {
    fn set_title(&self, title: &str) {
        self.state().title = Some(title.to_string());
    }

    fn set_meta(&self, name: &str, content: &str) {
        self.state().meta.insert(name.to_string(), content.to_string());
    }
}

/// Writes a route's metadata to `head`
///
/// Unset fields are left as they are. Keywords are joined with `", "`.
pub fn apply_meta(head: &dyn DocumentHead, meta: &RouteMeta, config: &RouterConfig) {
    if let Some(title) = &meta.title {
        head.set_title(&config.format_title(title));
    }
    if let Some(description) = &meta.description {
        head.set_meta("description", description);
    }
    if !meta.keywords.is_empty() {
        head.set_meta("keywords", &meta.keywords.join(", "));
    }
    for (name, content) in &meta.custom {
        head.set_meta(name, content);
    }
}
