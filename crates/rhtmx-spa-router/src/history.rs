//! Browser-history abstraction
//!
//! The router never touches a real history stack directly; it talks to a
//! [`History`] implementation. [`MemoryHistory`] keeps the stack in memory
//! and is what tests and non-browser hosts use.

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

const POP_CHANNEL_CAPACITY: usize = 64;

/// Which way a back/forward traversal moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopDirection {
    Back,
    Forward,
}

/// Emitted when the user (not the app) moves through history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopEvent {
    /// URL of the entry now current (pathname + query)
    pub url: String,
    pub direction: PopDirection,
}

/// A session-history stack
pub trait History: Send + Sync {
    /// URL of the current entry
    fn current_url(&self) -> String;

    /// Adds an entry, discarding any forward entries
    fn push(&self, url: &str);

    /// Overwrites the current entry
    fn replace(&self, url: &str);

    /// Stream of traversal events; app-initiated push/replace never appear here
    fn subscribe(&self) -> broadcast::Receiver<PopEvent>;
}

#[derive(Debug)]
struct Stack {
    entries: Vec<String>,
    index: usize,
}

/// In-memory [`History`]
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::history::{History, MemoryHistory};
///
/// let history = MemoryHistory::new("/");
/// history.push("/a");
/// history.push("/b");
/// assert!(history.back());
/// assert_eq!(history.current_url(), "/a");
/// history.push("/c");
/// assert_eq!(history.entries(), vec!["/", "/a", "/c"]);
/// ```
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
    pops: broadcast::Sender<PopEvent>,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        let (pops, _) = broadcast::channel(POP_CHANNEL_CAPACITY);
        Self {
            stack: Mutex::new(Stack {
                entries: vec![initial.into()],
                index: 0,
            }),
            pops,
        }
    }

    /// Moves one entry back; false when already at the start
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Moves one entry forward; false when already at the end
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Moves `delta` entries and emits a [`PopEvent`]
    ///
    /// Out-of-range moves are ignored and return false.
    pub fn go(&self, delta: isize) -> bool {
        let event = {
            let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(target) = stack.index.checked_add_signed(delta) else {
                return false;
            };
            if delta == 0 || target >= stack.entries.len() {
                return false;
            }
            stack.index = target;
            PopEvent {
                url: stack.entries[target].clone(),
                direction: if delta < 0 {
                    PopDirection::Back
                } else {
                    PopDirection::Forward
                },
            }
        };

        debug!(url = %event.url, direction = ?event.direction, "history traversal");
        // No subscribers is fine: nobody is listening yet
        let _ = self.pops.send(event);
        true
    }

    /// Snapshot of every entry
    pub fn entries(&self) -> Vec<String> {
        self.stack
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    /// Index of the current entry
    pub fn index(&self) -> usize {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner).index
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl History for MemoryHistory {
    fn current_url(&self) -> String {
        let stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        stack.entries[stack.index].clone()
    }

    fn push(&self, url: &str) {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(url.to_string());
        stack.index = keep;
    }

    fn replace(&self, url: &str) {
        let mut stack = self.stack.lock().unwrap_or_else(PoisonError::into_inner);
        let index = stack.index;
        stack.entries[index] = url.to_string();
    }

    fn subscribe(&self) -> broadcast::Receiver<PopEvent> {
        self.pops.subscribe()
    }
}
