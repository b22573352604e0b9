use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ActiveError;
use crate::gateway::NewsItem;
use crate::progress::{DownloadProgress, SelfUpdateState};

/// Sentinel version id meaning "always latest".
pub const AUTO_VERSION: &str = "auto";

/// Status line shown when no operation is running.
pub const READY_MESSAGE: &str = "Ready to play";

/// Status line shown when the initial host load fails.
pub const CONNECTION_WARNING_MESSAGE: &str = "Warning: connection issue";

pub const DEFAULT_NICKNAME: &str = "Player";

/// Release channel with its own independent version catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Branch {
    #[default]
    #[serde(rename = "release")]
    Release,
    #[serde(rename = "pre-release")]
    PreRelease,
}

impl Branch {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Branch::Release => "release",
            Branch::PreRelease => "pre-release",
        }
    }

    pub fn from_wire(s: &str) -> Option<Branch> {
        match s {
            "release" => Some(Branch::Release),
            "pre-release" | "prerelease" => Some(Branch::PreRelease),
            _ => None,
        }
    }
}

/// Full client-side session truth, pushed to the webview as one payload
/// after every accepted mutation. The presentation layer keeps no
/// authoritative copy of any of these fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub nickname: String,
    pub branch: Branch,
    /// Installable version ids for the selected branch, newest first,
    /// with the `auto` sentinel prepended.
    pub versions: Vec<String>,
    pub selected_version: String,
    pub status_message: String,
    pub is_downloading: bool,
    pub progress: DownloadProgress,
    pub self_update: SelfUpdateState,
    pub active_error: Option<ActiveError>,
    pub news: Vec<NewsItem>,
    pub news_index: usize,
    pub launcher_version: String,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionSnapshot {
            nickname: DEFAULT_NICKNAME.to_string(),
            branch: Branch::Release,
            versions: vec![AUTO_VERSION.to_string()],
            selected_version: AUTO_VERSION.to_string(),
            status_message: READY_MESSAGE.to_string(),
            is_downloading: false,
            progress: DownloadProgress::default(),
            self_update: SelfUpdateState::default(),
            active_error: None,
            news: vec![],
            news_index: 0,
            launcher_version: String::new(),
        }
    }
}

type Listener = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Handle returned by [`SessionStore::subscribe`]; pass it back to
/// [`SessionStore::unsubscribe`] to stop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct StoreInner {
    state: SessionSnapshot,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
}

/// Single owner of all mutable session state.
///
/// Mutation goes through [`update`](SessionStore::update), which commits a
/// change only if it alters the state by value equality and then fires every
/// listener synchronously, exactly once, with the new snapshot. Listeners
/// run under the store lock and must not call back into the store.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            inner: Mutex::new(StoreInner {
                state: SessionSnapshot::default(),
                listeners: vec![],
                next_listener_id: 1,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .lock()
            .expect("session state lock poisoned")
            .state
            .clone()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().expect("session state lock poisoned");
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().expect("session state lock poisoned");
        inner.listeners.retain(|(lid, _)| *lid != id.0);
    }

    /// Applies `mutate` to the state. Returns `true` and notifies listeners
    /// once if anything changed; a value-equal result is dropped without
    /// notification. A mutation touching several fields still produces
    /// exactly one notification.
    pub fn update(&self, mutate: impl FnOnce(&mut SessionSnapshot)) -> bool {
        let mut inner = self.inner.lock().expect("session state lock poisoned");
        let before = inner.state.clone();
        mutate(&mut inner.state);
        if inner.state == before {
            return false;
        }
        let snapshot = inner.state.clone();
        for (_, listener) in &inner.listeners {
            listener(&snapshot);
        }
        true
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn multi_field_mutation_notifies_once() {
        let store = SessionStore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let changed = store.update(|s| {
            s.branch = Branch::PreRelease;
            s.versions = vec![AUTO_VERSION.to_string(), "7".to_string()];
            s.selected_version = AUTO_VERSION.to_string();
        });

        assert!(changed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn value_equal_mutation_is_dropped() {
        let store = SessionStore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let changed = store.update(|s| {
            s.nickname = DEFAULT_NICKNAME.to_string();
            s.status_message = READY_MESSAGE.to_string();
        });

        assert!(!changed);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let store = SessionStore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.update(|s| s.nickname = "Steve".to_string());
        store.unsubscribe(id);
        store.update(|s| s.nickname = "Alex".to_string());

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot().nickname, "Alex");
    }

    #[test]
    fn listener_sees_committed_snapshot() {
        let store = SessionStore::new();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |snap| {
            *sink.lock().unwrap() = snap.nickname.clone();
        });

        store.update(|s| s.nickname = "Steve".to_string());
        assert_eq!(seen.lock().unwrap().as_str(), "Steve");
    }

    #[test]
    fn branch_wire_names() {
        assert_eq!(Branch::Release.as_wire(), "release");
        assert_eq!(Branch::from_wire("pre-release"), Some(Branch::PreRelease));
        assert_eq!(Branch::from_wire("nightly"), None);
    }
}
