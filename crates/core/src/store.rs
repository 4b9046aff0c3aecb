//! Session-scoped owner of the application state.

use std::sync::Arc;

use crate::action::Action;
use crate::model::AppState;
use crate::persistence::PersistenceBridge;
use crate::reducer::{apply, StampSource, SystemStamps};
use crate::storage::KeyValueStorage;

pub type SubscriptionId = u64;

type Subscriber = Box<dyn FnMut(&Arc<AppState>)>;

/// Holds the current snapshot and funnels every change through
/// [`apply`](crate::reducer::apply).
///
/// One store lives for one session. Collaborators receive it by reference,
/// read [`snapshot`](Store::snapshot)s and call [`dispatch`](Store::dispatch).
pub struct Store {
    state: Arc<AppState>,
    stamps: Box<dyn StampSource>,
    bridge: Option<PersistenceBridge>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl Store {
    /// A store with no durable backing.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            stamps: Box::new(SystemStamps::new()),
            bridge: None,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Hydrate from `storage` and persist every subsequent change back to it.
    pub fn open(storage: Box<dyn KeyValueStorage>) -> Self {
        let bridge = PersistenceBridge::new(storage);
        let mut store = Self::new(bridge.hydrate());
        store.bridge = Some(bridge);
        store
    }

    pub fn with_stamps(mut self, stamps: impl StampSource + 'static) -> Self {
        self.stamps = Box::new(stamps);
        self
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn storage_label(&self) -> &'static str {
        self.bridge
            .as_ref()
            .map(|bridge| bridge.storage().describe())
            .unwrap_or("none")
    }

    /// Apply `action`, persist what changed, then notify subscribers.
    pub fn dispatch(&mut self, action: Action) -> Arc<AppState> {
        let stamp = self.stamps.next_stamp();
        let next = Arc::new(apply(&self.state, &action, &stamp));

        if let Some(bridge) = self.bridge.as_mut() {
            let written = bridge.persist(&self.state, &next);
            tracing::debug!(
                action = action.kind(),
                tasks_written = written.tasks,
                categories_written = written.categories,
                "dispatched"
            );
        } else {
            tracing::debug!(action = action.kind(), "dispatched");
        }

        self.state = next;
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.state);
        }
        self.snapshot()
    }

    /// Register `subscriber` to run after every dispatch.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Arc<AppState>) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
