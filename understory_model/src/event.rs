// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Model identity and the per-model event bus.
//!
//! Every [`Model`](crate::Model) owns an [`Events`] bus. Handlers subscribe by
//! event name and are invoked synchronously, in subscription order, whenever a
//! matching [`Event`] is triggered.
//!
//! | name              | fired by                                  |
//! |-------------------|-------------------------------------------|
//! | `change:<key>`    | each attribute whose value changed         |
//! | `change`          | once per non-silent `set` that changed something |
//! | `unsavedChanges`  | change trackers layered on the model       |
//! | `sync`            | successful sync completion                 |
//! | `error`           | failed sync completion                     |

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use smallvec::SmallVec;

use crate::attrs::Attributes;
use crate::sync::SyncMethod;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

/// Process-unique client identity of a model.
///
/// Unlike the persisted `id` attribute, a `ModelId` exists from construction
/// and never changes. Ids are handed out in increasing order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(u64);

impl ModelId {
    /// Allocates a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Attribute names reported by a single `set`.
pub type ChangedKeys = SmallVec<[String; 4]>;

/// A notification delivered through [`Events`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Aggregate change notification, fired once per mutating `set`.
    Change {
        /// The model that changed.
        model: ModelId,
        /// Names of the attributes whose value changed.
        changed: ChangedKeys,
    },
    /// A single attribute changed.
    ChangeAttr {
        /// The model that changed.
        model: ModelId,
        /// Attribute name.
        name: String,
        /// New value, or `None` if the attribute was unset.
        value: Option<Value>,
    },
    /// The unsaved state of a tracked model was recomputed.
    UnsavedChanges {
        /// `true` if there are unsaved attributes.
        has_changes: bool,
        /// The unsaved attributes, empty when `has_changes` is `false`.
        changes: Attributes,
        /// The tracked model.
        model: ModelId,
    },
    /// A sync request completed successfully.
    Sync {
        /// The synced model.
        model: ModelId,
        /// The request method.
        method: SyncMethod,
    },
    /// A sync request failed.
    Error {
        /// The model whose sync failed.
        model: ModelId,
        /// The request method.
        method: SyncMethod,
        /// Rendered failure.
        message: String,
    },
}

impl Event {
    /// Returns the bus key this event is delivered under.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Change { .. } => "change".into(),
            Self::ChangeAttr { name, .. } => format!("change:{name}"),
            Self::UnsavedChanges { .. } => "unsavedChanges".into(),
            Self::Sync { .. } => "sync".into(),
            Self::Error { .. } => "error".into(),
        }
    }

    /// Returns the model the event concerns.
    #[must_use]
    pub fn model(&self) -> ModelId {
        match self {
            Self::Change { model, .. }
            | Self::ChangeAttr { model, .. }
            | Self::UnsavedChanges { model, .. }
            | Self::Sync { model, .. }
            | Self::Error { model, .. } => *model,
        }
    }
}

/// Handle returned by [`Events::on`], used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Box<dyn FnMut(&Event)>;

struct Listener {
    id: ListenerId,
    name: String,
    handler: Handler,
}

/// A synchronous subscribe/notify bus keyed by event name.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use understory_model::{Event, Events, ModelId};
///
/// let mut events = Events::new();
/// let hits = Rc::new(Cell::new(0));
///
/// let seen = hits.clone();
/// let id = events.on("sync", move |_| seen.set(seen.get() + 1));
///
/// let model = ModelId::next();
/// events.trigger(&Event::Sync { model, method: understory_model::SyncMethod::Read });
/// assert_eq!(hits.get(), 1);
///
/// assert!(events.off(id));
/// events.trigger(&Event::Sync { model, method: understory_model::SyncMethod::Read });
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Default)]
pub struct Events {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name.as_str()).collect();
        f.debug_struct("Events")
            .field("listeners", &names)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Events {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to events named `name`.
    pub fn on(
        &mut self,
        name: impl Into<String>,
        handler: impl FnMut(&Event) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            name: name.into(),
            handler: Box::new(handler),
        });
        id
    }

    /// Removes a single subscription.
    ///
    /// Returns `true` if the listener was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Removes every subscription to `name`.
    pub fn off_event(&mut self, name: &str) {
        self.listeners.retain(|l| l.name != name);
    }

    /// Removes every subscription.
    pub fn off_all(&mut self) {
        self.listeners.clear();
    }

    /// Number of handlers subscribed to `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.iter().filter(|l| l.name == name).count()
    }

    /// Delivers `event` to its subscribers in subscription order.
    pub fn trigger(&mut self, event: &Event) {
        let name = event.name();
        for listener in self.listeners.iter_mut().filter(|l| l.name == name) {
            (listener.handler)(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    fn sync_event(model: ModelId) -> Event {
        Event::Sync {
            model,
            method: SyncMethod::Update,
        }
    }

    #[test]
    fn model_ids_are_unique_and_increasing() {
        let a = ModelId::next();
        let b = ModelId::next();
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("c{}", a.get()));
    }

    #[test]
    fn event_names() {
        let model = ModelId::next();
        let attr = Event::ChangeAttr {
            model,
            name: "work".into(),
            value: None,
        };
        assert_eq!(attr.name(), "change:work");
        assert_eq!(sync_event(model).name(), "sync");
        assert_eq!(attr.model(), model);
    }

    #[test]
    fn trigger_runs_in_subscription_order() {
        let mut events = Events::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in 0..3 {
            let order = order.clone();
            events.on("sync", move |_| order.borrow_mut().push(tag));
        }
        let other = order.clone();
        events.on("error", move |_| other.borrow_mut().push(99));

        events.trigger(&sync_event(ModelId::next()));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn off_variants() {
        let mut events = Events::new();
        let a = events.on("sync", |_| {});
        events.on("sync", |_| {});
        events.on("change", |_| {});

        assert!(events.off(a));
        assert!(!events.off(a));
        assert_eq!(events.listener_count("sync"), 1);

        events.off_event("sync");
        assert_eq!(events.listener_count("sync"), 0);
        assert_eq!(events.listener_count("change"), 1);

        events.off_all();
        assert_eq!(events.listener_count("change"), 0);
    }
}
