// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reactive model.

use alloc::string::{String, ToString};

use serde_json::Value;

use crate::attrs::Attributes;
use crate::event::{ChangedKeys, Event, Events, ModelId};
use crate::sync::{PendingSync, SyncBackend, SyncError, SyncMethod, SyncOptions};

/// Per-call options for attribute writes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Suppress `change` / `change:<key>` notifications.
    pub silent: bool,
    /// Keep change trackers out of this write.
    ///
    /// The model itself ignores this flag; it is carried for layers that
    /// intercept writes.
    pub trackit_silent: bool,
}

impl SetOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses change notifications.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Bypasses change tracking.
    #[must_use]
    pub fn trackit_silent(mut self) -> Self {
        self.trackit_silent = true;
        self
    }
}

/// A keyed attribute store with change notifications and sync.
///
/// Writes report exactly the keys whose value changed and, unless silent,
/// fire `change:<key>` for each of them followed by one aggregate `change`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_model::{Attributes, Model, SetOptions};
///
/// let mut model = Model::new(Attributes::from_json(json!({ "name": "Burial" })));
/// assert!(model.is_new());
///
/// let changed = model.set("EP", json!("Rival Dealer"), SetOptions::new());
/// assert_eq!(changed.as_slice(), ["EP".to_string()]);
///
/// // Same value again: nothing changes.
/// assert!(model.set("EP", json!("Rival Dealer"), SetOptions::new()).is_empty());
/// ```
#[derive(Debug)]
pub struct Model {
    cid: ModelId,
    id_attribute: String,
    attributes: Attributes,
    events: Events,
}

impl Model {
    /// Creates a model whose identity attribute is `"id"`.
    #[must_use]
    pub fn new(attributes: Attributes) -> Self {
        Self::with_id_attribute(attributes, "id")
    }

    /// Creates a model whose identity lives under `id_attribute`.
    #[must_use]
    pub fn with_id_attribute(attributes: Attributes, id_attribute: impl Into<String>) -> Self {
        Self {
            cid: ModelId::next(),
            id_attribute: id_attribute.into(),
            attributes,
            events: Events::new(),
        }
    }

    /// Client identity.
    #[must_use]
    #[inline]
    pub fn cid(&self) -> ModelId {
        self.cid
    }

    /// Persisted identity, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(&self.id_attribute)
            .filter(|v| !v.is_null())
    }

    /// Returns `true` if the model has never been persisted.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns `true` if `key` is set to a non-null value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    /// All current attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The model's event bus.
    #[must_use]
    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Mutable access to the event bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut Events {
        &mut self.events
    }

    /// Delivers `event` to this model's subscribers.
    pub fn trigger(&mut self, event: &Event) {
        self.events.trigger(event);
    }

    /// Writes a single attribute.
    pub fn set(&mut self, key: &str, value: Value, options: SetOptions) -> ChangedKeys {
        let mut attrs = Attributes::new();
        attrs.insert(key, value);
        self.set_many(&attrs, options)
    }

    /// Writes several attributes at once.
    ///
    /// Returns the names of the attributes whose value changed.
    pub fn set_many(&mut self, attrs: &Attributes, options: SetOptions) -> ChangedKeys {
        let mut changed = ChangedKeys::new();
        for (key, value) in attrs {
            if self.attributes.get(key) != Some(value) {
                self.attributes.insert(key.clone(), value.clone());
                changed.push(key.clone());
            }
        }
        if !options.silent {
            self.notify(&changed);
        }
        changed
    }

    /// Removes an attribute.
    pub fn unset(&mut self, key: &str, options: SetOptions) -> ChangedKeys {
        let mut changed = ChangedKeys::new();
        if self.attributes.remove(key).is_some() {
            changed.push(key.into());
        }
        if !options.silent {
            self.notify(&changed);
        }
        changed
    }

    fn notify(&mut self, changed: &ChangedKeys) {
        if changed.is_empty() {
            return;
        }
        for name in changed {
            let event = Event::ChangeAttr {
                model: self.cid,
                name: name.clone(),
                value: self.attributes.get(name).cloned(),
            };
            self.events.trigger(&event);
        }
        self.events.trigger(&Event::Change {
            model: self.cid,
            changed: changed.clone(),
        });
    }

    /// Starts a save.
    ///
    /// `attrs`, if given, are written first. The method is
    /// [`SyncMethod::Create`] for new models, otherwise
    /// [`SyncMethod::Patch`] when `options.patch` is set (the payload is then
    /// only `attrs`) or [`SyncMethod::Update`].
    pub fn save(&mut self, attrs: Option<Attributes>, options: SyncOptions) -> PendingSync {
        let given = attrs.unwrap_or_default();
        if !given.is_empty() {
            self.set_many(&given, SetOptions::new());
        }
        let method = if self.is_new() {
            SyncMethod::Create
        } else if options.patch {
            SyncMethod::Patch
        } else {
            SyncMethod::Update
        };
        let payload = if method == SyncMethod::Patch {
            given
        } else {
            self.attributes.clone()
        };
        tracing::debug!(model = %self.cid, %method, keys = payload.len(), "save issued");
        PendingSync {
            method,
            model: self.cid,
            payload,
            options,
        }
    }

    /// Starts a fetch.
    pub fn fetch(&mut self, options: SyncOptions) -> PendingSync {
        tracing::debug!(model = %self.cid, "fetch issued");
        PendingSync {
            method: SyncMethod::Read,
            model: self.cid,
            payload: Attributes::new(),
            options,
        }
    }

    /// Starts a delete.
    ///
    /// Returns `None` for a new model: there is nothing to remove remotely.
    pub fn destroy(&mut self, options: SyncOptions) -> Option<PendingSync> {
        if self.is_new() {
            return None;
        }
        tracing::debug!(model = %self.cid, "destroy issued");
        Some(PendingSync {
            method: SyncMethod::Delete,
            model: self.cid,
            payload: Attributes::new(),
            options,
        })
    }

    /// Applies the outcome of a request issued by this model.
    ///
    /// On success the response attributes are merged (with notifications)
    /// and `sync` fires. On failure `error` fires and the error is returned
    /// unchanged; attributes are left untouched.
    pub fn complete(
        &mut self,
        pending: &PendingSync,
        outcome: Result<Attributes, SyncError>,
    ) -> Result<ChangedKeys, SyncError> {
        if pending.model != self.cid {
            return Err(SyncError::WrongModel {
                request: pending.model,
                model: self.cid,
            });
        }
        match outcome {
            Ok(response) => {
                let changed = self.set_many(&response, SetOptions::new());
                self.events.trigger(&Event::Sync {
                    model: self.cid,
                    method: pending.method,
                });
                Ok(changed)
            }
            Err(error) => {
                tracing::warn!(model = %self.cid, method = %pending.method, %error, "sync failed");
                self.events.trigger(&Event::Error {
                    model: self.cid,
                    method: pending.method,
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Saves through `backend` and applies the outcome.
    pub async fn save_with<B: SyncBackend>(
        &mut self,
        backend: &mut B,
        attrs: Option<Attributes>,
        options: SyncOptions,
    ) -> Result<ChangedKeys, SyncError> {
        let pending = self.save(attrs, options);
        let outcome = backend.sync(&pending).await;
        self.complete(&pending, outcome)
    }

    /// Fetches through `backend` and applies the outcome.
    pub async fn fetch_with<B: SyncBackend>(
        &mut self,
        backend: &mut B,
        options: SyncOptions,
    ) -> Result<ChangedKeys, SyncError> {
        let pending = self.fetch(options);
        let outcome = backend.sync(&pending).await;
        self.complete(&pending, outcome)
    }
}
