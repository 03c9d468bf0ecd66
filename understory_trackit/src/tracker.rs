// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The change tracker.
//!
//! [`TrackedModel`] wraps a [`Model`] and intercepts its writes and sync
//! completions. While tracking, it keeps a snapshot of the attributes as of
//! the last clean point (tracking start, restart, reset or successful save)
//! and derives the unsaved attributes from it on demand.
//!
//! ```text
//!           start_tracking             restart_tracking / reset_attributes /
//!   Idle ─────────────────► Tracking ◄─┐ successful save
//!    ▲                         │  └────┘
//!    └──────── stop_tracking ──┘
//! ```

use core::cell::RefCell;
use core::ops::Deref;
use std::rc::Rc;

use serde_json::Value;
use understory_model::{
    Attributes, ChangedKeys, Event, Events, Model, PendingSync, SetOptions,
    SyncBackend, SyncError, SyncOptions,
};

use crate::config::{UnsavedConfig, guard_predicate};
use crate::guard::GuardEvent;
use crate::registry::{GuardRegistry, GuardState, SharedGuardState};

/// Result of [`TrackedModel::unsaved_attributes`].
///
/// `NotTracking` is distinct from a tracked model without changes, although
/// neither [`has_changes`](Self::has_changes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unsaved {
    /// The model is not being tracked.
    NotTracking,
    /// The attributes that differ from the snapshot (possibly none).
    Changes(Attributes),
}

impl Unsaved {
    /// Returns `true` if there is at least one unsaved attribute.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        matches!(self, Self::Changes(changes) if !changes.is_empty())
    }

    /// Returns `true` unless this is [`Unsaved::NotTracking`].
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        matches!(self, Self::Changes(_))
    }

    /// The unsaved attributes, if tracking.
    #[must_use]
    pub fn changes(&self) -> Option<&Attributes> {
        match self {
            Self::NotTracking => None,
            Self::Changes(changes) => Some(changes),
        }
    }

    /// Consumes `self`, returning the unsaved attributes if tracking.
    #[must_use]
    pub fn into_changes(self) -> Option<Attributes> {
        match self {
            Self::NotTracking => None,
            Self::Changes(changes) => Some(changes),
        }
    }

    /// The unsaved value of `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.changes().and_then(|changes| changes.get(key))
    }

    /// Number of unsaved attributes (zero when not tracking).
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes().map_or(0, Attributes::len)
    }

    /// Returns `true` if there are no unsaved attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }
}

/// A [`Model`] with unsaved-change tracking.
///
/// Reads go straight to the model through `Deref`; every write goes through
/// the wrapper so the tracker sees it. While tracking, each write that
/// changes something fires an `unsavedChanges` event carrying
/// `(has_changes, changes, model)`.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_model::{Attributes, Model, SetOptions, SyncOptions};
/// use understory_trackit::{TrackedModel, Unsaved};
///
/// let mut model = TrackedModel::new(Model::new(Attributes::from_json(json!({
///     "id": 4,
///     "name": "Autechre",
/// }))));
/// assert_eq!(model.unsaved_attributes(None), Unsaved::NotTracking);
///
/// model.start_tracking(None);
/// model.set("work", json!("Quaristice"), SetOptions::new());
/// assert_eq!(model.unsaved_attributes(None).get("work"), Some(&json!("Quaristice")));
///
/// // Save and complete: the saved values become the new baseline.
/// let pending = model.save(None, SyncOptions::new());
/// model.complete(&pending, Ok(Attributes::new())).unwrap();
/// assert!(!model.unsaved_attributes(None).has_changes());
/// ```
#[derive(Debug)]
pub struct TrackedModel {
    model: Model,
    /// Present exactly while tracking.
    snapshot: Option<Attributes>,
    /// Unsaved values held over a `trackit_silent` write to an unsaved key.
    pinned: Attributes,
    guard: SharedGuardState,
    registry: GuardRegistry,
}

impl TrackedModel {
    /// Wraps `model`; guards register with [`GuardRegistry::global`].
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self::with_registry(model, GuardRegistry::global())
    }

    /// Wraps `model`; guards register with `registry`.
    #[must_use]
    pub fn with_registry(model: Model, registry: GuardRegistry) -> Self {
        Self {
            model,
            snapshot: None,
            pinned: Attributes::new(),
            guard: Rc::new(RefCell::new(GuardState::default())),
            registry,
        }
    }

    /// The wrapped model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The model's event bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut Events {
        self.model.events_mut()
    }

    /// The registry this model's guards report to.
    #[must_use]
    pub fn registry(&self) -> &GuardRegistry {
        &self.registry
    }

    /// Replaces the guard configuration.
    pub fn set_unsaved_config(&mut self, config: UnsavedConfig) {
        self.guard.borrow_mut().config = config;
    }

    /// Defines a named guard method, for use with
    /// [`PromptRule::Method`](crate::PromptRule::Method).
    pub fn define_method(
        &mut self,
        name: impl Into<String>,
        method: impl Fn(&GuardEvent<'_>) -> bool + 'static,
    ) {
        self.guard
            .borrow_mut()
            .methods
            .insert(name.into(), guard_predicate(method));
    }

    /// Returns `true` while tracking.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The snapshot of the last clean point, while tracking.
    #[must_use]
    pub fn original_attributes(&self) -> Option<&Attributes> {
        self.snapshot.as_ref()
    }

    /// Starts tracking with the current attributes as the clean baseline.
    ///
    /// `prompt` overrides the guard message for this tracking session. Does
    /// nothing if already tracking.
    pub fn start_tracking(&mut self, prompt: Option<&str>) {
        if self.is_tracking() {
            return;
        }
        self.snapshot = Some(self.model.attributes().clone());
        self.pinned = Attributes::new();
        self.guard.borrow_mut().prompt_override = prompt.map(Into::into);
        self.registry.register(self.model.cid(), self.guard.clone());
        self.refresh_guard();
        tracing::debug!(model = %self.model.cid(), "tracking started");
    }

    /// Stops tracking and discards the snapshot.
    ///
    /// Fires a final `unsavedChanges(false, {})`. Does nothing when idle.
    pub fn stop_tracking(&mut self) {
        if self.snapshot.take().is_none() {
            return;
        }
        self.pinned = Attributes::new();
        self.registry.deregister(self.model.cid());
        self.refresh_guard();
        tracing::debug!(model = %self.model.cid(), "tracking stopped");
        self.emit_unsaved(Attributes::new());
    }

    /// Makes the current attributes the clean baseline.
    ///
    /// Fires `unsavedChanges(false, {})` if there were unsaved changes. Does
    /// nothing when idle.
    pub fn restart_tracking(&mut self) {
        if !self.is_tracking() {
            return;
        }
        let had_changes = self.unsaved_attributes(None).has_changes();
        self.rebase();
        if had_changes {
            self.emit_unsaved(Attributes::new());
        }
    }

    /// Rolls every snapshot attribute back to its snapshot value, then
    /// restarts tracking.
    ///
    /// Attributes added after the snapshot was taken keep their value and
    /// become part of the new baseline. The rollback fires the model's usual
    /// `change` events followed by exactly one `unsavedChanges(false, {})`.
    /// Does nothing when idle.
    pub fn reset_attributes(&mut self) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        let reverted = self.model.set_many(&snapshot, SetOptions::new());
        tracing::debug!(model = %self.model.cid(), reverted = reverted.len(), "attributes reset");
        self.rebase();
        self.emit_unsaved(Attributes::new());
    }

    /// The attributes that differ from the snapshot.
    ///
    /// Compares `candidate` if given, otherwise the live attributes. Returns
    /// [`Unsaved::NotTracking`] when idle.
    #[must_use]
    pub fn unsaved_attributes(&self, candidate: Option<&Attributes>) -> Unsaved {
        let Some(snapshot) = &self.snapshot else {
            return Unsaved::NotTracking;
        };
        match candidate {
            Some(candidate) => Unsaved::Changes(candidate.diff_from(snapshot)),
            None => {
                let mut changes = self.model.attributes().diff_from(snapshot);
                changes.merge(&self.pinned);
                Unsaved::Changes(changes)
            }
        }
    }

    /// Writes a single attribute.
    pub fn set(&mut self, key: &str, value: Value, options: SetOptions) -> ChangedKeys {
        let mut attrs = Attributes::new();
        attrs.insert(key, value);
        self.set_many(&attrs, options)
    }

    /// Writes several attributes.
    ///
    /// With `options.trackit_silent` the write leaves the unsaved attributes
    /// as they were and fires no `unsavedChanges`: keys that were clean are
    /// absorbed into the baseline, keys that were unsaved keep reporting
    /// their earlier value until the next tracked write to them. A
    /// host-silent write (`options.silent`) counts as unsaved but, like the
    /// model's own `change`, is not announced.
    pub fn set_many(&mut self, attrs: &Attributes, options: SetOptions) -> ChangedKeys {
        if options.trackit_silent {
            let unsaved_before = self.unsaved_attributes(None).into_changes();
            let changed = self.model.set_many(attrs, options);
            if let Some(before) = unsaved_before {
                for (key, value) in attrs {
                    self.absorb(key, Some(value), &before);
                }
            }
            self.refresh_guard();
            return changed;
        }
        let unpinned = self.unpin(attrs.keys());
        let changed = self.model.set_many(attrs, options);
        self.after_write(!changed.is_empty() || unpinned, options);
        changed
    }

    /// Removes an attribute.
    pub fn unset(&mut self, key: &str, options: SetOptions) -> ChangedKeys {
        if options.trackit_silent {
            let unsaved_before = self.unsaved_attributes(None).into_changes();
            let changed = self.model.unset(key, options);
            if let Some(before) = unsaved_before {
                self.absorb(key, None, &before);
            }
            self.refresh_guard();
            return changed;
        }
        let unpinned = self.unpin([key]);
        let changed = self.model.unset(key, options);
        self.after_write(!changed.is_empty() || unpinned, options);
        changed
    }

    /// Starts a save. See [`Model::save`].
    pub fn save(&mut self, attrs: Option<Attributes>, options: SyncOptions) -> PendingSync {
        if let Some(attrs) = &attrs {
            let set_options = SetOptions {
                trackit_silent: options.trackit_silent,
                ..SetOptions::default()
            };
            self.set_many(attrs, set_options);
        }
        self.model.save(attrs, options)
    }

    /// Starts a fetch. See [`Model::fetch`].
    pub fn fetch(&mut self, options: SyncOptions) -> PendingSync {
        self.model.fetch(options)
    }

    /// Starts a delete. See [`Model::destroy`].
    pub fn destroy(&mut self, options: SyncOptions) -> Option<PendingSync> {
        self.model.destroy(options)
    }

    /// Applies the outcome of `pending`.
    ///
    /// A successful write advances the baseline to the persisted values
    /// (previous snapshot, request payload, then response) and fires
    /// `unsavedChanges`; attributes written while the request was in flight
    /// stay unsaved. A successful read merges like an ordinary write. With
    /// `trackit_silent` the response is absorbed the way a `trackit_silent`
    /// write is. Failures leave the baseline alone.
    pub fn complete(
        &mut self,
        pending: &PendingSync,
        outcome: Result<Attributes, SyncError>,
    ) -> Result<ChangedKeys, SyncError> {
        let Some(unsaved_before) = self.unsaved_attributes(None).into_changes() else {
            return self.model.complete(pending, outcome);
        };
        let response = outcome.as_ref().ok().cloned().unwrap_or_default();
        let changed = self.model.complete(pending, outcome)?;

        if pending.options.trackit_silent {
            for (key, value) in &response {
                self.absorb(key, Some(value), &unsaved_before);
            }
        } else if pending.method.is_write() {
            if let Some(snapshot) = self.snapshot.as_mut() {
                snapshot.merge(&pending.payload);
                snapshot.merge(&response);
            }
            self.unpin(pending.payload.keys().chain(response.keys()));
            tracing::debug!(
                model = %self.model.cid(),
                method = %pending.method,
                "baseline advanced by save"
            );
            self.notify_unsaved();
        } else if self.unpin(response.keys()) || !changed.is_empty() {
            self.notify_unsaved();
        }
        self.refresh_guard();
        Ok(changed)
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

    /// Takes the current attributes as the baseline.
    fn rebase(&mut self) {
        self.snapshot = Some(self.model.attributes().clone());
        self.pinned = Attributes::new();
        self.refresh_guard();
        tracing::debug!(model = %self.model.cid(), "tracking restarted");
    }

    /// Keeps a `trackit_silent` write to `key` out of the unsaved attributes.
    ///
    /// A clean key moves its baseline along (`None` removes it); an unsaved
    /// key keeps reporting the value it had before the write.
    fn absorb(&mut self, key: &str, value: Option<&Value>, unsaved_before: &Attributes) {
        let Some(snapshot) = self.snapshot.as_mut() else {
            return;
        };
        match (unsaved_before.get(key), value) {
            (Some(before), _) => {
                if !self.pinned.contains_key(key) {
                    self.pinned.insert(key, before.clone());
                }
            }
            (None, Some(value)) => {
                snapshot.insert(key, value.clone());
            }
            (None, None) => {
                snapshot.remove(key);
            }
        }
    }

    /// Releases pinned values for `keys`; returns `true` if any was pinned.
    fn unpin<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        let mut released = false;
        for key in keys {
            released |= self.pinned.remove(key).is_some();
        }
        released
    }

    fn after_write(&mut self, changed: bool, options: SetOptions) {
        if self.is_tracking() && changed && !options.silent {
            self.notify_unsaved();
        }
        self.refresh_guard();
    }

    /// Recomputes the registry's view of whether this model is unsaved.
    fn refresh_guard(&self) {
        let unsaved = self.unsaved_attributes(None).has_changes();
        self.guard.borrow_mut().unsaved = unsaved;
    }

    fn notify_unsaved(&mut self) {
        if let Unsaved::Changes(changes) = self.unsaved_attributes(None) {
            tracing::trace!(
                model = %self.model.cid(),
                unsaved = changes.len(),
                "unsaved recomputed"
            );
            self.emit_unsaved(changes);
        }
    }

    fn emit_unsaved(&mut self, changes: Attributes) {
        self.model.trigger(&Event::UnsavedChanges {
            has_changes: !changes.is_empty(),
            changes,
            model: self.model.cid(),
        });
    }
}

impl Deref for TrackedModel {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.model
    }
}

impl Drop for TrackedModel {
    fn drop(&mut self) {
        if self.is_tracking() {
            self.registry.deregister(self.model.cid());
        }
    }
}
