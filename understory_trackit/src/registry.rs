// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The guard registry.
//!
//! Every [`TrackedModel`](crate::TrackedModel) that is tracking registers its
//! guard state here, keyed by [`ModelId`]; stopping (or dropping) removes it.
//! At unload or navigation time the registry folds over all registered models
//! and produces the first applicable message, so any number of tracked models
//! can coexist behind one host hook.

use core::cell::RefCell;
use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

use understory_model::ModelId;

use crate::config::{DEFAULT_PROMPT, MethodTable, PromptRule, UnsavedConfig};
use crate::error::GuardError;
use crate::guard::GuardEvent;

/// Guard-relevant state of one tracked model, shared with its registry.
#[derive(Default)]
pub(crate) struct GuardState {
    /// Whether the model currently has unsaved changes.
    ///
    /// The tracker recomputes this from its diff after every operation that
    /// touches the snapshot or the attributes.
    pub(crate) unsaved: bool,
    /// Message passed to `start_tracking`.
    pub(crate) prompt_override: Option<String>,
    pub(crate) config: UnsavedConfig,
    pub(crate) methods: MethodTable,
}

impl fmt::Debug for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        f.debug_struct("GuardState")
            .field("unsaved", &self.unsaved)
            .field("prompt_override", &self.prompt_override)
            .field("config", &self.config)
            .field("methods", &methods)
            .finish()
    }
}

impl GuardState {
    fn message(&self) -> String {
        self.prompt_override
            .as_deref()
            .or(self.config.prompt.as_deref())
            .unwrap_or(DEFAULT_PROMPT)
            .into()
    }

    fn rule(&self, event: &GuardEvent<'_>) -> &PromptRule {
        match event {
            GuardEvent::Unload => &self.config.unload_window_prompt,
            GuardEvent::Navigate { .. } => &self.config.unload_router_prompt,
        }
    }
}

pub(crate) type SharedGuardState = Rc<RefCell<GuardState>>;

thread_local! {
    static GLOBAL: GuardRegistry = GuardRegistry::new();
}

/// A registration table of tracked models.
///
/// `GuardRegistry` is a cheap handle; clones share the same table. The host
/// wires its page-unload hook to [`before_unload`](Self::before_unload) and
/// its router to [`before_navigate`](Self::before_navigate) (or uses
/// [`History`](crate::History)).
///
/// Models register under [`GuardRegistry::global`] unless created with
/// [`TrackedModel::with_registry`](crate::TrackedModel::with_registry).
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_model::{Attributes, Model, SetOptions};
/// use understory_trackit::{GuardRegistry, TrackedModel, UnsavedConfig};
///
/// let registry = GuardRegistry::new();
/// let mut model = TrackedModel::with_registry(
///     Model::new(Attributes::from_json(json!({ "id": 5, "name": "Samuel Beckett" }))),
///     registry.clone(),
/// );
/// model.set_unsaved_config(UnsavedConfig::builder().unload_window_prompt(true).build());
///
/// model.start_tracking(None);
/// assert_eq!(registry.before_unload(), Ok(None));
///
/// model.set("work", json!("Molloy"), SetOptions::new());
/// assert_eq!(registry.before_unload(), Ok(Some("You have unsaved changes!".into())));
///
/// model.stop_tracking();
/// assert!(registry.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct GuardRegistry {
    entries: Rc<RefCell<BTreeMap<ModelId, SharedGuardState>>>,
}

impl fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.borrow().keys()).finish()
    }
}

impl GuardRegistry {
    /// Creates an empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry of the UI thread.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Returns `true` if both handles share one table.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub(crate) fn register(&self, model: ModelId, state: SharedGuardState) {
        self.entries.borrow_mut().insert(model, state);
    }

    pub(crate) fn deregister(&self, model: ModelId) -> bool {
        self.entries.borrow_mut().remove(&model).is_some()
    }

    /// Returns `true` if `model` is registered.
    #[must_use]
    pub fn contains(&self, model: ModelId) -> bool {
        self.entries.borrow().contains_key(&model)
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Evaluates the page-unload guard.
    ///
    /// Returns the message to show, or `None` to let the page unload.
    pub fn before_unload(&self) -> Result<Option<String>, GuardError> {
        self.resolve(&GuardEvent::Unload)
    }

    /// Evaluates the navigation guard for a move to `fragment`.
    ///
    /// Returns the message to confirm, or `None` to navigate freely.
    pub fn before_navigate(&self, fragment: &str) -> Result<Option<String>, GuardError> {
        self.resolve(&GuardEvent::Navigate { fragment })
    }

    /// First message among registered models, in model creation order.
    ///
    /// Rules are only consulted for models with unsaved changes.
    fn resolve(&self, event: &GuardEvent<'_>) -> Result<Option<String>, GuardError> {
        // Predicates may touch the registry; never hold a borrow across them.
        let states: Vec<SharedGuardState> = self.entries.borrow().values().cloned().collect();
        for state in states {
            let (rule, methods, message) = {
                let state = state.borrow();
                if !state.unsaved {
                    continue;
                }
                let rule = state.rule(event);
                if !rule.is_enabled() {
                    continue;
                }
                (rule.clone(), state.methods.clone(), state.message())
            };
            if rule.resolve(event, &methods)? {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }
}
