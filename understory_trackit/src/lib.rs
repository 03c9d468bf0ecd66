// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Trackit: unsaved-change tracking for `understory_model`.
//!
//! This crate layers "dirty tracking" onto a [`Model`](understory_model::Model):
//! whether a model has attribute changes since it was last saved, and
//! whether leaving the page or the current route should first ask the user.
//!
//! - **Tracker** ([`TrackedModel`]): start/stop/restart tracking, roll back
//!   with [`reset_attributes`](TrackedModel::reset_attributes), query
//!   [`unsaved_attributes`](TrackedModel::unsaved_attributes). Every tracked
//!   write fires `unsavedChanges`; successful saves advance the baseline.
//! - **Configuration** ([`UnsavedConfig`], [`PromptRule`]): per-model guard
//!   rules, from a builder or a JSON block.
//! - **Registry** ([`GuardRegistry`]): all tracking models, folded over at
//!   unload or navigation time.
//! - **Guards** ([`History`], [`Confirm`]): navigation that the user can
//!   cancel.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use serde_json::json;
//! use understory_model::{Attributes, Event, Model, SetOptions};
//! use understory_trackit::{TrackedModel, Unsaved};
//!
//! let mut model = TrackedModel::new(Model::new(Attributes::from_json(json!({
//!     "id": 3,
//!     "name": "Harmony Korine",
//!     "work": "Spring Breakers",
//! }))));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! model.events_mut().on("unsavedChanges", move |event| {
//!     if let Event::UnsavedChanges { has_changes, changes, .. } = event {
//!         log.borrow_mut().push((*has_changes, changes.len()));
//!     }
//! });
//!
//! model.start_tracking(None);
//! model.set("work", json!("Gummo"), SetOptions::new());
//! model.reset_attributes();
//!
//! assert_eq!(model.get("work"), Some(&json!("Spring Breakers")));
//! assert_eq!(model.unsaved_attributes(None), Unsaved::Changes(Attributes::new()));
//! assert_eq!(*seen.borrow(), vec![(true, 1), (false, 0)]);
//! ```
//!
//! ## Guards
//!
//! Hosts connect two hooks:
//!
//! - the page-unload handler returns [`GuardRegistry::before_unload`];
//! - route changes go through [`History::navigate`] (or
//!   [`GuardRegistry::before_navigate`] plus a blocking confirmation).
//!
//! A guard only speaks up for a model that is tracking, has unsaved changes,
//! and whose rule for that guard resolves to `true`.
//!
//! ## Threading
//!
//! Models, trackers and registries are single-threaded (`Rc`-based). The
//! [global registry](GuardRegistry::global) is per thread; a UI host uses
//! the one on its event-loop thread.

mod config;
mod error;
mod guard;
mod registry;
mod tracker;

pub use config::{DEFAULT_PROMPT, GuardPredicate, PromptRule, UnsavedConfig, UnsavedConfigBuilder};
pub use error::{ConfigError, GuardError};
pub use guard::{Confirm, GuardEvent, History, LEAVE_PAGE_SUFFIX, Navigation, leave_page_message};
pub use registry::GuardRegistry;
pub use tracker::{TrackedModel, Unsaved};
