// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Model: a reactive attribute model.
//!
//! This crate provides the host object that higher-level layers (such as the
//! unsaved-change tracker in `understory_trackit`) build on:
//!
//! - **Attributes** ([`Attributes`]): keyed JSON values with a value-equality
//!   diff.
//! - **Events** ([`Events`], [`Event`]): a synchronous bus keyed by event name,
//!   fed by attribute writes (`change:<key>`, `change`) and sync completion
//!   (`sync`, `error`).
//! - **Model** ([`Model`]): attribute get/set with change reporting and an
//!   `is_new` identity predicate.
//! - **Sync** ([`PendingSync`], [`SyncBackend`]): two-phase save/fetch. A
//!   request is issued, the transport runs, and the outcome is applied with
//!   [`Model::complete`]. Attribute writes made in between are kept.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use understory_model::{Attributes, Model, SetOptions, SyncMethod, SyncOptions};
//!
//! let mut model = Model::new(Attributes::from_json(json!({ "name": "John Cage" })));
//! model.set("work", json!("4'33\""), SetOptions::new());
//!
//! // Issue a save; the model has no id yet so this is a create.
//! let pending = model.save(None, SyncOptions::new());
//! assert_eq!(pending.method, SyncMethod::Create);
//!
//! // ... the transport runs, the endpoint assigns an id ...
//! let response = Attributes::from_json(json!({ "id": 1 }));
//! model.complete(&pending, Ok(response)).unwrap();
//! assert!(!model.is_new());
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.
//!
//! ## Threading
//!
//! Event handlers are plain `FnMut` closures and models are not `Send`: the
//! model lives on the UI thread and every notification is dispatched
//! synchronously from the write that caused it.

#![no_std]

extern crate alloc;

mod attrs;
mod event;
mod model;
mod sync;

pub use attrs::Attributes;
pub use event::{ChangedKeys, Event, Events, ListenerId, ModelId};
pub use model::{Model, SetOptions};
pub use serde_json::Value;
pub use sync::{PendingSync, SyncBackend, SyncError, SyncMethod, SyncOptions};
