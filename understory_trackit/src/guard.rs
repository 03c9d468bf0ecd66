// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Unload and navigation guards.
//!
//! The page-unload hook is a plain query: the host calls
//! [`GuardRegistry::before_unload`] from its unload handler and shows the
//! returned message, if any.
//!
//! Navigation needs a blocking answer from the user before the route
//! changes. [`History`] holds the current fragment and asks a [`Confirm`]
//! implementation whenever the registry produces a message; a decline leaves
//! the fragment where it was.

use crate::error::GuardError;
use crate::registry::GuardRegistry;

/// Appended to navigation confirmation messages.
pub const LEAVE_PAGE_SUFFIX: &str = " \n\nAre you sure you want to leave this page?";

/// What a guard is being asked about. Passed to guard predicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GuardEvent<'a> {
    /// The page is about to unload.
    Unload,
    /// The router is about to move to `fragment`.
    Navigate {
        /// Target fragment, without leading `#` or `/`.
        fragment: &'a str,
    },
}

/// A synchronous yes/no question to the user.
pub trait Confirm {
    /// Shows `message`; returns `true` if the user agrees to proceed.
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

/// Result of [`History::navigate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// The fragment changed.
    Proceeded,
    /// The user declined; the fragment is unchanged.
    Cancelled,
    /// Already at the requested fragment; nothing was asked.
    Unchanged,
}

/// Builds the confirmation text shown before leaving.
#[must_use]
pub fn leave_page_message(prompt: &str) -> String {
    format!("{prompt}{LEAVE_PAGE_SUFFIX}")
}

fn normalize(fragment: &str) -> &str {
    fragment.trim_start_matches(['#', '/'])
}

/// Minimal router history with a navigation guard.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_model::{Attributes, Model, SetOptions};
/// use understory_trackit::{GuardRegistry, History, Navigation, TrackedModel, UnsavedConfig};
///
/// let registry = GuardRegistry::new();
/// let mut history = History::with_registry(registry.clone());
/// let mut model = TrackedModel::with_registry(
///     Model::new(Attributes::from_json(json!({ "id": 6, "name": "Issey Miyake" }))),
///     registry,
/// );
/// model.set_unsaved_config(UnsavedConfig::builder().unload_router_prompt(true).build());
/// model.start_tracking(None);
/// model.set("work", json!("Final Home"), SetOptions::new());
///
/// let mut decline = |_: &str| false;
/// assert_eq!(history.navigate("#test", &mut decline), Ok(Navigation::Cancelled));
/// assert_eq!(history.fragment(), "");
///
/// let mut accept = |_: &str| true;
/// assert_eq!(history.navigate("#test", &mut accept), Ok(Navigation::Proceeded));
/// assert_eq!(history.fragment(), "test");
/// ```
#[derive(Debug, Default)]
pub struct History {
    fragment: String,
    registry: GuardRegistry,
}

impl History {
    /// A history at the empty fragment, guarded by the global registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(GuardRegistry::global())
    }

    /// A history at the empty fragment, guarded by `registry`.
    #[must_use]
    pub fn with_registry(registry: GuardRegistry) -> Self {
        Self {
            fragment: String::new(),
            registry,
        }
    }

    /// The current fragment.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Moves to `fragment`, asking `confirm` first if a tracked model holds
    /// unsaved changes whose router rule applies.
    pub fn navigate(
        &mut self,
        fragment: &str,
        confirm: &mut impl Confirm,
    ) -> Result<Navigation, GuardError> {
        let fragment = normalize(fragment);
        if fragment == self.fragment {
            return Ok(Navigation::Unchanged);
        }
        if let Some(prompt) = self.registry.before_navigate(fragment)?
            && !confirm.confirm(&leave_page_message(&prompt))
        {
            tracing::debug!(from = %self.fragment, to = fragment, "navigation cancelled");
            return Ok(Navigation::Cancelled);
        }
        self.fragment = fragment.into();
        Ok(Navigation::Proceeded)
    }
}
