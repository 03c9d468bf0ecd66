// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `unsaved` configuration block.
//!
//! A tracked model may carry an [`UnsavedConfig`] deciding whether its unsaved
//! changes should hold up a page unload or a router navigation, and with
//! which message.
//!
//! | JSON key              | field                   | accepted values             |
//! |-----------------------|-------------------------|-----------------------------|
//! | `unloadWindowPrompt`  | `unload_window_prompt`  | bool, method name           |
//! | `unloadRouterPrompt`  | `unload_router_prompt`  | bool, method name           |
//! | `prompt`              | `prompt`                | string                      |
//!
//! Predicates cannot be expressed in JSON; use [`UnsavedConfigBuilder`] with
//! [`PromptRule::predicate`] for those.

use core::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, GuardError};
use crate::guard::GuardEvent;

/// Message used when neither `start_tracking` nor the config supplies one.
pub const DEFAULT_PROMPT: &str = "You have unsaved changes!";

/// A guard callback. Returns `true` to ask the user before leaving.
pub type GuardPredicate = Rc<dyn Fn(&GuardEvent<'_>) -> bool>;

/// Named guard callbacks defined on a model.
pub(crate) type MethodTable = HashMap<String, GuardPredicate>;

pub(crate) fn guard_predicate(f: impl Fn(&GuardEvent<'_>) -> bool + 'static) -> GuardPredicate {
    Rc::new(f)
}

/// Decides whether a guard prompts for a model with unsaved changes.
#[derive(Clone, Default)]
pub enum PromptRule {
    /// No guard.
    #[default]
    Disabled,
    /// Always (`true`) or never (`false`) prompt.
    Fixed(bool),
    /// Ask a callback.
    Predicate(GuardPredicate),
    /// Ask the model method defined under this name.
    Method(String),
}

impl PromptRule {
    /// Wraps a closure as a [`PromptRule::Predicate`].
    pub fn predicate(f: impl Fn(&GuardEvent<'_>) -> bool + 'static) -> Self {
        Self::Predicate(guard_predicate(f))
    }

    /// Returns `false` if the rule can never prompt.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled | Self::Fixed(false))
    }

    /// Evaluates the rule for `event`, looking up named methods in `methods`.
    pub(crate) fn resolve(
        &self,
        event: &GuardEvent<'_>,
        methods: &MethodTable,
    ) -> Result<bool, GuardError> {
        match self {
            Self::Disabled => Ok(false),
            Self::Fixed(enabled) => Ok(*enabled),
            Self::Predicate(predicate) => Ok(predicate(event)),
            Self::Method(name) => methods
                .get(name)
                .map(|predicate| predicate(event))
                .ok_or_else(|| GuardError::UnknownMethod(name.clone())),
        }
    }
}

impl fmt::Debug for PromptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Fixed(enabled) => f.debug_tuple("Fixed").field(enabled).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
        }
    }
}

impl From<bool> for PromptRule {
    fn from(enabled: bool) -> Self {
        Self::Fixed(enabled)
    }
}

impl From<&str> for PromptRule {
    fn from(method: &str) -> Self {
        Self::Method(method.into())
    }
}

impl From<String> for PromptRule {
    fn from(method: String) -> Self {
        Self::Method(method)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Flag(bool),
    Method(String),
}

impl From<RawRule> for PromptRule {
    fn from(raw: RawRule) -> Self {
        match raw {
            RawRule::Flag(enabled) => Self::Fixed(enabled),
            RawRule::Method(name) => Self::Method(name),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    unload_window_prompt: Option<RawRule>,
    #[serde(default)]
    unload_router_prompt: Option<RawRule>,
    #[serde(default)]
    prompt: Option<String>,
}

/// Guard configuration for one tracked model.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use understory_trackit::{PromptRule, UnsavedConfig};
///
/// let from_json = UnsavedConfig::from_json(&json!({
///     "unloadWindowPrompt": true,
///     "unloadRouterPrompt": "confirmLeave",
///     "prompt": "Drafts will be lost",
/// }))
/// .unwrap();
///
/// let built = UnsavedConfig::builder()
///     .unload_window_prompt(true)
///     .unload_router_prompt("confirmLeave")
///     .prompt("Drafts will be lost")
///     .build();
///
/// assert!(matches!(from_json.unload_window_prompt, PromptRule::Fixed(true)));
/// assert!(matches!(built.unload_router_prompt, PromptRule::Method(ref m) if m == "confirmLeave"));
/// assert_eq!(from_json.prompt, built.prompt);
/// ```
#[derive(Clone, Debug, Default)]
pub struct UnsavedConfig {
    /// Rule for the page-unload guard.
    pub unload_window_prompt: PromptRule,
    /// Rule for the router navigation guard.
    pub unload_router_prompt: PromptRule,
    /// Overrides [`DEFAULT_PROMPT`].
    pub prompt: Option<String>,
}

impl UnsavedConfig {
    /// Starts a builder with both guards disabled.
    #[must_use]
    pub fn builder() -> UnsavedConfigBuilder {
        UnsavedConfigBuilder::default()
    }

    /// Reads a JSON configuration block. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let raw = RawConfig::deserialize(value)?;
        Ok(Self {
            unload_window_prompt: raw.unload_window_prompt.map(Into::into).unwrap_or_default(),
            unload_router_prompt: raw.unload_router_prompt.map(Into::into).unwrap_or_default(),
            prompt: raw.prompt,
        })
    }
}

/// Builder for [`UnsavedConfig`].
#[derive(Clone, Debug, Default)]
pub struct UnsavedConfigBuilder {
    config: UnsavedConfig,
}

impl UnsavedConfigBuilder {
    /// Sets the page-unload rule.
    #[must_use]
    pub fn unload_window_prompt(mut self, rule: impl Into<PromptRule>) -> Self {
        self.config.unload_window_prompt = rule.into();
        self
    }

    /// Sets the navigation rule.
    #[must_use]
    pub fn unload_router_prompt(mut self, rule: impl Into<PromptRule>) -> Self {
        self.config.unload_router_prompt = rule.into();
        self
    }

    /// Overrides the confirmation message.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> UnsavedConfig {
        self.config
    }
}
