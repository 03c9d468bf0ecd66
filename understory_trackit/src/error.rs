// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

/// A guard rule could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// A [`PromptRule::Method`](crate::PromptRule::Method) names a method the
    /// model never defined.
    #[error("guard method `{0}` is not defined on the model")]
    UnknownMethod(String),
}

/// An `unsaved` configuration block could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The block is not valid JSON for this shape.
    #[error("invalid unsaved configuration: {0}")]
    Json(#[from] serde_json::Error),
}
