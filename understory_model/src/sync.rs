// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistence requests.
//!
//! Saving, fetching or destroying a [`Model`](crate::Model) is split in two
//! phases:
//!
//! 1. [`Model::save`](crate::Model::save), [`Model::fetch`](crate::Model::fetch)
//!    or [`Model::destroy`](crate::Model::destroy) build a [`PendingSync`]
//!    describing the request.
//! 2. Once the transport has an answer, [`Model::complete`](crate::Model::complete)
//!    applies the `Result` to the model.
//!
//! The model stays fully usable in between, so attribute writes made while a
//! request is in flight are not lost. Hosts that prefer a single call can
//! implement [`SyncBackend`] and use [`Model::save_with`](crate::Model::save_with).

use alloc::string::String;
use core::fmt;
use core::future::Future;

use crate::attrs::Attributes;
use crate::event::ModelId;

/// The kind of persistence request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncMethod {
    /// Persist a model that has no identity yet.
    Create,
    /// Persist every attribute of an existing model.
    Update,
    /// Persist a subset of attributes of an existing model.
    Patch,
    /// Read the model from the remote endpoint.
    Read,
    /// Remove the model from the remote endpoint.
    Delete,
}

impl SyncMethod {
    /// Returns `true` for methods that persist attributes.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Patch)
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Read => "read",
            Self::Delete => "delete",
        })
    }
}

/// Per-call options for a sync request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Endpoint override.
    pub url: Option<String>,
    /// Send only the attributes passed to `save`.
    pub patch: bool,
    /// Keep change trackers out of this request entirely.
    pub trackit_silent: bool,
}

impl SyncOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint override.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Requests a partial update.
    #[must_use]
    pub fn patch(mut self) -> Self {
        self.patch = true;
        self
    }

    /// Bypasses change tracking for this request.
    #[must_use]
    pub fn trackit_silent(mut self) -> Self {
        self.trackit_silent = true;
        self
    }
}

/// An in-flight persistence request.
///
/// Produced by [`Model::save`](crate::Model::save) or
/// [`Model::fetch`](crate::Model::fetch) and consumed by
/// [`Model::complete`](crate::Model::complete).
#[derive(Clone, Debug, PartialEq)]
#[must_use = "a pending sync does nothing until it is completed"]
pub struct PendingSync {
    /// The request method.
    pub method: SyncMethod,
    /// The model the request was issued for.
    pub model: ModelId,
    /// Attributes sent with the request (empty for reads).
    pub payload: Attributes,
    /// Options given at issue time.
    pub options: SyncOptions,
}

/// A failed sync request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The endpoint answered with a failure status.
    #[error("sync rejected with status {status}: {message}")]
    Rejected {
        /// Status code reported by the endpoint.
        status: u16,
        /// Reason given by the endpoint.
        message: String,
    },
    /// The request never reached the endpoint.
    #[error("sync transport failed: {0}")]
    Transport(String),
    /// The request belongs to another model.
    #[error("sync request for {request} completed on {model}")]
    WrongModel {
        /// Model the request was issued for.
        request: ModelId,
        /// Model it was completed on.
        model: ModelId,
    },
}

/// A transport that carries [`PendingSync`] requests to a remote endpoint.
///
/// The returned future resolves to the attributes the endpoint sent back; an
/// empty mapping is fine when the endpoint echoes nothing.
pub trait SyncBackend {
    /// Performs `request`.
    fn sync(
        &mut self,
        request: &PendingSync,
    ) -> impl Future<Output = Result<Attributes, SyncError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn write_methods() {
        assert!(SyncMethod::Create.is_write());
        assert!(SyncMethod::Update.is_write());
        assert!(SyncMethod::Patch.is_write());
        assert!(!SyncMethod::Read.is_write());
        assert!(!SyncMethod::Delete.is_write());
    }

    #[test]
    fn options_builder() {
        let options = SyncOptions::new().url("none").trackit_silent();
        assert_eq!(options.url.as_deref(), Some("none"));
        assert!(options.trackit_silent);
        assert!(!options.patch);
    }

    #[test]
    fn error_display() {
        let err = SyncError::Rejected {
            status: 409,
            message: "conflict".into(),
        };
        assert_eq!(err.to_string(), "sync rejected with status 409: conflict");
    }
}
