// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-node outcome of a batched read.

use serde::{Deserialize, Serialize};

use crate::error::UaError;
use crate::types::StatusCode;

/// Outcome for one requested node.
///
/// Every batched service returns one `PerNodeResult` per input node, in
/// input order, whatever happened to its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PerNodeResult<T> {
    /// The node was read completely.
    Success {
        /// Accumulated value over all rounds.
        value: T,
    },
    /// The node failed; earlier partial data is discarded.
    Failure {
        /// Status reported for the node.
        status: StatusCode,
        /// Description.
        message: String,
    },
}

impl<T> PerNodeResult<T> {
    /// Creates a success.
    #[inline]
    pub fn success(value: T) -> Self {
        Self::Success { value }
    }

    /// Creates a failure.
    #[inline]
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Failure {
            status,
            message: message.into(),
        }
    }

    /// Returns `true` for a success.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` for a failure.
    #[inline]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Returns the value of a success.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the status of the outcome.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success { .. } => StatusCode::GOOD,
            Self::Failure { status, .. } => *status,
        }
    }

    /// Returns the message of a failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Maps the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PerNodeResult<U> {
        match self {
            Self::Success { value } => PerNodeResult::Success { value: f(value) },
            Self::Failure { status, message } => PerNodeResult::Failure { status, message },
        }
    }

    /// Converts into a `Result`, turning a failure into [`UaError::PerItemFailure`].
    pub fn into_result(self, index: usize, node: impl Into<String>) -> Result<T, UaError> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Failure { status, message } => Err(UaError::per_item(index, node, status, message)),
        }
    }
}
