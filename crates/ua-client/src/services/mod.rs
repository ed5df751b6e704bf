// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched service calls on an open session.
//!
//! Every call returns one [`PerNodeResult`] per requested item, in request
//! order. A failure of the whole request marks every item with the same
//! status; a bad item status only affects that item.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ua_client::services::{BrowseOptions, RawReadRequest};
//! use ua_client::types::NodeId;
//!
//! let services = handle.services(&telemetry);
//!
//! let children = services.browse(&NodeId::OBJECTS_FOLDER, &BrowseOptions::default()).await;
//! let history = services
//!     .read_history_raw(&[NodeId::string(2, "Line1.Temperature")], &RawReadRequest::new(start, end))
//!     .await;
//! ```

mod browse;
mod history;
mod read;

pub use browse::BrowseOptions;
pub use history::{Aggregate, EventReadRequest, HistoryValue, ProcessedReadRequest, RawReadRequest};

use crate::config::PagingConfig;
use crate::error::UaError;
use crate::paging::Paginator;
use crate::result::PerNodeResult;
use crate::runtime::UaSession;
use crate::telemetry::Telemetry;
use crate::types::{NodeId, StatusCode};

/// Service calls bound to one session.
#[derive(Debug)]
pub struct Services<'a, S: ?Sized> {
    session: &'a S,
    telemetry: &'a Telemetry,
    paging: PagingConfig,
}

impl<'a, S> Services<'a, S>
where
    S: UaSession + ?Sized,
{
    /// Creates service calls on `session` with default paging settings.
    pub fn new(session: &'a S, telemetry: &'a Telemetry) -> Self {
        Self {
            session,
            telemetry,
            paging: PagingConfig::default(),
        }
    }

    /// Applies paging settings.
    pub fn with_paging(mut self, paging: &PagingConfig) -> Self {
        self.paging = paging.clone();
        self
    }

    /// Returns the session.
    pub fn session(&self) -> &'a S {
        self.session
    }

    fn paginator(&self) -> Paginator<'a> {
        Paginator::new(self.telemetry).with_max_rounds(self.paging.max_rounds)
    }
}

pub(crate) fn error_reading(node: &NodeId) -> String {
    format!("Error reading node id {}", node)
}

pub(crate) fn no_history_data(node: &NodeId) -> String {
    format!("No history data for node id {}", node)
}

pub(crate) fn batch_failure<T>(count: usize, error: &UaError) -> Vec<PerNodeResult<T>> {
    let status = error.status_code();
    let message = error.to_string();
    (0..count)
        .map(|_| PerNodeResult::failure(status, message.clone()))
        .collect()
}

pub(crate) fn missing_result<T>(node: &NodeId) -> PerNodeResult<T> {
    PerNodeResult::failure(
        StatusCode::BAD_UNKNOWN_RESPONSE,
        format!("No result for node id {}", node),
    )
}
