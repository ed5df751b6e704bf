// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Seam to the OPC UA client runtime.
//!
//! The runtime performs wire encoding, secure channels and the individual
//! service calls. This crate composes those calls into session
//! establishment and multi-round reads.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ SessionFactory / services                    │
//! ├──────────────────────────────────────────────┤
//! │ UaRuntime (discovery, open session)          │
//! │ UaSession (browse, read, history read)       │
//! ├──────────────────────────────────────────────┤
//! │ opcua crate adapter | test doubles           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Service-level bad results are reported as
//! [`UaError::ServiceFailure`](crate::error::UaError::ServiceFailure);
//! per-item status codes are carried in the returned items.

#[cfg(feature = "opcua-runtime")]
pub mod opcua;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::certificate::{ApplicationIdentity, CertificateValidator};
use crate::error::UaResult;
use crate::reverse::ReverseConnection;
use crate::types::{
    AttributeId, ContinuationPoint, DataValue, EndpointDescriptor, EventFilter, HistoryData,
    HistoryEvent, NodeId, ReferenceDescription, StatusCode, UserIdentity,
};

// =============================================================================
// UaRuntime
// =============================================================================

/// Connection side of the client runtime.
#[async_trait]
pub trait UaRuntime: Send + Sync {
    /// Session type produced by this runtime.
    type Session: UaSession;

    /// Returns the endpoints advertised at `url`.
    async fn discover_endpoints(&self, url: &str) -> UaResult<Vec<EndpointDescriptor>>;

    /// Returns the endpoints advertised through a reverse connection.
    ///
    /// The connection is consumed by discovery.
    async fn discover_endpoints_via(
        &self,
        connection: ReverseConnection,
        url: &str,
    ) -> UaResult<Vec<EndpointDescriptor>>;

    /// Opens and activates a session.
    async fn open_session(&self, request: OpenSessionRequest<'_>) -> UaResult<Self::Session>;
}

/// How the transport of a new session is obtained.
#[derive(Debug)]
pub enum SessionChannel {
    /// The client dials the endpoint.
    Direct,
    /// The server already dialed the client.
    Reverse(ReverseConnection),
}

impl SessionChannel {
    /// Returns `true` for reverse connections.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Self::Reverse(_))
    }
}

/// Everything the runtime needs to open one session.
pub struct OpenSessionRequest<'a> {
    /// Selected endpoint.
    pub endpoint: &'a EndpointDescriptor,
    /// Transport source.
    pub channel: SessionChannel,
    /// User identity.
    pub identity: &'a UserIdentity,
    /// Application certificate, present when security is used.
    pub application: Option<&'a ApplicationIdentity>,
    /// Application URI announced to the server.
    pub application_uri: &'a str,
    /// Session name.
    pub session_name: &'a str,
    /// Requested session idle timeout.
    pub session_timeout: Duration,
    /// Timeout for individual service calls.
    pub operation_timeout: Duration,
    /// Decides on untrusted server certificates for this call only.
    pub validator: &'a dyn CertificateValidator,
}

impl std::fmt::Debug for OpenSessionRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSessionRequest")
            .field("endpoint", &self.endpoint.endpoint_url)
            .field("channel", &self.channel)
            .field("identity", &self.identity)
            .field("session_name", &self.session_name)
            .field("session_timeout", &self.session_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// UaSession
// =============================================================================

/// One live session.
///
/// Calls on one session are issued sequentially by this crate.
#[async_trait]
pub trait UaSession: Send + Sync + 'static {
    /// Browses the given nodes.
    async fn browse(&self, nodes: &[BrowseDescription]) -> UaResult<Vec<BrowseResult>>;

    /// Continues or releases browse continuation points.
    async fn browse_next(
        &self,
        release: bool,
        points: &[ContinuationPoint],
    ) -> UaResult<Vec<BrowseResult>>;

    /// Reads attributes.
    async fn read(&self, items: &[ReadValueId]) -> UaResult<Vec<DataValue>>;

    /// Reads history. With `release` set, continuation points are released
    /// and no data is returned.
    async fn history_read(
        &self,
        details: &HistoryReadDetails,
        release: bool,
        items: &[HistoryReadValueId],
    ) -> UaResult<Vec<HistoryReadResult>>;

    /// Closes the session.
    async fn close(&self) -> UaResult<()>;
}

// =============================================================================
// Request and Response Shapes
// =============================================================================

/// Browse request for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseDescription {
    /// Node to browse.
    pub node_id: NodeId,
    /// Reference type to follow.
    pub reference_type_id: NodeId,
    /// Follow subtypes of the reference type.
    pub include_subtypes: bool,
    /// Node class mask of targets; 0 means all.
    pub node_class_mask: u32,
    /// Maximum references per round; 0 lets the server choose.
    pub max_references: u32,
}

/// Browse or BrowseNext result for one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowseResult {
    /// Item status.
    pub status: StatusCode,
    /// Continuation point when more references exist.
    pub continuation_point: Option<ContinuationPoint>,
    /// References of this round.
    pub references: Vec<ReferenceDescription>,
}

/// One attribute to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValueId {
    /// Node.
    pub node_id: NodeId,
    /// Attribute.
    pub attribute_id: AttributeId,
}

/// HistoryRead details.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryReadDetails {
    /// Raw values in a time range.
    Raw {
        /// Range start.
        start: DateTime<Utc>,
        /// Range end.
        end: DateTime<Utc>,
        /// Values per node and round; 0 lets the server choose.
        max_values_per_node: u32,
        /// Include bounding values.
        return_bounds: bool,
    },
    /// Aggregated values.
    Processed {
        /// Range start.
        start: DateTime<Utc>,
        /// Range end.
        end: DateTime<Utc>,
        /// Aggregate function node.
        aggregate_type: NodeId,
        /// Aggregation interval.
        processing_interval: Duration,
    },
    /// Events in a time range.
    Events {
        /// Range start.
        start: DateTime<Utc>,
        /// Range end.
        end: DateTime<Utc>,
        /// Events per node and round; 0 lets the server choose.
        max_values_per_node: u32,
        /// Selected event fields.
        filter: EventFilter,
    },
}

impl HistoryReadDetails {
    /// Returns the details kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Raw { .. } => "raw",
            Self::Processed { .. } => "processed",
            Self::Events { .. } => "events",
        }
    }
}

/// One node of a HistoryRead request.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReadValueId {
    /// Node.
    pub node_id: NodeId,
    /// Continuation point from the previous round.
    pub continuation_point: Option<ContinuationPoint>,
}

/// History payload for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryPayload {
    /// Values.
    Data(HistoryData),
    /// Events.
    Events(HistoryEvent),
}

/// HistoryRead result for one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryReadResult {
    /// Item status.
    pub status: StatusCode,
    /// Continuation point when more data exists.
    pub continuation_point: Option<ContinuationPoint>,
    /// Payload of this round.
    pub history: Option<HistoryPayload>,
}
