// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HistoryRead for raw values, aggregates and events.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{error_reading, no_history_data, Services};
use crate::error::UaResult;
use crate::paging::{PagedOperation, RoundItem};
use crate::result::PerNodeResult;
use crate::runtime::{
    HistoryPayload, HistoryReadDetails, HistoryReadResult, HistoryReadValueId, UaSession,
};
use crate::types::{ContinuationPoint, EventFilter, HistoryData, HistoryEvent, NodeId, StatusCode};

// =============================================================================
// Requests
// =============================================================================

/// Raw history read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReadRequest {
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end.
    pub end: DateTime<Utc>,
    /// Values per node and round; 0 lets the server choose.
    #[serde(default)]
    pub max_values_per_node: u32,
    /// Include bounding values.
    #[serde(default)]
    pub return_bounds: bool,
    /// Follow continuation points. When `false` only the first round is read
    /// and outstanding continuation points are released.
    #[serde(default = "default_true")]
    pub use_continuation_points: bool,
}

fn default_true() -> bool {
    true
}

impl RawReadRequest {
    /// Creates a request for a time range.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            max_values_per_node: 0,
            return_bounds: false,
            use_continuation_points: true,
        }
    }

    /// Sets the values per node and round.
    pub fn with_max_values_per_node(mut self, max: u32) -> Self {
        self.max_values_per_node = max;
        self
    }

    /// Includes bounding values.
    pub fn with_return_bounds(mut self, return_bounds: bool) -> Self {
        self.return_bounds = return_bounds;
        self
    }

    /// Enables or disables continuation rounds.
    pub fn with_continuation_points(mut self, follow: bool) -> Self {
        self.use_continuation_points = follow;
        self
    }
}

/// Standard aggregate functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Interpolative (i=2341).
    Interpolative,
    /// Average (i=2342).
    Average,
    /// TimeAverage (i=2343).
    TimeAverage,
    /// Total (i=2344).
    Total,
    /// Minimum (i=2346).
    Minimum,
    /// Maximum (i=2347).
    Maximum,
    /// Range (i=2350).
    Range,
    /// Count (i=2352).
    Count,
    /// Start (i=2357).
    Start,
    /// End (i=2358).
    End,
    /// Any other aggregate function node.
    Custom(NodeId),
}

impl Aggregate {
    /// Returns the aggregate function node.
    pub fn node_id(&self) -> NodeId {
        let id = match self {
            Self::Interpolative => 2341,
            Self::Average => 2342,
            Self::TimeAverage => 2343,
            Self::Total => 2344,
            Self::Minimum => 2346,
            Self::Maximum => 2347,
            Self::Range => 2350,
            Self::Count => 2352,
            Self::Start => 2357,
            Self::End => 2358,
            Self::Custom(node) => return node.clone(),
        };
        NodeId::numeric(0, id)
    }
}

/// Processed (aggregated) history read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedReadRequest {
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end.
    pub end: DateTime<Utc>,
    /// Aggregate function.
    pub aggregate: Aggregate,
    /// Aggregation interval.
    pub processing_interval: Duration,
}

/// Event history read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReadRequest {
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end.
    pub end: DateTime<Utc>,
    /// Events per node and round; 0 lets the server choose.
    #[serde(default)]
    pub max_values_per_node: u32,
    /// Selected event fields.
    #[serde(default = "EventFilter::base_fields")]
    pub filter: EventFilter,
}

// =============================================================================
// HistoryValue
// =============================================================================

/// Payload type accumulated by a history read.
pub trait HistoryValue: Sized + Send + 'static {
    /// Extracts this payload type, if the server returned it.
    fn from_payload(payload: HistoryPayload) -> Option<Self>;

    /// Appends the payload of a later round.
    fn append_round(&mut self, later: Self);
}

impl HistoryValue for HistoryData {
    fn from_payload(payload: HistoryPayload) -> Option<Self> {
        match payload {
            HistoryPayload::Data(data) => Some(data),
            HistoryPayload::Events(_) => None,
        }
    }

    fn append_round(&mut self, later: Self) {
        self.append(later);
    }
}

impl HistoryValue for HistoryEvent {
    fn from_payload(payload: HistoryPayload) -> Option<Self> {
        match payload {
            HistoryPayload::Events(events) => Some(events),
            HistoryPayload::Data(_) => None,
        }
    }

    fn append_round(&mut self, later: Self) {
        self.append(later);
    }
}

// =============================================================================
// HistoryOperation
// =============================================================================

struct HistoryOperation<'a, S: ?Sized, T> {
    session: &'a S,
    details: HistoryReadDetails,
    follow: bool,
    _value: PhantomData<fn() -> T>,
}

impl<'a, S, T> HistoryOperation<'a, S, T>
where
    S: UaSession + ?Sized,
    T: HistoryValue,
{
    fn new(session: &'a S, details: HistoryReadDetails) -> Self {
        Self {
            session,
            details,
            follow: true,
            _value: PhantomData,
        }
    }

    fn item(node: &NodeId, result: HistoryReadResult) -> RoundItem<T> {
        let HistoryReadResult {
            status,
            continuation_point,
            history,
        } = result;

        let result = if status.is_bad() {
            PerNodeResult::failure(status, error_reading(node))
        } else {
            match history.and_then(T::from_payload) {
                Some(value) => PerNodeResult::success(value),
                None => PerNodeResult::failure(StatusCode::BAD_UNKNOWN_RESPONSE, no_history_data(node)),
            }
        };

        RoundItem {
            result,
            continuation_point,
        }
    }

    async fn issue(
        &self,
        release: bool,
        items: Vec<HistoryReadValueId>,
    ) -> UaResult<Vec<RoundItem<T>>> {
        let results = self
            .session
            .history_read(&self.details, release, &items)
            .await?;
        Ok(items
            .iter()
            .zip(results)
            .map(|(item, result)| Self::item(&item.node_id, result))
            .collect())
    }
}

#[async_trait]
impl<S, T> PagedOperation for HistoryOperation<'_, S, T>
where
    S: UaSession + ?Sized,
    T: HistoryValue,
{
    type Value = T;

    fn name(&self) -> &'static str {
        match self.details {
            HistoryReadDetails::Raw { .. } => "history_read_raw",
            HistoryReadDetails::Processed { .. } => "history_read_processed",
            HistoryReadDetails::Events { .. } => "history_read_events",
        }
    }

    async fn first_round(&self, nodes: &[NodeId]) -> UaResult<Vec<RoundItem<T>>> {
        let items = nodes
            .iter()
            .map(|node| HistoryReadValueId {
                node_id: node.clone(),
                continuation_point: None,
            })
            .collect();
        self.issue(false, items).await
    }

    async fn next_round(&self, pending: &[(NodeId, ContinuationPoint)]) -> UaResult<Vec<RoundItem<T>>> {
        self.issue(false, continuation_items(pending)).await
    }

    async fn release(&self, points: &[(NodeId, ContinuationPoint)]) -> UaResult<()> {
        self.session
            .history_read(&self.details, true, &continuation_items(points))
            .await?;
        Ok(())
    }

    fn merge(&self, accumulated: &mut T, incoming: T) {
        accumulated.append_round(incoming);
    }

    fn follows_continuations(&self) -> bool {
        self.follow
    }
}

fn continuation_items(points: &[(NodeId, ContinuationPoint)]) -> Vec<HistoryReadValueId> {
    points
        .iter()
        .map(|(node, point)| HistoryReadValueId {
            node_id: node.clone(),
            continuation_point: Some(point.clone()),
        })
        .collect()
}

// =============================================================================
// Entry Points
// =============================================================================

impl<S> Services<'_, S>
where
    S: UaSession + ?Sized,
{
    /// Reads raw values of `nodes` in a time range.
    pub async fn read_history_raw(
        &self,
        nodes: &[NodeId],
        request: &RawReadRequest,
    ) -> Vec<PerNodeResult<HistoryData>> {
        let mut operation = HistoryOperation::new(
            self.session,
            HistoryReadDetails::Raw {
                start: request.start,
                end: request.end,
                max_values_per_node: request.max_values_per_node,
                return_bounds: request.return_bounds,
            },
        );
        operation.follow = request.use_continuation_points;
        self.paginator().fetch_all(&operation, nodes).await
    }

    /// Reads aggregated values of `nodes`.
    pub async fn read_history_processed(
        &self,
        nodes: &[NodeId],
        request: &ProcessedReadRequest,
    ) -> Vec<PerNodeResult<HistoryData>> {
        let operation = HistoryOperation::new(
            self.session,
            HistoryReadDetails::Processed {
                start: request.start,
                end: request.end,
                aggregate_type: request.aggregate.node_id(),
                processing_interval: request.processing_interval,
            },
        );
        self.paginator().fetch_all(&operation, nodes).await
    }

    /// Reads historical events of `nodes`.
    pub async fn read_history_events(
        &self,
        nodes: &[NodeId],
        request: &EventReadRequest,
    ) -> Vec<PerNodeResult<HistoryEvent>> {
        let operation = HistoryOperation::new(
            self.session,
            HistoryReadDetails::Events {
                start: request.start,
                end: request.end,
                max_values_per_node: request.max_values_per_node,
                filter: request.filter.clone(),
            },
        );
        self.paginator().fetch_all(&operation, nodes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataValue, HistoryEventFieldList, Variant};

    #[test]
    fn test_aggregate_node_ids() {
        assert_eq!(Aggregate::Average.node_id(), NodeId::numeric(0, 2342));
        assert_eq!(Aggregate::Count.node_id(), NodeId::numeric(0, 2352));
        let custom = NodeId::string(3, "MyAggregate");
        assert_eq!(Aggregate::Custom(custom.clone()).node_id(), custom);
    }

    #[test]
    fn test_payload_kind_must_match() {
        let data = HistoryPayload::Data(HistoryData::new(vec![DataValue::new(Variant::Double(1.5))]));
        let events = HistoryPayload::Events(HistoryEvent::new(vec![HistoryEventFieldList::default()]));

        assert!(HistoryData::from_payload(data.clone()).is_some());
        assert!(HistoryData::from_payload(events.clone()).is_none());
        assert!(HistoryEvent::from_payload(events).is_some());
        assert!(HistoryEvent::from_payload(data).is_none());
    }

    #[test]
    fn test_raw_request_defaults_from_json() {
        let request: RawReadRequest = serde_json::from_str(
            r#"{"start": "2025-01-01T00:00:00Z", "end": "2025-01-02T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(request.use_continuation_points);
        assert_eq!(request.max_values_per_node, 0);
        assert!(!request.return_bounds);
    }
}
