// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Continuation point pagination.
//!
//! Servers split large results over several round trips and hand out an
//! opaque continuation point per node while more data exists. The
//! [`Paginator`] drives any [`PagedOperation`] to completion:
//!
//! ```text
//! round 0     first_round(nodes) ─┬─ Bad               → Failure
//!                                 ├─ Good, no token    → Success
//!                                 └─ Good, token       → Success (provisional) + pending
//! round n>0   next_round(pending) ─┬─ Bad              → Failure (partial data dropped)
//!                                  ├─ Good             → merge, keep pending while a token comes back
//!                                  └─ transport error  → Failure for the in-flight nodes only
//! ```
//!
//! A token that will not be resubmitted (value complete, round limit
//! reached, follow-up disabled, node failed) is released in one batched
//! call per round. Results are aligned with the input nodes.
//!
//! Rounds are issued sequentially; a session is never asked for two rounds
//! at once.

use async_trait::async_trait;
use tracing::{debug, warn, Instrument};

use crate::error::{UaError, UaResult};
use crate::result::PerNodeResult;
use crate::telemetry::Telemetry;
use crate::types::{ContinuationPoint, NodeId, StatusCode};

// =============================================================================
// PagedOperation
// =============================================================================

/// Result of one node in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundItem<T> {
    /// Outcome of this round for the node.
    pub result: PerNodeResult<T>,
    /// Continuation point when the server holds more data.
    pub continuation_point: Option<ContinuationPoint>,
}

impl<T> RoundItem<T> {
    /// Creates a good item.
    pub fn success(value: T, continuation_point: Option<ContinuationPoint>) -> Self {
        Self {
            result: PerNodeResult::success(value),
            continuation_point,
        }
    }

    /// Creates a failed item.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            result: PerNodeResult::failure(status, message),
            continuation_point: None,
        }
    }
}

/// A multi-round service call.
#[async_trait]
pub trait PagedOperation: Send + Sync {
    /// Value accumulated per node.
    type Value: Send;

    /// Operation name for logs.
    fn name(&self) -> &'static str;

    /// Issues the initial request for all nodes.
    async fn first_round(&self, nodes: &[NodeId]) -> UaResult<Vec<RoundItem<Self::Value>>>;

    /// Issues a follow-up request carrying the outstanding continuation points.
    async fn next_round(
        &self,
        pending: &[(NodeId, ContinuationPoint)],
    ) -> UaResult<Vec<RoundItem<Self::Value>>>;

    /// Releases continuation points without reading further data.
    async fn release(&self, points: &[(NodeId, ContinuationPoint)]) -> UaResult<()>;

    /// Appends the data of a later round to the accumulated value.
    fn merge(&self, accumulated: &mut Self::Value, incoming: Self::Value);

    /// Returns `true` once no more data is wanted for `value`.
    ///
    /// May trim `value` to a limit.
    fn is_complete(&self, _value: &mut Self::Value) -> bool {
        false
    }

    /// Returns `false` to stop after the initial round.
    fn follows_continuations(&self) -> bool {
        true
    }
}

// =============================================================================
// PendingRound
// =============================================================================

#[derive(Debug)]
struct PendingEntry {
    index: usize,
    node: NodeId,
    token: ContinuationPoint,
}

/// Nodes still holding a continuation point, keyed by input index.
#[derive(Debug, Default)]
struct PendingRound {
    entries: Vec<PendingEntry>,
}

impl PendingRound {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, index: usize, node: NodeId, token: ContinuationPoint) {
        self.entries.push(PendingEntry { index, node, token });
    }

    fn request(&self) -> Vec<(NodeId, ContinuationPoint)> {
        self.entries
            .iter()
            .map(|entry| (entry.node.clone(), entry.token.clone()))
            .collect()
    }

    fn take(&mut self) -> Vec<PendingEntry> {
        std::mem::take(&mut self.entries)
    }
}

// =============================================================================
// Paginator
// =============================================================================

/// Drives paged operations to completion.
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    telemetry: &'a Telemetry,
    max_rounds: Option<u32>,
}

struct RoundState<V> {
    results: Vec<PerNodeResult<V>>,
    pending: PendingRound,
    releases: Vec<(NodeId, ContinuationPoint)>,
}

impl<'a> Paginator<'a> {
    /// Creates a paginator without a round limit.
    pub fn new(telemetry: &'a Telemetry) -> Self {
        Self {
            telemetry,
            max_rounds: None,
        }
    }

    /// Limits the number of follow-up rounds.
    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Runs `operation` for `nodes` until no continuation point remains.
    ///
    /// Returns one result per node, in input order.
    pub async fn fetch_all<O>(&self, operation: &O, nodes: &[NodeId]) -> Vec<PerNodeResult<O::Value>>
    where
        O: PagedOperation + ?Sized,
    {
        let span = self.telemetry.operation_span(operation.name());
        self.run(operation, nodes).instrument(span).await
    }

    async fn run<O>(&self, operation: &O, nodes: &[NodeId]) -> Vec<PerNodeResult<O::Value>>
    where
        O: PagedOperation + ?Sized,
    {
        if nodes.is_empty() {
            return Vec::new();
        }

        self.telemetry.record_round();
        let items = match operation.first_round(nodes).await {
            Ok(items) => items,
            Err(e) => {
                e.log(operation.name());
                let status = e.status_code();
                let message = e.to_string();
                return nodes
                    .iter()
                    .map(|_| PerNodeResult::failure(status, message.clone()))
                    .collect();
            }
        };

        let mut state = RoundState {
            results: Vec::with_capacity(nodes.len()),
            pending: PendingRound::default(),
            releases: Vec::new(),
        };

        let mut items = items.into_iter();
        for (index, node) in nodes.iter().enumerate() {
            state.results.push(PerNodeResult::failure(
                StatusCode::BAD_UNKNOWN_RESPONSE,
                format!("No result for node id {}", node),
            ));
            if let Some(item) = items.next() {
                self.settle(operation, &mut state, index, node, item, true);
            }
        }
        let extra = items.as_slice();
        if !extra.is_empty() {
            warn!(operation = operation.name(), extra = extra.len(), "Server returned more results than requested");
        }
        self.flush_releases(operation, &mut state.releases).await;

        let mut rounds = 0u32;
        while !state.pending.is_empty() {
            if self.max_rounds.is_some_and(|max| rounds >= max) {
                self.abandon(operation, &mut state, rounds);
                self.flush_releases(operation, &mut state.releases).await;
                break;
            }

            rounds += 1;
            self.telemetry.record_round();
            let request = state.pending.request();
            debug!(operation = operation.name(), round = rounds, pending = request.len(), "Continuation round");

            match operation.next_round(&request).await {
                Ok(items) => {
                    let mut items = items.into_iter();
                    for entry in state.pending.take() {
                        match items.next() {
                            Some(item) => {
                                self.settle(operation, &mut state, entry.index, &entry.node, item, false)
                            }
                            None => {
                                state.results[entry.index] = PerNodeResult::failure(
                                    StatusCode::BAD_UNKNOWN_RESPONSE,
                                    format!("No result for node id {}", entry.node),
                                );
                                state.releases.push((entry.node, entry.token));
                            }
                        }
                    }
                }
                Err(e) => {
                    for entry in state.pending.take() {
                        let error = UaError::per_item(
                            entry.index,
                            entry.node.to_string(),
                            e.status_code(),
                            e.to_string(),
                        );
                        error.log(operation.name());
                        state.results[entry.index] =
                            PerNodeResult::failure(error.status_code(), e.to_string());
                    }
                }
            }

            self.flush_releases(operation, &mut state.releases).await;
        }

        debug!(
            operation = operation.name(),
            nodes = nodes.len(),
            rounds = rounds + 1,
            failed = state.results.iter().filter(|r| r.is_failure()).count(),
            "Pagination complete"
        );
        state.results
    }

    fn settle<O>(
        &self,
        operation: &O,
        state: &mut RoundState<O::Value>,
        index: usize,
        node: &NodeId,
        item: RoundItem<O::Value>,
        first: bool,
    ) where
        O: PagedOperation + ?Sized,
    {
        let RoundItem {
            result,
            continuation_point,
        } = item;

        let slot = &mut state.results[index];
        match result {
            PerNodeResult::Failure { status, message } => {
                *slot = PerNodeResult::Failure { status, message };
            }
            PerNodeResult::Success { value: incoming } => match slot {
                PerNodeResult::Success { value } if !first => operation.merge(value, incoming),
                _ => *slot = PerNodeResult::success(incoming),
            },
        }

        let Some(token) = continuation_point else {
            if let PerNodeResult::Success { value } = slot {
                operation.is_complete(value);
            }
            return;
        };

        let resubmit = match slot {
            PerNodeResult::Success { value } => {
                !operation.is_complete(value) && operation.follows_continuations()
            }
            PerNodeResult::Failure { .. } => false,
        };

        if resubmit {
            state.pending.push(index, node.clone(), token);
        } else {
            state.releases.push((node.clone(), token));
        }
    }

    fn abandon<O>(&self, operation: &O, state: &mut RoundState<O::Value>, rounds: u32)
    where
        O: PagedOperation + ?Sized,
    {
        warn!(
            operation = operation.name(),
            rounds,
            pending = state.pending.len(),
            "Continuation round limit reached"
        );
        for entry in state.pending.take() {
            state.results[entry.index] = PerNodeResult::failure(
                StatusCode::BAD_CONTINUATION_POINT_INVALID,
                format!("Continuation round limit reached for node id {}", entry.node),
            );
            state.releases.push((entry.node, entry.token));
        }
    }

    async fn flush_releases<O>(&self, operation: &O, releases: &mut Vec<(NodeId, ContinuationPoint)>)
    where
        O: PagedOperation + ?Sized,
    {
        if releases.is_empty() {
            return;
        }
        let points = std::mem::take(releases);
        match operation.release(&points).await {
            Ok(()) => {
                for _ in &points {
                    self.telemetry.record_release();
                }
                debug!(operation = operation.name(), count = points.len(), "Continuation points released");
            }
            Err(e) => warn!(
                operation = operation.name(),
                count = points.len(),
                error = %e,
                "Failed to release continuation points"
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    enum Step {
        Data(Vec<u32>),
        Bad(StatusCode),
    }

    /// Serves a fixed script per node; a token is handed out while steps remain.
    #[derive(Default)]
    struct Scripted {
        scripts: HashMap<NodeId, Vec<Step>>,
        cursor: Mutex<HashMap<NodeId, usize>>,
        rounds: Mutex<Vec<usize>>,
        released: Mutex<Vec<Vec<ContinuationPoint>>>,
        fail_round: Option<usize>,
        limit: Option<usize>,
        follow: bool,
        surplus: usize,
    }

    impl Scripted {
        fn new(scripts: Vec<(NodeId, Vec<Step>)>) -> Self {
            Self {
                scripts: scripts.into_iter().collect(),
                follow: true,
                ..Default::default()
            }
        }

        fn serve(&self, node: &NodeId) -> RoundItem<Vec<u32>> {
            let mut cursor = self.cursor.lock();
            let position = cursor.entry(node.clone()).or_insert(0);
            let script = &self.scripts[node];
            let step = script[*position].clone();
            *position += 1;
            let token = (*position < script.len())
                .then(|| ContinuationPoint::from_bytes(format!("{}#{}", node, position).into_bytes()))
                .flatten();
            match step {
                Step::Data(values) => RoundItem::success(values, token),
                Step::Bad(status) => RoundItem::failure(status, format!("Error reading node id {}", node)),
            }
        }
    }

    #[async_trait]
    impl PagedOperation for Scripted {
        type Value = Vec<u32>;

        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn first_round(&self, nodes: &[NodeId]) -> UaResult<Vec<RoundItem<Vec<u32>>>> {
            self.rounds.lock().push(nodes.len());
            if self.fail_round == Some(0) {
                return Err(UaError::service_failure("Scripted", StatusCode::BAD_TOO_MANY_OPERATIONS));
            }
            let mut items: Vec<_> = nodes.iter().map(|node| self.serve(node)).collect();
            items.extend((0..self.surplus).map(|_| RoundItem::success(vec![99], None)));
            Ok(items)
        }

        async fn next_round(
            &self,
            pending: &[(NodeId, ContinuationPoint)],
        ) -> UaResult<Vec<RoundItem<Vec<u32>>>> {
            let round = {
                let mut rounds = self.rounds.lock();
                rounds.push(pending.len());
                rounds.len() - 1
            };
            if self.fail_round == Some(round) {
                return Err(UaError::connection_failed("opc.tcp://plc:4840", "socket closed"));
            }
            Ok(pending.iter().map(|(node, _)| self.serve(node)).collect())
        }

        async fn release(&self, points: &[(NodeId, ContinuationPoint)]) -> UaResult<()> {
            self.released
                .lock()
                .push(points.iter().map(|(_, token)| token.clone()).collect());
            Ok(())
        }

        fn merge(&self, accumulated: &mut Vec<u32>, incoming: Vec<u32>) {
            accumulated.extend(incoming);
        }

        fn is_complete(&self, value: &mut Vec<u32>) -> bool {
            match self.limit {
                Some(limit) => {
                    value.truncate(limit);
                    value.len() >= limit
                }
                None => false,
            }
        }

        fn follows_continuations(&self) -> bool {
            self.follow
        }
    }

    fn node(n: u32) -> NodeId {
        NodeId::numeric(2, n)
    }

    fn pages(k: usize) -> Vec<Step> {
        (0..=k as u32).map(|round| Step::Data(vec![round * 10, round * 10 + 1])).collect()
    }

    #[tokio::test]
    async fn test_drains_in_k_plus_one_rounds() {
        for k in [0usize, 1, 5] {
            let telemetry = Telemetry::new("test");
            let op = Scripted::new(vec![(node(1), pages(k))]);

            let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1)]).await;

            let expected: Vec<u32> = (0..=k as u32).flat_map(|r| [r * 10, r * 10 + 1]).collect();
            assert_eq!(results, vec![PerNodeResult::success(expected)]);
            assert_eq!(op.rounds.lock().len(), k + 1);
            assert!(op.released.lock().is_empty());
            assert_eq!(telemetry.snapshot().rounds_issued, k as u64 + 1);
        }
    }

    #[tokio::test]
    async fn test_mid_pagination_bad_discards_partial_data() {
        let telemetry = Telemetry::new("test");
        let op = Scripted::new(vec![
            (node(1), vec![Step::Data(vec![1, 2]), Step::Bad(StatusCode::BAD_NOT_READABLE)]),
            (node(2), vec![Step::Data(vec![7])]),
        ]);

        let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1), node(2)]).await;

        assert_eq!(results[0].status(), StatusCode::BAD_NOT_READABLE);
        assert!(results[0].value().is_none());
        assert_eq!(results[1], PerNodeResult::success(vec![7]));
    }

    #[tokio::test]
    async fn test_initial_transport_error_fails_every_node() {
        let telemetry = Telemetry::new("test");
        let mut op = Scripted::new(vec![(node(1), pages(0)), (node(2), pages(0))]);
        op.fail_round = Some(0);

        let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1), node(2)]).await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status(), StatusCode::BAD_TOO_MANY_OPERATIONS);
        }
    }

    #[tokio::test]
    async fn test_later_transport_error_fails_in_flight_nodes_only() {
        let telemetry = Telemetry::new("test");
        let mut op = Scripted::new(vec![
            (node(1), pages(0)),
            (node(2), pages(2)),
            (node(3), pages(1)),
        ]);
        op.fail_round = Some(2);

        let results = Paginator::new(&telemetry)
            .fetch_all(&op, &[node(1), node(2), node(3)])
            .await;

        assert_eq!(results[0], PerNodeResult::success(vec![0, 1]));
        assert_eq!(results[1].status(), StatusCode::BAD_COMMUNICATION_ERROR);
        assert_eq!(results[2], PerNodeResult::success(vec![0, 1, 10, 11]));
        assert_eq!(*op.rounds.lock(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_complete_value_releases_token() {
        let telemetry = Telemetry::new("test");
        let mut op = Scripted::new(vec![(node(1), pages(5))]);
        op.limit = Some(3);

        let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1)]).await;

        assert_eq!(results[0], PerNodeResult::success(vec![0, 1, 10]));
        assert_eq!(op.rounds.lock().len(), 2);
        assert_eq!(op.released.lock().len(), 1);
        assert_eq!(op.released.lock()[0].len(), 1);
        assert_eq!(telemetry.snapshot().continuation_points_released, 1);
    }

    #[tokio::test]
    async fn test_round_limit_fails_and_releases() {
        let telemetry = Telemetry::new("test");
        let op = Scripted::new(vec![(node(1), pages(10)), (node(2), pages(1))]);

        let results = Paginator::new(&telemetry)
            .with_max_rounds(Some(2))
            .fetch_all(&op, &[node(1), node(2)])
            .await;

        assert_eq!(results[0].status(), StatusCode::BAD_CONTINUATION_POINT_INVALID);
        assert!(matches!(
            &results[0],
            PerNodeResult::Failure { message, .. } if message.contains("round limit")
        ));
        assert!(results[1].is_success());
        assert_eq!(op.rounds.lock().len(), 3);
        assert_eq!(op.released.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_single_round_mode_keeps_partial_data() {
        let telemetry = Telemetry::new("test");
        let mut op = Scripted::new(vec![(node(1), pages(3))]);
        op.follow = false;

        let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1)]).await;

        assert_eq!(results[0], PerNodeResult::success(vec![0, 1]));
        assert_eq!(op.rounds.lock().len(), 1);
        assert_eq!(op.released.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_surplus_results_are_ignored() {
        let telemetry = Telemetry::new("test");
        let mut op = Scripted::new(vec![(node(1), pages(1)), (node(2), pages(0))]);
        op.surplus = 2;

        let results = Paginator::new(&telemetry).fetch_all(&op, &[node(1), node(2)]).await;

        assert_eq!(
            results,
            vec![
                PerNodeResult::success(vec![0, 1, 10, 11]),
                PerNodeResult::success(vec![0, 1]),
            ]
        );
        assert!(op.released.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_issues_nothing() {
        let telemetry = Telemetry::new("test");
        let op = Scripted::new(Vec::new());
        let results = Paginator::new(&telemetry).fetch_all(&op, &[]).await;
        assert!(results.is_empty());
        assert!(op.rounds.lock().is_empty());
    }
}
