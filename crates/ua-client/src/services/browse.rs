// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Forward hierarchical browse with BrowseNext paging.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_reading, Services};
use crate::error::UaResult;
use crate::paging::{PagedOperation, RoundItem};
use crate::result::PerNodeResult;
use crate::runtime::{BrowseDescription, BrowseResult, UaSession};
use crate::types::{ContinuationPoint, NodeClass, NodeId, ReferenceDescription};

fn default_node_class_mask() -> u32 {
    NodeClass::mask(&[NodeClass::Object, NodeClass::Variable])
}

fn default_max_results() -> usize {
    10_000
}

/// Browse settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseOptions {
    /// Node classes of the returned targets; 0 means all.
    #[serde(default = "default_node_class_mask")]
    pub node_class_mask: u32,

    /// Maximum references returned per root.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// References requested per round. Falls back to the paging settings,
    /// then to `max_results`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_per_round: Option<u32>,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            node_class_mask: default_node_class_mask(),
            max_results: default_max_results(),
            references_per_round: None,
        }
    }
}

impl BrowseOptions {
    /// Sets the node class mask.
    pub fn with_node_class_mask(mut self, mask: u32) -> Self {
        self.node_class_mask = mask;
        self
    }

    /// Sets the maximum number of references per root.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Sets the references requested per round.
    pub fn with_references_per_round(mut self, references: u32) -> Self {
        self.references_per_round = Some(references);
        self
    }
}

struct BrowseOperation<'a, S: ?Sized> {
    session: &'a S,
    node_class_mask: u32,
    max_results: usize,
    per_round: u32,
}

impl<S: UaSession + ?Sized> BrowseOperation<'_, S> {
    fn items(&self, nodes: &[NodeId], results: Vec<BrowseResult>) -> Vec<RoundItem<Vec<ReferenceDescription>>> {
        nodes
            .iter()
            .zip(results)
            .map(|(node, result)| {
                if result.status.is_bad() {
                    RoundItem {
                        result: PerNodeResult::failure(result.status, error_reading(node)),
                        continuation_point: result.continuation_point,
                    }
                } else {
                    RoundItem::success(result.references, result.continuation_point)
                }
            })
            .collect()
    }
}

#[async_trait]
impl<S: UaSession + ?Sized> PagedOperation for BrowseOperation<'_, S> {
    type Value = Vec<ReferenceDescription>;

    fn name(&self) -> &'static str {
        "browse"
    }

    async fn first_round(&self, nodes: &[NodeId]) -> UaResult<Vec<RoundItem<Self::Value>>> {
        let descriptions: Vec<BrowseDescription> = nodes
            .iter()
            .map(|node| BrowseDescription {
                node_id: node.clone(),
                reference_type_id: NodeId::HIERARCHICAL_REFERENCES,
                include_subtypes: true,
                node_class_mask: self.node_class_mask,
                max_references: self.per_round,
            })
            .collect();
        let results = self.session.browse(&descriptions).await?;
        Ok(self.items(nodes, results))
    }

    async fn next_round(
        &self,
        pending: &[(NodeId, ContinuationPoint)],
    ) -> UaResult<Vec<RoundItem<Self::Value>>> {
        let (nodes, points): (Vec<NodeId>, Vec<ContinuationPoint>) = pending.iter().cloned().unzip();
        let results = self.session.browse_next(false, &points).await?;
        Ok(self.items(&nodes, results))
    }

    async fn release(&self, points: &[(NodeId, ContinuationPoint)]) -> UaResult<()> {
        let points: Vec<ContinuationPoint> = points.iter().map(|(_, point)| point.clone()).collect();
        self.session.browse_next(true, &points).await?;
        Ok(())
    }

    fn merge(&self, accumulated: &mut Self::Value, incoming: Self::Value) {
        accumulated.extend(incoming);
    }

    fn is_complete(&self, value: &mut Self::Value) -> bool {
        value.truncate(self.max_results);
        value.len() >= self.max_results
    }
}

impl<S> Services<'_, S>
where
    S: UaSession + ?Sized,
{
    /// Browses the forward hierarchical references of `root`.
    pub async fn browse(
        &self,
        root: &NodeId,
        options: &BrowseOptions,
    ) -> PerNodeResult<Vec<ReferenceDescription>> {
        self.browse_many(std::slice::from_ref(root), options)
            .await
            .pop()
            .unwrap_or_else(|| super::missing_result(root))
    }

    /// Browses several roots in one paged operation.
    pub async fn browse_many(
        &self,
        roots: &[NodeId],
        options: &BrowseOptions,
    ) -> Vec<PerNodeResult<Vec<ReferenceDescription>>> {
        let per_round = options
            .references_per_round
            .filter(|n| *n > 0)
            .or(Some(self.paging.browse_max_references_per_round).filter(|n| *n > 0))
            .unwrap_or_else(|| u32::try_from(options.max_results).unwrap_or(u32::MAX));

        let operation = BrowseOperation {
            session: self.session,
            node_class_mask: options.node_class_mask,
            max_results: options.max_results,
            per_round,
        };

        let results = self.paginator().fetch_all(&operation, roots).await;
        debug!(
            roots = roots.len(),
            references = results
                .iter()
                .filter_map(|r| r.value())
                .map(Vec::len)
                .sum::<usize>(),
            "Browse complete"
        );
        results
    }
}
